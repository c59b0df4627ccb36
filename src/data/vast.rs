//! Loader for the tab-separated social network tables
//!
//! The link, entity and city tables start with two header rows that are
//! skipped; the username table has none. Columns are taken by position:
//!
//! - `Links_Table.txt`: `ID1`, `ID2`
//! - `Entities_Table.txt`: `ID`, `Name`, `Type`
//! - `People-Cities.txt`: `ID`, `City` (optional)
//! - `Flitter Names.txt`: `ID`, `Username` (optional)

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;

use crate::data::{Dataset, People, Person};
use crate::error::DataError;
use crate::graph::{GraphBuilder, NodeId};

pub const LINKS_FILE: &str = "Links_Table.txt";
pub const ENTITIES_FILE: &str = "Entities_Table.txt";
pub const CITIES_FILE: &str = "People-Cities.txt";
pub const NAMES_FILE: &str = "Flitter Names.txt";

const HEADER_ROWS: usize = 2;

/// One row of the entity table
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub id: NodeId,
    pub name: Option<String>,
    pub kind: Option<String>,
}

/// Read the dataset directory and build the graph plus the people directory
pub fn load_dataset(dir: impl AsRef<Path>) -> Result<Dataset, DataError> {
    let dir = dir.as_ref();
    log::info!("Loading dataset from {}", dir.display());

    let entities = read_entities(&dir.join(ENTITIES_FILE))?;
    log::info!("Loaded {} entities", entities.len());

    let links = read_links(&dir.join(LINKS_FILE))?;
    log::info!("Loaded {} links", links.len());

    let cities = read_optional(&dir.join(CITIES_FILE), "locations", read_cities)?;
    let usernames = read_optional(&dir.join(NAMES_FILE), "usernames", read_usernames)?;

    build_dataset(entities, &links, cities, usernames)
}

fn read_optional(
    path: &Path,
    what: &str,
    read: fn(&Path) -> Result<BTreeMap<NodeId, String>, DataError>,
) -> Result<BTreeMap<NodeId, String>, DataError> {
    if !path.exists() {
        log::warn!("{} not found, continuing without {}", path.display(), what);
        return Ok(BTreeMap::new());
    }
    let values = read(path)?;
    log::info!("Loaded {} for {} people", what, values.len());
    Ok(values)
}

/// Assemble a [`Dataset`] from already parsed rows.
///
/// Link endpoints that are missing from the entity table are added as
/// nodes; self-loops are dropped. Both are logged.
pub fn build_dataset(
    entities: Vec<EntityRow>,
    links: &[(NodeId, NodeId)],
    cities: BTreeMap<NodeId, String>,
    usernames: BTreeMap<NodeId, String>,
) -> Result<Dataset, DataError> {
    let mut builder = GraphBuilder::with_capacity(entities.len(), links.len());
    let mut people = BTreeMap::new();

    for entity in entities {
        builder.add_node(entity.id);
        people.insert(
            entity.id,
            Person {
                name: entity.name,
                kind: entity.kind,
                city: None,
                username: None,
            },
        );
    }

    let mut added_nodes = 0;
    let mut skipped_self_loops = 0;
    for &(a, b) in links {
        if a == b {
            log::warn!("Skipping self-loop on {}", a);
            skipped_self_loops += 1;
            continue;
        }
        for id in [a, b] {
            if !builder.contains_node(id) {
                log::warn!("Link endpoint {} is not in the entity table, adding it", id);
                builder.add_node(id);
                added_nodes += 1;
            }
        }
        builder.add_edge(a, b);
    }

    for (id, city) in cities {
        people.entry(id).or_insert_with(Person::default).city = Some(city);
    }
    for (id, username) in usernames {
        people.entry(id).or_insert_with(Person::default).username = Some(username);
    }

    let graph = builder.build()?;
    log::info!(
        "Built network with {} people and {} connections",
        graph.node_count(),
        graph.edge_count()
    );
    log::debug!("Adjacency arena uses {} bytes", graph.memory_usage());

    Ok(Dataset {
        graph,
        people: People::new(people),
        added_nodes,
        skipped_self_loops,
    })
}

fn read_table(path: &Path, header_rows: usize, min_columns: usize) -> Result<DataFrame, DataError> {
    if !path.exists() {
        return Err(DataError::MissingFile(path.to_path_buf()));
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(false)
        .with_skip_rows(header_rows)
        .with_separator(b'\t')
        .finish()?
        .collect()?;

    if df.width() < min_columns {
        return Err(DataError::Columns {
            file: path.display().to_string(),
            expected: min_columns,
            found: df.width(),
        });
    }
    Ok(df)
}

fn id_column(df: &DataFrame, position: usize) -> Result<Vec<Option<NodeId>>, DataError> {
    let series = df.get_columns()[position]
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let ids = series
        .i64()?
        .into_iter()
        .map(|value| value.and_then(|v| NodeId::try_from(v).ok()))
        .collect();
    Ok(ids)
}

fn text_column(df: &DataFrame, position: usize) -> Result<Vec<Option<String>>, DataError> {
    let series = df.get_columns()[position]
        .as_materialized_series()
        .cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

pub fn read_links(path: &Path) -> Result<Vec<(NodeId, NodeId)>, DataError> {
    let df = read_table(path, HEADER_ROWS, 2)?;
    let from = id_column(&df, 0)?;
    let to = id_column(&df, 1)?;

    let mut links = Vec::with_capacity(df.height());
    for (row, pair) in from.into_iter().zip(to).enumerate() {
        match pair {
            (Some(a), Some(b)) => links.push((a, b)),
            _ => log::warn!("{}: skipping row {} without two valid ids", path.display(), row),
        }
    }
    Ok(links)
}

pub fn read_entities(path: &Path) -> Result<Vec<EntityRow>, DataError> {
    let df = read_table(path, HEADER_ROWS, 1)?;
    let ids = id_column(&df, 0)?;
    let names = if df.width() > 1 {
        text_column(&df, 1)?
    } else {
        vec![None; df.height()]
    };
    let kinds = if df.width() > 2 {
        text_column(&df, 2)?
    } else {
        vec![None; df.height()]
    };

    let mut entities = Vec::with_capacity(df.height());
    for (row, ((id, name), kind)) in ids.into_iter().zip(names).zip(kinds).enumerate() {
        match id {
            Some(id) => entities.push(EntityRow { id, name, kind }),
            None => log::warn!("{}: skipping row {} without a valid id", path.display(), row),
        }
    }
    Ok(entities)
}

pub fn read_cities(path: &Path) -> Result<BTreeMap<NodeId, String>, DataError> {
    read_id_text(path, HEADER_ROWS)
}

pub fn read_usernames(path: &Path) -> Result<BTreeMap<NodeId, String>, DataError> {
    read_id_text(path, 0)
}

/// Two-column id/text table; rows missing either value are dropped
fn read_id_text(path: &Path, header_rows: usize) -> Result<BTreeMap<NodeId, String>, DataError> {
    let df = read_table(path, header_rows, 2)?;
    let ids = id_column(&df, 0)?;
    let values = text_column(&df, 1)?;

    Ok(ids
        .into_iter()
        .zip(values)
        .filter_map(|(id, value)| Some((id?, value?)))
        .collect())
}
