//! Dataset loading and the people directory

pub mod vast;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, SocialGraph};

pub use vast::load_dataset;

/// What the entity, location and username tables know about one person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub city: Option<String>,
    /// Handle on the social platform
    pub username: Option<String>,
}

/// Lookup of names and cities by node id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct People {
    entries: BTreeMap<NodeId, Person>,
}

impl People {
    pub fn new(entries: BTreeMap<NodeId, Person>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: NodeId) -> Option<&Person> {
        self.entries.get(&id)
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.name.as_deref()
    }

    pub fn city_of(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.city.as_deref()
    }

    pub fn username_of(&self, id: NodeId) -> Option<&str> {
        self.get(id)?.username.as_deref()
    }

    /// Distinct cities, sorted
    pub fn cities(&self) -> Vec<&str> {
        let mut cities: Vec<&str> = self.entries.values().filter_map(|p| p.city.as_deref()).collect();
        cities.sort_unstable();
        cities.dedup();
        cities
    }

    pub fn people_in(&self, city: &str) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter(|(_, p)| p.city.as_deref() == Some(city))
            .map(|(&id, _)| id)
            .collect()
    }

    /// `"<id> (<name>)"`, or just the id when the name is unknown
    pub fn label(&self, id: NodeId) -> String {
        match self.name_of(id) {
            Some(name) => format!("{} ({})", id, name),
            None => id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loaded network with its side tables
#[derive(Debug, Clone)]
pub struct Dataset {
    pub graph: SocialGraph,
    pub people: People,
    /// Link endpoints that had no entity row
    pub added_nodes: usize,
    pub skipped_self_loops: usize,
}
