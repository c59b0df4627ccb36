//! Configuration management for the analyzer.
//!
//! All thresholds, weights and search limits come from a flat mapping of
//! dotted keys (`employee.degree_min`, `scoring.weights.leader`, ...). A YAML
//! file with nested sections is flattened into the same keys. Unknown keys
//! are ignored; a missing required key fails before any analysis starts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Keys that must be present, in the order they are checked
pub const REQUIRED_KEYS: &[&str] = &[
    "employee.degree_min",
    "employee.degree_max",
    "handler.degree_min",
    "handler.degree_max",
    "middleman.betweenness_min",
    "leader.degree_min",
    "scoring.weights.employee",
    "scoring.weights.handler",
    "scoring.weights.middleman",
    "scoring.weights.leader",
    "search.combination_limit",
];

const DEFAULT_EMPLOYEE_POOL: usize = 5;
const DEFAULT_HANDLER_POOL: usize = 10;
const DEFAULT_MIDDLEMAN_POOL: usize = 10;

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min, max: f64::INFINITY }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max.is_infinite() {
            write!(f, "[{}, inf)", self.min)
        } else {
            write!(f, "[{}, {}]", self.min, self.max)
        }
    }
}

/// Thresholds for a role selected by degree (employee, handler, leader)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreeRole {
    pub degree: Bounds,
    /// Ideal degree used by the scorer
    pub target: f64,
    pub clustering: Option<Bounds>,
}

/// Thresholds for the middleman role, selected by betweenness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiddlemanRole {
    pub betweenness: Bounds,
    pub degree: Option<Bounds>,
    pub clustering: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub employee: DegreeRole,
    pub handler: DegreeRole,
    pub middleman: MiddlemanRole,
    pub leader: DegreeRole,
    /// When set, a leader must also be in this top share of the network by
    /// degree or by betweenness
    pub leader_top_fraction: Option<f64>,
}

/// Per-role weights of the match score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub employee: f64,
    pub handler: f64,
    pub middleman: f64,
    pub leader: f64,
}

/// Bounds on the candidate search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Maximum search steps per scenario
    pub combination_limit: usize,
    /// Top-ranked employees tried
    pub employee_pool: usize,
    /// Top-ranked handlers around each employee fed into triples
    pub handler_pool: usize,
    /// Top-ranked middlemen around a handler triple (Scenario B)
    pub middleman_pool: usize,
}

/// How each Scenario B middleman must reach the leader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderLink {
    /// Direct adjacency
    Direct,
    /// Adjacent or sharing a neighbor
    WithinTwoHops,
}

impl FromStr for LeaderLink {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(LeaderLink::Direct),
            "within_two_hops" => Ok(LeaderLink::WithinTwoHops),
            other => Err(format!("expected `direct` or `within_two_hops`, got `{}`", other)),
        }
    }
}

/// Validated analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub thresholds: Thresholds,
    pub weights: ScoringWeights,
    pub search: SearchLimits,
    pub leader_link: LeaderLink,
}

impl AnalysisConfig {
    /// Load a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Reading analysis configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse YAML text, flattening nested sections into dotted keys
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let mut flat = BTreeMap::new();
        flatten_yaml("", &value, &mut flat);
        Self::from_flat(&flat)
    }

    /// Build from a flat key/value mapping
    pub fn from_flat(map: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let flat = FlatConfig { map };

        if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !map.contains_key(**key)) {
            return Err(ConfigError::Missing((*missing).to_string()));
        }

        let employee_degree = flat.bounds("employee.degree_min", "employee.degree_max")?;
        let handler_degree = flat.bounds("handler.degree_min", "handler.degree_max")?;
        let leader_degree = match flat.optional_f64("leader.degree_max")? {
            Some(max) => checked_bounds("leader.degree_max", flat.number("leader.degree_min")?, max)?,
            None => Bounds::at_least(flat.number("leader.degree_min")?),
        };

        let betweenness_min = flat.number("middleman.betweenness_min")?;
        let betweenness_max = flat.optional_f64("middleman.betweenness_max")?.unwrap_or(1.0);
        let middleman_betweenness =
            checked_bounds("middleman.betweenness_max", betweenness_min, betweenness_max)?;

        let thresholds = Thresholds {
            employee: DegreeRole {
                degree: employee_degree,
                target: flat
                    .optional_f64("employee.degree_target")?
                    .unwrap_or_else(|| employee_degree.midpoint()),
                clustering: flat.optional_bounds("employee.clustering")?,
            },
            handler: DegreeRole {
                degree: handler_degree,
                target: flat
                    .optional_f64("handler.degree_target")?
                    .unwrap_or_else(|| handler_degree.midpoint()),
                clustering: flat.optional_bounds("handler.clustering")?,
            },
            middleman: MiddlemanRole {
                betweenness: middleman_betweenness,
                degree: flat.optional_bounds("middleman.degree")?,
                clustering: flat.optional_bounds("middleman.clustering")?,
            },
            leader: DegreeRole {
                degree: leader_degree,
                target: flat
                    .optional_f64("leader.degree_target")?
                    .unwrap_or(leader_degree.min),
                clustering: flat.optional_bounds("leader.clustering")?,
            },
            leader_top_fraction: flat.optional_fraction("leader.top_fraction")?,
        };

        let weights = ScoringWeights {
            employee: flat.weight("scoring.weights.employee")?,
            handler: flat.weight("scoring.weights.handler")?,
            middleman: flat.weight("scoring.weights.middleman")?,
            leader: flat.weight("scoring.weights.leader")?,
        };
        if weights.employee + weights.handler + weights.middleman + weights.leader <= 0.0 {
            return Err(ConfigError::invalid(
                "scoring.weights",
                "0",
                "at least one weight must be positive",
            ));
        }

        let search = SearchLimits {
            combination_limit: flat.usize_at_least("search.combination_limit", 1)?,
            employee_pool: flat
                .optional_usize_at_least("search.employee_pool", 1)?
                .unwrap_or(DEFAULT_EMPLOYEE_POOL),
            handler_pool: flat
                .optional_usize_at_least("search.handler_pool", 3)?
                .unwrap_or(DEFAULT_HANDLER_POOL),
            middleman_pool: flat
                .optional_usize_at_least("search.middleman_pool", 3)?
                .unwrap_or(DEFAULT_MIDDLEMAN_POOL),
        };

        let leader_link = match map.get("scenario_b.leader_link") {
            Some(raw) => raw
                .parse::<LeaderLink>()
                .map_err(|reason: String| ConfigError::invalid("scenario_b.leader_link", raw, reason))?,
            None => LeaderLink::Direct,
        };

        let ignored: Vec<&String> = map.keys().filter(|k| !is_recognized(k)).collect();
        if !ignored.is_empty() {
            log::debug!("Ignoring unrecognized configuration keys: {:?}", ignored);
        }

        Ok(Self {
            thresholds,
            weights,
            search,
            leader_link,
        })
    }
}

fn is_recognized(key: &str) -> bool {
    const OPTIONAL: &[&str] = &[
        "employee.degree_target",
        "handler.degree_target",
        "leader.degree_target",
        "leader.degree_max",
        "leader.top_fraction",
        "middleman.betweenness_max",
        "middleman.degree_min",
        "middleman.degree_max",
        "scenario_b.leader_link",
        "search.employee_pool",
        "search.handler_pool",
        "search.middleman_pool",
    ];
    REQUIRED_KEYS.contains(&key)
        || OPTIONAL.contains(&key)
        || key.ends_with(".clustering_min")
        || key.ends_with(".clustering_max")
}

fn checked_bounds(key: &str, min: f64, max: f64) -> Result<Bounds, ConfigError> {
    if min > max {
        return Err(ConfigError::invalid(
            key,
            max,
            format!("upper bound is below the lower bound {}", min),
        ));
    }
    Ok(Bounds::new(min, max))
}

/// Typed accessors over the flat mapping
struct FlatConfig<'a> {
    map: &'a BTreeMap<String, String>,
}

impl FlatConfig<'_> {
    fn optional_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Some(value)),
                _ => Err(ConfigError::invalid(key, raw, "expected a finite number")),
            },
        }
    }

    /// A share in `(0, 1]`
    fn optional_fraction(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.optional_f64(key)? {
            Some(value) if value <= 0.0 || value > 1.0 => {
                Err(ConfigError::invalid(key, value, "expected a fraction in (0, 1]"))
            }
            other => Ok(other),
        }
    }

    fn number(&self, key: &str) -> Result<f64, ConfigError> {
        self.optional_f64(key)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn weight(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.number(key)?;
        if value < 0.0 {
            return Err(ConfigError::invalid(key, value, "weights must not be negative"));
        }
        Ok(value)
    }

    fn optional_usize_at_least(&self, key: &str, floor: usize) -> Result<Option<usize>, ConfigError> {
        match self.map.get(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value >= floor => Ok(Some(value)),
                _ => Err(ConfigError::invalid(
                    key,
                    raw,
                    format!("expected an integer of at least {}", floor),
                )),
            },
        }
    }

    fn usize_at_least(&self, key: &str, floor: usize) -> Result<usize, ConfigError> {
        self.optional_usize_at_least(key, floor)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn bounds(&self, min_key: &str, max_key: &str) -> Result<Bounds, ConfigError> {
        checked_bounds(max_key, self.number(min_key)?, self.number(max_key)?)
    }

    /// `<prefix>_min` / `<prefix>_max`; either side may be omitted
    fn optional_bounds(&self, prefix: &str) -> Result<Option<Bounds>, ConfigError> {
        let min_key = format!("{}_min", prefix);
        let max_key = format!("{}_max", prefix);
        match (self.optional_f64(&min_key)?, self.optional_f64(&max_key)?) {
            (None, None) => Ok(None),
            (min, max) => checked_bounds(
                &max_key,
                min.unwrap_or(f64::NEG_INFINITY),
                max.unwrap_or(f64::INFINITY),
            )
            .map(Some),
        }
    }
}

fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut BTreeMap<String, String>) {
    use serde_yaml::Value;

    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };

    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let key = match key {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                flatten_yaml(&join(&key), child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out),
        Value::Null | Value::Sequence(_) => {}
    }
}
