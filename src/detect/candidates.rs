//! Per-role candidate lists

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{Bounds, Thresholds};
use crate::detect::Role;
use crate::graph::NodeId;
use crate::metrics::{MetricsTable, NodeMetrics};

/// Ranked candidates for every role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    pub employees: Vec<NodeId>,
    pub handlers: Vec<NodeId>,
    pub middlemen: Vec<NodeId>,
    pub leaders: Vec<NodeId>,
}

impl CandidateSet {
    pub fn get(&self, role: Role) -> &[NodeId] {
        match role {
            Role::Employee => &self.employees,
            Role::Handler => &self.handlers,
            Role::Middleman => &self.middlemen,
            Role::Leader => &self.leaders,
        }
    }

    /// First role, in organization order, with no candidate at all
    pub fn first_empty(&self) -> Option<Role> {
        Role::ALL.into_iter().find(|&role| self.get(role).is_empty())
    }

    /// Position of each candidate in its role's ranking
    pub fn ranks(&self, role: Role) -> HashMap<NodeId, usize> {
        self.get(role)
            .iter()
            .enumerate()
            .map(|(rank, &id)| (id, rank))
            .collect()
    }
}

fn within(bounds: Option<Bounds>, value: f64) -> bool {
    bounds.map_or(true, |b| b.contains(value))
}

/// Whether a node's metrics satisfy every configured bound of `role`
pub fn qualifies(role: Role, row: &NodeMetrics, thresholds: &Thresholds) -> bool {
    let degree = row.degree as f64;
    match role {
        Role::Employee | Role::Handler | Role::Leader => {
            let bounds = match role {
                Role::Employee => &thresholds.employee,
                Role::Handler => &thresholds.handler,
                _ => &thresholds.leader,
            };
            bounds.degree.contains(degree) && within(bounds.clustering, row.clustering)
        }
        Role::Middleman => {
            let bounds = &thresholds.middleman;
            bounds.betweenness.contains(row.betweenness)
                && within(bounds.degree, degree)
                && within(bounds.clustering, row.clustering)
        }
    }
}

/// Degree and betweenness cutoffs of the most prominent nodes.
///
/// For a fraction `f` of `n` nodes the cutoff is the value at position
/// `min(max(1, floor(n * f)), n - 1)` of each metric sorted descending. A
/// node is prominent when it reaches either cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub degree: f64,
    pub betweenness: f64,
}

impl Prominence {
    pub fn top_fraction(metrics: &MetricsTable, fraction: f64) -> Option<Self> {
        let n = metrics.len();
        if n == 0 {
            return None;
        }
        let position = ((n as f64 * fraction).floor() as usize).max(1).min(n - 1);

        let cutoff = |value: fn(&NodeMetrics) -> f64| {
            let mut values: Vec<f64> = metrics.iter().map(value).collect();
            values.sort_by(|a, b| b.total_cmp(a));
            values[position]
        };

        Some(Self {
            degree: cutoff(|row| row.degree as f64),
            betweenness: cutoff(|row| row.betweenness),
        })
    }

    pub fn admits(&self, row: &NodeMetrics) -> bool {
        row.degree as f64 >= self.degree || row.betweenness >= self.betweenness
    }
}

/// Role bounds plus the network-wide leader prominence rule
#[derive(Debug, Clone, Copy)]
pub struct RoleFilter<'a> {
    thresholds: &'a Thresholds,
    prominence: Option<Prominence>,
}

impl<'a> RoleFilter<'a> {
    pub fn new(metrics: &MetricsTable, thresholds: &'a Thresholds) -> Self {
        let prominence = thresholds
            .leader_top_fraction
            .and_then(|fraction| Prominence::top_fraction(metrics, fraction));
        if let Some(p) = &prominence {
            log::debug!(
                "Leaders must reach degree {} or betweenness {:.6}",
                p.degree,
                p.betweenness
            );
        }
        Self {
            thresholds,
            prominence,
        }
    }

    pub fn admits(&self, role: Role, row: &NodeMetrics) -> bool {
        qualifies(role, row, self.thresholds)
            && (role != Role::Leader || self.prominence.map_or(true, |p| p.admits(row)))
    }
}

/// Secondary metric ranking the survivors of a role, higher first
fn rank_key(role: Role, row: &NodeMetrics) -> f64 {
    match role {
        Role::Employee | Role::Handler | Role::Leader => row.betweenness,
        // brokerage: bridges that also reach many people
        Role::Middleman => row.betweenness * row.degree as f64,
    }
}

fn ranked(role: Role, metrics: &MetricsTable, filter: &RoleFilter<'_>) -> Vec<NodeId> {
    let mut survivors: Vec<&NodeMetrics> = metrics
        .iter()
        .filter(|row| filter.admits(role, row))
        .collect();

    survivors.sort_by(|a, b| {
        rank_key(role, b)
            .total_cmp(&rank_key(role, a))
            .then(a.id.cmp(&b.id))
    });

    survivors.into_iter().map(|row| row.id).collect()
}

/// Filter and rank candidates for every role.
///
/// An empty list is a valid outcome; the selector turns it into a
/// disqualified scenario.
pub fn find_candidates(metrics: &MetricsTable, thresholds: &Thresholds) -> CandidateSet {
    let filter = RoleFilter::new(metrics, thresholds);
    let set = CandidateSet {
        employees: ranked(Role::Employee, metrics, &filter),
        handlers: ranked(Role::Handler, metrics, &filter),
        middlemen: ranked(Role::Middleman, metrics, &filter),
        leaders: ranked(Role::Leader, metrics, &filter),
    };

    log::info!(
        "Candidates: {} employees, {} handlers, {} middlemen, {} leaders",
        set.employees.len(),
        set.handlers.len(),
        set.middlemen.len(),
        set.leaders.len()
    );

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DegreeRole, MiddlemanRole};

    fn row(id: NodeId, degree: usize, betweenness: f64) -> NodeMetrics {
        NodeMetrics {
            id,
            degree,
            betweenness,
            closeness: 0.5,
            eigenvector: 0.1,
            clustering: 0.3,
            component: 0,
            community: 0,
        }
    }

    fn table() -> MetricsTable {
        MetricsTable::new(
            0,
            vec![
                row(1, 40, 0.01),
                row(2, 38, 0.02),
                row(3, 35, 0.02),
                row(4, 20, 0.30),
                row(5, 120, 0.10),
                row(6, 2, 0.0),
            ],
            vec![6],
        )
    }

    fn thresholds() -> Thresholds {
        let degree_role = |min: f64, max: f64| DegreeRole {
            degree: Bounds::new(min, max),
            target: (min + max) / 2.0,
            clustering: None,
        };
        Thresholds {
            employee: degree_role(35.0, 45.0),
            handler: degree_role(30.0, 40.0),
            middleman: MiddlemanRole {
                betweenness: Bounds::new(0.05, 1.0),
                degree: None,
                clustering: None,
            },
            leader: DegreeRole {
                degree: Bounds::at_least(100.0),
                target: 100.0,
                clustering: None,
            },
            leader_top_fraction: None,
        }
    }

    #[test]
    fn filters_and_ranks_each_role() {
        let set = find_candidates(&table(), &thresholds());
        // betweenness desc, ties by id
        assert_eq!(set.employees, vec![2, 3, 1]);
        assert_eq!(set.handlers, vec![2, 3, 1]);
        // 4: 0.30 * 20 = 6.0, 5: 0.10 * 120 = 12.0
        assert_eq!(set.middlemen, vec![5, 4]);
        assert_eq!(set.leaders, vec![5]);
        assert_eq!(set.first_empty(), None);
    }

    #[test]
    fn empty_role_is_not_an_error() {
        let mut t = thresholds();
        t.middleman.betweenness = Bounds::new(0.99, 1.0);
        let set = find_candidates(&table(), &t);
        assert!(set.middlemen.is_empty());
        assert_eq!(set.first_empty(), Some(Role::Middleman));
    }

    #[test]
    fn clustering_bounds_filter_when_configured() {
        let mut t = thresholds();
        t.employee.clustering = Some(Bounds::new(0.5, 1.0));
        assert!(find_candidates(&table(), &t).employees.is_empty());
    }

    #[test]
    fn prominence_cutoffs_sit_past_the_top_share() {
        // one node in the top share of six: cutoffs are the second highest values
        let p = Prominence::top_fraction(&table(), 0.2).unwrap();
        assert_eq!(p.degree, 40.0);
        assert_eq!(p.betweenness, 0.10);

        // a tiny fraction still keeps one node above the cutoff
        assert_eq!(Prominence::top_fraction(&table(), 0.001), Some(p));
        assert_eq!(
            Prominence::top_fraction(&MetricsTable::new(0, Vec::new(), Vec::new()), 0.2),
            None
        );
    }

    #[test]
    fn leaders_must_be_prominent_when_configured() {
        let mut t = thresholds();
        t.leader.degree = Bounds::at_least(30.0);
        assert_eq!(find_candidates(&table(), &t).leaders, vec![5, 2, 3, 1]);

        // 5 leads by both metrics, 1 only reaches the degree cutoff
        t.leader_top_fraction = Some(0.2);
        assert_eq!(find_candidates(&table(), &t).leaders, vec![5, 1]);
    }

    #[test]
    fn ranks_follow_list_order() {
        let set = find_candidates(&table(), &thresholds());
        let ranks = set.ranks(Role::Middleman);
        assert_eq!(ranks[&5], 0);
        assert_eq!(ranks[&4], 1);
    }
}
