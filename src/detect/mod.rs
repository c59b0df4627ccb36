//! Criminal structure detection.
//!
//! The pipeline is leaf first:
//!
//! 1. [`candidates`] filters the metrics table into ranked per-role lists.
//! 2. [`scorer`] verifies the adjacency pattern of one role assignment and
//!    scores it, or disqualifies it with a [`Reason`].
//! 3. [`selector`] runs a bounded search for both scenarios and picks the
//!    winner.
//!
//! Disqualification is data: it is reported through [`ScoreOutcome`] and
//! [`ScenarioStatus`], never raised as an error.

pub mod candidates;
pub mod scorer;
pub mod selector;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::config::AnalysisConfig;
use crate::error::DetectError;
use crate::graph::{NodeId, SocialGraph};
use crate::metrics;

pub use candidates::{find_candidates, CandidateSet};
pub use scorer::StructureScorer;
pub use selector::{select_best, Analysis, ScenarioReport, ScenarioStatus, Verdict};

/// Positions in the organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Employee,
    Handler,
    Middleman,
    Leader,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Employee, Role::Handler, Role::Middleman, Role::Leader];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Handler => "handler",
            Role::Middleman => "middleman",
            Role::Leader => "leader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which organization shape is being matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scenario {
    /// Three handlers report to one middleman
    A,
    /// Three middlemen, each bridging a different handler to the leader
    B,
}

impl Scenario {
    pub fn middleman_count(self) -> usize {
        match self {
            Scenario::A => 1,
            Scenario::B => 3,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Scenario::A => "single middleman",
            Scenario::B => "three middlemen",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::A => f.write_str("A"),
            Scenario::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Middlemen {
    Single(NodeId),
    Trio([NodeId; 3]),
}

impl Middlemen {
    pub fn ids(&self) -> &[NodeId] {
        match self {
            Middlemen::Single(id) => std::slice::from_ref(id),
            Middlemen::Trio(ids) => ids,
        }
    }
}

/// One candidate mapping of people to roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub employee: NodeId,
    pub handlers: [NodeId; 3],
    pub middlemen: Middlemen,
    pub leader: NodeId,
}

impl Assignment {
    /// Every role holder paired with its role, employee first
    pub fn roles(&self) -> Vec<(Role, NodeId)> {
        let mut roles = Vec::with_capacity(8);
        roles.push((Role::Employee, self.employee));
        roles.extend(self.handlers.iter().map(|&h| (Role::Handler, h)));
        roles.extend(self.middlemen.ids().iter().map(|&m| (Role::Middleman, m)));
        roles.push((Role::Leader, self.leader));
        roles
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.roles().into_iter().map(|(_, id)| id).collect()
    }
}

/// Why an assignment or a whole scenario failed.
///
/// The snake_case codes returned by [`Reason::code`] are stable across runs
/// and are what reports print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reason {
    MiddlemanCountMismatch,
    DuplicateRoleNode,
    EmployeeNotAdjacentToAllHandlers,
    HandlerNotAdjacentToMiddleman,
    MiddlemanNotAdjacentToLeader,
    HandlerNotCoveredByMiddleman,
    MiddlemanNotAdjacentToAnyHandler,
    MiddlemenShareHandlerSubset,
    MiddlemanNotLinkedToLeader,
    LeaderOutOfRange,
    MiddlemanOutOfRange,
    NoCandidates(Role),
    NoQualifyingAssignment,
}

impl Reason {
    pub fn code(self) -> &'static str {
        match self {
            Reason::MiddlemanCountMismatch => "middleman_count_mismatch",
            Reason::DuplicateRoleNode => "duplicate_role_node",
            Reason::EmployeeNotAdjacentToAllHandlers => "employee_not_adjacent_to_all_handlers",
            Reason::HandlerNotAdjacentToMiddleman => "handler_not_adjacent_to_middleman",
            Reason::MiddlemanNotAdjacentToLeader => "middleman_not_adjacent_to_leader",
            Reason::HandlerNotCoveredByMiddleman => "handler_not_covered_by_middleman",
            Reason::MiddlemanNotAdjacentToAnyHandler => "middleman_not_adjacent_to_any_handler",
            Reason::MiddlemenShareHandlerSubset => "middlemen_share_handler_subset",
            Reason::MiddlemanNotLinkedToLeader => "middleman_not_linked_to_leader",
            Reason::LeaderOutOfRange => "leader_out_of_range",
            Reason::MiddlemanOutOfRange => "middleman_out_of_range",
            Reason::NoCandidates(Role::Employee) => "no_employee_candidates",
            Reason::NoCandidates(Role::Handler) => "no_handler_candidates",
            Reason::NoCandidates(Role::Middleman) => "no_middleman_candidates",
            Reason::NoCandidates(Role::Leader) => "no_leader_candidates",
            Reason::NoQualifyingAssignment => "no_qualifying_assignment",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Per-role fit values, each in `[0, 1]`, before weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub employee: f64,
    pub handler: f64,
    pub middleman: f64,
    pub leader: f64,
}

/// An assignment that passed every structural check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredAssignment {
    pub scenario: Scenario,
    pub assignment: Assignment,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// The winning scenario and role mapping
pub type BestResult = ScoredAssignment;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disqualification {
    pub scenario: Scenario,
    pub assignment: Assignment,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScoreOutcome {
    Scored(ScoredAssignment),
    Disqualified(Disqualification),
}

impl ScoreOutcome {
    pub fn score(&self) -> f64 {
        match self {
            ScoreOutcome::Scored(scored) => scored.score,
            ScoreOutcome::Disqualified(_) => 0.0,
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            ScoreOutcome::Scored(_) => None,
            ScoreOutcome::Disqualified(d) => Some(d.reason),
        }
    }
}

/// Compute metrics for `graph` and run the detection for both scenarios
pub fn analyze(graph: &SocialGraph, config: &AnalysisConfig) -> Result<Analysis, DetectError> {
    let metrics = metrics::compute(graph)?;
    Ok(select_best(graph, &metrics, config))
}

/// Like [`analyze`], but starting from a flat key/value configuration.
///
/// The configuration is validated before any metric is computed.
pub fn analyze_with_settings(
    graph: &SocialGraph,
    settings: &BTreeMap<String, String>,
) -> Result<Analysis, DetectError> {
    let config = AnalysisConfig::from_flat(settings)?;
    analyze(graph, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(
            Reason::EmployeeNotAdjacentToAllHandlers.code(),
            "employee_not_adjacent_to_all_handlers"
        );
        assert_eq!(Reason::LeaderOutOfRange.to_string(), "leader_out_of_range");
        assert_eq!(
            Reason::NoCandidates(Role::Middleman).code(),
            "no_middleman_candidates"
        );
        assert_eq!(
            serde_json::to_string(&Reason::DuplicateRoleNode).unwrap(),
            "\"duplicate_role_node\""
        );
    }

    #[test]
    fn assignment_roles_in_order() {
        let a = Assignment {
            employee: 1,
            handlers: [2, 3, 4],
            middlemen: Middlemen::Trio([5, 6, 7]),
            leader: 8,
        };
        assert_eq!(a.members(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(a.roles()[4], (Role::Middleman, 5));
        assert_eq!(Middlemen::Single(9).ids(), &[9]);
    }
}
