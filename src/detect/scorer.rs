//! Structural verification and scoring of role assignments

use itertools::Itertools;

use crate::config::{AnalysisConfig, LeaderLink};
use crate::detect::candidates::RoleFilter;
use crate::detect::{
    Assignment, Disqualification, Middlemen, Reason, Role, ScoreBreakdown, ScoreOutcome,
    ScoredAssignment, Scenario,
};
use crate::graph::algorithms::within_two_hops;
use crate::graph::{NodeId, SocialGraph};
use crate::metrics::MetricsTable;

/// Scores assignments against one graph snapshot and configuration.
///
/// Holds only shared references; scoring the same assignment twice gives
/// the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct StructureScorer<'a> {
    graph: &'a SocialGraph,
    metrics: &'a MetricsTable,
    config: &'a AnalysisConfig,
    filter: RoleFilter<'a>,
}

impl<'a> StructureScorer<'a> {
    pub fn new(graph: &'a SocialGraph, metrics: &'a MetricsTable, config: &'a AnalysisConfig) -> Self {
        Self {
            graph,
            metrics,
            config,
            filter: RoleFilter::new(metrics, &config.thresholds),
        }
    }

    pub fn score(&self, assignment: &Assignment, scenario: Scenario) -> ScoreOutcome {
        match self.verify(assignment, scenario) {
            Ok(()) => {
                let breakdown = self.breakdown(assignment);
                let w = &self.config.weights;
                let score = w.employee * breakdown.employee
                    + w.handler * breakdown.handler
                    + w.middleman * breakdown.middleman
                    + w.leader * breakdown.leader;

                ScoreOutcome::Scored(ScoredAssignment {
                    scenario,
                    assignment: *assignment,
                    score,
                    breakdown,
                })
            }
            Err(reason) => ScoreOutcome::Disqualified(Disqualification {
                scenario,
                assignment: *assignment,
                reason,
            }),
        }
    }

    /// Structural and range checks; the first failure wins
    fn verify(&self, a: &Assignment, scenario: Scenario) -> Result<(), Reason> {
        let middlemen = match (scenario, &a.middlemen) {
            (Scenario::A, Middlemen::Single(_)) | (Scenario::B, Middlemen::Trio(_)) => {
                a.middlemen.ids()
            }
            _ => return Err(Reason::MiddlemanCountMismatch),
        };

        let mut members = a.members();
        members.sort_unstable();
        if members.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Reason::DuplicateRoleNode);
        }

        let adjacent = |x: NodeId, y: NodeId| self.graph.are_adjacent(x, y);

        if !a.handlers.iter().all(|&h| adjacent(a.employee, h)) {
            return Err(Reason::EmployeeNotAdjacentToAllHandlers);
        }

        match scenario {
            Scenario::A => {
                let middleman = middlemen[0];
                if !a.handlers.iter().all(|&h| adjacent(h, middleman)) {
                    return Err(Reason::HandlerNotAdjacentToMiddleman);
                }
                if !adjacent(middleman, a.leader) {
                    return Err(Reason::MiddlemanNotAdjacentToLeader);
                }
            }
            Scenario::B => {
                if !a
                    .handlers
                    .iter()
                    .all(|&h| middlemen.iter().any(|&m| adjacent(h, m)))
                {
                    return Err(Reason::HandlerNotCoveredByMiddleman);
                }
                if !middlemen
                    .iter()
                    .all(|&m| a.handlers.iter().any(|&h| adjacent(h, m)))
                {
                    return Err(Reason::MiddlemanNotAdjacentToAnyHandler);
                }
                if !distinct_bridges(self.graph, &a.handlers, middlemen) {
                    return Err(Reason::MiddlemenShareHandlerSubset);
                }
                if !middlemen.iter().all(|&m| self.linked_to_leader(m, a.leader)) {
                    return Err(Reason::MiddlemanNotLinkedToLeader);
                }
            }
        }

        if !self.in_range(Role::Leader, a.leader) {
            return Err(Reason::LeaderOutOfRange);
        }
        if !middlemen.iter().all(|&m| self.in_range(Role::Middleman, m)) {
            return Err(Reason::MiddlemanOutOfRange);
        }

        Ok(())
    }

    fn linked_to_leader(&self, middleman: NodeId, leader: NodeId) -> bool {
        match self.config.leader_link {
            LeaderLink::Direct => self.graph.are_adjacent(middleman, leader),
            LeaderLink::WithinTwoHops => within_two_hops(self.graph, middleman, leader),
        }
    }

    fn in_range(&self, role: Role, id: NodeId) -> bool {
        self.metrics
            .get(id)
            .is_some_and(|row| self.filter.admits(role, row))
    }

    fn degree(&self, id: NodeId) -> f64 {
        self.metrics.get(id).map_or(0.0, |row| row.degree as f64)
    }

    fn breakdown(&self, a: &Assignment) -> ScoreBreakdown {
        let t = &self.config.thresholds;

        let handler = a
            .handlers
            .iter()
            .map(|&h| closeness(self.degree(h), t.handler.target))
            .sum::<f64>()
            / a.handlers.len() as f64;

        let max_betweenness = self.metrics.max_betweenness();
        let middlemen = a.middlemen.ids();
        let middleman = if max_betweenness > 0.0 {
            middlemen
                .iter()
                .map(|&m| self.metrics.get(m).map_or(0.0, |row| row.betweenness) / max_betweenness)
                .sum::<f64>()
                / middlemen.len() as f64
        } else {
            0.0
        };

        let leader_degree = self.degree(a.leader);
        let leader = if leader_degree >= t.leader.target {
            1.0
        } else {
            closeness(leader_degree, t.leader.target)
        };

        ScoreBreakdown {
            employee: closeness(self.degree(a.employee), t.employee.target),
            handler,
            middleman,
            leader,
        }
    }
}

/// True when the middlemen can be paired one to one with the handlers
/// along edges, so no two middlemen serve the same single handler.
pub(crate) fn distinct_bridges(graph: &SocialGraph, handlers: &[NodeId], middlemen: &[NodeId]) -> bool {
    handlers.len() == middlemen.len()
        && middlemen.iter().permutations(middlemen.len()).any(|order| {
            handlers
                .iter()
                .zip(order)
                .all(|(&h, &m)| graph.are_adjacent(h, m))
        })
}

/// 1 at the target, falling off with absolute distance
fn closeness(value: f64, target: f64) -> f64 {
    1.0 / (1.0 + (value - target).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AnalysisConfig, Bounds, DegreeRole, MiddlemanRole, ScoringWeights, SearchLimits,
        Thresholds,
    };
    use crate::graph::GraphBuilder;
    use crate::metrics::compute;

    fn loose_config() -> AnalysisConfig {
        let any_degree = DegreeRole {
            degree: Bounds::new(0.0, 1000.0),
            target: 3.0,
            clustering: None,
        };
        AnalysisConfig {
            thresholds: Thresholds {
                employee: any_degree,
                handler: any_degree,
                middleman: MiddlemanRole {
                    betweenness: Bounds::new(0.0, 1.0),
                    degree: None,
                    clustering: None,
                },
                leader: any_degree,
                leader_top_fraction: None,
            },
            weights: ScoringWeights {
                employee: 1.0,
                handler: 1.0,
                middleman: 1.0,
                leader: 1.0,
            },
            search: SearchLimits {
                combination_limit: 100,
                employee_pool: 5,
                handler_pool: 10,
                middleman_pool: 10,
            },
            leader_link: LeaderLink::Direct,
        }
    }

    /// 1 employee, 2-4 handlers, 5 middleman, 6 leader
    fn scenario_a_graph() -> SocialGraph {
        GraphBuilder::from_edges(
            1..=6,
            [(1, 2), (1, 3), (1, 4), (2, 5), (3, 5), (4, 5), (5, 6)],
        )
        .unwrap()
    }

    /// 1 employee, 2-4 handlers, 5-7 middlemen (one per handler), 8 leader
    fn scenario_b_graph() -> SocialGraph {
        GraphBuilder::from_edges(
            1..=8,
            [
                (1, 2),
                (1, 3),
                (1, 4),
                (2, 5),
                (3, 6),
                (4, 7),
                (5, 8),
                (6, 8),
                (7, 8),
            ],
        )
        .unwrap()
    }

    fn single(employee: NodeId, handlers: [NodeId; 3], middleman: NodeId, leader: NodeId) -> Assignment {
        Assignment {
            employee,
            handlers,
            middlemen: Middlemen::Single(middleman),
            leader,
        }
    }

    fn trio(middlemen: [NodeId; 3], leader: NodeId) -> Assignment {
        Assignment {
            employee: 1,
            handlers: [2, 3, 4],
            middlemen: Middlemen::Trio(middlemen),
            leader,
        }
    }

    #[test]
    fn valid_scenario_a_scores_positive() {
        let g = scenario_a_graph();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let outcome = StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 4], 5, 6), Scenario::A);
        assert!(outcome.reason().is_none(), "{:?}", outcome);
        assert!(outcome.score() > 0.0);
    }

    #[test]
    fn duplicate_roles_are_rejected_first() {
        let g = scenario_a_graph();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let outcome = StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 3], 5, 6), Scenario::A);
        assert_eq!(outcome.reason(), Some(Reason::DuplicateRoleNode));
        assert_eq!(outcome.score(), 0.0);
    }

    #[test]
    fn arity_must_match_scenario() {
        let g = scenario_a_graph();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let scorer = StructureScorer::new(&g, &m, &config);
        assert_eq!(
            scorer.score(&single(1, [2, 3, 4], 5, 6), Scenario::B).reason(),
            Some(Reason::MiddlemanCountMismatch)
        );
    }

    #[test]
    fn missing_middleman_edge_is_reported() {
        let g = GraphBuilder::from_edges(
            1..=6,
            [(1, 2), (1, 3), (1, 4), (2, 5), (3, 5), (5, 6)],
        )
        .unwrap();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let outcome = StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 4], 5, 6), Scenario::A);
        assert_eq!(outcome.reason(), Some(Reason::HandlerNotAdjacentToMiddleman));
    }

    #[test]
    fn middleman_must_reach_leader() {
        let g = GraphBuilder::from_edges(
            1..=6,
            [(1, 2), (1, 3), (1, 4), (2, 5), (3, 5), (4, 5)],
        )
        .unwrap();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let outcome = StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 4], 5, 6), Scenario::A);
        assert_eq!(outcome.reason(), Some(Reason::MiddlemanNotAdjacentToLeader));
    }

    #[test]
    fn scenario_b_accepts_one_middleman_per_handler() {
        let g = scenario_b_graph();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let outcome = StructureScorer::new(&g, &m, &config).score(&trio([5, 6, 7], 8), Scenario::B);
        assert!(outcome.reason().is_none(), "{:?}", outcome);
    }

    #[test]
    fn scenario_b_leader_link_rule_is_configurable() {
        // 7 reaches the leader only through 5
        let g = GraphBuilder::from_edges(
            1..=8,
            [
                (1, 2),
                (1, 3),
                (1, 4),
                (2, 5),
                (3, 6),
                (4, 7),
                (5, 8),
                (6, 8),
                (7, 5),
            ],
        )
        .unwrap();
        let m = compute(&g).unwrap();

        let direct = loose_config();
        assert_eq!(
            StructureScorer::new(&g, &m, &direct).score(&trio([5, 6, 7], 8), Scenario::B).reason(),
            Some(Reason::MiddlemanNotLinkedToLeader)
        );

        let mut two_hops = loose_config();
        two_hops.leader_link = LeaderLink::WithinTwoHops;
        assert!(StructureScorer::new(&g, &m, &two_hops)
            .score(&trio([5, 6, 7], 8), Scenario::B)
            .reason()
            .is_none());
    }

    #[test]
    fn scenario_b_requires_every_handler_covered() {
        // handler 4 has no middleman
        let g = GraphBuilder::from_edges(
            1..=8,
            [(1, 2), (1, 3), (1, 4), (2, 5), (3, 6), (2, 7), (5, 8), (6, 8), (7, 8)],
        )
        .unwrap();
        let m = compute(&g).unwrap();
        let config = loose_config();
        assert_eq!(
            StructureScorer::new(&g, &m, &config).score(&trio([5, 6, 7], 8), Scenario::B).reason(),
            Some(Reason::HandlerNotCoveredByMiddleman)
        );
    }

    #[test]
    fn scenario_b_middlemen_need_their_own_handlers() {
        // 5 and 6 both hang off handler 2 only; 7 serves 3 and 4
        let g = GraphBuilder::from_edges(
            1..=8,
            [
                (1, 2),
                (1, 3),
                (1, 4),
                (2, 5),
                (2, 6),
                (3, 7),
                (4, 7),
                (5, 8),
                (6, 8),
                (7, 8),
            ],
        )
        .unwrap();
        let m = compute(&g).unwrap();
        let config = loose_config();
        assert_eq!(
            StructureScorer::new(&g, &m, &config).score(&trio([5, 6, 7], 8), Scenario::B).reason(),
            Some(Reason::MiddlemenShareHandlerSubset)
        );
    }

    #[test]
    fn distinct_bridges_accepts_any_pairing_order() {
        let g = scenario_b_graph();
        assert!(distinct_bridges(&g, &[2, 3, 4], &[7, 5, 6]));
        assert!(!distinct_bridges(&g, &[2, 3, 4], &[5, 5, 6]));
        assert!(!distinct_bridges(&g, &[2, 3], &[5, 6, 7]));
    }

    #[test]
    fn middleman_range_is_rechecked() {
        let g = scenario_a_graph();
        let m = compute(&g).unwrap();
        let mut config = loose_config();
        config.thresholds.middleman.betweenness = Bounds::new(0.99, 1.0);
        assert_eq!(
            StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 4], 5, 6), Scenario::A).reason(),
            Some(Reason::MiddlemanOutOfRange)
        );
    }

    #[test]
    fn obscure_leader_fails_the_prominence_rule() {
        let g = scenario_a_graph();
        let m = compute(&g).unwrap();
        let mut config = loose_config();
        let scorer = StructureScorer::new(&g, &m, &config);
        assert!(scorer.score(&single(1, [2, 3, 4], 5, 6), Scenario::A).reason().is_none());

        // leaf 6 is below both top-half cutoffs
        config.thresholds.leader_top_fraction = Some(0.5);
        assert_eq!(
            StructureScorer::new(&g, &m, &config).score(&single(1, [2, 3, 4], 5, 6), Scenario::A).reason(),
            Some(Reason::LeaderOutOfRange)
        );
    }

    #[test]
    fn closer_degree_never_scores_lower() {
        assert!(closeness(40.0, 40.0) > closeness(41.0, 40.0));
        assert!(closeness(41.0, 40.0) > closeness(45.0, 40.0));
        assert_eq!(closeness(35.0, 40.0), closeness(45.0, 40.0));
    }

    #[test]
    fn scoring_is_repeatable() {
        let g = scenario_b_graph();
        let m = compute(&g).unwrap();
        let config = loose_config();
        let scorer = StructureScorer::new(&g, &m, &config);
        let first = scorer.score(&trio([5, 6, 7], 8), Scenario::B);
        let second = scorer.score(&trio([5, 6, 7], 8), Scenario::B);
        assert_eq!(first, second);
    }
}
