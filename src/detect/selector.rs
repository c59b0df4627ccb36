//! Bounded search over both scenarios and final selection.
//!
//! The search walks ranked candidate lists top first: employees, then the
//! employee's best-ranked handler neighbors taken three at a time, then
//! middlemen around each handler triple, then leaders. Every step of the
//! walk counts against `search.combination_limit`: each handler triple,
//! each middleman or middleman trio tried, and each assignment handed to
//! the scorer. The walk stops once the cap is reached, so a large
//! candidate pool trades completeness for a bounded run time even when no
//! assignment ever reaches the scorer.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;

use itertools::Itertools;
use serde::Serialize;

use crate::config::{AnalysisConfig, LeaderLink};
use crate::detect::candidates::{find_candidates, CandidateSet};
use crate::detect::scorer::{distinct_bridges, StructureScorer};
use crate::detect::{Assignment, BestResult, Middlemen, Reason, Role, ScoreOutcome, ScoredAssignment, Scenario};
use crate::graph::algorithms::within_two_hops;
use crate::graph::{NodeId, SocialGraph};
use crate::metrics::MetricsTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScenarioStatus {
    Matched(ScoredAssignment),
    Disqualified(Reason),
}

/// Outcome of searching one scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub status: ScenarioStatus,
    /// Search steps taken, bounded by `search.combination_limit`
    pub combinations_examined: usize,
    /// Assignments handed to the scorer
    pub assignments_scored: usize,
    /// True when the search stopped at the combination limit
    pub hit_limit: bool,
    /// Why the examined assignments were rejected, with counts
    pub rejections: BTreeMap<Reason, usize>,
}

impl ScenarioReport {
    pub fn best(&self) -> Option<&ScoredAssignment> {
        match &self.status {
            ScenarioStatus::Matched(scored) => Some(scored),
            ScenarioStatus::Disqualified(_) => None,
        }
    }

    fn disqualified(scenario: Scenario, reason: Reason) -> Self {
        Self {
            scenario,
            status: ScenarioStatus::Disqualified(reason),
            combinations_examined: 0,
            assignments_scored: 0,
            hit_limit: false,
            rejections: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Verdict {
    Found(BestResult),
    /// Neither scenario produced a valid assignment
    NoValidAssignment,
}

/// Everything the reporting layer needs about one detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub candidates: CandidateSet,
    pub scenario_a: ScenarioReport,
    pub scenario_b: ScenarioReport,
    pub verdict: Verdict,
}

/// Pick the better scenario. B must score strictly higher to win.
pub fn compare(a: &ScenarioReport, b: &ScenarioReport) -> Verdict {
    match (a.best(), b.best()) {
        (Some(sa), Some(sb)) if sb.score > sa.score => Verdict::Found(sb.clone()),
        (Some(sa), _) => Verdict::Found(sa.clone()),
        (None, Some(sb)) => Verdict::Found(sb.clone()),
        (None, None) => Verdict::NoValidAssignment,
    }
}

/// Run candidate generation and the bounded search for both scenarios
pub fn select_best(graph: &SocialGraph, metrics: &MetricsTable, config: &AnalysisConfig) -> Analysis {
    let candidates = find_candidates(metrics, &config.thresholds);
    let scorer = StructureScorer::new(graph, metrics, config);

    let scenario_a = run_scenario(Scenario::A, graph, &candidates, scorer, config);
    let scenario_b = run_scenario(Scenario::B, graph, &candidates, scorer, config);
    let verdict = compare(&scenario_a, &scenario_b);

    match &verdict {
        Verdict::Found(best) => log::info!(
            "Best match: scenario {} ({}) with score {:.4}",
            best.scenario,
            best.scenario.describe(),
            best.score
        ),
        Verdict::NoValidAssignment => log::info!("No valid assignment in either scenario"),
    }

    Analysis {
        candidates,
        scenario_a,
        scenario_b,
        verdict,
    }
}

fn run_scenario(
    scenario: Scenario,
    graph: &SocialGraph,
    candidates: &CandidateSet,
    scorer: StructureScorer<'_>,
    config: &AnalysisConfig,
) -> ScenarioReport {
    log::info!("Analyzing scenario {} ({})", scenario, scenario.describe());

    if let Some(role) = candidates.first_empty() {
        log::warn!("Scenario {} disqualified: no {} candidates", scenario, role);
        return ScenarioReport::disqualified(scenario, Reason::NoCandidates(role));
    }

    let mut search = Search::new(graph, candidates, scorer, config);
    match scenario {
        Scenario::A => search.scenario_a(),
        Scenario::B => search.scenario_b(),
    }

    log::info!(
        "Scenario {}: {} search steps, {} assignments scored{}",
        scenario,
        search.examined,
        search.scored,
        if search.hit_limit { " (limit reached)" } else { "" }
    );

    let status = match search.best {
        Some(best) => ScenarioStatus::Matched(best),
        None => ScenarioStatus::Disqualified(Reason::NoQualifyingAssignment),
    };

    ScenarioReport {
        scenario,
        status,
        combinations_examined: search.examined,
        assignments_scored: search.scored,
        hit_limit: search.hit_limit,
        rejections: search.rejections,
    }
}

struct Search<'a> {
    graph: &'a SocialGraph,
    candidates: &'a CandidateSet,
    scorer: StructureScorer<'a>,
    config: &'a AnalysisConfig,
    handler_ranks: HashMap<NodeId, usize>,
    middleman_ranks: HashMap<NodeId, usize>,
    examined: usize,
    scored: usize,
    hit_limit: bool,
    best: Option<ScoredAssignment>,
    rejections: BTreeMap<Reason, usize>,
}

impl<'a> Search<'a> {
    fn new(
        graph: &'a SocialGraph,
        candidates: &'a CandidateSet,
        scorer: StructureScorer<'a>,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            graph,
            candidates,
            scorer,
            config,
            handler_ranks: candidates.ranks(Role::Handler),
            middleman_ranks: candidates.ranks(Role::Middleman),
            examined: 0,
            scored: 0,
            hit_limit: false,
            best: None,
            rejections: BTreeMap::new(),
        }
    }

    /// Count one search step; breaks once the combination limit is reached
    fn step(&mut self) -> ControlFlow<()> {
        if self.examined >= self.config.search.combination_limit {
            self.hit_limit = true;
            return ControlFlow::Break(());
        }
        self.examined += 1;
        ControlFlow::Continue(())
    }

    /// Score one assignment as a search step
    fn try_assignment(&mut self, assignment: Assignment, scenario: Scenario) -> ControlFlow<()> {
        if self.step().is_break() {
            return ControlFlow::Break(());
        }
        self.scored += 1;

        match self.scorer.score(&assignment, scenario) {
            ScoreOutcome::Scored(scored) => {
                let better = self.best.as_ref().map_or(true, |best| scored.score > best.score);
                if better {
                    log::debug!("New best for scenario {}: {:.4}", scenario, scored.score);
                    self.best = Some(scored);
                }
            }
            ScoreOutcome::Disqualified(d) => {
                *self.rejections.entry(d.reason).or_insert(0) += 1;
            }
        }
        ControlFlow::Continue(())
    }

    /// `ids` filtered to those in `ranks`, ordered by rank
    fn ranked(ids: impl IntoIterator<Item = NodeId>, ranks: &HashMap<NodeId, usize>) -> Vec<NodeId> {
        let mut ranked: Vec<(usize, NodeId)> = ids
            .into_iter()
            .filter_map(|id| ranks.get(&id).map(|&rank| (rank, id)))
            .collect();
        ranked.sort_unstable();
        ranked.dedup();
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    /// Best-ranked handler candidates among the employee's contacts
    fn handler_pool(&self, employee: NodeId) -> Vec<NodeId> {
        let mut pool = Self::ranked(self.graph.neighbor_ids(employee), &self.handler_ranks);
        pool.retain(|&h| h != employee);
        pool.truncate(self.config.search.handler_pool);
        pool
    }

    /// Middleman candidates adjacent to every handler of the triple
    fn common_middlemen(&self, handlers: &[NodeId; 3], used: &[NodeId]) -> Vec<NodeId> {
        let around_first = self
            .graph
            .neighbor_ids(handlers[0])
            .into_iter()
            .filter(|&m| !used.contains(&m))
            .filter(|&m| handlers[1..].iter().all(|&h| self.graph.are_adjacent(h, m)));
        let mut pool = Self::ranked(around_first, &self.middleman_ranks);
        pool.truncate(self.config.search.middleman_pool);
        pool
    }

    /// Middleman candidates adjacent to at least one handler of the triple
    fn covering_middlemen(&self, handlers: &[NodeId; 3], used: &[NodeId]) -> Vec<NodeId> {
        let around_any = handlers
            .iter()
            .flat_map(|&h| self.graph.neighbor_ids(h))
            .filter(|m| !used.contains(m));
        let mut pool = Self::ranked(around_any, &self.middleman_ranks);
        pool.truncate(self.config.search.middleman_pool);
        pool
    }

    /// Leader candidates, in rank order, linked to every middleman
    fn leaders_for(&self, middlemen: &[NodeId], used: &[NodeId], link: LeaderLink) -> Vec<NodeId> {
        self.candidates
            .leaders
            .iter()
            .copied()
            .filter(|l| !used.contains(l) && !middlemen.contains(l))
            .filter(|&l| {
                middlemen.iter().all(|&m| match link {
                    LeaderLink::Direct => self.graph.are_adjacent(m, l),
                    LeaderLink::WithinTwoHops => within_two_hops(self.graph, m, l),
                })
            })
            .collect()
    }

    fn employees(&self) -> Vec<NodeId> {
        self.candidates
            .employees
            .iter()
            .copied()
            .take(self.config.search.employee_pool)
            .collect()
    }

    fn scenario_a(&mut self) {
        'search: for employee in self.employees() {
            let handlers = self.handler_pool(employee);
            if handlers.len() < 3 {
                log::debug!("Employee {} has only {} handler candidates", employee, handlers.len());
                continue;
            }

            for triple in handlers.into_iter().combinations(3) {
                if self.step().is_break() {
                    break 'search;
                }
                let triple = [triple[0], triple[1], triple[2]];
                let used = [employee, triple[0], triple[1], triple[2]];

                for middleman in self.common_middlemen(&triple, &used) {
                    if self.step().is_break() {
                        break 'search;
                    }
                    for leader in self.leaders_for(&[middleman], &used, LeaderLink::Direct) {
                        let assignment = Assignment {
                            employee,
                            handlers: triple,
                            middlemen: Middlemen::Single(middleman),
                            leader,
                        };
                        if self.try_assignment(assignment, Scenario::A).is_break() {
                            break 'search;
                        }
                    }
                }
            }
        }
    }

    fn scenario_b(&mut self) {
        let link = self.config.leader_link;

        'search: for employee in self.employees() {
            let handlers = self.handler_pool(employee);
            if handlers.len() < 3 {
                log::debug!("Employee {} has only {} handler candidates", employee, handlers.len());
                continue;
            }

            for triple in handlers.into_iter().combinations(3) {
                if self.step().is_break() {
                    break 'search;
                }
                let triple = [triple[0], triple[1], triple[2]];
                let used = [employee, triple[0], triple[1], triple[2]];

                for trio in self.covering_middlemen(&triple, &used).into_iter().combinations(3) {
                    if self.step().is_break() {
                        break 'search;
                    }
                    let trio = [trio[0], trio[1], trio[2]];
                    if !distinct_bridges(self.graph, &triple, &trio) {
                        continue;
                    }

                    for leader in self.leaders_for(&trio, &used, link) {
                        let assignment = Assignment {
                            employee,
                            handlers: triple,
                            middlemen: Middlemen::Trio(trio),
                            leader,
                        };
                        if self.try_assignment(assignment, Scenario::B).is_break() {
                            break 'search;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bounds, DegreeRole, MiddlemanRole, ScoringWeights, SearchLimits, Thresholds};
    use crate::detect::ScoreBreakdown;
    use crate::graph::GraphBuilder;
    use crate::metrics::compute;

    fn loose_config(limit: usize) -> AnalysisConfig {
        let any_degree = DegreeRole {
            degree: Bounds::new(1.0, 1000.0),
            target: 4.0,
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
                combination_limit: limit,
                employee_pool: 10,
                handler_pool: 10,
                middleman_pool: 10,
            },
            leader_link: LeaderLink::Direct,
        }
    }

    /// Employee 1 with six handlers 10..=15, all reporting to middleman 20,
    /// which reports to leader 30
    fn wide_graph() -> SocialGraph {
        let mut edges = Vec::new();
        for h in 10..=15u64 {
            edges.push((1, h));
            edges.push((h, 20));
        }
        edges.push((20, 30));
        let nodes = [1, 10, 11, 12, 13, 14, 15, 20, 30];
        GraphBuilder::from_edges(nodes, edges).unwrap()
    }

    fn report(scenario: Scenario, score: Option<f64>) -> ScenarioReport {
        let status = match score {
            Some(score) => ScenarioStatus::Matched(ScoredAssignment {
                scenario,
                assignment: Assignment {
                    employee: 1,
                    handlers: [2, 3, 4],
                    middlemen: match scenario {
                        Scenario::A => Middlemen::Single(5),
                        Scenario::B => Middlemen::Trio([5, 6, 7]),
                    },
                    leader: 8,
                },
                score,
                breakdown: ScoreBreakdown {
                    employee: 0.0,
                    handler: 0.0,
                    middleman: 0.0,
                    leader: 0.0,
                },
            }),
            None => ScenarioStatus::Disqualified(Reason::NoQualifyingAssignment),
        };
        ScenarioReport {
            scenario,
            status,
            combinations_examined: 0,
            assignments_scored: 0,
            hit_limit: false,
            rejections: BTreeMap::new(),
        }
    }

    fn winner(verdict: &Verdict) -> Option<Scenario> {
        match verdict {
            Verdict::Found(best) => Some(best.scenario),
            Verdict::NoValidAssignment => None,
        }
    }

    #[test]
    fn equal_scores_prefer_scenario_a() {
        let verdict = compare(&report(Scenario::A, Some(2.5)), &report(Scenario::B, Some(2.5)));
        assert_eq!(winner(&verdict), Some(Scenario::A));
    }

    #[test]
    fn strictly_higher_b_wins() {
        let verdict = compare(&report(Scenario::A, Some(2.5)), &report(Scenario::B, Some(2.6)));
        assert_eq!(winner(&verdict), Some(Scenario::B));
    }

    #[test]
    fn single_surviving_scenario_wins() {
        assert_eq!(
            winner(&compare(&report(Scenario::A, None), &report(Scenario::B, Some(1.0)))),
            Some(Scenario::B)
        );
        assert_eq!(
            compare(&report(Scenario::A, None), &report(Scenario::B, None)),
            Verdict::NoValidAssignment
        );
    }

    #[test]
    fn search_never_exceeds_combination_limit() {
        let g = wide_graph();
        let m = compute(&g).unwrap();
        for limit in [1, 5, 7] {
            let analysis = select_best(&g, &m, &loose_config(limit));
            assert!(analysis.scenario_a.combinations_examined <= limit);
            assert!(analysis.scenario_b.combinations_examined <= limit);
            assert!(analysis.scenario_a.hit_limit);
        }
    }

    #[test]
    fn generous_limit_finds_the_wide_structure() {
        let g = wide_graph();
        let m = compute(&g).unwrap();
        let mut config = loose_config(10_000);
        // only the degree-one node 30 can lead
        config.thresholds.leader.degree = Bounds::new(1.0, 1.0);
        let analysis = select_best(&g, &m, &config);

        assert!(!analysis.scenario_a.hit_limit);
        let best = analysis.scenario_a.best().expect("scenario A should match");
        assert_eq!(best.assignment.employee, 1);
        assert_eq!(best.assignment.middlemen, Middlemen::Single(20));
        assert_eq!(best.assignment.leader, 30);
        assert_eq!(winner(&analysis.verdict), Some(Scenario::A));
    }

    #[test]
    fn limit_bounds_work_that_never_reaches_the_scorer() {
        // every middleman serves every handler, but the only leaders are an
        // isolated pair no middleman can reach
        let mut edges = Vec::new();
        for h in 10..=19u64 {
            edges.push((1, h));
            for m in 100..=119u64 {
                edges.push((h, m));
            }
        }
        edges.push((500, 501));
        let nodes: Vec<NodeId> = [1, 500, 501].into_iter().chain(10..=19).chain(100..=119).collect();
        let g = GraphBuilder::from_edges(nodes, edges).unwrap();
        let m = compute(&g).unwrap();
        let mut config = loose_config(5);
        config.thresholds.leader.degree = Bounds::new(1.0, 1.0);

        let analysis = select_best(&g, &m, &config);
        for report in [&analysis.scenario_a, &analysis.scenario_b] {
            assert!(report.combinations_examined <= 5);
            assert!(report.hit_limit, "scenario {} ran past the limit", report.scenario);
            assert_eq!(report.assignments_scored, 0);
            assert_eq!(
                report.status,
                ScenarioStatus::Disqualified(Reason::NoQualifyingAssignment)
            );
        }
    }

    #[test]
    fn trio_sharing_one_handler_is_not_a_match() {
        // 5 and 6 can only bridge handler 2; 7 serves both 3 and 4
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
        let analysis = select_best(&g, &m, &loose_config(10_000));

        assert!(!analysis.scenario_b.hit_limit);
        assert_eq!(analysis.scenario_b.best(), None);
        assert_eq!(
            analysis.scenario_b.status,
            ScenarioStatus::Disqualified(Reason::NoQualifyingAssignment)
        );
    }

    #[test]
    fn empty_role_disqualifies_both_scenarios() {
        let g = wide_graph();
        let m = compute(&g).unwrap();
        let mut config = loose_config(100);
        config.thresholds.leader.degree = Bounds::new(500.0, 600.0);

        let analysis = select_best(&g, &m, &config);
        assert_eq!(
            analysis.scenario_a.status,
            ScenarioStatus::Disqualified(Reason::NoCandidates(Role::Leader))
        );
        assert_eq!(analysis.scenario_a.combinations_examined, 0);
        assert_eq!(analysis.verdict, Verdict::NoValidAssignment);
    }

    #[test]
    fn selection_is_repeatable() {
        let g = wide_graph();
        let m = compute(&g).unwrap();
        let config = loose_config(50);
        assert_eq!(select_best(&g, &m, &config), select_best(&g, &m, &config));
    }
}
