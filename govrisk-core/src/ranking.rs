//! Scenario ranking
//!
//! Global invariants enforced:
//! - Total score is a sum of non-negative weighted magnitudes (lower = better)
//! - Sorting is stable: equal scores keep catalog order
//! - Near-ties are flagged, never hidden or broken
//! - Per-goal ordinals run 1..N with N = best

use crate::catalog::{Catalog, GoalDirection};
use crate::goals::{scenario_goal_profile, ScenarioGoalProfile};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Score gap below which adjacent scenarios are reported as tied
pub const DEFAULT_NEAR_TIE_THRESHOLD: f64 = 1e-4;

/// Goal id → importance weight
pub type GoalWeights = BTreeMap<String, f64>;

/// One goal's share of a scenario's total score
#[derive(Debug, Clone, Serialize)]
pub struct WeightedContribution {
    pub goal: String,
    pub weight: f64,
    /// Expected impact, plus the baseline gap for rule-derived baselines
    pub adjusted_impact: f64,
    /// `|adjusted_impact · normalizer| · weight`
    pub contribution: f64,
}

/// A scenario's position in a weighted ranking
#[derive(Debug, Clone, Serialize)]
pub struct RankedScenario {
    pub scenario: String,
    pub scenario_name: String,
    pub total_score: f64,
    pub rank: usize,
    pub contributions: Vec<WeightedContribution>,
    /// Within the near-tie threshold of a neighbour
    pub near_tie: bool,
}

/// Weighted score of a single scenario
///
/// Goals are visited in catalog order. Weights for goals the catalog does not
/// define are ignored.
pub fn weighted_score(
    catalog: &Catalog,
    profile: &ScenarioGoalProfile,
    weights: &GoalWeights,
) -> (f64, Vec<WeightedContribution>) {
    let mut total = 0.0;
    let mut contributions = Vec::new();

    for goal in catalog.goals() {
        let Some(&weight) = weights.get(&goal.id) else {
            continue;
        };
        let Some(score) = profile.get(&goal.id) else {
            continue;
        };

        let mut impact = score.expected_impact;
        // Structural ceiling gap: low-capability scenarios are penalized
        // before any risk fires
        if let Some(rule) = &goal.baseline_rule {
            impact += score.baseline - rule.max_value();
        }

        let contribution = (impact * goal.normalizer).abs() * weight;
        total += contribution;
        contributions.push(WeightedContribution {
            goal: goal.id.clone(),
            weight,
            adjusted_impact: impact,
            contribution,
        });
    }

    (total, contributions)
}

/// Rank every scenario by weighted score, best (lowest) first
pub fn rank_scenarios(catalog: &Catalog, weights: &GoalWeights) -> Vec<RankedScenario> {
    rank_scenarios_with_threshold(catalog, weights, DEFAULT_NEAR_TIE_THRESHOLD)
}

/// [`rank_scenarios`] with an explicit near-tie threshold
pub fn rank_scenarios_with_threshold(
    catalog: &Catalog,
    weights: &GoalWeights,
    near_tie_threshold: f64,
) -> Vec<RankedScenario> {
    let mut ranked: Vec<RankedScenario> = catalog
        .scenarios()
        .iter()
        .filter_map(|s| scenario_goal_profile(catalog, &s.id))
        .map(|profile| {
            let (total_score, contributions) = weighted_score(catalog, &profile, weights);
            RankedScenario {
                scenario: profile.scenario,
                scenario_name: profile.scenario_name,
                total_score,
                rank: 0,
                contributions,
                near_tie: false,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.total_score
            .partial_cmp(&b.total_score)
            .unwrap_or(Ordering::Equal)
    });

    for (i, entry) in ranked.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    for i in 1..ranked.len() {
        let gap = ranked[i].total_score - ranked[i - 1].total_score;
        if gap.abs() < near_tie_threshold {
            tracing::warn!(
                first = %ranked[i - 1].scenario,
                second = %ranked[i].scenario,
                gap,
                "near-tie in scenario ranking"
            );
            ranked[i - 1].near_tie = true;
            ranked[i].near_tie = true;
        }
    }

    ranked
}

/// Ordinal of one scenario on one goal
#[derive(Debug, Clone, Serialize)]
pub struct GoalRank {
    pub scenario: String,
    pub goal: String,
    pub expected_value: f64,
    /// 1..N, N = best
    pub rank: usize,
}

/// Cross-scenario ordinal per (scenario, goal)
#[derive(Debug, Clone, Default, Serialize)]
pub struct GoalRankings {
    /// Number of ranked scenarios (the best ordinal)
    pub scenario_count: usize,
    /// Scenario-major, catalog order
    pub entries: Vec<GoalRank>,
}

impl GoalRankings {
    pub fn get(&self, scenario_id: &str, goal_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.scenario == scenario_id && e.goal == goal_id)
            .map(|e| e.rank)
    }

    /// Ordinals of one scenario, in catalog goal order
    pub fn for_scenario(&self, scenario_id: &str) -> Vec<&GoalRank> {
        self.entries
            .iter()
            .filter(|e| e.scenario == scenario_id)
            .collect()
    }
}

/// Rank every scenario within each goal by expected value
///
/// Higher-better goals rank the largest expected value best, lower-better
/// goals the smallest. Ties keep catalog order. Depends on no user input.
pub fn goal_rankings(catalog: &Catalog) -> GoalRankings {
    let profiles: Vec<ScenarioGoalProfile> = catalog
        .scenarios()
        .iter()
        .filter_map(|s| scenario_goal_profile(catalog, &s.id))
        .collect();
    let n = profiles.len();

    let mut ranks: BTreeMap<(usize, usize), (f64, usize)> = BTreeMap::new();
    for (goal_idx, goal) in catalog.goals().iter().enumerate() {
        let mut values: Vec<(usize, f64)> = profiles
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.get(&goal.id).map(|g| (i, g.expected_value)))
            .collect();

        values.sort_by(|a, b| {
            let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
            match goal.direction {
                GoalDirection::HigherBetter => ord.reverse(),
                GoalDirection::LowerBetter => ord,
            }
        });

        for (position, (scenario_idx, value)) in values.into_iter().enumerate() {
            ranks.insert((scenario_idx, goal_idx), (value, n - position));
        }
    }

    let entries = ranks
        .into_iter()
        .map(|((scenario_idx, goal_idx), (expected_value, rank))| GoalRank {
            scenario: profiles[scenario_idx].scenario.clone(),
            goal: catalog.goals()[goal_idx].id.clone(),
            expected_value,
            rank,
        })
        .collect();

    GoalRankings {
        scenario_count: n,
        entries,
    }
}

/// Expected impact of one goal
#[derive(Debug, Clone, Serialize)]
pub struct GoalImpact {
    pub goal: String,
    pub expected_impact: f64,
}

/// Expected impact per goal for each requested scenario
///
/// Unknown scenario ids are skipped.
pub fn compare_scenarios_by_goals(
    catalog: &Catalog,
    scenario_ids: &[&str],
) -> Vec<(String, Vec<GoalImpact>)> {
    scenario_ids
        .iter()
        .filter_map(|id| scenario_goal_profile(catalog, id))
        .map(|profile| {
            let impacts = profile
                .goals
                .iter()
                .map(|g| GoalImpact {
                    goal: g.goal.clone(),
                    expected_impact: g.expected_impact,
                })
                .collect();
            (profile.scenario, impacts)
        })
        .collect()
}

/// Scenario with the best expected impact on a goal
#[derive(Debug, Clone, Serialize)]
pub struct BestScenario {
    pub goal: String,
    pub scenario: String,
    pub expected_impact: f64,
}

/// Best scenario per goal: lowest expected impact for lower-better goals,
/// highest for higher-better. The first scenario in catalog order wins ties.
pub fn best_scenario_per_goal(catalog: &Catalog) -> Vec<BestScenario> {
    let comparison = compare_scenarios_by_goals(catalog, &catalog.scenario_ids());

    catalog
        .goals()
        .iter()
        .filter_map(|goal| {
            let mut best: Option<(&str, f64)> = None;
            for (scenario, impacts) in &comparison {
                let impact = impacts
                    .iter()
                    .find(|i| i.goal == goal.id)
                    .map(|i| i.expected_impact)
                    .unwrap_or(0.0);
                let better = match (best, goal.direction) {
                    (None, _) => true,
                    (Some((_, b)), GoalDirection::LowerBetter) => impact < b,
                    (Some((_, b)), GoalDirection::HigherBetter) => impact > b,
                };
                if better {
                    best = Some((scenario.as_str(), impact));
                }
            }
            best.map(|(scenario, expected_impact)| BestScenario {
                goal: goal.id.clone(),
                scenario: scenario.to_string(),
                expected_impact,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(catalog: &Catalog) -> GoalWeights {
        catalog.weight_preset("balanced").unwrap().weights.clone()
    }

    #[test]
    fn test_ranks_are_sequential_and_sorted() {
        let catalog = Catalog::builtin().unwrap();
        let ranked = rank_scenarios(&catalog, &balanced(&catalog));
        assert_eq!(ranked.len(), 12);
        for (i, entry) in ranked.iter().enumerate() {
            assert_eq!(entry.rank, i + 1);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].total_score <= pair[1].total_score);
        }
    }

    #[test]
    fn test_total_is_sum_of_contributions() {
        let catalog = Catalog::builtin().unwrap();
        for entry in rank_scenarios(&catalog, &balanced(&catalog)) {
            let sum: f64 = entry.contributions.iter().map(|c| c.contribution).sum();
            assert!((entry.total_score - sum).abs() < 1e-12);
            assert!(entry.contributions.iter().all(|c| c.contribution >= 0.0));
        }
    }

    #[test]
    fn test_unknown_and_missing_weights() {
        let catalog = Catalog::builtin().unwrap();
        let mut weights = GoalWeights::new();
        weights.insert("G1".to_string(), 1.0);
        weights.insert("G99".to_string(), 50.0);
        let ranked = rank_scenarios(&catalog, &weights);
        for entry in &ranked {
            assert_eq!(entry.contributions.len(), 1);
            assert_eq!(entry.contributions[0].goal, "G1");
        }
    }

    #[test]
    fn test_zero_weights_flag_every_tie() {
        let catalog = Catalog::builtin().unwrap();
        let weights: GoalWeights = catalog
            .goal_ids()
            .into_iter()
            .map(|g| (g.to_string(), 0.0))
            .collect();
        let ranked = rank_scenarios(&catalog, &weights);
        assert!(ranked.iter().all(|r| r.total_score == 0.0 && r.near_tie));
        // stable: catalog order survives
        let ids: Vec<&str> = ranked.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(ids, catalog.scenario_ids());
    }

    #[test]
    fn test_baseline_gap_penalizes_low_control() {
        let catalog = Catalog::builtin().unwrap();
        let mut weights = GoalWeights::new();
        weights.insert("G9".to_string(), 1.0);
        let ranked = rank_scenarios(&catalog, &weights);
        let s9 = ranked.iter().find(|r| r.scenario == "S9").unwrap();
        // S9 baseline is 40, sixty points under the ceiling
        assert!(s9.contributions[0].adjusted_impact <= -60.0);
    }

    #[test]
    fn test_goal_rankings_are_permutations() {
        let catalog = Catalog::builtin().unwrap();
        let rankings = goal_rankings(&catalog);
        assert_eq!(rankings.scenario_count, 12);
        assert_eq!(rankings.entries.len(), 12 * 10);
        for goal in catalog.goal_ids() {
            let mut ranks: Vec<usize> = catalog
                .scenario_ids()
                .iter()
                .map(|s| rankings.get(s, goal).unwrap())
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=12).collect::<Vec<_>>());
        }
        assert!(rankings.get("S99", "G1").is_none());
    }

    #[test]
    fn test_goal_ranking_direction() {
        let catalog = Catalog::builtin().unwrap();
        let rankings = goal_rankings(&catalog);
        for goal in catalog.goals() {
            let entries: Vec<&GoalRank> =
                rankings.entries.iter().filter(|e| e.goal == goal.id).collect();
            for a in &entries {
                for b in &entries {
                    if a.rank > b.rank {
                        match goal.direction {
                            GoalDirection::LowerBetter => {
                                assert!(a.expected_value <= b.expected_value)
                            }
                            GoalDirection::HigherBetter => {
                                assert!(a.expected_value >= b.expected_value)
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_best_scenario_per_goal() {
        let catalog = Catalog::builtin().unwrap();
        let best = best_scenario_per_goal(&catalog);
        assert_eq!(best.len(), 10);
        let comparison = compare_scenarios_by_goals(&catalog, &catalog.scenario_ids());
        for entry in &best {
            let direction = catalog.goal(&entry.goal).unwrap().direction;
            for (_, impacts) in &comparison {
                let impact = impacts.iter().find(|i| i.goal == entry.goal).unwrap();
                match direction {
                    GoalDirection::LowerBetter => {
                        assert!(entry.expected_impact <= impact.expected_impact)
                    }
                    GoalDirection::HigherBetter => {
                        assert!(entry.expected_impact >= impact.expected_impact)
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_skips_unknown() {
        let catalog = Catalog::builtin().unwrap();
        let table = compare_scenarios_by_goals(&catalog, &["S1", "S99", "S2"]);
        let ids: Vec<&str> = table.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert_eq!(table[0].1.len(), 10);
    }
}
