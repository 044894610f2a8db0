//! Goal aggregation
//!
//! Folds adjusted risk probabilities and risk×goal impacts into an expected
//! value per goal for one scenario.
//!
//! Global invariants enforced:
//! - Gated risks contribute nothing and do not appear in contribution lists
//! - Risks with a zero PERT-mean probability are skipped
//! - Contributions are listed in catalog impact order

use crate::catalog::{Catalog, GoalDirection, ImpactUnit};
use crate::probability::scenario_risk_profile;
use serde::Serialize;
use std::collections::HashMap;

/// Default number of contributors shown per goal
pub const DEFAULT_TOP_CONTRIBUTORS: usize = 5;

/// PERT weighted mean `(low + 4·likely + high) / 6`
pub fn pert_mean(low: f64, likely: f64, high: f64) -> f64 {
    (low + 4.0 * likely + high) / 6.0
}

/// Expected contribution of one risk to one goal
#[derive(Debug, Clone, Serialize)]
pub struct GoalContribution {
    pub risk: String,
    pub risk_name: String,
    /// PERT mean of the adjusted probability
    pub probability: f64,
    /// PERT mean of the impact if the risk occurs
    pub impact_if_occurs: f64,
    pub expected_impact: f64,
}

/// Expected outcome of one goal in one scenario
#[derive(Debug, Clone, Serialize)]
pub struct GoalScore {
    pub goal: String,
    pub name: String,
    pub unit: ImpactUnit,
    pub direction: GoalDirection,
    pub baseline: f64,
    pub expected_impact: f64,
    pub expected_value: f64,
    pub contributions: Vec<GoalContribution>,
}

impl GoalScore {
    /// Largest contributors by |expected impact|
    pub fn top_contributors(&self, n: usize) -> Vec<&GoalContribution> {
        let mut sorted: Vec<&GoalContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| {
            b.expected_impact
                .abs()
                .partial_cmp(&a.expected_impact.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }
}

/// Expected value of every goal for a scenario, in catalog goal order
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioGoalProfile {
    pub scenario: String,
    pub scenario_name: String,
    pub goals: Vec<GoalScore>,
}

impl ScenarioGoalProfile {
    pub fn get(&self, goal_id: &str) -> Option<&GoalScore> {
        self.goals.iter().find(|g| g.goal == goal_id)
    }

    /// Goals ordered by |expected impact|, largest first
    pub fn rank_goals_by_impact(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .goals
            .iter()
            .map(|g| (g.goal.as_str(), g.expected_impact))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

/// Aggregate expected goal impacts for a scenario
///
/// Returns `None` for an unknown scenario.
pub fn scenario_goal_profile(catalog: &Catalog, scenario_id: &str) -> Option<ScenarioGoalProfile> {
    let scenario = catalog.scenario(scenario_id)?;
    let risk_profile = scenario_risk_profile(catalog, scenario_id)?;

    let applicable: HashMap<&str, (f64, &str)> = risk_profile
        .risks
        .iter()
        .map(|r| (r.risk.as_str(), (r.pert_mean, r.name.as_str())))
        .collect();

    let goals = catalog
        .goals()
        .iter()
        .map(|goal| {
            let mut contributions = Vec::new();
            let mut total = 0.0;

            for record in catalog.impacts_for_goal(&goal.id) {
                let Some(&(probability, risk_name)) = applicable.get(record.risk.as_str()) else {
                    continue;
                };
                if probability == 0.0 {
                    continue;
                }
                let impact_if_occurs = record.impact.pert_mean();
                let expected_impact = probability * impact_if_occurs;
                total += expected_impact;
                contributions.push(GoalContribution {
                    risk: record.risk.clone(),
                    risk_name: risk_name.to_string(),
                    probability,
                    impact_if_occurs,
                    expected_impact,
                });
            }

            let baseline = goal.baseline_for(scenario);
            GoalScore {
                goal: goal.id.clone(),
                name: goal.name.clone(),
                unit: goal.unit,
                direction: goal.direction,
                baseline,
                expected_impact: total,
                expected_value: baseline + total,
                contributions,
            }
        })
        .collect();

    Some(ScenarioGoalProfile {
        scenario: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        goals,
    })
}
