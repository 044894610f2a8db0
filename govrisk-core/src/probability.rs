//! Scenario-adjusted risk probabilities (logistic model)
//!
//! Factor effects are treated as odds-ratio multipliers: each effect shifts the
//! base log-odds by `ln(effect)` and the sum is mapped back through the sigmoid.
//!
//! Global invariants enforced:
//! - Output probabilities lie strictly inside (0, 1)
//! - An empty effect list is the identity (up to the input clamp)
//! - low <= likely <= high survives the transform
//! - A gated risk is absent, never merely small

use crate::catalog::{
    Catalog, Direction, RiskProfile, ScenarioFactors, ScoreRange, Strength, ThreePoint,
};
use crate::effect::{effect_label, factor_effect, NEUTRAL_SCORE};
use serde::Serialize;
use std::collections::BTreeMap;

/// Smallest output probability
pub const PROB_FLOOR: f64 = 1e-15;
/// Largest output probability
pub const PROB_CEIL: f64 = 1.0 - 1e-15;

/// Input clamp applied before taking log-odds
const INPUT_MIN: f64 = 0.001;
const INPUT_MAX: f64 = 0.999;
/// Effects are floored here before their logarithm is taken
const EFFECT_MIN: f64 = 0.001;
/// Beyond this |log-odds| the sigmoid is not evaluated
const LOG_ODDS_LIMIT: f64 = 700.0;

/// Step-by-step record of one logistic transform
#[derive(Debug, Clone, Serialize)]
pub struct LogisticTrace {
    /// Base probability after the input clamp
    pub base_probability: f64,
    pub base_log_odds: f64,
    /// `ln(max(effect, 0.001))` per effect, in input order
    pub adjustments: Vec<f64>,
    pub total_adjustment: f64,
    pub adjusted_log_odds: f64,
    pub probability: f64,
}

/// Combine factor effects with a base probability in log-odds space
pub fn logistic_transform(base_probability: f64, effects: &[f64]) -> f64 {
    logistic_trace(base_probability, effects).probability
}

/// Same as [`logistic_transform`], keeping every intermediate value
pub fn logistic_trace(base_probability: f64, effects: &[f64]) -> LogisticTrace {
    let p = base_probability.clamp(INPUT_MIN, INPUT_MAX);
    let base_log_odds = (p / (1.0 - p)).ln();

    let adjustments: Vec<f64> = effects.iter().map(|e| e.max(EFFECT_MIN).ln()).collect();
    let total_adjustment: f64 = adjustments.iter().sum();
    let adjusted_log_odds = base_log_odds + total_adjustment;

    let raw = if adjusted_log_odds > LOG_ODDS_LIMIT {
        PROB_CEIL
    } else if adjusted_log_odds < -LOG_ODDS_LIMIT {
        PROB_FLOOR
    } else {
        1.0 / (1.0 + (-adjusted_log_odds).exp())
    };

    LogisticTrace {
        base_probability: p,
        base_log_odds,
        adjustments,
        total_adjustment,
        adjusted_log_odds,
        // sigmoid rounds to exactly 0.0 or 1.0 well inside the ±700 window
        probability: raw.clamp(PROB_FLOOR, PROB_CEIL),
    }
}

/// Whether a risk exists in a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Applicability {
    Applicable,
    /// First gating factor whose score falls outside the required range
    Gated {
        factor: String,
        score: i32,
        range: ScoreRange,
    },
}

impl Applicability {
    pub fn is_applicable(&self) -> bool {
        matches!(self, Applicability::Applicable)
    }
}

/// Effect of one sensitivity in one scenario
#[derive(Debug, Clone, Serialize)]
pub struct FactorBreakdown {
    pub factor: String,
    pub factor_name: String,
    pub score: i32,
    pub direction: Direction,
    pub strength: Strength,
    pub effect: f64,
    /// "reduces", "increases" or "neutral"
    pub label: &'static str,
}

/// Adjusted probability of one risk in one scenario
#[derive(Debug, Clone, Serialize)]
pub struct AdjustedProbability {
    pub scenario: String,
    pub risk: String,
    pub applicability: Applicability,
    pub probability: ThreePoint,
    /// Plain product of the raw effects, for explanation only
    pub display_modifier: f64,
    pub breakdown: Vec<FactorBreakdown>,
}

impl AdjustedProbability {
    pub fn is_applicable(&self) -> bool {
        self.applicability.is_applicable()
    }

    /// PERT mean of the adjusted probability
    pub fn pert_mean(&self) -> f64 {
        self.probability.pert_mean()
    }

    /// Trace of the likely-point transform
    pub fn likely_trace(&self, catalog: &Catalog) -> Option<LogisticTrace> {
        if !self.is_applicable() {
            return None;
        }
        let risk = catalog.risk(&self.risk)?;
        let effects: Vec<f64> = self.breakdown.iter().map(|b| b.effect).collect();
        Some(logistic_trace(risk.base_probability.likely, &effects))
    }
}

/// Adjust a risk's base probabilities for a scenario
///
/// Returns `None` if either id is unknown.
pub fn adjusted_probability(
    catalog: &Catalog,
    scenario_id: &str,
    risk_id: &str,
) -> Option<AdjustedProbability> {
    let scenario = catalog.scenario(scenario_id)?;
    let risk = catalog.risk(risk_id)?;
    Some(adjust(catalog, scenario, risk))
}

/// Check a risk's `requires_factors` gate against a scenario
pub fn risk_applicability(scenario: &ScenarioFactors, risk: &RiskProfile) -> Applicability {
    for (factor, range) in &risk.requires_factors {
        // scenarios score every catalog factor, checked at load
        let score = scenario.score(factor).unwrap_or(0);
        if !range.contains(score) {
            return Applicability::Gated {
                factor: factor.clone(),
                score,
                range: *range,
            };
        }
    }
    Applicability::Applicable
}

/// Effect of each of a risk's sensitivities under a scenario, in sensitivity order
///
/// The gate is not consulted.
pub fn factor_effects(scenario: &ScenarioFactors, risk: &RiskProfile) -> Vec<f64> {
    risk.sensitivities
        .iter()
        .map(|sens| {
            let score = scenario.score(&sens.factor).unwrap_or(NEUTRAL_SCORE);
            factor_effect(score, sens.direction, sens.strength)
        })
        .collect()
}

fn adjust(
    catalog: &Catalog,
    scenario: &ScenarioFactors,
    risk: &RiskProfile,
) -> AdjustedProbability {
    let applicability = risk_applicability(scenario, risk);
    if !applicability.is_applicable() {
        tracing::trace!(scenario = %scenario.id, risk = %risk.id, "risk gated out");
        return AdjustedProbability {
            scenario: scenario.id.clone(),
            risk: risk.id.clone(),
            applicability,
            probability: ThreePoint::ZERO,
            display_modifier: 0.0,
            breakdown: Vec::new(),
        };
    }

    let breakdown: Vec<FactorBreakdown> = risk
        .sensitivities
        .iter()
        .map(|sens| {
            let score = scenario.score(&sens.factor).unwrap_or(NEUTRAL_SCORE);
            let effect = factor_effect(score, sens.direction, sens.strength);
            FactorBreakdown {
                factor: sens.factor.clone(),
                factor_name: catalog
                    .factor(&sens.factor)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| sens.factor.clone()),
                score,
                direction: sens.direction,
                strength: sens.strength,
                effect,
                label: effect_label(effect),
            }
        })
        .collect();

    let effects: Vec<f64> = breakdown.iter().map(|b| b.effect).collect();
    let base = &risk.base_probability;

    AdjustedProbability {
        scenario: scenario.id.clone(),
        risk: risk.id.clone(),
        applicability,
        probability: ThreePoint::new(
            logistic_transform(base.low, &effects),
            logistic_transform(base.likely, &effects),
            logistic_transform(base.high, &effects),
        ),
        display_modifier: effects.iter().product(),
        breakdown,
    }
}

/// Band of a risk's likely probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilityBand {
    High,   // > 0.40
    Medium, // 0.20-0.40
    Low,    // < 0.20
}

impl ProbabilityBand {
    pub fn classify(likely: f64) -> Self {
        if likely > 0.40 {
            ProbabilityBand::High
        } else if likely >= 0.20 {
            ProbabilityBand::Medium
        } else {
            ProbabilityBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbabilityBand::High => "high",
            ProbabilityBand::Medium => "medium",
            ProbabilityBand::Low => "low",
        }
    }
}

/// One applicable risk within a scenario profile
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRisk {
    pub risk: String,
    pub name: String,
    pub category: String,
    pub probability: ThreePoint,
    pub pert_mean: f64,
    pub band: ProbabilityBand,
    pub display_modifier: f64,
    pub affected_goals: Vec<String>,
    pub breakdown: Vec<FactorBreakdown>,
}

/// Band counts for a scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
    pub risk_count: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// All applicable risks of a scenario, in catalog order
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRiskProfile {
    pub scenario: String,
    pub scenario_name: String,
    pub factor_scores: BTreeMap<String, i32>,
    pub risks: Vec<ScenarioRisk>,
}

impl ScenarioRiskProfile {
    pub fn get(&self, risk_id: &str) -> Option<&ScenarioRisk> {
        self.risks.iter().find(|r| r.risk == risk_id)
    }

    /// Risks grouped by category; categories sorted by name, risks in catalog order
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&ScenarioRisk>> {
        let mut grouped: BTreeMap<&str, Vec<&ScenarioRisk>> = BTreeMap::new();
        for risk in &self.risks {
            grouped.entry(risk.category.as_str()).or_default().push(risk);
        }
        grouped
    }

    pub fn affecting_goal(&self, goal_id: &str) -> Vec<&ScenarioRisk> {
        self.risks
            .iter()
            .filter(|r| r.affected_goals.iter().any(|g| g == goal_id))
            .collect()
    }

    /// Top `n` risks by likely probability, highest first
    pub fn top_risks(&self, n: usize) -> Vec<&ScenarioRisk> {
        let mut sorted: Vec<&ScenarioRisk> = self.risks.iter().collect();
        sorted.sort_by(|a, b| {
            b.probability
                .likely
                .partial_cmp(&a.probability.likely)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    pub fn in_band(&self, band: ProbabilityBand) -> Vec<&ScenarioRisk> {
        self.risks.iter().filter(|r| r.band == band).collect()
    }

    pub fn summary(&self) -> RiskSummary {
        let mut summary = RiskSummary {
            risk_count: self.risks.len(),
            ..RiskSummary::default()
        };
        for risk in &self.risks {
            match risk.band {
                ProbabilityBand::High => summary.high += 1,
                ProbabilityBand::Medium => summary.medium += 1,
                ProbabilityBand::Low => summary.low += 1,
            }
        }
        summary
    }
}

/// Adjusted probabilities of every applicable risk in a scenario
///
/// Gated risks are omitted. Returns `None` for an unknown scenario.
pub fn scenario_risk_profile(catalog: &Catalog, scenario_id: &str) -> Option<ScenarioRiskProfile> {
    let scenario = catalog.scenario(scenario_id)?;

    let risks = catalog
        .risks()
        .iter()
        .map(|risk| (risk, adjust(catalog, scenario, risk)))
        .filter(|(_, adjusted)| adjusted.is_applicable())
        .map(|(risk, adjusted)| ScenarioRisk {
            risk: risk.id.clone(),
            name: risk.name.clone(),
            category: risk.category.clone(),
            pert_mean: adjusted.pert_mean(),
            band: ProbabilityBand::classify(adjusted.probability.likely),
            probability: adjusted.probability,
            display_modifier: adjusted.display_modifier,
            affected_goals: risk.affected_goals.clone(),
            breakdown: adjusted.breakdown,
        })
        .collect();

    Some(ScenarioRiskProfile {
        scenario: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        factor_scores: scenario.scores.clone(),
        risks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_effects_is_identity() {
        for p in [0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99] {
            let out = logistic_transform(p, &[]);
            assert!((out - p).abs() < 1e-3, "identity failed at p={}", p);
        }
    }

    #[test]
    fn test_input_clamp() {
        assert!((logistic_transform(0.0, &[]) - 0.001).abs() < 1e-12);
        assert!((logistic_transform(1.0, &[]) - 0.999).abs() < 1e-12);
    }

    #[test]
    fn test_odds_multiplication() {
        // p = 0.5 has odds 1; an effect of 3 gives odds 3 -> p = 0.75
        let out = logistic_transform(0.5, &[3.0]);
        assert!((out - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_log_odds_stay_open() {
        let huge = vec![1e300; 10];
        let p = logistic_transform(0.5, &huge);
        assert!(p < 1.0);
        assert_eq!(p, PROB_CEIL);

        let tiny = vec![0.0; 200];
        let p = logistic_transform(0.5, &tiny);
        assert!(p > 0.0);
        assert_eq!(p, PROB_FLOOR);

        // inside the ±700 window but past double precision
        let p = logistic_transform(0.5, &[1e20]);
        assert!(p < 1.0);
    }

    #[test]
    fn test_trace_records_each_adjustment() {
        let trace = logistic_trace(0.5, &[2.0, 0.5]);
        assert_eq!(trace.adjustments.len(), 2);
        assert!(trace.total_adjustment.abs() < 1e-12);
        assert!((trace.probability - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_probability_bands() {
        assert_eq!(ProbabilityBand::classify(0.41), ProbabilityBand::High);
        assert_eq!(ProbabilityBand::classify(0.40), ProbabilityBand::Medium);
        assert_eq!(ProbabilityBand::classify(0.20), ProbabilityBand::Medium);
        assert_eq!(ProbabilityBand::classify(0.19), ProbabilityBand::Low);
    }

    #[test]
    fn test_unknown_ids() {
        let catalog = Catalog::builtin().unwrap();
        assert!(adjusted_probability(&catalog, "S99", "R01").is_none());
        assert!(adjusted_probability(&catalog, "S1", "R99").is_none());
        assert!(scenario_risk_profile(&catalog, "S99").is_none());
    }

    #[test]
    fn test_gated_risk_is_hard_zero() {
        let catalog = Catalog::builtin().unwrap();
        // R34 requires F6 in 3..=4; S9 scores F6 = 1
        let adjusted = adjusted_probability(&catalog, "S9", "R34").unwrap();
        assert!(!adjusted.is_applicable());
        assert_eq!(adjusted.probability, ThreePoint::ZERO);
        assert_eq!(adjusted.display_modifier, 0.0);
        assert_eq!(
            adjusted.applicability,
            Applicability::Gated {
                factor: "F6".to_string(),
                score: 1,
                range: ScoreRange { min: 3, max: 4 },
            }
        );

        let profile = scenario_risk_profile(&catalog, "S9").unwrap();
        assert!(profile.get("R34").is_none());
    }

    #[test]
    fn test_display_modifier_is_effect_product() {
        let catalog = Catalog::builtin().unwrap();
        let adjusted = adjusted_probability(&catalog, "S9", "R01").unwrap();
        let product: f64 = adjusted.breakdown.iter().map(|b| b.effect).product();
        assert_eq!(adjusted.display_modifier, product);
        assert_eq!(adjusted.breakdown.len(), 2);
    }

    #[test]
    fn test_profile_helpers() {
        let catalog = Catalog::builtin().unwrap();
        let profile = scenario_risk_profile(&catalog, "S1").unwrap();
        let summary = profile.summary();
        assert_eq!(summary.risk_count, profile.risks.len());
        assert_eq!(summary.high + summary.medium + summary.low, summary.risk_count);
        assert_eq!(profile.in_band(ProbabilityBand::High).len(), summary.high);

        let top = profile.top_risks(3);
        assert_eq!(top.len(), 3);
        assert!(top[0].probability.likely >= top[1].probability.likely);
        assert!(top[1].probability.likely >= top[2].probability.likely);

        let grouped: usize = profile.by_category().values().map(|v| v.len()).sum();
        assert_eq!(grouped, profile.risks.len());

        for risk in profile.affecting_goal("G1") {
            assert!(risk.affected_goals.iter().any(|g| g == "G1"));
        }
    }
}
