//! Catalog audit
//!
//! Offline validation of catalog data and of the model's numeric properties.
//! Catalog loading only rejects wiring defects; everything a reviewer would
//! call a data-quality defect is reported here.
//!
//! Global invariants enforced:
//! - Audits are deterministic (same catalog = same report)
//! - No IO
//! - Findings are ordered by check, then subject

use crate::catalog::{Catalog, Direction, GoalDirection, ScenarioFactors, Strength, ThreePoint};
use crate::effect::{factor_effect, NEUTRAL_SCORE};
use crate::probability::{
    factor_effects, logistic_transform, risk_applicability, scenario_risk_profile,
};
use crate::ranking::{rank_scenarios, rank_scenarios_with_threshold, GoalWeights};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Probabilities at which the empty-effect identity is checked
const IDENTITY_POINTS: [f64; 7] = [0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99];
const IDENTITY_TOLERANCE: f64 = 1e-3;
const ORDERING_TOLERANCE: f64 = 1e-10;
/// Effect lists that push log-odds far past the sigmoid's resolution
const OVERFLOW_EFFECTS: [f64; 2] = [100.0, 0.001];
const OVERFLOW_REPEAT: usize = 10;
/// Contractor strength, capital patience, planning-execution integration
const STRUCTURAL_FACTORS: [&str; 3] = ["F2", "F3", "F4"];

/// Base probability and effects to probability
type Transform = fn(f64, &[f64]) -> f64;

/// Audit check identifier, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditCheck {
    FactorScoreRange,
    BaseProbability,
    DuplicateSensitivity,
    GateRange,
    AffectedGoals,
    ImpactOrdering,
    ImpactSign,
    GoalCoverage,
    NormalizerSign,
    WeightPreset,
    EffectNeutrality,
    EffectMonotonicity,
    LogisticIdentity,
    LogisticOverflow,
    ProbabilityBounds,
    PertOrdering,
    SensitivityMonotonicity,
    ApplicableRisks,
    // Warning-only
    StructuralOrdering,
    RankingNearTie,
}

impl AuditCheck {
    pub const ALL: [AuditCheck; 20] = [
        AuditCheck::FactorScoreRange,
        AuditCheck::BaseProbability,
        AuditCheck::DuplicateSensitivity,
        AuditCheck::GateRange,
        AuditCheck::AffectedGoals,
        AuditCheck::ImpactOrdering,
        AuditCheck::ImpactSign,
        AuditCheck::GoalCoverage,
        AuditCheck::NormalizerSign,
        AuditCheck::WeightPreset,
        AuditCheck::EffectNeutrality,
        AuditCheck::EffectMonotonicity,
        AuditCheck::LogisticIdentity,
        AuditCheck::LogisticOverflow,
        AuditCheck::ProbabilityBounds,
        AuditCheck::PertOrdering,
        AuditCheck::SensitivityMonotonicity,
        AuditCheck::ApplicableRisks,
        AuditCheck::StructuralOrdering,
        AuditCheck::RankingNearTie,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCheck::FactorScoreRange => "factor-score-range",
            AuditCheck::BaseProbability => "base-probability",
            AuditCheck::DuplicateSensitivity => "duplicate-sensitivity",
            AuditCheck::GateRange => "gate-range",
            AuditCheck::AffectedGoals => "affected-goals",
            AuditCheck::ImpactOrdering => "impact-ordering",
            AuditCheck::ImpactSign => "impact-sign",
            AuditCheck::GoalCoverage => "goal-coverage",
            AuditCheck::NormalizerSign => "normalizer-sign",
            AuditCheck::WeightPreset => "weight-preset",
            AuditCheck::EffectNeutrality => "effect-neutrality",
            AuditCheck::EffectMonotonicity => "effect-monotonicity",
            AuditCheck::LogisticIdentity => "logistic-identity",
            AuditCheck::LogisticOverflow => "logistic-overflow",
            AuditCheck::ProbabilityBounds => "probability-bounds",
            AuditCheck::PertOrdering => "pert-ordering",
            AuditCheck::SensitivityMonotonicity => "sensitivity-monotonicity",
            AuditCheck::ApplicableRisks => "applicable-risks",
            AuditCheck::StructuralOrdering => "structural-ordering",
            AuditCheck::RankingNearTie => "ranking-near-tie",
        }
    }
}

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fail,
    Warn,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fail => "fail",
            Severity::Warn => "warn",
        }
    }
}

/// A single audit finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditFinding {
    pub check: AuditCheck,
    pub severity: Severity,
    /// Record the finding is about, e.g. `S9/R23` or `R04->G3`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// Outcome of a full catalog audit
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
    /// Checks with no failing finding
    pub passed: Vec<AuditCheck>,
}

impl AuditReport {
    pub fn has_failures(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Fail)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AuditFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Fail)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &AuditFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warn)
    }

    pub fn findings_for(&self, check: AuditCheck) -> Vec<&AuditFinding> {
        self.findings.iter().filter(|f| f.check == check).collect()
    }

    /// Sort findings by check order, then subject
    pub fn sort(&mut self) {
        self.findings.sort_by(|a, b| {
            a.check
                .cmp(&b.check)
                .then_with(|| a.subject.cmp(&b.subject))
        });
    }

    fn push(
        &mut self,
        check: AuditCheck,
        severity: Severity,
        subject: Option<String>,
        message: String,
    ) {
        self.findings.push(AuditFinding {
            check,
            severity,
            subject,
            message,
        });
    }

    fn fail(&mut self, check: AuditCheck, subject: impl Into<String>, message: String) {
        self.push(check, Severity::Fail, Some(subject.into()), message);
    }

    fn warn(&mut self, check: AuditCheck, subject: impl Into<String>, message: String) {
        self.push(check, Severity::Warn, Some(subject.into()), message);
    }
}

/// Run every audit check against a catalog
pub fn audit_catalog(catalog: &Catalog, near_tie_threshold: f64) -> AuditReport {
    let mut report = AuditReport::default();

    check_factor_scores(catalog, &mut report);
    check_risks(catalog, &mut report);
    check_impacts(catalog, &mut report);
    check_goals(catalog, &mut report);
    check_weight_presets(catalog, &mut report);
    check_effect_function(&mut report);
    check_logistic_identity(&mut report);
    check_logistic_overflow(logistic_transform, &mut report);
    check_probability_bounds(catalog, logistic_transform, &mut report);
    check_pert_ordering(catalog, &mut report);
    check_sensitivity_monotonicity(catalog, &mut report);
    check_applicable_risks(catalog, &mut report);
    check_structural_ordering(catalog, &mut report);
    check_near_ties(catalog, near_tie_threshold, &mut report);

    report.sort();

    let failed: HashSet<AuditCheck> = report.failures().map(|f| f.check).collect();
    report.passed = AuditCheck::ALL
        .iter()
        .copied()
        .filter(|c| !failed.contains(c))
        .collect();

    tracing::debug!(
        findings = report.findings.len(),
        passed = report.passed.len(),
        "catalog audit complete"
    );

    report
}

fn check_factor_scores(catalog: &Catalog, report: &mut AuditReport) {
    for scenario in catalog.scenarios() {
        for factor in catalog.factors() {
            match scenario.score(&factor.id) {
                None => report.fail(
                    AuditCheck::FactorScoreRange,
                    format!("{}/{}", scenario.id, factor.id),
                    "scenario does not score this factor".to_string(),
                ),
                Some(score) if !(1..=5).contains(&score) => report.fail(
                    AuditCheck::FactorScoreRange,
                    format!("{}/{}", scenario.id, factor.id),
                    format!("score {} is outside 1-5", score),
                ),
                Some(_) => {}
            }
        }
    }
}

fn check_risks(catalog: &Catalog, report: &mut AuditReport) {
    for risk in catalog.risks() {
        let ThreePoint { low, likely, high } = risk.base_probability;
        if !(low > 0.0 && low <= likely && likely <= high && high < 1.0) {
            report.fail(
                AuditCheck::BaseProbability,
                risk.id.clone(),
                format!(
                    "base probability ({}, {}, {}) violates 0 < low <= likely <= high < 1",
                    low, likely, high
                ),
            );
        } else if low == likely || likely == high {
            report.warn(
                AuditCheck::BaseProbability,
                risk.id.clone(),
                format!("degenerate base probability range ({}, {}, {})", low, likely, high),
            );
        }

        let mut seen = HashSet::new();
        for sens in &risk.sensitivities {
            if !seen.insert(sens.factor.as_str()) {
                report.fail(
                    AuditCheck::DuplicateSensitivity,
                    risk.id.clone(),
                    format!("factor {} is referenced more than once", sens.factor),
                );
            }
        }

        for (factor, range) in &risk.requires_factors {
            if !(1 <= range.min && range.min <= range.max && range.max <= 5) {
                report.fail(
                    AuditCheck::GateRange,
                    format!("{}/{}", risk.id, factor),
                    format!("gate range {}..={} is not within 1-5", range.min, range.max),
                );
            }
        }

        let declared: BTreeSet<&str> = risk.affected_goals.iter().map(String::as_str).collect();
        let recorded: BTreeSet<&str> = catalog
            .impacts_for_risk(&risk.id)
            .iter()
            .map(|i| i.goal.as_str())
            .collect();
        let orphans: Vec<&str> = declared.difference(&recorded).copied().collect();
        let undeclared: Vec<&str> = recorded.difference(&declared).copied().collect();
        if !orphans.is_empty() {
            report.fail(
                AuditCheck::AffectedGoals,
                risk.id.clone(),
                format!("affected goals without impact records: {}", orphans.join(", ")),
            );
        }
        if !undeclared.is_empty() {
            report.fail(
                AuditCheck::AffectedGoals,
                risk.id.clone(),
                format!("impact records for undeclared goals: {}", undeclared.join(", ")),
            );
        }
    }
}

fn check_impacts(catalog: &Catalog, report: &mut AuditReport) {
    for record in catalog.impacts() {
        let subject = format!("{}->{}", record.risk, record.goal);
        let points = record.impact.points();
        let ThreePoint { low, likely, high } = record.impact;

        let positive = points.iter().all(|&v| v > 0.0);
        let negative = points.iter().all(|&v| v < 0.0);

        if !positive && !negative {
            report.fail(
                AuditCheck::ImpactOrdering,
                subject.clone(),
                format!("impact ({}, {}, {}) does not share one sign", low, likely, high),
            );
        } else if !(low.abs() <= likely.abs() && likely.abs() <= high.abs()) {
            report.fail(
                AuditCheck::ImpactOrdering,
                subject.clone(),
                format!("impact ({}, {}, {}) is not ordered by magnitude", low, likely, high),
            );
        }

        let Some(goal) = catalog.goal(&record.goal) else {
            continue;
        };
        let consistent = match goal.direction {
            GoalDirection::LowerBetter => positive,
            GoalDirection::HigherBetter => negative,
        };
        if !consistent {
            report.fail(
                AuditCheck::ImpactSign,
                subject,
                format!(
                    "impact sign does not match {} goal (expected {})",
                    goal.direction.as_str(),
                    match goal.direction {
                        GoalDirection::LowerBetter => "positive",
                        GoalDirection::HigherBetter => "negative",
                    }
                ),
            );
        }
    }
}

fn check_goals(catalog: &Catalog, report: &mut AuditReport) {
    for goal in catalog.goals() {
        let contributing: BTreeSet<&str> = catalog
            .impacts_for_goal(&goal.id)
            .iter()
            .filter(|i| i.impact.pert_mean() != 0.0)
            .map(|i| i.risk.as_str())
            .collect();
        match contributing.len() {
            0 => report.fail(
                AuditCheck::GoalCoverage,
                goal.id.clone(),
                "no risk contributes a non-zero impact".to_string(),
            ),
            1 => report.warn(
                AuditCheck::GoalCoverage,
                goal.id.clone(),
                format!(
                    "only one contributing risk ({})",
                    contributing.iter().next().copied().unwrap_or_default()
                ),
            ),
            _ => {}
        }

        let sign_ok = match goal.direction {
            GoalDirection::LowerBetter => goal.normalizer > 0.0,
            GoalDirection::HigherBetter => goal.normalizer < 0.0,
        };
        if !sign_ok {
            report.fail(
                AuditCheck::NormalizerSign,
                goal.id.clone(),
                format!(
                    "normalizer {} has the wrong sign for a {} goal",
                    goal.normalizer,
                    goal.direction.as_str()
                ),
            );
        }
    }
}

fn check_weight_presets(catalog: &Catalog, report: &mut AuditReport) {
    for preset in catalog.weight_presets() {
        for goal in catalog.goals() {
            match preset.weights.get(&goal.id) {
                None => report.fail(
                    AuditCheck::WeightPreset,
                    format!("{}/{}", preset.id, goal.id),
                    "preset has no weight for this goal".to_string(),
                ),
                Some(&w) if !(w.is_finite() && w >= 0.0) => report.fail(
                    AuditCheck::WeightPreset,
                    format!("{}/{}", preset.id, goal.id),
                    format!("weight {} is not a non-negative number", w),
                ),
                Some(_) => {}
            }
        }
    }
}

fn check_effect_function(report: &mut AuditReport) {
    for direction in [Direction::Protective, Direction::Exposure] {
        for strength in Strength::ALL {
            let subject = format!("{}/{}", direction.as_str(), strength.as_str());

            let neutral = factor_effect(NEUTRAL_SCORE, direction, strength);
            if neutral != 1.0 {
                report.fail(
                    AuditCheck::EffectNeutrality,
                    subject.clone(),
                    format!("effect at score 3 is {}, expected exactly 1.0", neutral),
                );
            }

            for score in 1..5 {
                let lo = factor_effect(score, direction, strength);
                let hi = factor_effect(score + 1, direction, strength);
                let ok = match direction {
                    Direction::Protective => hi < lo,
                    Direction::Exposure => hi > lo,
                };
                if !ok {
                    report.fail(
                        AuditCheck::EffectMonotonicity,
                        subject.clone(),
                        format!(
                            "effect not strictly monotonic between scores {} and {}",
                            score,
                            score + 1
                        ),
                    );
                }
            }
        }
    }
}

fn check_logistic_identity(report: &mut AuditReport) {
    for p in IDENTITY_POINTS {
        let out = logistic_transform(p, &[]);
        if (out - p).abs() >= IDENTITY_TOLERANCE {
            report.fail(
                AuditCheck::LogisticIdentity,
                format!("p={}", p),
                format!("empty-effect transform returned {}", out),
            );
        }
    }
}

fn check_logistic_overflow(transform: Transform, report: &mut AuditReport) {
    for effect in OVERFLOW_EFFECTS {
        let out = transform(0.5, &[effect; OVERFLOW_REPEAT]);
        if !(out > 0.0 && out < 1.0) {
            report.fail(
                AuditCheck::LogisticOverflow,
                format!("{}x{}", effect, OVERFLOW_REPEAT),
                format!("transform at p=0.5 returned {}, outside (0, 1)", out),
            );
        }
    }
}

/// Every base point of every scenario x risk pair, gated or not
fn check_probability_bounds(catalog: &Catalog, transform: Transform, report: &mut AuditReport) {
    for scenario in catalog.scenarios() {
        for risk in catalog.risks() {
            let effects = factor_effects(scenario, risk);
            let [low, likely, high] =
                risk.base_probability.points().map(|p| transform(p, &effects));
            if [low, likely, high].iter().any(|&p| !(p > 0.0 && p < 1.0)) {
                report.fail(
                    AuditCheck::ProbabilityBounds,
                    format!("{}/{}", scenario.id, risk.id),
                    format!("adjusted probability ({}, {}, {}) leaves (0, 1)", low, likely, high),
                );
            }
        }
    }
}

fn check_pert_ordering(catalog: &Catalog, report: &mut AuditReport) {
    for scenario in catalog.scenarios() {
        for risk in catalog.risks() {
            if !risk_applicability(scenario, risk).is_applicable() {
                continue;
            }
            let effects = factor_effects(scenario, risk);
            let [low, likely, high] =
                risk.base_probability.points().map(|p| logistic_transform(p, &effects));
            if low > likely + ORDERING_TOLERANCE || likely > high + ORDERING_TOLERANCE {
                report.fail(
                    AuditCheck::PertOrdering,
                    format!("{}/{}", scenario.id, risk.id),
                    format!(
                        "adjusted probability ({}, {}, {}) lost low <= likely <= high",
                        low, likely, high
                    ),
                );
            }
        }
    }
}

/// Probability of a risk at its likely point with every factor at neutral except one
fn isolated_probability(
    catalog: &Catalog,
    risk_id: &str,
    factor: &str,
    score: i32,
) -> Option<f64> {
    let risk = catalog.risk(risk_id)?;
    let scores: BTreeMap<String, i32> = catalog
        .factor_ids()
        .into_iter()
        .map(|f| (f.to_string(), if f == factor { score } else { NEUTRAL_SCORE }))
        .collect();
    let isolated = ScenarioFactors {
        id: "isolated".to_string(),
        name: "isolated".to_string(),
        scores,
    };
    Some(logistic_transform(
        risk.base_probability.likely,
        &factor_effects(&isolated, risk),
    ))
}

fn check_sensitivity_monotonicity(catalog: &Catalog, report: &mut AuditReport) {
    for risk in catalog.risks() {
        for sens in &risk.sensitivities {
            let (Some(at_two), Some(at_four)) = (
                isolated_probability(catalog, &risk.id, &sens.factor, 2),
                isolated_probability(catalog, &risk.id, &sens.factor, 4),
            ) else {
                continue;
            };
            let (worse, better) = match sens.direction {
                Direction::Protective => (at_two, at_four),
                Direction::Exposure => (at_four, at_two),
            };
            if worse < better {
                report.fail(
                    AuditCheck::SensitivityMonotonicity,
                    format!("{}/{}", risk.id, sens.factor),
                    format!(
                        "worse {} score lowers probability ({} < {})",
                        sens.direction.as_str(),
                        worse,
                        better
                    ),
                );
            }
        }
    }
}

fn check_applicable_risks(catalog: &Catalog, report: &mut AuditReport) {
    for scenario in catalog.scenarios() {
        let empty = scenario_risk_profile(catalog, &scenario.id)
            .map(|p| p.risks.is_empty())
            .unwrap_or(true);
        if empty {
            report.fail(
                AuditCheck::ApplicableRisks,
                scenario.id.clone(),
                "no risk applies to this scenario".to_string(),
            );
        }
    }
}

/// The `balanced` preset, or equal weights when the catalog has none
fn balanced_weights(catalog: &Catalog) -> GoalWeights {
    catalog
        .weight_preset("balanced")
        .map(|p| p.weights.clone())
        .unwrap_or_else(|| {
            catalog
                .goal_ids()
                .into_iter()
                .map(|g| (g.to_string(), 1.0))
                .collect()
        })
}

/// Copy of a scenario with every structural factor set to `score`
fn structural_variant(base: &ScenarioFactors, suffix: &str, score: i32) -> ScenarioFactors {
    let mut variant = base.clone();
    variant.id = format!("{}-{}", base.id, suffix);
    variant.name = format!("{} ({})", base.name, suffix.to_lowercase());
    for factor in STRUCTURAL_FACTORS {
        variant.scores.insert(factor.to_string(), score);
    }
    variant
}

/// Strong structure must beat weak structure under balanced weights
fn check_structural_ordering(catalog: &Catalog, report: &mut AuditReport) {
    // catalogs without the structural factors have nothing to compare
    if STRUCTURAL_FACTORS.iter().any(|f| catalog.factor(f).is_none()) {
        return;
    }
    let Some(base) = catalog.scenarios().first() else {
        return;
    };

    let strong = structural_variant(base, "STRONG", 5);
    let weak = structural_variant(base, "WEAK", 1);
    let (strong_id, weak_id) = (strong.id.clone(), weak.id.clone());

    let mut data = catalog.data().clone();
    data.scenarios = vec![strong, weak];
    let Ok(pair) = Catalog::from_data(data) else {
        return;
    };

    let ranked = rank_scenarios(&pair, &balanced_weights(catalog));
    let score_of = |id: &str| {
        ranked
            .iter()
            .find(|r| r.scenario == id)
            .map(|r| r.total_score)
    };
    let (Some(strong_score), Some(weak_score)) = (score_of(&strong_id), score_of(&weak_id)) else {
        return;
    };

    if strong_score >= weak_score {
        report.warn(
            AuditCheck::StructuralOrdering,
            base.id.clone(),
            format!(
                "strong variant scores {:.4}, not below weak variant {:.4}",
                strong_score, weak_score
            ),
        );
    }
}

fn check_near_ties(catalog: &Catalog, threshold: f64, report: &mut AuditReport) {
    let ranked = rank_scenarios_with_threshold(catalog, &balanced_weights(catalog), threshold);
    for pair in ranked.windows(2) {
        let gap = pair[1].total_score - pair[0].total_score;
        if gap.abs() < threshold {
            report.warn(
                AuditCheck::RankingNearTie,
                format!("{}/{}", pair[0].scenario, pair[1].scenario),
                format!(
                    "ranks {} and {} differ by {:.2e}, below the {:.0e} threshold",
                    pair[0].rank, pair[1].rank, gap, threshold
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogData;

    #[test]
    fn test_builtin_catalog_passes() {
        let catalog = Catalog::builtin().unwrap();
        let report = audit_catalog(&catalog, 1e-4);
        let failures: Vec<_> = report.failures().collect();
        assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
        assert_eq!(report.passed.len(), AuditCheck::ALL.len());
    }

    #[test]
    fn test_check_names_are_kebab_case() {
        for check in AuditCheck::ALL {
            let json = serde_json::to_string(&check).unwrap();
            assert_eq!(json, format!("\"{}\"", check.as_str()));
        }
    }

    fn broken_catalog() -> Catalog {
        let mut data: CatalogData = Catalog::builtin().unwrap().data().clone();
        // out-of-range score
        data.scenarios[0].scores.insert("F1".to_string(), 7);
        // inverted base probability
        data.risks[0].base_probability = ThreePoint::new(0.5, 0.4, 0.6);
        // duplicated sensitivity
        let dup = data.risks[1].sensitivities[0].clone();
        data.risks[1].sensitivities.push(dup);
        // wrong-signed normalizer
        data.goals[0].normalizer = -0.1;
        // mixed-sign impact
        data.impacts[0].impact = ThreePoint::new(-1.0, 2.0, 3.0);
        Catalog::from_data(data).unwrap()
    }

    #[test]
    fn test_data_defects_are_reported() {
        let report = audit_catalog(&broken_catalog(), 1e-4);
        assert!(report.has_failures());

        let failed: HashSet<AuditCheck> = report.failures().map(|f| f.check).collect();
        for check in [
            AuditCheck::FactorScoreRange,
            AuditCheck::BaseProbability,
            AuditCheck::DuplicateSensitivity,
            AuditCheck::NormalizerSign,
            AuditCheck::ImpactOrdering,
            AuditCheck::ImpactSign,
        ] {
            assert!(failed.contains(&check), "{} should fail", check.as_str());
            assert!(!report.passed.contains(&check));
        }

        let range = report.findings_for(AuditCheck::FactorScoreRange);
        assert_eq!(range[0].subject.as_deref(), Some("S1/F1"));
    }

    #[test]
    fn test_findings_sorted_by_check() {
        let report = audit_catalog(&broken_catalog(), 1e-4);
        for pair in report.findings.windows(2) {
            assert!(pair[0].check <= pair[1].check);
        }
    }

    fn saturating(_base: f64, _effects: &[f64]) -> f64 {
        1.0
    }

    fn unclamped(base: f64, effects: &[f64]) -> f64 {
        let log_odds = (base / (1.0 - base)).ln() + effects.iter().map(|e| e.ln()).sum::<f64>();
        1.0 / (1.0 + (-log_odds).exp())
    }

    #[test]
    fn test_gated_pairs_are_bound_checked() {
        let catalog = Catalog::builtin().unwrap();
        let s9 = catalog.scenario("S9").unwrap();
        let r34 = catalog.risk("R34").unwrap();
        assert!(!risk_applicability(s9, r34).is_applicable());

        let mut report = AuditReport::default();
        check_probability_bounds(&catalog, saturating, &mut report);

        let subjects: HashSet<&str> = report
            .findings
            .iter()
            .filter_map(|f| f.subject.as_deref())
            .collect();
        assert!(subjects.contains("S9/R34"));
        assert_eq!(
            report.findings.len(),
            catalog.scenario_ids().len() * catalog.risk_ids().len()
        );
    }

    #[test]
    fn test_logistic_overflow() {
        let mut report = AuditReport::default();
        check_logistic_overflow(logistic_transform, &mut report);
        assert!(report.findings.is_empty());

        // exp(-46) vanishes next to 1.0, so the bare sigmoid saturates
        let mut report = AuditReport::default();
        check_logistic_overflow(unclamped, &mut report);
        let overflow = report.findings_for(AuditCheck::LogisticOverflow);
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].subject.as_deref(), Some("100x10"));
        assert_eq!(overflow[0].severity, Severity::Fail);
    }

    #[test]
    fn test_strong_structure_ranks_better_on_builtin() {
        let report = audit_catalog(&Catalog::builtin().unwrap(), 1e-4);
        assert!(report.findings_for(AuditCheck::StructuralOrdering).is_empty());
    }

    #[test]
    fn test_inverted_structural_factors_are_flagged() {
        let mut data: CatalogData = Catalog::builtin().unwrap().data().clone();
        // structural strength now raises every probability it touches
        for risk in &mut data.risks {
            for sens in &mut risk.sensitivities {
                if STRUCTURAL_FACTORS.contains(&sens.factor.as_str()) {
                    sens.direction = Direction::Exposure;
                }
            }
        }
        let catalog = Catalog::from_data(data).unwrap();

        let report = audit_catalog(&catalog, 1e-4);
        let flagged = report.findings_for(AuditCheck::StructuralOrdering);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].subject.as_deref(), Some("S1"));
        assert_eq!(flagged[0].severity, Severity::Warn);
        assert!(report.passed.contains(&AuditCheck::StructuralOrdering));
    }

    #[test]
    fn test_near_tie_is_warning_only() {
        let catalog = Catalog::builtin().unwrap();
        // every adjacent pair is closer than an enormous threshold
        let report = audit_catalog(&catalog, 1e9);
        let ties = report.findings_for(AuditCheck::RankingNearTie);
        assert_eq!(ties.len(), catalog.scenario_ids().len() - 1);
        assert!(ties.iter().all(|f| f.severity == Severity::Warn));
        assert!(!report.has_failures());
    }
}
