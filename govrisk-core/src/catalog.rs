//! Reference catalogs: structural factors, scenarios, risks, goals, impacts
//!
//! Catalogs are loaded once from JSON and never mutated. Every lookup is by id
//! and returns `None` on a miss.
//!
//! Loading rejects wiring defects only (duplicate ids, dangling references,
//! scenarios that do not score a defined factor). Data-quality defects such as
//! out-of-range scores or mis-signed impacts are left for [`crate::audit`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Catalog shipped with the library
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// How a structural factor moves a risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Higher factor score lowers the risk
    Protective,
    /// Higher factor score raises the risk
    Exposure,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Protective => "protective",
            Direction::Exposure => "exposure",
        }
    }
}

/// How strongly a risk responds to a factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Low,
    Medium,
    High,
    Critical,
}

impl Strength {
    pub const ALL: [Strength; 4] = [
        Strength::Low,
        Strength::Medium,
        Strength::High,
        Strength::Critical,
    ];

    /// Exponent applied to the base effect
    pub fn exponent(&self) -> f64 {
        match self {
            Strength::Low => 0.5,
            Strength::Medium => 1.0,
            Strength::High => 1.5,
            Strength::Critical => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Low => "low",
            Strength::Medium => "medium",
            Strength::High => "high",
            Strength::Critical => "critical",
        }
    }
}

/// Which way a goal metric should move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalDirection {
    LowerBetter,
    HigherBetter,
}

impl GoalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalDirection::LowerBetter => "lower_better",
            GoalDirection::HigherBetter => "higher_better",
        }
    }
}

/// Unit a goal is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactUnit {
    Months,
    Misk,
    PctPoints,
    Score,
}

impl ImpactUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactUnit::Months => "months",
            ImpactUnit::Misk => "misk",
            ImpactUnit::PctPoints => "pct_points",
            ImpactUnit::Score => "score",
        }
    }
}

/// Three-point (low / likely / high) estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreePoint {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
}

impl ThreePoint {
    pub const ZERO: ThreePoint = ThreePoint {
        low: 0.0,
        likely: 0.0,
        high: 0.0,
    };

    pub fn new(low: f64, likely: f64, high: f64) -> Self {
        ThreePoint { low, likely, high }
    }

    /// PERT weighted mean: (low + 4·likely + high) / 6
    pub fn pert_mean(&self) -> f64 {
        crate::goals::pert_mean(self.low, self.likely, self.high)
    }

    pub fn points(&self) -> [f64; 3] {
        [self.low, self.likely, self.high]
    }
}

/// A named 1-5 dimension describing a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuralFactor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub scale_low: String,
    pub scale_high: String,
}

/// A candidate governance structure and its factor scores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFactors {
    pub id: String,
    pub name: String,
    pub scores: BTreeMap<String, i32>,
}

impl ScenarioFactors {
    pub fn score(&self, factor_id: &str) -> Option<i32> {
        self.scores.get(factor_id).copied()
    }
}

/// One factor a risk responds to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactorSensitivity {
    pub factor: String,
    pub direction: Direction,
    pub strength: Strength,
}

/// Inclusive score range used for applicability gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreRange {
    pub min: i32,
    pub max: i32,
}

impl ScoreRange {
    pub fn contains(&self, score: i32) -> bool {
        self.min <= score && score <= self.max
    }
}

/// A risk event with base probability and factor sensitivities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskProfile {
    pub id: String,
    pub name: String,
    pub category: String,
    pub base_probability: ThreePoint,
    pub affected_goals: Vec<String>,
    #[serde(default)]
    pub sensitivities: Vec<FactorSensitivity>,
    /// Risk only exists in scenarios whose scores fall inside every range
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires_factors: BTreeMap<String, ScoreRange>,
}

/// Term of a factor-derived baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineTerm {
    pub factor: String,
    pub per_point: f64,
}

/// Baseline computed from scenario factor scores:
/// `intercept + Σ per_point · (score − 1)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineRule {
    pub intercept: f64,
    pub terms: Vec<BaselineTerm>,
}

impl BaselineRule {
    /// Baseline for a scenario, or `None` if it does not score a term's factor
    pub fn evaluate(&self, scenario: &ScenarioFactors) -> Option<f64> {
        let mut value = self.intercept;
        for term in &self.terms {
            let score = scenario.score(&term.factor)?;
            value += term.per_point * f64::from(score - 1);
        }
        Some(value)
    }

    /// Highest baseline any scenario can reach on the 1-5 scale
    pub fn max_value(&self) -> f64 {
        self.intercept
            + self
                .terms
                .iter()
                .map(|t| (t.per_point * 4.0).max(0.0))
                .sum::<f64>()
    }
}

/// A city goal and how it is scored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalDefinition {
    pub id: String,
    pub name: String,
    pub unit: ImpactUnit,
    pub baseline: f64,
    pub direction: GoalDirection,
    /// Pre-calibrated scale factor used by the ranker
    pub normalizer: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_rule: Option<BaselineRule>,
}

impl GoalDefinition {
    /// Baseline for a scenario: rule-derived if the goal has a rule, otherwise static
    pub fn baseline_for(&self, scenario: &ScenarioFactors) -> f64 {
        self.baseline_rule
            .as_ref()
            .and_then(|rule| rule.evaluate(scenario))
            .unwrap_or(self.baseline)
    }
}

/// Impact of one risk on one goal, if the risk occurs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskGoalImpact {
    pub risk: String,
    pub goal: String,
    pub impact: ThreePoint,
}

/// Named goal-weight vector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightPreset {
    pub id: String,
    pub name: String,
    pub weights: BTreeMap<String, f64>,
}

/// On-disk catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogData {
    pub factors: Vec<StructuralFactor>,
    pub scenarios: Vec<ScenarioFactors>,
    pub risks: Vec<RiskProfile>,
    pub goals: Vec<GoalDefinition>,
    pub impacts: Vec<RiskGoalImpact>,
    #[serde(default)]
    pub weight_presets: Vec<WeightPreset>,
}

/// Immutable, id-indexed reference data
#[derive(Debug, Clone)]
pub struct Catalog {
    data: CatalogData,
    factor_index: HashMap<String, usize>,
    scenario_index: HashMap<String, usize>,
    risk_index: HashMap<String, usize>,
    goal_index: HashMap<String, usize>,
    impacts_by_risk: HashMap<String, Vec<usize>>,
    impacts_by_goal: HashMap<String, Vec<usize>>,
}

impl Catalog {
    /// Catalog embedded in the library
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("failed to load built-in catalog")
    }

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("invalid catalog in: {}", path.display()))
    }

    /// Parse and index a catalog from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let data: CatalogData =
            serde_json::from_str(content).context("failed to parse catalog JSON")?;
        Self::from_data(data)
    }

    /// Index catalog data, rejecting duplicate ids and dangling references
    pub fn from_data(data: CatalogData) -> Result<Self> {
        let factor_index = index_ids("factor", data.factors.iter().map(|f| f.id.as_str()))?;
        let scenario_index = index_ids("scenario", data.scenarios.iter().map(|s| s.id.as_str()))?;
        let risk_index = index_ids("risk", data.risks.iter().map(|r| r.id.as_str()))?;
        let goal_index = index_ids("goal", data.goals.iter().map(|g| g.id.as_str()))?;
        index_ids(
            "weight preset",
            data.weight_presets.iter().map(|p| p.id.as_str()),
        )?;

        for scenario in &data.scenarios {
            for factor in &data.factors {
                if !scenario.scores.contains_key(&factor.id) {
                    anyhow::bail!("scenario {} has no score for factor {}", scenario.id, factor.id);
                }
            }
            for factor_id in scenario.scores.keys() {
                if !factor_index.contains_key(factor_id) {
                    anyhow::bail!("scenario {} scores unknown factor {}", scenario.id, factor_id);
                }
            }
        }

        for risk in &data.risks {
            for sens in &risk.sensitivities {
                if !factor_index.contains_key(&sens.factor) {
                    anyhow::bail!(
                        "risk {} is sensitive to unknown factor {}",
                        risk.id,
                        sens.factor
                    );
                }
            }
            for factor_id in risk.requires_factors.keys() {
                if !factor_index.contains_key(factor_id) {
                    anyhow::bail!("risk {} is gated on unknown factor {}", risk.id, factor_id);
                }
            }
            for goal_id in &risk.affected_goals {
                if !goal_index.contains_key(goal_id) {
                    anyhow::bail!("risk {} affects unknown goal {}", risk.id, goal_id);
                }
            }
        }

        for goal in &data.goals {
            if let Some(rule) = &goal.baseline_rule {
                for term in &rule.terms {
                    if !factor_index.contains_key(&term.factor) {
                        anyhow::bail!(
                            "goal {} baseline rule uses unknown factor {}",
                            goal.id,
                            term.factor
                        );
                    }
                }
            }
        }

        let mut impacts_by_risk: HashMap<String, Vec<usize>> = HashMap::new();
        let mut impacts_by_goal: HashMap<String, Vec<usize>> = HashMap::new();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
        for (i, impact) in data.impacts.iter().enumerate() {
            if !risk_index.contains_key(&impact.risk) {
                anyhow::bail!("impact references unknown risk {}", impact.risk);
            }
            if !goal_index.contains_key(&impact.goal) {
                anyhow::bail!("impact references unknown goal {}", impact.goal);
            }
            if !seen_pairs.insert((impact.risk.clone(), impact.goal.clone())) {
                anyhow::bail!("duplicate impact record {}->{}", impact.risk, impact.goal);
            }
            impacts_by_risk.entry(impact.risk.clone()).or_default().push(i);
            impacts_by_goal.entry(impact.goal.clone()).or_default().push(i);
        }

        for preset in &data.weight_presets {
            for goal_id in preset.weights.keys() {
                if !goal_index.contains_key(goal_id) {
                    anyhow::bail!("weight preset {} weights unknown goal {}", preset.id, goal_id);
                }
            }
        }

        tracing::debug!(
            factors = data.factors.len(),
            scenarios = data.scenarios.len(),
            risks = data.risks.len(),
            goals = data.goals.len(),
            impacts = data.impacts.len(),
            "catalog loaded"
        );

        Ok(Catalog {
            data,
            factor_index,
            scenario_index,
            risk_index,
            goal_index,
            impacts_by_risk,
            impacts_by_goal,
        })
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    pub fn factors(&self) -> &[StructuralFactor] {
        &self.data.factors
    }

    pub fn scenarios(&self) -> &[ScenarioFactors] {
        &self.data.scenarios
    }

    pub fn risks(&self) -> &[RiskProfile] {
        &self.data.risks
    }

    pub fn goals(&self) -> &[GoalDefinition] {
        &self.data.goals
    }

    pub fn impacts(&self) -> &[RiskGoalImpact] {
        &self.data.impacts
    }

    pub fn weight_presets(&self) -> &[WeightPreset] {
        &self.data.weight_presets
    }

    pub fn scenario_ids(&self) -> Vec<&str> {
        self.data.scenarios.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn risk_ids(&self) -> Vec<&str> {
        self.data.risks.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn goal_ids(&self) -> Vec<&str> {
        self.data.goals.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn factor_ids(&self) -> Vec<&str> {
        self.data.factors.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn factor(&self, id: &str) -> Option<&StructuralFactor> {
        self.factor_index.get(id).map(|&i| &self.data.factors[i])
    }

    pub fn scenario(&self, id: &str) -> Option<&ScenarioFactors> {
        self.scenario_index.get(id).map(|&i| &self.data.scenarios[i])
    }

    pub fn risk(&self, id: &str) -> Option<&RiskProfile> {
        self.risk_index.get(id).map(|&i| &self.data.risks[i])
    }

    pub fn goal(&self, id: &str) -> Option<&GoalDefinition> {
        self.goal_index.get(id).map(|&i| &self.data.goals[i])
    }

    pub fn weight_preset(&self, id: &str) -> Option<&WeightPreset> {
        self.data.weight_presets.iter().find(|p| p.id == id)
    }

    /// Score of a scenario on a factor
    pub fn factor_score(&self, scenario_id: &str, factor_id: &str) -> Option<i32> {
        self.scenario(scenario_id)?.score(factor_id)
    }

    /// Impact records keyed to a risk, in catalog order
    pub fn impacts_for_risk(&self, risk_id: &str) -> Vec<&RiskGoalImpact> {
        self.impact_refs(self.impacts_by_risk.get(risk_id))
    }

    /// Impact records keyed to a goal, in catalog order
    pub fn impacts_for_goal(&self, goal_id: &str) -> Vec<&RiskGoalImpact> {
        self.impact_refs(self.impacts_by_goal.get(goal_id))
    }

    /// Risks whose impact records touch a goal
    pub fn risks_affecting_goal(&self, goal_id: &str) -> Vec<&str> {
        self.impacts_for_goal(goal_id)
            .into_iter()
            .map(|i| i.risk.as_str())
            .collect()
    }

    fn impact_refs(&self, indices: Option<&Vec<usize>>) -> Vec<&RiskGoalImpact> {
        indices
            .map(|idx| idx.iter().map(|&i| &self.data.impacts[i]).collect())
            .unwrap_or_default()
    }
}

fn index_ids<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if index.insert(id.to_string(), i).is_some() {
            anyhow::bail!("duplicate {} id: {}", kind, id);
        }
    }
    Ok(index)
}
