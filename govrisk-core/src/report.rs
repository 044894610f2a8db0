//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::audit::AuditReport;
use crate::catalog::Catalog;
use crate::goals::{GoalContribution, GoalScore, ScenarioGoalProfile};
use crate::probability::{
    AdjustedProbability, Applicability, LogisticTrace, RiskSummary, ScenarioRisk,
};
use crate::ranking::{BestScenario, GoalRankings, RankedScenario};
use serde::Serialize;

/// Risk and goal view of one scenario, as shown by the `scenario` command
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport<'a> {
    pub scenario: &'a str,
    pub scenario_name: &'a str,
    pub summary: RiskSummary,
    /// Risks after any category / band / top filter
    pub risks: Vec<&'a ScenarioRisk>,
    pub goals: Vec<GoalReport<'a>>,
}

/// Goal score with its leading contributors
#[derive(Debug, Clone, Serialize)]
pub struct GoalReport<'a> {
    #[serde(flatten)]
    pub score: GoalSummary<'a>,
    pub top_contributors: Vec<&'a GoalContribution>,
}

/// Goal score without the full contribution list
#[derive(Debug, Clone, Serialize)]
pub struct GoalSummary<'a> {
    pub goal: &'a str,
    pub name: &'a str,
    pub unit: &'static str,
    pub direction: &'static str,
    pub baseline: f64,
    pub expected_impact: f64,
    pub expected_value: f64,
}

impl<'a> GoalReport<'a> {
    pub fn new(score: &'a GoalScore, top_contributors: usize) -> Self {
        GoalReport {
            score: GoalSummary {
                goal: &score.goal,
                name: &score.name,
                unit: score.unit.as_str(),
                direction: score.direction.as_str(),
                baseline: score.baseline,
                expected_impact: score.expected_impact,
                expected_value: score.expected_value,
            },
            top_contributors: score.top_contributors(top_contributors),
        }
    }
}

impl<'a> ScenarioReport<'a> {
    pub fn new(
        summary: RiskSummary,
        risks: Vec<&'a ScenarioRisk>,
        goals: &'a ScenarioGoalProfile,
        top_contributors: usize,
    ) -> Self {
        ScenarioReport {
            scenario: &goals.scenario,
            scenario_name: &goals.scenario_name,
            summary,
            risks,
            goals: goals
                .goals
                .iter()
                .map(|g| GoalReport::new(g, top_contributors))
                .collect(),
        }
    }
}

/// Adjusted probability with its likely-point trace
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedProbability<'a> {
    #[serde(flatten)]
    pub adjusted: &'a AdjustedProbability,
    pub trace: &'a LogisticTrace,
}

/// Render a weighted ranking as text
pub fn render_ranking_text(ranked: &[RankedScenario]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<6} {:<8} {:<10} {}\n",
        "RANK", "ID", "SCORE", "SCENARIO"
    ));

    for entry in ranked {
        let marker = if entry.near_tie { " (near tie)" } else { "" };
        output.push_str(&format!(
            "{:<6} {:<8} {:<10.4} {}{}\n",
            entry.rank,
            entry.scenario,
            entry.total_score,
            entry.scenario_name,
            marker
        ));
    }

    if ranked.iter().any(|r| r.near_tie) {
        output.push_str("\nScenarios marked (near tie) are too close to order with confidence.\n");
    }

    output
}

/// Render a scenario's risk and goal profile as text
pub fn render_scenario_text(report: &ScenarioReport<'_>) -> String {
    let mut output = String::new();

    output.push_str(&format!("{} {}\n", report.scenario, report.scenario_name));
    output.push_str(&format!(
        "Applicable risks: {} (high {}, medium {}, low {})\n\n",
        report.summary.risk_count, report.summary.high, report.summary.medium, report.summary.low
    ));

    output.push_str(&format!(
        "{:<5} {:<30} {:<24} {:<7} {:<7} {:<7} {:<7} {}\n",
        "RISK", "NAME", "CATEGORY", "LOW", "LIKELY", "HIGH", "PERT", "BAND"
    ));
    for risk in &report.risks {
        output.push_str(&format!(
            "{:<5} {:<30} {:<24} {:<7} {:<7} {:<7} {:<7} {}\n",
            risk.risk,
            truncate_or_pad(&risk.name, 30),
            truncate_or_pad(&risk.category, 24),
            percent(risk.probability.low),
            percent(risk.probability.likely),
            percent(risk.probability.high),
            percent(risk.pert_mean),
            risk.band.as_str()
        ));
    }

    output.push_str(&format!(
        "\n{:<5} {:<30} {:<12} {:<12} {:<12} {}\n",
        "GOAL", "NAME", "BASELINE", "IMPACT", "EXPECTED", "UNIT"
    ));
    for goal in &report.goals {
        output.push_str(&format!(
            "{:<5} {:<30} {:<12.2} {:<12.2} {:<12.2} {}\n",
            goal.score.goal,
            truncate_or_pad(goal.score.name, 30),
            goal.score.baseline,
            goal.score.expected_impact,
            goal.score.expected_value,
            goal.score.unit
        ));
        for c in &goal.top_contributors {
            output.push_str(&format!(
                "        {:<5} p={:<7} impact={:<9.2} expected={:.3}\n",
                c.risk,
                percent(c.probability),
                c.impact_if_occurs,
                c.expected_impact
            ));
        }
    }

    output
}

/// Render one adjusted probability, optionally with the log-odds trace
pub fn render_probability_text(
    adjusted: &AdjustedProbability,
    trace: Option<&LogisticTrace>,
) -> String {
    let mut output = String::new();
    output.push_str(&format!("{} / {}\n", adjusted.scenario, adjusted.risk));

    if let Applicability::Gated { factor, score, range } = &adjusted.applicability {
        output.push_str(&format!(
            "Not applicable: {} = {} is outside {}..={}\n",
            factor, score, range.min, range.max
        ));
        return output;
    }

    output.push_str(&format!(
        "Probability: low {}  likely {}  high {}  (PERT {})\n",
        percent(adjusted.probability.low),
        percent(adjusted.probability.likely),
        percent(adjusted.probability.high),
        percent(adjusted.pert_mean())
    ));
    output.push_str(&format!("Combined modifier: {:.2}x\n", adjusted.display_modifier));

    if !adjusted.breakdown.is_empty() {
        output.push('\n');
        output.push_str(&format!(
            "{:<5} {:<30} {:<6} {:<11} {:<9} {:<8} {}\n",
            "ID", "FACTOR", "SCORE", "DIRECTION", "STRENGTH", "EFFECT", "LABEL"
        ));
        for b in &adjusted.breakdown {
            output.push_str(&format!(
                "{:<5} {:<30} {:<6} {:<11} {:<9} {:<8.3} {}\n",
                b.factor,
                truncate_or_pad(&b.factor_name, 30),
                b.score,
                b.direction.as_str(),
                b.strength.as_str(),
                b.effect,
                b.label
            ));
        }
    }

    if let Some(trace) = trace {
        output.push_str("\nLog-odds (likely point):\n");
        output.push_str(&format!(
            "  base p = {:.4}  log-odds = {:.4}\n",
            trace.base_probability, trace.base_log_odds
        ));
        for (b, adj) in adjusted.breakdown.iter().zip(&trace.adjustments) {
            output.push_str(&format!("  {:<5} {:+.4}\n", b.factor, adj));
        }
        output.push_str(&format!(
            "  total {:+.4}  adjusted log-odds = {:.4}  p = {:.4}\n",
            trace.total_adjustment, trace.adjusted_log_odds, trace.probability
        ));
    }

    output
}

/// Render the per-goal ordinal matrix (N = best)
pub fn render_goal_rankings_text(rankings: &GoalRankings, catalog: &Catalog) -> String {
    let mut output = String::new();
    let goals = catalog.goal_ids();

    output.push_str(&format!("{:<6}", "ID"));
    for goal in &goals {
        output.push_str(&format!(" {:>4}", goal));
    }
    output.push('\n');

    for scenario in catalog.scenario_ids() {
        output.push_str(&format!("{:<6}", scenario));
        for goal in &goals {
            match rankings.get(scenario, goal) {
                Some(rank) => output.push_str(&format!(" {:>4}", rank)),
                None => output.push_str(&format!(" {:>4}", "-")),
            }
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{} = best, 1 = worst within each goal\n",
        rankings.scenario_count
    ));
    output
}

/// Render the best scenario per goal
pub fn render_best_per_goal_text(best: &[BestScenario], catalog: &Catalog) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<5} {:<30} {:<8} {}\n",
        "GOAL", "NAME", "BEST", "EXPECTED IMPACT"
    ));
    for entry in best {
        let name = catalog
            .goal(&entry.goal)
            .map(|g| g.name.as_str())
            .unwrap_or("");
        output.push_str(&format!(
            "{:<5} {:<30} {:<8} {:.3}\n",
            entry.goal,
            truncate_or_pad(name, 30),
            entry.scenario,
            entry.expected_impact
        ));
    }
    output
}

/// Render an audit report as text
pub fn render_audit_text(report: &AuditReport) -> String {
    let mut output = String::new();

    for finding in &report.findings {
        output.push_str(&format!(
            "{:<5} {:<25} {:<14} {}\n",
            finding.severity.as_str().to_uppercase(),
            finding.check.as_str(),
            finding.subject.as_deref().unwrap_or("-"),
            finding.message
        ));
    }

    let failures = report.failures().count();
    let warnings = report.warnings().count();
    if !report.findings.is_empty() {
        output.push('\n');
    }
    output.push_str(&format!(
        "{} checks passed, {} failures, {} warnings\n",
        report.passed.len(),
        failures,
        warnings
    ));

    output
}

/// Render any report as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn percent(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::audit_catalog;
    use crate::goals::scenario_goal_profile;
    use crate::probability::{adjusted_probability, scenario_risk_profile};
    use crate::ranking::{goal_rankings, rank_scenarios};

    fn balanced_ranking(catalog: &Catalog) -> Vec<RankedScenario> {
        let weights = catalog.weight_preset("balanced").unwrap().weights.clone();
        rank_scenarios(catalog, &weights)
    }

    #[test]
    fn test_truncate_or_pad() {
        assert_eq!(truncate_or_pad("abc", 5), "abc  ");
        assert_eq!(truncate_or_pad("abcdefgh", 6), "abc...");
    }

    #[test]
    fn test_ranking_text_lists_every_scenario() {
        let catalog = Catalog::builtin().unwrap();
        let ranked = balanced_ranking(&catalog);
        let text = render_ranking_text(&ranked);
        assert!(text.starts_with("RANK"));
        assert_eq!(text.lines().filter(|l| l.starts_with(char::is_numeric)).count(), 12);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let catalog = Catalog::builtin().unwrap();
        let a = render_json(&balanced_ranking(&catalog));
        let b = render_json(&balanced_ranking(&catalog));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ranking_json_shape() {
        let catalog = Catalog::builtin().unwrap();
        let json = render_json(&balanced_ranking(&catalog));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &value[0];
        assert_eq!(first["rank"], 1);
        assert!(first["total_score"].is_number());
        assert!(first["near_tie"].is_boolean());
        assert_eq!(first["contributions"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_gated_probability_text() {
        let catalog = Catalog::builtin().unwrap();
        let adjusted = adjusted_probability(&catalog, "S9", "R34").unwrap();
        let text = render_probability_text(&adjusted, None);
        assert!(text.contains("Not applicable: F6 = 1 is outside 3..=4"));
    }

    #[test]
    fn test_probability_text_with_trace() {
        let catalog = Catalog::builtin().unwrap();
        let adjusted = adjusted_probability(&catalog, "S9", "R01").unwrap();
        let trace = adjusted.likely_trace(&catalog).unwrap();
        let text = render_probability_text(&adjusted, Some(&trace));
        assert!(text.contains("Log-odds (likely point)"));
        assert!(text.contains("F5"));
    }

    #[test]
    fn test_explained_probability_json() {
        let catalog = Catalog::builtin().unwrap();
        let adjusted = adjusted_probability(&catalog, "S9", "R01").unwrap();
        let trace = adjusted.likely_trace(&catalog).unwrap();
        let json = render_json(&ExplainedProbability {
            adjusted: &adjusted,
            trace: &trace,
        });
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["risk"], "R01");
        assert_eq!(value["applicability"]["status"], "applicable");
        assert_eq!(value["trace"]["adjustments"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_scenario_report_json() {
        let catalog = Catalog::builtin().unwrap();
        let risks = scenario_risk_profile(&catalog, "S1").unwrap();
        let goals = scenario_goal_profile(&catalog, "S1").unwrap();
        let report = ScenarioReport::new(risks.summary(), risks.top_risks(3), &goals, 2);
        let value: serde_json::Value = serde_json::from_str(&render_json(&report)).unwrap();
        assert_eq!(value["scenario"], "S1");
        assert_eq!(value["risks"].as_array().unwrap().len(), 3);
        assert_eq!(value["goals"].as_array().unwrap().len(), 10);
        assert!(value["goals"][0]["top_contributors"].as_array().unwrap().len() <= 2);
        assert_eq!(value["goals"][0]["goal"], "G1");
    }

    #[test]
    fn test_goal_rankings_text() {
        let catalog = Catalog::builtin().unwrap();
        let text = render_goal_rankings_text(&goal_rankings(&catalog), &catalog);
        assert!(text.contains("12 = best"));
        assert!(text.lines().any(|l| l.starts_with("S12")));
    }

    #[test]
    fn test_audit_text_summary_line() {
        let catalog = Catalog::builtin().unwrap();
        let text = render_audit_text(&audit_catalog(&catalog, 1e-4));
        assert!(text.contains("checks passed, 0 failures"));
    }
}
