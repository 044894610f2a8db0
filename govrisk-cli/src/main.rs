//! govrisk CLI - rank governance scenarios by structural risk to city goals

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Reports on stdout, diagnostics on stderr

mod telemetry;

use anyhow::Context;
use clap::{Parser, Subcommand};
use govrisk_core::audit::audit_catalog;
use govrisk_core::catalog::Catalog;
use govrisk_core::config::{self, ResolvedConfig};
use govrisk_core::goals::scenario_goal_profile;
use govrisk_core::probability::{
    adjusted_probability, scenario_risk_profile, ProbabilityBand, ScenarioRisk,
};
use govrisk_core::ranking::{best_scenario_per_goal, goal_rankings, rank_scenarios_with_threshold};
use govrisk_core::report::{self, render_json, ExplainedProbability, ScenarioReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "govrisk")]
#[command(about = "Rank governance scenarios by the risk they pose to weighted city goals")]
#[command(version = env!("GOVRISK_VERSION"))]
struct Cli {
    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Alternative catalog JSON file (overrides config file)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Log level or filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog entries
    List {
        /// What to list
        what: ListKind,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Rank all scenarios by weighted goal score (lower is better)
    Rank {
        /// Weight preset (overrides config file)
        #[arg(long)]
        preset: Option<String>,

        /// Goal weight override, e.g. G1=2.0 (repeatable)
        #[arg(long = "weight", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Show only top N scenarios (overrides config file)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show a scenario's risk profile and goal profile
    Scenario {
        /// Scenario id
        id: String,

        /// Only risks in this category
        #[arg(long)]
        category: Option<String>,

        /// Only risks in this probability band
        #[arg(long)]
        band: Option<BandArg>,

        /// Show only the N most likely risks (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the adjusted probability of one risk in one scenario
    Probability {
        /// Scenario id
        scenario: String,

        /// Risk id
        risk: String,

        /// Include the log-odds trace
        #[arg(long)]
        explain: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the 1..N ordinal of every scenario on every goal
    GoalRanks {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the best scenario for each goal
    BestPerGoal {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate catalog data and model properties
    Audit {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ListKind {
    Scenarios,
    Risks,
    Goals,
    Factors,
    Presets,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BandArg {
    High,
    Medium,
    Low,
}

impl From<BandArg> for ProbabilityBand {
    fn from(band: BandArg) -> Self {
        match band {
            BandArg::High => ProbabilityBand::High,
            BandArg::Medium => ProbabilityBand::Medium,
            BandArg::Low => ProbabilityBand::Low,
        }
    }
}

/// Parse a `GOAL=WEIGHT` pair
fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (goal, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GOAL=WEIGHT, got '{}'", s))?;
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight '{}' for {}", weight, goal))?;
    Ok((goal.trim().to_string(), weight))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level)?;

    match cli.command {
        Commands::List { what, format } => {
            let (_, catalog) = load(cli.config, cli.catalog)?;
            print!("{}", render_list(&catalog, what, format));
        }
        Commands::Rank {
            preset,
            weights,
            format,
            top,
        } => {
            let (mut resolved, catalog) = load(cli.config, cli.catalog)?;
            if let Some(preset) = preset {
                resolved.preset = preset;
            }
            resolved.weight_overrides.extend(weights);

            let goal_weights = resolved
                .goal_weights(&catalog)
                .context("cannot rank scenarios")?;
            let mut ranked =
                rank_scenarios_with_threshold(&catalog, &goal_weights, resolved.near_tie_threshold);
            if let Some(n) = top.or(resolved.top_n) {
                ranked.truncate(n);
            }

            match format {
                OutputFormat::Text => print!("{}", report::render_ranking_text(&ranked)),
                OutputFormat::Json => println!("{}", render_json(&ranked)),
            }
        }
        Commands::Scenario {
            id,
            category,
            band,
            top,
            format,
        } => {
            let (resolved, catalog) = load(cli.config, cli.catalog)?;
            let risk_profile = scenario_risk_profile(&catalog, &id)
                .with_context(|| format!("unknown scenario: {}", id))?;
            let goal_profile = scenario_goal_profile(&catalog, &id)
                .with_context(|| format!("unknown scenario: {}", id))?;

            let mut risks: Vec<&ScenarioRisk> = risk_profile
                .risks
                .iter()
                .filter(|r| {
                    category
                        .as_deref()
                        .map(|c| r.category.eq_ignore_ascii_case(c))
                        .unwrap_or(true)
                })
                .filter(|r| band.map(|b| r.band == ProbabilityBand::from(b)).unwrap_or(true))
                .collect();
            if let Some(n) = top.or(resolved.top_n) {
                risks.sort_by(|a, b| {
                    b.probability
                        .likely
                        .partial_cmp(&a.probability.likely)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                risks.truncate(n);
            }

            let scenario_report = ScenarioReport::new(
                risk_profile.summary(),
                risks,
                &goal_profile,
                resolved.top_contributors,
            );
            match format {
                OutputFormat::Text => print!("{}", report::render_scenario_text(&scenario_report)),
                OutputFormat::Json => println!("{}", render_json(&scenario_report)),
            }
        }
        Commands::Probability {
            scenario,
            risk,
            explain,
            format,
        } => {
            let (_, catalog) = load(cli.config, cli.catalog)?;
            let adjusted = adjusted_probability(&catalog, &scenario, &risk)
                .with_context(|| format!("unknown scenario or risk: {}/{}", scenario, risk))?;
            let trace = if explain {
                adjusted.likely_trace(&catalog)
            } else {
                None
            };

            match format {
                OutputFormat::Text => {
                    print!("{}", report::render_probability_text(&adjusted, trace.as_ref()))
                }
                OutputFormat::Json => match trace {
                    Some(trace) => println!(
                        "{}",
                        render_json(&ExplainedProbability {
                            adjusted: &adjusted,
                            trace: &trace,
                        })
                    ),
                    None => println!("{}", render_json(&adjusted)),
                },
            }
        }
        Commands::GoalRanks { format } => {
            let (_, catalog) = load(cli.config, cli.catalog)?;
            let rankings = goal_rankings(&catalog);
            match format {
                OutputFormat::Text => {
                    print!("{}", report::render_goal_rankings_text(&rankings, &catalog))
                }
                OutputFormat::Json => println!("{}", render_json(&rankings)),
            }
        }
        Commands::BestPerGoal { format } => {
            let (_, catalog) = load(cli.config, cli.catalog)?;
            let best = best_scenario_per_goal(&catalog);
            match format {
                OutputFormat::Text => {
                    print!("{}", report::render_best_per_goal_text(&best, &catalog))
                }
                OutputFormat::Json => println!("{}", render_json(&best)),
            }
        }
        Commands::Audit { format } => {
            let (resolved, catalog) = load(cli.config, cli.catalog)?;
            let audit = audit_catalog(&catalog, resolved.near_tie_threshold);
            match format {
                OutputFormat::Text => print!("{}", report::render_audit_text(&audit)),
                OutputFormat::Json => println!("{}", render_json(&audit)),
            }

            // Exit with error code if any check failed
            if audit.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let root = std::env::current_dir()?;
                match config::load_and_resolve(&root, path.as_deref()) {
                    Ok(resolved) => {
                        if let Some(ref p) = resolved.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&root, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

/// Resolve configuration and load the catalog it points at
fn load(
    config_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
) -> anyhow::Result<(ResolvedConfig, Catalog)> {
    let root = std::env::current_dir()?;
    let mut resolved = config::load_and_resolve(&root, config_path.as_deref())
        .context("failed to load configuration")?;
    if catalog_path.is_some() {
        resolved.catalog = catalog_path;
    }

    let catalog = resolved.load_catalog()?;
    tracing::debug!(
        catalog = %resolved
            .catalog
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string()),
        "catalog ready"
    );
    Ok((resolved, catalog))
}

fn render_list(catalog: &Catalog, what: ListKind, format: OutputFormat) -> String {
    if let OutputFormat::Json = format {
        let json = match what {
            ListKind::Scenarios => render_json(catalog.scenarios()),
            ListKind::Risks => render_json(catalog.risks()),
            ListKind::Goals => render_json(catalog.goals()),
            ListKind::Factors => render_json(catalog.factors()),
            ListKind::Presets => render_json(catalog.weight_presets()),
        };
        return format!("{}\n", json);
    }

    let mut output = String::new();
    match what {
        ListKind::Scenarios => {
            let factors = catalog.factor_ids();
            output.push_str(&format!("{:<6}", "ID"));
            for f in &factors {
                output.push_str(&format!(" {:>3}", f));
            }
            output.push_str("  NAME\n");
            for s in catalog.scenarios() {
                output.push_str(&format!("{:<6}", s.id));
                for f in &factors {
                    let score = s
                        .score(f)
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    output.push_str(&format!(" {:>3}", score));
                }
                output.push_str(&format!("  {}\n", s.name));
            }
        }
        ListKind::Risks => {
            output.push_str(&format!("{:<5} {:<30} {}\n", "ID", "CATEGORY", "NAME"));
            for r in catalog.risks() {
                output.push_str(&format!("{:<5} {:<30} {}\n", r.id, r.category, r.name));
            }
        }
        ListKind::Goals => {
            output.push_str(&format!(
                "{:<5} {:<11} {:<14} {:<9} {}\n",
                "ID", "UNIT", "DIRECTION", "BASELINE", "NAME"
            ));
            for g in catalog.goals() {
                let baseline = if g.baseline_rule.is_some() {
                    "varies".to_string()
                } else {
                    g.baseline.to_string()
                };
                output.push_str(&format!(
                    "{:<5} {:<11} {:<14} {:<9} {}\n",
                    g.id,
                    g.unit.as_str(),
                    g.direction.as_str(),
                    baseline,
                    g.name
                ));
            }
        }
        ListKind::Factors => {
            output.push_str(&format!("{:<4} {}\n", "ID", "NAME"));
            for f in catalog.factors() {
                output.push_str(&format!(
                    "{:<4} {} (1 = {}, 5 = {})\n",
                    f.id, f.name, f.scale_low, f.scale_high
                ));
            }
        }
        ListKind::Presets => {
            for p in catalog.weight_presets() {
                let weights: Vec<String> = catalog
                    .goal_ids()
                    .into_iter()
                    .map(|g| format!("{}={}", g, p.weights.get(g).copied().unwrap_or(0.0)))
                    .collect();
                output.push_str(&format!("{:<10} {:<25} {}\n", p.id, p.name, weights.join(" ")));
            }
        }
    }
    output
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Catalog:");
    println!(
        "  {}",
        resolved
            .catalog
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!();
    println!("Weights:");
    println!("  preset: {}", resolved.preset);
    if resolved.weight_overrides.is_empty() {
        println!("  overrides: none");
    } else {
        for (goal, w) in &resolved.weight_overrides {
            println!("  {}: {}", goal, w);
        }
    }
    println!();
    println!("Ranking:");
    println!("  near_tie_threshold: {}", resolved.near_tie_threshold);
    println!("  top_contributors: {}", resolved.top_contributors);
    println!(
        "  top: {}",
        resolved
            .top_n
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
}
