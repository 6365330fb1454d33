#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fundalloc_api::{AllocationOptimizer, AllocationResult, Engine, OptimizerConfig, Project, Scalar};
use fundalloc_io::{read_scenario, write_report, AllocationReport, Scenario};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fundalloc")]
#[command(version, about = "Impact-maximising budget allocation across funding projects")]
struct Cli {
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one scenario and print the allocation.
    Solve {
        #[arg(long)]
        scenario: PathBuf,
        /// Overrides the scenario budget.
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long)]
        engine: Option<EngineArg>,
        /// Time limit in seconds.
        #[arg(long)]
        time_limit: Option<f64>,
        #[arg(long)]
        max_nodes: Option<usize>,
        #[arg(long)]
        tol: Option<f64>,
        /// Keep the first optimal selection instead of preferring lower cost.
        #[arg(long)]
        no_tie_break: bool,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Validate a scenario without solving it.
    Check {
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Solve a scenario at several budget levels in parallel.
    Sweep {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        budgets: Vec<f64>,
        #[arg(long)]
        engine: Option<EngineArg>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Bnb,
    Exhaustive,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Engine {
        match arg {
            EngineArg::Bnb => Engine::BranchAndBound,
            EngineArg::Exhaustive => Engine::Exhaustive,
        }
    }
}

struct Overrides {
    engine: Option<EngineArg>,
    time_limit: Option<f64>,
    max_nodes: Option<usize>,
    tol: Option<f64>,
    no_tie_break: bool,
}

impl Overrides {
    fn apply(self, mut config: OptimizerConfig) -> Result<OptimizerConfig> {
        if let Some(engine) = self.engine {
            config.engine = engine.into();
        }
        if let Some(secs) = self.time_limit {
            config.time_limit = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("invalid --time-limit {secs}"))?;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.max_nodes = max_nodes;
        }
        if let Some(tolerance) = self.tol {
            config.feasibility_tolerance = tolerance as Scalar;
        }
        if self.no_tie_break {
            config.tie_break = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.log_json)?;
    match cli.command {
        Commands::Solve {
            scenario,
            budget,
            engine,
            time_limit,
            max_nodes,
            tol,
            no_tie_break,
            output,
            json,
        } => {
            let overrides = Overrides {
                engine,
                time_limit,
                max_nodes,
                tol,
                no_tie_break,
            };
            solve_command(scenario, budget, overrides, output, json)
        }
        Commands::Check { scenario } => check_command(scenario),
        Commands::Sweep {
            scenario,
            budgets,
            engine,
            json,
        } => sweep_command(scenario, budgets, engine, json),
    }
}

fn initialize_tracing(log_json: bool) -> Result<()> {
    if log_json {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init()
            .ok();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init()
            .ok();
    }
    Ok(())
}

fn solve_command(
    path: PathBuf,
    budget: Option<f64>,
    overrides: Overrides,
    output: Option<PathBuf>,
    output_json: bool,
) -> Result<()> {
    let Scenario {
        budget: scenario_budget,
        projects,
        constraints,
        config,
    } = read_scenario(&path)?;
    let budget = budget.map_or(scenario_budget, |value| value as Scalar);
    let optimizer = AllocationOptimizer::new(overrides.apply(config)?);
    info!(engine = optimizer.engine_name(), budget, "solving scenario");

    let result = optimizer
        .optimize_projects(&projects, budget, &constraints)
        .with_context(|| format!("allocation failed for {:?}", path))?;
    let report = AllocationReport::new(&projects, &result)?;
    if output_json {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer_pretty(&mut handle, &report)?;
        handle.write_all(b"\n")?;
        handle.flush()?;
    } else {
        print_table(&projects, &result);
    }
    if let Some(path) = output {
        write_report(path, &report)?;
    }
    Ok(())
}

fn print_table(projects: &[Project], result: &AllocationResult) {
    println!(
        "status: {}{}\ntotal impact: {:.6}\ntotal cost: {:.2}\nnodes: {}  stages: {}  time: {:?}",
        result.status,
        if result.suboptimal { " (not proven optimal)" } else { "" },
        result.total_impact,
        result.total_cost,
        result.summary.nodes,
        result.summary.stages_completed,
        result.summary.solve_time,
    );
    let width = projects
        .iter()
        .map(|p| p.id.len())
        .max()
        .unwrap_or(0)
        .max("project".len());
    println!();
    println!("{:<width$}  {:>8}  {:>14}  {:>12}", "project", "share", "funded", "impact");
    for row in result.allocations(projects) {
        if row.decision > 0.0 {
            println!(
                "{:<width$}  {:>8.4}  {:>14.2}  {:>12.4}",
                row.id, row.decision, row.funded, row.impact
            );
        }
    }
}

fn check_command(path: PathBuf) -> Result<()> {
    let scenario = read_scenario(&path).context("scenario validation failed")?;
    scenario.config.validate().context("invalid solver configuration")?;
    let requested = scenario.projects.iter().map(|p| p.cost).sum::<Scalar>();
    println!(
        "Scenario is valid: {} projects, {} constraints, budget {:.2} (requested {:.2}).",
        scenario.projects.len(),
        scenario.constraints.constraints.len(),
        scenario.budget,
        requested
    );
    Ok(())
}

fn sweep_command(
    path: PathBuf,
    budgets: Vec<f64>,
    engine: Option<EngineArg>,
    output_json: bool,
) -> Result<()> {
    let scenario = read_scenario(&path)?;
    let mut config = scenario.config;
    if let Some(engine) = engine {
        config.engine = engine.into();
    }
    let budgets = budgets.into_iter().map(|b| b as Scalar).collect::<Vec<_>>();
    let optimizer = AllocationOptimizer::new(config);
    let results = optimizer.project_sweep(&scenario.projects, &budgets, &scenario.constraints);

    let mut rows = Vec::with_capacity(results.len());
    for (budget, result) in budgets.iter().zip(results) {
        let result = result.with_context(|| format!("allocation failed at budget {budget}"))?;
        rows.push((*budget, result));
    }
    if output_json {
        let values = rows
            .iter()
            .map(|(budget, result)| serde_json::json!({ "budget": budget, "result": result }))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        println!("{:>14}  {:>10}  {:>12}  {:>14}  {:>8}", "budget", "status", "impact", "cost", "selected");
        for (budget, result) in &rows {
            println!(
                "{:>14.2}  {:>10}  {:>12.4}  {:>14.2}  {:>8}",
                budget,
                result.status.to_string(),
                result.total_impact,
                result.total_cost,
                result.selected().len()
            );
        }
    }
    Ok(())
}
