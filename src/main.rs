use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plansmith_core::config::PlansmithConfig;
use plansmith_core::error::PlannerError;
use plansmith_core::event::EventBus;
use plansmith_core::scope::AgenticScope;
use plansmith_core::types::PlannerEvent;

use plansmith_planner::{
    build_agents, build_planner, planner_agent, GoalOrientedSearchGraph, PlanExecutor, Planner,
    ReplayingPlanner, RunJournal,
};

#[derive(Parser)]
#[command(name = "plansmith", version, about = "Dependency-driven planner for agent workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "plansmith.toml", env = "PLANSMITH_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the plan for a goal without running it
    Plan {
        /// Comma-separated variables that are already available
        #[arg(long, value_delimiter = ',')]
        have: Vec<String>,
        /// Goal variable (defaults to planner.goal)
        #[arg(long)]
        goal: Option<String>,
    },
    /// Show the variable dependency graph
    Graph,
    /// Run the configured planner and print the final scope
    Run {
        /// Initial scope value (KEY=VALUE, VALUE parsed as JSON when possible)
        #[arg(long = "set")]
        set: Vec<String>,
        /// Resume from a journal: completed invocations are replayed, not re-run
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match PlansmithConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e @ PlannerError::ConfigNotFound(_)) => {
            eprintln!("{}", e);
            eprintln!("Create plansmith.toml or pass --config <path>.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let level = config
        .log
        .as_ref()
        .map(|l| l.level.as_str())
        .unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PLANSMITH_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(format!("plansmith={},warn", level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(path = %cli.config.display(), agents = config.agents.len(), "Config loaded");

    match cli.command {
        Commands::Plan { have, goal } => print_plan(&config, &have, goal)?,
        Commands::Graph => print_graph(&config)?,
        Commands::Run { set, resume } => run(&config, &set, resume.as_deref()).await?,
        Commands::Config => println!("{}", render_config(&config)?),
    }

    Ok(())
}

fn print_plan(config: &PlansmithConfig, have: &[String], goal: Option<String>) -> anyhow::Result<()> {
    let goal = goal
        .or_else(|| config.planner.goal.clone())
        .ok_or_else(|| PlannerError::InvalidArgument("no goal: pass --goal or set planner.goal".into()))?;

    let agents = build_agents(&config.agents)?;
    let graph = GoalOrientedSearchGraph::new(&agents);
    let available: Vec<&str> = have.iter().map(|h| h.trim()).filter(|h| !h.is_empty()).collect();

    if available.contains(&goal.as_str()) {
        println!("'{}' is already available, nothing to do.", goal);
        return Ok(());
    }

    let plan = graph.search(&available, &goal)?;
    if plan.is_empty() {
        return Err(PlannerError::NoPathFound { goal }.into());
    }

    println!("Plan for '{}' ({} steps):", goal, plan.len());
    for (i, agent) in plan.iter().enumerate() {
        println!(
            "  {}. {} ({}) -> {}",
            i + 1,
            agent.name(),
            agent.arguments().join(", "),
            agent.output_key()
        );
    }
    Ok(())
}

fn print_graph(config: &PlansmithConfig) -> anyhow::Result<()> {
    let agents = build_agents(&config.agents)?;
    let graph = GoalOrientedSearchGraph::new(&agents);

    println!("Nodes:");
    for node in graph.nodes() {
        let producers: Vec<String> = graph
            .producers_of(node.name())
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        if producers.is_empty() {
            println!("  {}", node.name());
        } else {
            println!("  {}  <- {}", node.name(), producers.join(", "));
        }
    }

    println!("Edges:");
    for edge in graph.edges() {
        println!("  {} -> {}  [{}]", edge.from, edge.to, edge.agent);
    }
    Ok(())
}

async fn run(config: &PlansmithConfig, set: &[String], resume: Option<&Path>) -> anyhow::Result<()> {
    let agents = build_agents(&config.agents)?;
    let planner_agent = planner_agent(config);

    let mut scope = AgenticScope::new();
    for pair in set {
        let (key, value) = parse_assignment(pair)?;
        scope.write_state(key, value);
    }

    let mut planner: Box<dyn Planner> = build_planner(config);
    let journal_path = match resume {
        Some(path) => {
            let entries = RunJournal::load(path).await?;
            info!(path = %path.display(), entries = entries.len(), "Resuming from journal");
            planner = Box::new(ReplayingPlanner::new(planner, entries));
            Some(path.to_path_buf())
        }
        None => config
            .journal
            .as_ref()
            .filter(|j| j.enabled)
            .map(|j| j.journal_path()),
    };

    let event_bus = Arc::new(EventBus::default());
    let mut executor = PlanExecutor::from_config(&config.executor)
        .with_event_bus(event_bus.clone())
        .resuming(resume.is_some());
    if let Some(path) = journal_path {
        executor = executor.with_journal(Arc::new(RunJournal::open(path).await?));
    }

    let mut rx = event_bus.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                PlannerEvent::AgentCompleted {
                    agent, elapsed_ms, ..
                } => eprintln!("[{}: ok] {}ms", agent, elapsed_ms),
                PlannerEvent::AgentFailed { agent, error } => {
                    eprintln!("[{}: ERROR] {}", agent, error)
                }
                PlannerEvent::RunComplete { .. } | PlannerEvent::RunError { .. } => break,
                _ => {}
            }
        }
    });

    let result = executor
        .run(planner.as_mut(), &planner_agent, &agents, scope)
        .await;
    drop(executor);
    drop(event_bus);
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress printer stopped");
    }
    let result = result?;

    let report = serde_json::json!({
        "run_id": result.run_id.to_string(),
        "invocations": result.invocations.len(),
        "elapsed_ms": result.total_elapsed_ms,
        "output": result.output,
        "state": result.scope.state(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Render the config as TOML, or as JSON when it holds values TOML cannot
/// express (a `null` constant, for one).
fn render_config(config: &PlansmithConfig) -> anyhow::Result<String> {
    match toml::to_string_pretty(config) {
        Ok(rendered) => Ok(rendered),
        Err(e) => {
            warn!(error = %e, "Config has no TOML form, printing JSON");
            Ok(serde_json::to_string_pretty(config)?)
        }
    }
}

/// Split `KEY=VALUE`; VALUE is parsed as JSON, falling back to a plain string.
fn parse_assignment(pair: &str) -> Result<(String, serde_json::Value), PlannerError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| PlannerError::InvalidArgument(format!("expected KEY=VALUE, got '{}'", pair)))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(PlannerError::InvalidArgument(format!("empty key in '{}'", pair)));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("topic=dragons").unwrap(), ("topic".into(), json!("dragons")));
        assert_eq!(parse_assignment("score=0.5").unwrap(), ("score".into(), json!(0.5)));
        assert_eq!(parse_assignment("tags=[1,2]").unwrap(), ("tags".into(), json!([1, 2])));
        assert_eq!(parse_assignment("eq=a=b").unwrap(), ("eq".into(), json!("a=b")));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_render_config_with_null_constant() {
        let config = PlansmithConfig::from_toml(
            r#"
[planner]
goal = "y"

[[agents]]
name = "a"
output_key = "y"
kind = { type = "constant", value = 1 }
"#,
        )
        .unwrap();
        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("[planner]"));

        let mut config = config;
        config.agents[0].kind = plansmith_core::config::AgentKind::Constant {
            value: serde_json::Value::Null,
        };
        let rendered = render_config(&config).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["agents"][0]["kind"]["value"], serde_json::Value::Null);
        assert_eq!(parsed["planner"]["goal"], "y");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::parse_from(["plansmith", "run", "--set", "a=1", "--set", "b=x"]);
        match cli.command {
            Commands::Run { set, resume } => {
                assert_eq!(set, vec!["a=1", "b=x"]);
                assert!(resume.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_plan_have_list() {
        let cli = Cli::parse_from(["plansmith", "-c", "x.toml", "plan", "--have", "a,b", "--goal", "z"]);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        match cli.command {
            Commands::Plan { have, goal } => {
                assert_eq!(have, vec!["a", "b"]);
                assert_eq!(goal.as_deref(), Some("z"));
            }
            _ => panic!("expected plan"),
        }
    }
}
