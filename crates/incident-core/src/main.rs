use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use incident_core::telemetry::init_tracing;
use incident_core::{stage_graph, IncidentPipeline, PipelineConfig, PipelineInput, RunOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Command::new("incident-triage")
        .version(incident_core::VERSION)
        .about("Correlate and forecast incidents from a single structured log")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("warn")
                .value_parser(value_parser!(Level))
                .help("Log level when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Run the pipeline over a JSON input file")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file with `log_entries` and `issues`"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML pipeline configuration"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run outcome as JSON and log as JSON"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Run deadline; overrides the configuration"),
                ),
        )
        .subcommand(Command::new("graph").about("Print the stage graph as dependency levels"))
        .subcommand(Command::new("config").about("Print the default configuration as TOML"));

    let matches = cli.get_matches();
    let level = matches.get_one::<Level>("log-level").copied().unwrap_or(Level::WARN);

    match matches.subcommand() {
        Some(("analyze", args)) => {
            init_tracing(args.get_flag("json"), level);
            analyze(args).await
        }
        Some(("graph", _)) => {
            init_tracing(false, level);
            let graph = stage_graph().context("stage graph is invalid")?;
            for (depth, nodes) in graph.levels().iter().enumerate() {
                let names: Vec<String> = nodes.iter().map(ToString::to_string).collect();
                println!("{depth}: {}", names.join(", "));
            }
            let terminals: Vec<String> = graph.terminals().iter().map(ToString::to_string).collect();
            println!("terminal: {}", terminals.join(", "));
            Ok(ExitCode::SUCCESS)
        }
        Some(("config", _)) => {
            init_tracing(false, level);
            print!("{}", PipelineConfig::default().to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn analyze(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(secs) = args.get_one::<u64>("timeout-secs") {
        config.scheduler.timeout_secs = Some(*secs);
    }

    let path = args
        .get_one::<PathBuf>("input")
        .context("--input is required")?;
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let input: PipelineInput =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    let pipeline = IncidentPipeline::builder().config(config).build()?;
    let outcome = pipeline.run(input).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome);
    }

    Ok(if outcome.is_partial() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(outcome: &RunOutcome) {
    let state = &outcome.state;
    println!("Incident Triage Report");
    println!("======================");
    println!("Run: {}", outcome.run_id);
    println!("Status: {:?} in {}ms", outcome.status, outcome.elapsed.as_millis());
    println!("Entries: {}  Issues: {}", state.log_entries().len(), state.issues().len());
    println!();

    let chains = state.causal_chains();
    println!("Causal chains ({}):", chains.len());
    for chain in &chains {
        let services: Vec<&str> = chain.affected_services().iter().map(String::as_str).collect();
        println!(
            "  [{}] {} (blast radius {}: {})",
            chain.confidence(),
            chain.root_cause(),
            chain.blast_radius(),
            services.join(", ")
        );
        println!("      {}", chain.summary());
    }
    println!();

    let risks = state.risk_predictions();
    println!("Risk predictions ({}):", risks.len());
    for risk in &risks {
        println!("  [{}] {} ({}): {}", risk.risk_level, risk.service, risk.time_horizon, risk.prediction);
        println!("      action: {}", risk.preventive_action);
        for evidence in &risk.evidence {
            println!("      - {evidence}");
        }
    }
    println!();

    if let Some(notification) = state.notification() {
        println!("Notification for {}: {}", notification.channel, notification.headline);
        println!();
    }

    println!("Diagnostics ({}):", outcome.diagnostics.len());
    for diagnostic in &outcome.diagnostics {
        println!("  {diagnostic}");
    }
}
