//! kitctl
//!
//! Entry point for the `kitctl` command-line tool.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kit_api::{ClusterType, Kit, PublishStrategy};
use kit_operator::controller::SettleReport;
use kit_operator::snapshot::SnapshotError;
use kit_operator::{
    digest, BuildSimulator, CatalogComposer, Controller, ControllerConfig, EffectiveConfig,
    KitReconciler, OperatorConfig, ReconcileContext, Snapshot,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kitctl")]
#[command(about = "Kit build orchestration", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the Kits of a store snapshot until nothing changes
    Reconcile {
        /// Snapshot JSON file; rewritten with the resulting state
        #[arg(long, short = 's')]
        state: PathBuf,

        /// Namespace to reconcile (default from config)
        #[arg(long, short = 'n')]
        namespace: Option<String>,

        /// Advance Builds with the simulated build engine
        #[arg(long)]
        simulate: bool,

        /// Pass limit (default from config)
        #[arg(long)]
        max_passes: Option<u32>,

        /// Path to operator config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the step pipeline for a cluster flavor
    Steps {
        /// Kubernetes or OpenShift
        #[arg(long)]
        cluster: String,

        /// Kaniko or S2I (default derived from the cluster)
        #[arg(long)]
        strategy: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the digest of a Kit file
    Digest {
        /// Kit JSON file
        #[arg(long, short = 'k')]
        kit: PathBuf,

        /// Path to operator config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Path to operator config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile {
            state,
            namespace,
            simulate,
            max_passes,
            config,
            json,
        } => {
            let mut overrides = serde_json::Map::new();
            if let Some(ns) = namespace {
                overrides.insert("namespace".to_string(), json!(ns));
            }
            if let Some(passes) = max_passes {
                overrides.insert("max_passes".to_string(), json!(passes));
            }
            let config = load_config(config.as_deref(), Some(overrides.into()));
            init_logging(&config.log_filter);
            run_reconcile(&config, &state, simulate, json);
        }
        Commands::Steps {
            cluster,
            strategy,
            json,
        } => {
            run_steps(&cluster, strategy.as_deref(), json);
        }
        Commands::Digest { kit, config } => {
            let config = load_config(config.as_deref(), None);
            run_digest(&config, &kit);
        }
        Commands::Config { config } => {
            run_config(config.as_deref());
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>, overrides: Option<serde_json::Value>) -> OperatorConfig {
    let effective = match EffectiveConfig::build(path, overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };
    match effective.operator_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

fn run_reconcile(config: &OperatorConfig, state: &Path, simulate: bool, json: bool) {
    let store = match Snapshot::load(state).and_then(|s| Ok(s.into_store()?)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error loading state: {}", e);
            process::exit(1);
        }
    };

    let ctx = ReconcileContext::new();
    let handler_ctx = ctx.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_ctx.cancel()) {
        warn!(error = %e, "cannot install Ctrl-C handler");
    }

    let reconciler = KitReconciler::new(
        Arc::clone(&store),
        CatalogComposer::default(),
        config.operator_version.clone(),
    );
    let controller = Controller::new(reconciler, ControllerConfig::from(config));
    let simulator = BuildSimulator::new();
    let namespace = config.namespace.as_str();

    info!(namespace, simulate, state = %state.display(), "reconciling");
    let result = controller.run_until_settled(&ctx, namespace, |store| {
        if !simulate {
            return false;
        }
        match simulator.advance_all(store, namespace) {
            Ok(advanced) => advanced > 0,
            Err(e) => {
                warn!(error = %e, "simulated build engine failed");
                false
            }
        }
    });

    // Persist whatever state was reached, settled or not
    if let Err(e) = Snapshot::capture(&store)
        .map_err(SnapshotError::from)
        .and_then(|s| s.save(state))
    {
        eprintln!("Error saving state: {}", e);
        process::exit(1);
    }

    match result {
        Ok(report) => {
            print_settle_report(&report, namespace, json);
            let exit_code = report
                .last_pass
                .failures()
                .map(|(_, e)| e.exit_code())
                .next()
                .unwrap_or(0);
            process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn print_settle_report(report: &SettleReport, namespace: &str, json: bool) {
    let errors: Vec<_> = report
        .last_pass
        .failures()
        .map(|(key, e)| json!({"kit": key.name, "error": e.to_string()}))
        .collect();

    if json {
        let kits: Vec<_> = report
            .phases
            .iter()
            .map(|(name, phase)| json!({"name": name, "phase": phase}))
            .collect();
        let output = json!({
            "namespace": namespace,
            "passes": report.passes,
            "kits": kits,
            "errors": errors,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Namespace {} settled after {} pass(es)", namespace, report.passes);
    if report.phases.is_empty() {
        println!("  (no kits)");
    }
    for (name, phase) in &report.phases {
        println!("  {:<32} {}", name, phase);
    }
    for (key, e) in report.last_pass.failures() {
        println!("  ! {}: {}", key, e);
    }
}

fn run_steps(cluster: &str, strategy: Option<&str>, json: bool) {
    let cluster: ClusterType = match cluster.parse() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let strategy: Option<PublishStrategy> = match strategy.map(str::parse).transpose() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let pipeline = match kit_builder::pipeline_for(cluster, strategy) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if json {
        let steps: Vec<_> = pipeline
            .steps
            .iter()
            .map(|s| json!({"id": s.id(), "phase": s.phase()}))
            .collect();
        let output = json!({
            "cluster": cluster,
            "strategy": pipeline.strategy,
            "build_dir": pipeline.build_dir,
            "steps": steps,
        });
        println!("{}", output);
        return;
    }

    println!("{} / {}", cluster, pipeline.strategy);
    for (i, step) in pipeline.steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    if let Some(dir) = &pipeline.build_dir {
        println!("build dir: {}", dir);
    }
}

fn run_digest(config: &OperatorConfig, path: &Path) {
    let kit: Kit = match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error reading kit {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    match digest::compute_for_kit(&config.operator_version, &kit) {
        Ok(d) => println!("{}", d),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_config(path: Option<&Path>) {
    let effective = match EffectiveConfig::build(path, None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };
    match effective.to_json() {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
