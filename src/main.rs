//! # Tessera
//!
//! Command-line driver for the add-wins OR-Set. `demo` walks through the
//! canonical add/remove scenarios on in-memory replicas; `stress` and
//! `scaling` run many replicas through random full-state gossip and check
//! that they converge.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::StressConfig;
use stress_test::{stress_test_orset, stress_test_scaling};
use tessera_core::lattice::Crdt;
use tessera_core::orset::{ORSet, ORSetOp};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Add-wins OR-Set CRDT: scenarios and convergence stress tests")]
#[command(version)]
struct Cli {
    /// Default log filter; `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through add, remove, add-wins and not-found on local replicas
    Demo,
    /// Random gossip between replicas, then verify convergence
    Stress(StressArgs),
    /// Repeat the stress test for a growing number of replicas
    Scaling {
        #[command(flatten)]
        stress: StressArgs,
        /// Largest replica count to try
        #[arg(long, default_value_t = 20)]
        max_replicas: usize,
        /// Replica count increment between runs
        #[arg(long, default_value_t = 2)]
        step: usize,
    },
}

#[derive(Args, Clone)]
struct StressArgs {
    /// Number of simulated replicas
    #[arg(long, default_value_t = 4)]
    replicas: usize,
    /// Local adds per replica
    #[arg(long, default_value_t = 100)]
    ops: usize,
    /// Random pairwise syncs before the final exchange
    #[arg(long, default_value_t = 200)]
    syncs: usize,
    /// Probability of removing an older element after each add
    #[arg(long, default_value_t = 0.3)]
    remove_ratio: f64,
    /// Fix the schedule for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

impl From<StressArgs> for StressConfig {
    fn from(args: StressArgs) -> Self {
        StressConfig::builder()
            .replicas(args.replicas)
            .ops_per_replica(args.ops)
            .syncs(args.syncs)
            .remove_ratio(args.remove_ratio)
            .seed(args.seed)
            .build()
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

// ─── Demo ──────────────────────────────────────────────────────────────────

fn show(label: &str, set: &ORSet<String>) {
    println!("  {:<28} {:?}", label, set.query());
}

fn run_demo() -> Result<()> {
    println!("Sequential updates on one replica");
    let s0: ORSet<String> = ORSet::init();
    let s1 = s0.update(ORSetOp::Add("foo".to_string()))?;
    let s2 = s1.update(ORSetOp::Add("foo".to_string()))?;
    let s3 = s2.update(ORSetOp::Add("bar".to_string()))?;
    let s4 = s3.update(ORSetOp::Remove("foo".to_string()))?;
    show("add foo, add foo, add bar:", &s3);
    show("remove foo:", &s4);
    println!(
        "  tokens kept for foo:         {}",
        s4.query_at(&"foo".to_string()).len()
    );

    println!("\nRemove of an element never added");
    match s0.update(ORSetOp::Remove("baz".to_string())) {
        Ok(_) => println!("  unexpectedly succeeded"),
        Err(err) => println!("  rejected: {} (state unchanged: {})", err, s0 == ORSet::init()),
    }

    println!("\nConcurrent add and remove on two replicas");
    let shared = ORSet::<String>::init().update(ORSetOp::Add("e".to_string()))?;
    let replica_1 = shared.update(ORSetOp::Add("e".to_string()))?;
    let replica_2 = shared.update(ORSetOp::Remove("e".to_string()))?;
    show("replica 1 (re-added):", &replica_1);
    show("replica 2 (removed):", &replica_2);
    show("merged 1 ⊔ 2:", &replica_1.merge(&replica_2));
    show("merged 2 ⊔ 1:", &replica_2.merge(&replica_1));

    println!("\nIndependent adds");
    let left = ORSet::<String>::init().update(ORSetOp::Add("foo".to_string()))?;
    let right = ORSet::<String>::init().update(ORSetOp::Add("bar".to_string()))?;
    let merged = left.merge(&right);
    show("merged:", &merged);
    println!(
        "  left ≤ merged: {}, merged ≤ left: {}",
        left.compare(&merged),
        merged.compare(&left)
    );

    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Stress(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            let stats = rt.block_on(stress_test_orset(&args.into()))?;
            stats.print();
            info!("stress test converged");
            Ok(())
        }
        Commands::Scaling {
            stress,
            max_replicas,
            step,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let results = rt.block_on(stress_test_scaling(&stress.into(), max_replicas, step))?;
            for stats in &results {
                stats.print();
            }
            info!(runs = results.len(), "scaling analysis complete");
            Ok(())
        }
    }
}
