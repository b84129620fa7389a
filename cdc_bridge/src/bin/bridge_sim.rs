//! Bridge workload driver.
//!
//! Runs a random write/read-back workload through the bridge against the
//! reference register file, either co-simulated on a clock schedule or with
//! the slow domain on its own thread, and checks every read against a shadow
//! copy of the registers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cdc_bridge::{
    bridge, drive_fast, spawn_slow_domain, BusWidth, CoSimulation, Completion, Config, Op,
    RegisterFile, WaitStates,
};
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bridge_sim")]
#[command(about = "Drive a random workload through the clock-domain bridge")]
struct Args {
    /// TOML config file; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of transactions
    #[arg(short = 'n', long, default_value = "10000")]
    transactions: usize,

    /// Distinct register addresses touched by the workload
    #[arg(long, default_value = "64")]
    addresses: u32,

    #[arg(long)]
    fast_period: Option<u64>,

    #[arg(long)]
    slow_period: Option<u64>,

    /// Maximum random stretch of each slow period
    #[arg(long)]
    jitter: Option<u64>,

    /// Peripheral wait states per access
    #[arg(short, long)]
    wait_states: Option<u32>,

    /// Draw wait states uniformly from 0..=wait-states
    #[arg(long)]
    random_wait: bool,

    /// Seed for the workload, the clock jitter and the peripheral
    #[arg(short, long, default_value = "1")]
    seed: u64,

    /// Run the slow domain on its own thread instead of co-simulating
    #[arg(short, long)]
    threaded: bool,

    /// Core to pin the slow-domain thread to (threaded mode)
    #[arg(long)]
    pin_slow: Option<usize>,

    /// Sleep between slow ticks in microseconds (threaded mode; spins if unset)
    #[arg(long)]
    slow_sleep_us: Option<u64>,

    /// Clock-edge budget per transaction (co-simulation)
    #[arg(long, default_value = "100000")]
    max_edges: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(period) = args.fast_period {
        config.clock.fast_period = period;
    }
    if let Some(period) = args.slow_period {
        config.clock.slow_period = period;
    }
    if let Some(jitter) = args.jitter {
        config.clock.jitter = jitter;
    }
    if let Some(n) = args.wait_states {
        config.peripheral.wait_states = if args.random_wait {
            WaitStates::Random { max: n }
        } else {
            WaitStates::Fixed(n)
        };
    }
    config.clock.seed = args.seed;
    config.peripheral.seed = args.seed;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn workload(count: usize, addresses: u32, seed: u64) -> Vec<Op> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let address = rng.random_range(0..addresses.max(1)) * 4;
            if rng.random_bool(0.5) {
                Op::Write {
                    address,
                    data: rng.random(),
                }
            } else {
                Op::Read { address }
            }
        })
        .collect()
}

/// Replays `ops` against a shadow register map and checks each completion.
fn verify(ops: &[Op], completions: &[Completion], width: BusWidth) -> Result<()> {
    if ops.len() != completions.len() {
        bail!(
            "{} transactions issued but {} completed",
            ops.len(),
            completions.len()
        );
    }

    let mut shadow: HashMap<u32, u32> = HashMap::new();
    for (index, (op, completion)) in ops.iter().zip(completions).enumerate() {
        match (*op, *completion) {
            (Op::Write { address, data }, Completion::WriteDone) => {
                shadow.insert(width.address(address), width.data(data));
            }
            (Op::Read { address }, Completion::ReadDone(data)) => {
                let expected = shadow.get(&width.address(address)).copied().unwrap_or(0);
                if data != expected {
                    bail!(
                        "transaction {index}: read {address:#x} returned {data:#x}, \
                         expected {expected:#x}"
                    );
                }
            }
            (op, completion) => bail!("transaction {index}: {op:?} completed as {completion:?}"),
        }
    }
    Ok(())
}

struct Summary {
    completions: Vec<Completion>,
    fast_ticks: Option<u64>,
    slow_ticks: Option<u64>,
    peripheral: RegisterFile,
}

fn run_cosim(config: &Config, ops: &[Op], max_edges: u64) -> Result<Summary> {
    let mut sim = CoSimulation::from_config(config, RegisterFile::from_config(&config.peripheral));
    let completions = sim.run_script(ops, max_edges)?;
    if !sim.drain(max_edges) {
        tracing::warn!("bridge did not go quiescent after the last transaction");
    }
    let (fast_ticks, slow_ticks) = (sim.fast_ticks(), sim.slow_ticks());
    let (_fast, slow) = sim.into_parts();
    Ok(Summary {
        completions,
        fast_ticks: Some(fast_ticks),
        slow_ticks: Some(slow_ticks),
        peripheral: slow.into_peripheral(),
    })
}

fn run_threaded(config: &Config, ops: &[Op], args: &Args) -> Result<Summary> {
    let (mut fast, slow) = bridge(&config.bridge, RegisterFile::from_config(&config.peripheral));
    let period = args.slow_sleep_us.map(Duration::from_micros);
    let handle = spawn_slow_domain(slow, period, args.pin_slow)
        .context("failed to spawn slow domain thread")?;

    let completions = drive_fast(&mut fast, ops, None)?;
    // The slow thread carries out any trailing posted write, then exits.
    drop(fast);
    let slow = match handle.join() {
        Ok(slow) => slow,
        Err(_) => bail!("slow domain thread panicked"),
    };

    Ok(Summary {
        completions,
        fast_ticks: None,
        slow_ticks: None,
        peripheral: slow.into_peripheral(),
    })
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = build_config(&args)?;
    let ops = workload(args.transactions, args.addresses, args.seed);

    tracing::info!(
        transactions = ops.len(),
        threaded = args.threaded,
        fast_period = config.clock.fast_period,
        slow_period = config.clock.slow_period,
        wait_states = ?config.peripheral.wait_states,
        write_completion = ?config.bridge.write_completion,
        "starting workload"
    );

    let start = Instant::now();
    let summary = if args.threaded {
        run_threaded(&config, &ops, &args)?
    } else {
        run_cosim(&config, &ops, args.max_edges)?
    };
    let elapsed = start.elapsed();

    verify(&ops, &summary.completions, config.bridge.bus_width())?;
    if summary.peripheral.accesses() != ops.len() as u64 {
        bail!(
            "{} transactions completed but the peripheral saw {} accesses",
            ops.len(),
            summary.peripheral.accesses()
        );
    }

    let reads = ops.iter().filter(|op| matches!(op, Op::Read { .. })).count();
    println!("=== bridge_sim ===");
    println!("mode:              {}", if args.threaded { "threaded" } else { "co-simulation" });
    println!("transactions:      {} ({} reads, {} writes)", ops.len(), reads, ops.len() - reads);
    println!("peripheral access: {}", summary.peripheral.accesses());
    println!("wait ticks:        {}", summary.peripheral.wait_ticks());
    if let (Some(fast), Some(slow)) = (summary.fast_ticks, summary.slow_ticks) {
        println!("fast ticks:        {fast}");
        println!("slow ticks:        {slow}");
        if !ops.is_empty() {
            println!("fast ticks / txn:  {:.2}", fast as f64 / ops.len() as f64);
        }
    }
    println!("elapsed:           {:.3} ms", elapsed.as_secs_f64() * 1e3);
    if !ops.is_empty() {
        println!(
            "throughput:        {:.3} Mtxn/s",
            ops.len() as f64 / elapsed.as_secs_f64() / 1e6
        );
    }
    println!("all reads verified");

    Ok(())
}
