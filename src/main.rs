// src/main.rs
//
// Research-harness CLI entrypoint for Skycourier.
//
// Constraints:
// - Scenario precedence: --scenario overrides SKYCOURIER_SCENARIO
//   (default Medium).
// - Deterministic runs via --seed (map seed and episode seed base).
// - Optional table load/save around the run; optional JSONL telemetry.
// - Print a concise run header (scenario, episodes, cfg version/hash).

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};

use skycourier::telemetry::{FileSink, NoopSink, RecordSink};
use skycourier::{resolve_effective_scenario, Config, RunConfig, ScenarioPreset, Trainer};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScenarioArg {
    Easy,
    Medium,
    Hard,
    Storm,
}

impl From<ScenarioArg> for ScenarioPreset {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Easy => ScenarioPreset::Easy,
            ScenarioArg::Medium => ScenarioPreset::Medium,
            ScenarioArg::Hard => ScenarioPreset::Hard,
            ScenarioArg::Storm => ScenarioPreset::Storm,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "skycourier",
    about = "Hybrid neuro-symbolic delivery-drone trainer (research harness)",
    version
)]
struct Args {
    /// Number of episodes to run.
    #[arg(long, default_value_t = 1000)]
    episodes: u64,

    /// Scenario preset (optional).
    /// If omitted, uses SKYCOURIER_SCENARIO (default medium).
    #[arg(long, value_enum)]
    scenario: Option<ScenarioArg>,

    /// Deterministic seed for the map and episode sequence.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Evaluate greedily instead of training (no exploration, no updates).
    #[arg(long)]
    eval: bool,

    /// Load a value table before running.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save the value table after the run (and every 500 episodes).
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write per-step / per-episode JSONL telemetry to this file.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Verbosity: -v prints progress every 100 episodes, -vv every 10.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let effective = resolve_effective_scenario(args.scenario.map(ScenarioPreset::from));
    effective.log_startup();

    let cfg = Config::for_scenario(effective.preset);
    let cfg_hash = fnv1a64(&format!("{cfg:?}"));

    println!(
        "skycourier | cfg={} | cfg_hash=0x{:016x} | scenario={} | episodes={} | seed={} | mode={}",
        cfg.version,
        cfg_hash,
        effective.preset.as_str(),
        args.episodes,
        args.seed,
        if args.eval { "eval" } else { "train" },
    );

    let sink: Box<dyn RecordSink> = match &args.log {
        Some(path) => {
            let path_str = path.to_string_lossy();
            Box::new(FileSink::create(&path_str).with_context(|| {
                format!("failed to create telemetry log {}", path.display())
            })?)
        }
        None => Box::new(NoopSink),
    };

    let mut trainer =
        Trainer::new(cfg, args.seed, sink).context("environment construction failed")?;

    if let Some(path) = &args.load {
        trainer
            .controller_mut()
            .agent_mut()
            .load_from(path)
            .with_context(|| format!("failed to load value table {}", path.display()))?;
        eprintln!("loaded value table from {}", path.display());
    }

    let log_interval = match args.verbose {
        0 => 0,
        1 => 100,
        _ => 10,
    };

    let mut run = RunConfig::default()
        .with_episodes(args.episodes)
        .with_seed(args.seed)
        .with_explore(!args.eval)
        .with_log_interval(log_interval);
    if let Some(path) = &args.save {
        run = run.with_checkpoint(500, path.clone());
    }

    let summary = trainer.run(&run);

    if let Some(path) = &args.save {
        trainer
            .controller()
            .agent()
            .save_to(path)
            .with_context(|| format!("failed to save value table {}", path.display()))?;
        eprintln!("saved value table to {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
