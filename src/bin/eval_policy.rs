// Deterministic greedy-evaluation smoke run: load a trained value table
// (optional), run N pure-exploitation episodes, write a JSON summary.

use std::env;
use std::fs;
use std::path::PathBuf;

use skycourier::telemetry::NoopSink;
use skycourier::{Config, RunConfig, ScenarioPreset, Trainer};

fn parse_u64(args: &[String], flag: &str, default: u64) -> u64 {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_path(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn parse_scenario(args: &[String]) -> ScenarioPreset {
    args.iter()
        .position(|a| a == "--scenario")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| ScenarioPreset::parse(v))
        .unwrap_or(ScenarioPreset::Medium)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let seed = parse_u64(&args, "--seed", 42);
    let episodes = parse_u64(&args, "--episodes", 20);
    let scenario = parse_scenario(&args);
    let table_path = parse_path(&args, "--table");
    let out_path = parse_path(&args, "--out")
        .unwrap_or_else(|| PathBuf::from("runs/eval_policy/summary.json"));

    let cfg = Config::for_scenario(scenario);
    let mut trainer = match Trainer::new(cfg, seed, NoopSink) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    if let Some(path) = &table_path {
        if let Err(err) = trainer.controller_mut().agent_mut().load_from(path) {
            eprintln!("Failed to load value table {}: {}", path.display(), err);
            std::process::exit(2);
        }
    }

    let run = RunConfig::default()
        .with_episodes(episodes)
        .with_seed(seed)
        .with_explore(false);
    let summary = trainer.run(&run);

    if let Some(parent) = out_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!(
                "Failed to create output directory {}: {}",
                parent.display(),
                err
            );
            std::process::exit(2);
        }
    }

    match serde_json::to_string_pretty(&summary) {
        Ok(payload) => {
            if let Err(err) = fs::write(&out_path, payload) {
                eprintln!("Failed to write {}: {}", out_path.display(), err);
                std::process::exit(2);
            }
            println!("eval_policy: wrote {}", out_path.display());
        }
        Err(err) => {
            eprintln!("Failed to serialize summary: {}", err);
            std::process::exit(2);
        }
    }
}
