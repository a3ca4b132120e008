// src/telemetry.rs
//
// Metrics sinks for the decision core.
// - RecordSink: trait consumed by the training/eval harness
// - NoopSink:   discards all records
// - MemorySink: buffers records (tests, analysis)
// - FileSink:   one JSON line per record for offline tooling

use std::fs::File;
use std::io::{self, BufWriter, Write};

use serde::{Deserialize, Serialize};

use crate::env::StepInfo;
use crate::fusion::Decision;
use crate::types::{Action, DecisionPath, TerminalCause};

/// Per-step record emitted after the environment consumed the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub episode_id: u64,
    pub step: u32,
    pub action: Action,
    pub proposed: Action,
    pub path: DecisionPath,
    pub reward: f64,
    pub done: bool,
    pub terminal_cause: Option<TerminalCause>,
    /// Names of the rules that rejected the proposal, if any.
    pub triggered_rules: Vec<String>,
    pub battery: f64,
    pub distance_to_objective: i32,
}

impl StepRecord {
    pub fn new(
        episode_id: u64,
        decision: &Decision,
        reward: f64,
        done: bool,
        info: &StepInfo,
    ) -> Self {
        Self {
            episode_id,
            step: info.step,
            action: decision.action,
            proposed: decision.proposed,
            path: decision.path,
            reward,
            done,
            terminal_cause: info.terminal_cause,
            triggered_rules: decision
                .triggered
                .iter()
                .map(|r| r.name.to_string())
                .collect(),
            battery: info.battery,
            distance_to_objective: info.distance_to_objective,
        }
    }
}

/// Per-episode record emitted at termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_id: u64,
    pub seed: u64,
    pub steps: u32,
    pub total_reward: f64,
    pub terminal_cause: TerminalCause,
    pub success: bool,
    pub safety_overrides: u32,
    pub final_battery: f64,
    pub epsilon: f64,
}

/// Abstract sink for step/episode telemetry. The core produces records
/// as plain values; formatting and persistence live behind this seam.
pub trait RecordSink {
    fn record_step(&mut self, record: &StepRecord);
    fn record_episode(&mut self, record: &EpisodeRecord);
}

// Lets callers pick a sink at runtime without making the harness
// non-generic.
impl RecordSink for Box<dyn RecordSink> {
    fn record_step(&mut self, record: &StepRecord) {
        (**self).record_step(record);
    }

    fn record_episode(&mut self, record: &EpisodeRecord) {
        (**self).record_episode(record);
    }
}

/// Sink that discards all records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RecordSink for NoopSink {
    fn record_step(&mut self, _record: &StepRecord) {}
    fn record_episode(&mut self, _record: &EpisodeRecord) {}
}

/// In-memory sink, mainly for tests and notebook-style analysis.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub steps: Vec<StepRecord>,
    pub episodes: Vec<EpisodeRecord>,
}

impl RecordSink for MemorySink {
    fn record_step(&mut self, record: &StepRecord) {
        self.steps.push(record.clone());
    }

    fn record_episode(&mut self, record: &EpisodeRecord) {
        self.episodes.push(record.clone());
    }
}

/// JSONL file sink: each record is one JSON object on its own line,
/// tagged with its kind.
pub struct FileSink {
    writer: BufWriter<File>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Step(&'a StepRecord),
    Episode(&'a EpisodeRecord),
}

impl FileSink {
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, line: &Line<'_>) {
        // A telemetry write failure must not take down a training run, so
        // I/O errors are deliberately dropped here.
        if let Ok(json) = serde_json::to_string(line) {
            let _ = self.writer.write_all(json.as_bytes());
            let _ = self.writer.write_all(b"\n");
        }
    }
}

impl RecordSink for FileSink {
    fn record_step(&mut self, record: &StepRecord) {
        self.write_line(&Line::Step(record));
    }

    fn record_episode(&mut self, record: &EpisodeRecord) {
        self.write_line(&Line::Episode(record));
        let _ = self.writer.flush();
    }
}
