use std::collections::BTreeMap;
use std::time::Instant;

use super::recognize_faces_use_case::RunReport;

/// Observer for per-frame pipeline events.
///
/// Keeps the orchestrator free of output concerns: the CLI logs through the
/// `log` facade, tests use the null implementation.
pub trait PipelineLogger: Send {
    /// A frame entered the pipeline. Live sources have no known total.
    fn frame(&mut self, index: usize);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time metric (detections per frame, top probability, ...).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self, _report: &RunReport) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame(&mut self, _index: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running sum and count; a live run may last for hours, so samples are
/// not kept.
#[derive(Clone, Copy, Debug, Default)]
struct Accumulator {
    total: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Logger backed by the `log` crate.
///
/// Emits a progress line every `throttle_frames` frames and an end-of-run
/// summary with per-stage averages, throughput, outcomes and the tally.
pub struct LogPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Accumulator>,
    metrics: BTreeMap<String, Accumulator>,
    start_time: Instant,
    frames_seen: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    pub fn mean_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Accumulator::mean)
    }

    pub fn mean_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Accumulator::mean)
    }

    pub fn summary_string(&self, report: &RunReport) -> String {
        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Recognition summary ({} frames, {elapsed_s:.1}s, stopped: {}):",
            report.frames, report.stop_reason
        )];

        let elapsed_ms = elapsed_s * 1000.0;
        for (stage, acc) in &self.timings {
            let pct = if elapsed_ms > 0.0 {
                acc.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                acc.mean(),
                acc.total
            ));
        }
        for (name, acc) in &self.metrics {
            lines.push(format!("  {name}: avg {:.2}", acc.mean()));
        }
        if report.frames > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                report.frames as f64 / elapsed_s
            ));
        }

        let c = &report.outcomes;
        lines.push(format!(
            "  Outcomes: {} recognized, {} unknown, {} no face, {} multiple faces, {} too small, {} failed ({} contract violations)",
            c.recognized, c.unknown, c.no_face, c.multiple_faces, c.too_small, c.failed, c.contract_violations
        ));
        if report.read_errors > 0 {
            lines.push(format!("  Read errors: {}", report.read_errors));
        }
        lines.push(format!("  Recognized: {}", report.tally.summary()));
        lines.join("\n")
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame(&mut self, index: usize) {
        self.frames_seen += 1;
        if self.frames_seen % self.throttle_frames == 0 {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let fps = if elapsed > 0.0 {
                self.frames_seen as f64 / elapsed
            } else {
                0.0
            };
            log::info!(
                "Processed {} frames (last index {index}, {fps:.1} fps)",
                self.frames_seen
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self, report: &RunReport) {
        log::info!("\n\n{}", self.summary_string(report));
    }
}
