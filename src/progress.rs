//! Progress reporting for a single pipeline invocation.
//!
//! Callers pass a [`ProgressCallback`] to
//! [`crate::process::DocumentPipeline::process_document`]. Any
//! `Fn(ProgressEvent) + Send + Sync` closure implements the trait, so the
//! simplest integration is a closure that forwards the percentage to a UI.
//!
//! # Milestones
//!
//! | Percentage | When |
//! |-----------:|------|
//! | 0   | invocation starts |
//! | 0–50 | upload, proportional to bytes transferred (or simulated steps) |
//! | 50  | handoff to extraction |
//! | 75  | extraction returned |
//! | 100 | result assembled |
//!
//! Percentages never go backwards within one invocation; the internal
//! [`ProgressReporter`] drops any event that would regress.
//!
//! # Example
//!
//! ```rust
//! use matter_intake::{ProgressCallback, ProgressEvent};
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! let last = AtomicU8::new(0);
//! let cb = |e: ProgressEvent| last.store(e.percentage, Ordering::SeqCst);
//! cb.on_progress(ProgressEvent::milestone(50));
//! assert_eq!(last.load(Ordering::SeqCst), 50);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// One progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub loaded: u64,
    pub total: u64,
    /// 0–100.
    pub percentage: u8,
}

impl ProgressEvent {
    /// Build an event from a byte count, deriving the percentage.
    ///
    /// A zero `total` is treated as complete.
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((loaded.min(total) as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }

    /// A pipeline milestone expressed as `percentage / 100`.
    pub fn milestone(percentage: u8) -> Self {
        let percentage = percentage.min(100);
        Self {
            loaded: percentage as u64,
            total: 100,
            percentage,
        }
    }

    /// Map this event's percentage into the `[0, ceiling]` band, keeping
    /// `loaded`/`total` as reported by the stage.
    pub fn scaled(self, ceiling: u8) -> Self {
        let percentage = ((self.percentage as f64 / 100.0) * ceiling as f64).round() as u8;
        Self { percentage, ..self }
    }
}

/// Lifecycle of one invocation.
///
/// `Idle → Uploading → Extracting → Parsing → Scoring → Complete`, with
/// `Failed` reachable from `Extracting` and `Parsing`. There is no retry
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Uploading,
    Extracting,
    Parsing,
    Scoring,
    Complete,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Parsing => "parsing",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receives progress from the pipeline.
///
/// Implementations must be `Send + Sync`. Only [`on_progress`] is required;
/// [`on_stage`] defaults to a no-op.
///
/// [`on_progress`]: ProgressCallback::on_progress
/// [`on_stage`]: ProgressCallback::on_stage
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);

    /// Called on every state transition.
    fn on_stage(&self, stage: PipelineStage) {
        let _ = stage;
    }
}

impl<F> ProgressCallback for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Wraps the caller's callback for one invocation and enforces the
/// non-decreasing percentage invariant.
pub(crate) struct ProgressReporter<'a> {
    inner: Option<&'a dyn ProgressCallback>,
    last: AtomicU8,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(inner: Option<&'a dyn ProgressCallback>) -> Self {
        Self {
            inner,
            last: AtomicU8::new(0),
        }
    }

    pub(crate) fn milestone(&self, percentage: u8) {
        self.on_progress(ProgressEvent::milestone(percentage));
    }

    pub(crate) fn last_percentage(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

impl ProgressCallback for ProgressReporter<'_> {
    fn on_progress(&self, event: ProgressEvent) {
        // fetch_max returns the previous maximum; anything below it is stale.
        let previous = self.last.fetch_max(event.percentage, Ordering::SeqCst);
        if event.percentage < previous {
            return;
        }
        if let Some(cb) = self.inner {
            cb.on_progress(event);
        }
    }

    fn on_stage(&self, stage: PipelineStage) {
        if let Some(cb) = self.inner {
            cb.on_stage(stage);
        }
    }
}

/// Rescales upload-local events (0–100) into the pipeline's upload band.
pub(crate) struct UploadBand<'a> {
    pub(crate) reporter: &'a ProgressReporter<'a>,
    pub(crate) ceiling: u8,
}

impl ProgressCallback for UploadBand<'_> {
    fn on_progress(&self, event: ProgressEvent) {
        self.reporter.on_progress(event.scaled(self.ceiling));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percentage_from_bytes() {
        assert_eq!(ProgressEvent::new(0, 200).percentage, 0);
        assert_eq!(ProgressEvent::new(50, 200).percentage, 25);
        assert_eq!(ProgressEvent::new(200, 200).percentage, 100);
        assert_eq!(ProgressEvent::new(300, 200).percentage, 100);
        assert_eq!(ProgressEvent::new(0, 0).percentage, 100);
    }

    #[test]
    fn scaled_into_upload_band() {
        let e = ProgressEvent::new(40, 100).scaled(50);
        assert_eq!(e.percentage, 20);
        assert_eq!(e.loaded, 40);
        assert_eq!(ProgressEvent::milestone(100).scaled(50).percentage, 50);
    }

    #[test]
    fn reporter_drops_regressions() {
        let seen = Mutex::new(Vec::new());
        let cb = |e: ProgressEvent| seen.lock().unwrap().push(e.percentage);
        let reporter = ProgressReporter::new(Some(&cb));

        reporter.milestone(0);
        reporter.on_progress(ProgressEvent::new(40, 100));
        reporter.on_progress(ProgressEvent::new(10, 100));
        reporter.milestone(50);

        assert_eq!(*seen.lock().unwrap(), vec![0, 40, 50]);
        assert_eq!(reporter.last_percentage(), 50);
    }

    #[test]
    fn upload_band_halves_percentages() {
        let seen = Mutex::new(Vec::new());
        let cb = |e: ProgressEvent| seen.lock().unwrap().push(e.percentage);
        let reporter = ProgressReporter::new(Some(&cb));
        let band = UploadBand {
            reporter: &reporter,
            ceiling: 50,
        };

        for p in [20, 40, 60, 80, 100] {
            band.on_progress(ProgressEvent::milestone(p));
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new(None);
        reporter.milestone(75);
        reporter.on_stage(PipelineStage::Complete);
        assert_eq!(reporter.last_percentage(), 75);
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_progress(ProgressEvent::milestone(10));
        cb.on_stage(PipelineStage::Uploading);
    }

    #[test]
    fn stage_display() {
        assert_eq!(PipelineStage::Extracting.to_string(), "extracting");
        assert_eq!(PipelineStage::Failed.to_string(), "failed");
    }
}
