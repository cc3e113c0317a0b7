//! Run stages, progress callbacks, and the tracker that sequences them.
//!
//! A run moves through [`Stage`]s strictly in order. Extraction runs:
//!
//! ```text
//! Validating ─▶ Encoding ─▶ ResolvingSchema ─▶ Extracting ─▶ Persisting ─▶ Done
//!     5            10             15                50            90         100
//! ```
//!
//! Parse runs skip schema resolution and call the digitization endpoint in
//! `Parsing` instead of `Extracting`:
//!
//! ```text
//! Validating ─▶ Encoding ─▶ Parsing ─▶ Persisting ─▶ Done
//!     5            10          50          90         100
//! ```
//!
//! Any stage can fall into the absorbing `Failed` state, represented by
//! [`crate::error::RunFailure`]. The percentages under each stage are the
//! progress value emitted when the stage is entered. They only ever go up and
//! carry no meaning beyond that.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::DocAiConfigBuilder::progress_callback`] to observe a run.
//!
//! # Example
//!
//! ```rust
//! use upstage_docai::{PipelineProgressCallback, Stage};
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl PipelineProgressCallback for LastPercent {
//!     fn on_stage(&self, _stage: Stage, percent: u8) {
//!         self.0.store(percent, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::{DocAiError, RunFailure};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One step of a pipeline run. Ordered by position in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Validating,
    Encoding,
    ResolvingSchema,
    /// Document-digitization call of a parse run.
    Parsing,
    Extracting,
    Persisting,
    Done,
}

impl Stage {
    /// Progress percentage emitted when the stage is entered.
    pub fn checkpoint(self) -> u8 {
        match self {
            Stage::Validating => 5,
            Stage::Encoding => 10,
            Stage::ResolvingSchema => 15,
            Stage::Parsing | Stage::Extracting => 50,
            Stage::Persisting => 90,
            Stage::Done => 100,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Encoding => "encoding",
            Stage::ResolvingSchema => "resolving schema",
            Stage::Parsing => "parsing",
            Stage::Extracting => "extracting",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as a run advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: one callback
/// may observe several runs executing on different tasks.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before validation starts.
    fn on_run_start(&self, file: &Path) {
        let _ = file;
    }

    /// Called on entering each stage.
    ///
    /// # Arguments
    /// * `stage`   — the stage being entered
    /// * `percent` — progress in `0..=100`, strictly greater than the
    ///   previous value of the same run
    fn on_stage(&self, stage: Stage, percent: u8) {
        let _ = (stage, percent);
    }

    /// Informational message ("Loading schema from …").
    fn on_info(&self, message: &str) {
        let _ = message;
    }

    /// A non-fatal problem, e.g. a raw artifact that could not be saved.
    fn on_warning(&self, message: &str) {
        let _ = message;
    }

    /// Called once when the run enters the `Failed` state.
    fn on_run_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after the run reached [`Stage::Done`].
    fn on_run_complete(&self, file: &Path) {
        let _ = file;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DocAiConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

/// Drives one run through its stages and reports each transition.
///
/// Each fallible step goes through [`StageTracker::step`], which enters the
/// stage, awaits the step, and tags a failure with the stage it happened in.
/// Stages can only move forward; an attempt to re-enter or go back is
/// ignored with a warning.
pub struct StageTracker {
    callback: Option<ProgressCallback>,
    current: Option<Stage>,
    last_percent: u8,
}

impl StageTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            current: None,
            last_percent: 0,
        }
    }

    /// The stage most recently entered, if any.
    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Last progress value emitted.
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn start(&self, file: &Path) {
        if let Some(ref cb) = self.callback {
            cb.on_run_start(file);
        }
    }

    /// Enter `stage` and emit its checkpoint.
    pub fn enter(&mut self, stage: Stage) {
        if let Some(current) = self.current {
            if stage <= current {
                warn!("Ignoring backwards stage transition {} -> {}", current, stage);
                return;
            }
        }
        self.current = Some(stage);

        let percent = stage.checkpoint().min(100);
        if percent <= self.last_percent {
            return;
        }
        self.last_percent = percent;
        debug!("Stage {} ({}%)", stage, percent);
        if let Some(ref cb) = self.callback {
            cb.on_stage(stage, percent);
        }
    }

    /// Run one fallible step inside `stage`.
    pub async fn step<T, F>(&mut self, stage: Stage, step: F) -> Result<T, RunFailure>
    where
        F: Future<Output = Result<T, DocAiError>>,
    {
        self.enter(stage);
        match step.await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Move to the `Failed` state from the current stage.
    pub fn fail(&self, error: DocAiError) -> RunFailure {
        let stage = self.current.unwrap_or(Stage::Validating);
        warn!("Run failed while {}: {}", stage, error);
        if let Some(ref cb) = self.callback {
            cb.on_run_failed(stage, &error.to_string());
        }
        RunFailure::new(stage, error)
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", message);
        if let Some(ref cb) = self.callback {
            cb.on_info(message);
        }
    }

    pub fn warning(&self, message: &str) {
        warn!("{}", message);
        if let Some(ref cb) = self.callback {
            cb.on_warning(message);
        }
    }

    /// Enter [`Stage::Done`] and report completion.
    pub fn finish(&mut self, file: &Path) {
        self.enter(Stage::Done);
        if let Some(ref cb) = self.callback {
            cb.on_run_complete(file);
        }
    }
}
