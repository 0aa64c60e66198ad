//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn SolveProgressCallback>`] via
//! [`crate::config::AssistantConfigBuilder::progress_callback`] to observe a
//! request as it moves through the pipeline. The CLI uses it to drive its
//! busy spinner; a GUI could forward the events to its own status bar.
//!
//! # Example
//!
//! ```rust
//! use ai_chemist::{AssistantConfig, PipelineStage, SolveProgressCallback};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl SolveProgressCallback for StageLogger {
//!     fn on_stage(&self, stage: PipelineStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = AssistantConfig::builder()
//!     .progress_callback(Arc::new(StageLogger) as Arc<dyn SolveProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::generate::GenerationState;
use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Decoding the image or extracting PDF text.
    Extracting,
    /// Building the prompt.
    Assembling,
    /// Waiting for the backend.
    Generating,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Extracting => f.write_str("Reading attachment"),
            PipelineStage::Assembling => f.write_str("Assembling prompt"),
            PipelineStage::Generating => f.write_str("Analyzing chemical problem"),
        }
    }
}

/// Called by the assistant as it processes one request.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SolveProgressCallback: Send + Sync {
    /// Called when a pipeline stage begins.
    fn on_stage(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called on every generation state transition
    /// (`Idle → Dispatching → Succeeded | Failed`).
    fn on_state(&self, state: GenerationState) {
        let _ = state;
    }

    /// Called once the request succeeded.
    ///
    /// # Arguments
    /// * `markdown_len` — byte length of the returned text
    fn on_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }

    /// Called once the request failed, with the user-visible message.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SolveProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AssistantConfig`].
pub type ProgressCallback = Arc<dyn SolveProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SolveProgressCallback for Recorder {
        fn on_stage(&self, stage: PipelineStage) {
            self.events.lock().unwrap().push(format!("stage:{stage:?}"));
        }

        fn on_state(&self, state: GenerationState) {
            self.events.lock().unwrap().push(format!("state:{state:?}"));
        }

        fn on_error(&self, error: &str) {
            self.events.lock().unwrap().push(format!("error:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(PipelineStage::Extracting);
        cb.on_state(GenerationState::Dispatching);
        cb.on_complete(42);
        cb.on_error("boom");
    }

    #[test]
    fn recorder_keeps_event_order() {
        let rec = Recorder::default();
        rec.on_stage(PipelineStage::Assembling);
        rec.on_state(GenerationState::Dispatching);
        rec.on_state(GenerationState::Failed);
        rec.on_error("quota");
        rec.on_complete(10);

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "stage:Assembling",
                "state:Dispatching",
                "state:Failed",
                "error:quota"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage(PipelineStage::Generating);
        assert_eq!(PipelineStage::Generating.to_string(), "Analyzing chemical problem");
    }
}
