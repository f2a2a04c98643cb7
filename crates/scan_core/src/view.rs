//! Projection handed to the rendering layer: scan snapshot plus drag flag.

use shared::{ScanError, ScanResult};

use crate::{
    intake::FileIntake,
    orchestrator::{ScanSnapshot, ScanStatus, UploadOrchestrator},
};

/// Substring that marks the class shown with emphasis. Display-only.
pub const POSITIVE_CLASS_MARKER: &str = "CAR";

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerView {
    pub snapshot: ScanSnapshot,
    pub drag_active: bool,
}

impl ScannerView {
    pub fn capture(orchestrator: &UploadOrchestrator, intake: &FileIntake) -> Self {
        Self {
            snapshot: orchestrator.current_state(),
            drag_active: intake.drag_active(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.snapshot.status
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.snapshot.result.as_ref()
    }

    pub fn error(&self) -> Option<&ScanError> {
        self.snapshot.error.as_ref()
    }

    pub fn is_positive_class(&self) -> bool {
        self.result()
            .is_some_and(|result| result.prediction.contains(POSITIVE_CLASS_MARKER))
    }

    /// Opaque target width for the confidence indicator, e.g. `"97.3%"`.
    pub fn indicator_target(&self) -> Option<&str> {
        self.result().map(|result| result.confidence.as_str())
    }
}
