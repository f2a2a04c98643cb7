//! Client core for submitting point-cloud scans to a remote classifier.
//!
//! [`FileIntake`] turns picker and drag-and-drop input into one "file
//! selected" signal, [`UploadOrchestrator`] drives the single active scan
//! through `Idle -> Scanning -> Settled`, and [`ScannerView`] is what the
//! rendering layer reads.

pub mod inference;
pub mod intake;
pub mod orchestrator;
pub mod view;

pub use inference::{
    HttpInferenceClient, InferenceError, InferenceService, UploadRequest,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use intake::{
    DragEvent, DragResponse, DropPayload, FileHandle, FileIntake, FileSelected, IntakeOrigin,
};
pub use orchestrator::{ScanSnapshot, ScanStatus, Settlement, SubmitDecision, UploadOrchestrator};
pub use shared::{Confidence, ScanError, ScanErrorKind, ScanResult};
pub use view::ScannerView;
