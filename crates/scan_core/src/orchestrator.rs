//! Upload lifecycle: `Idle -> Scanning -> Settled -> Scanning -> ...`.
//!
//! One orchestrator owns the single active scan. At most one request is in
//! flight; a submission while scanning is ignored until the current one
//! settles. Every in-flight request is bounded by the orchestrator's timeout,
//! so `Scanning` is always left.

use std::{sync::Arc, time::Duration};

use shared::{ScanError, ScanErrorKind, ScanResult};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    inference::{InferenceError, InferenceService, UploadRequest, DEFAULT_REQUEST_TIMEOUT},
    intake::FileHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Idle,
    Scanning,
    Settled,
}

impl ScanStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Settled => "settled",
        }
    }
}

/// Terminal outcome of one upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Completed(ScanResult),
    Failed(ScanError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
enum ScanState {
    Idle,
    Scanning,
    Settled(Settlement),
}

/// Read-only projection of the orchestrator state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSnapshot {
    pub status: ScanStatus,
    /// Name of the file being scanned, or of the last one that settled.
    pub filename: Option<String>,
    pub result: Option<ScanResult>,
    pub error: Option<ScanError>,
    pub cancelled: bool,
}

impl ScanSnapshot {
    pub fn idle() -> Self {
        Self {
            status: ScanStatus::Idle,
            filename: None,
            result: None,
            error: None,
            cancelled: false,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.status == ScanStatus::Scanning
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    Accepted { attempt: u64 },
    IgnoredWhileScanning,
}

struct InFlight {
    attempt: u64,
    task: JoinHandle<Settlement>,
}

pub struct UploadOrchestrator {
    service: Arc<dyn InferenceService>,
    timeout: Duration,
    state: ScanState,
    filename: Option<String>,
    in_flight: Option<InFlight>,
    attempts: u64,
    published: watch::Sender<ScanSnapshot>,
}

impl UploadOrchestrator {
    pub fn new(service: Arc<dyn InferenceService>) -> Self {
        let (published, _) = watch::channel(ScanSnapshot::idle());
        Self {
            service,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            state: ScanState::Idle,
            filename: None,
            in_flight: None,
            attempts: 0,
            published,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn status(&self) -> ScanStatus {
        match self.state {
            ScanState::Idle => ScanStatus::Idle,
            ScanState::Scanning => ScanStatus::Scanning,
            ScanState::Settled(_) => ScanStatus::Settled,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.status() == ScanStatus::Scanning
    }

    pub fn current_state(&self) -> ScanSnapshot {
        let mut snapshot = ScanSnapshot {
            status: self.status(),
            filename: self.filename.clone(),
            ..ScanSnapshot::idle()
        };
        if let ScanState::Settled(settlement) = &self.state {
            match settlement {
                Settlement::Completed(result) => snapshot.result = Some(result.clone()),
                Settlement::Failed(error) => snapshot.error = Some(error.clone()),
                Settlement::Cancelled => snapshot.cancelled = true,
            }
        }
        snapshot
    }

    /// Observes every published snapshot, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.published.subscribe()
    }

    /// Starts one upload for `file`. Must be called within a tokio runtime.
    pub fn submit(&mut self, file: FileHandle) -> SubmitDecision {
        if self.is_scanning() {
            warn!(
                filename = file.name(),
                active = self.filename.as_deref().unwrap_or_default(),
                "scan already in flight; ignoring submission"
            );
            return SubmitDecision::IgnoredWhileScanning;
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.state = ScanState::Scanning;
        self.filename = Some(file.name().to_string());

        let service = Arc::clone(&self.service);
        let timeout = self.timeout;
        info!(attempt, filename = file.name(), "scan submitted");
        let task = tokio::spawn(async move { run_upload(service, file, timeout).await });
        self.in_flight = Some(InFlight { attempt, task });

        self.publish();
        SubmitDecision::Accepted { attempt }
    }

    /// Waits for the in-flight request and applies its settlement.
    ///
    /// Returns `None` immediately when nothing is in flight. Cancel-safe: if
    /// the future is dropped the request keeps running and a later call picks
    /// it up.
    pub async fn settle_next(&mut self) -> Option<ScanSnapshot> {
        let in_flight = self.in_flight.as_mut()?;
        let joined = (&mut in_flight.task).await;
        let attempt = in_flight.attempt;
        self.in_flight = None;

        let settlement = match joined {
            Ok(settlement) => settlement,
            Err(err) if err.is_cancelled() => Settlement::Cancelled,
            Err(err) => {
                error!(attempt, %err, "upload task failed");
                Settlement::Failed(ScanError::new(
                    ScanErrorKind::Transport,
                    "Upload stopped unexpectedly before the service answered.",
                ))
            }
        };
        self.apply(attempt, settlement);
        Some(self.current_state())
    }

    /// Aborts the in-flight request and settles it as cancelled.
    pub fn cancel(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        in_flight.task.abort();
        self.apply(in_flight.attempt, Settlement::Cancelled);
        true
    }

    fn apply(&mut self, attempt: u64, settlement: Settlement) {
        let filename = self.filename.as_deref().unwrap_or_default();
        match &settlement {
            Settlement::Completed(result) => info!(
                attempt,
                filename,
                prediction = %result.prediction,
                confidence = %result.confidence,
                latency_ms = result.processing_latency_ms,
                "scan settled with result"
            ),
            Settlement::Failed(err) => match err.kind {
                ScanErrorKind::Transport => {
                    error!(attempt, filename, error = %err, "scan settled: service unreachable")
                }
                ScanErrorKind::Decode => {
                    warn!(attempt, filename, error = %err, "scan settled: undecodable response")
                }
                ScanErrorKind::Service | ScanErrorKind::Unreadable => {
                    warn!(attempt, filename, kind = err.kind.label(), error = %err, "scan settled with error")
                }
            },
            Settlement::Cancelled => info!(attempt, filename, "scan cancelled"),
        }
        self.state = ScanState::Settled(settlement);
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.current_state();
        debug!(status = snapshot.status.label(), "publishing scan snapshot");
        self.published.send_replace(snapshot);
    }
}

impl Drop for UploadOrchestrator {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
    }
}

async fn run_upload(
    service: Arc<dyn InferenceService>,
    file: FileHandle,
    timeout: Duration,
) -> Settlement {
    let filename = file.name().to_string();
    let payload = match file.read_bytes().await {
        Ok(payload) => payload,
        Err(err) => {
            return Settlement::Failed(
                InferenceError::Unreadable {
                    filename,
                    reason: err.to_string(),
                }
                .into(),
            )
        }
    };

    let request = UploadRequest { filename, payload };
    match tokio::time::timeout(timeout, service.process_lidar(request)).await {
        Ok(Ok(result)) => Settlement::Completed(result),
        Ok(Err(err)) => {
            debug!(error = %err, "inference call failed");
            Settlement::Failed(err.into())
        }
        Err(_) => Settlement::Failed(InferenceError::TimedOut { timeout }.into()),
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
