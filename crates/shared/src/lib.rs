//! Wire protocol and user-facing error types for the point-cloud scan client.

pub mod error;
pub mod protocol;

pub use error::{ScanError, ScanErrorKind};
pub use protocol::{Confidence, ScanResult};
