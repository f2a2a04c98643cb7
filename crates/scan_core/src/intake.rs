//! File intake: normalizes picker selections and drag-and-drop payloads into
//! one "file selected" signal.
//!
//! No validation of type, extension or size happens here. The `.bin` hint
//! belongs to the picker, not to this layer.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Hint for pickers; never enforced by intake.
pub const PICKER_ACCEPT_HINT: &str = ".bin";

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// Reference to a user-supplied file. Contents are read lazily at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    source: FileSource,
}

impl FileHandle {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    pub fn in_memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(path) => Some(path),
            FileSource::Memory(_) => None,
        }
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOrigin {
    Picker,
    Drop,
}

/// The normalized "file accepted" event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelected {
    pub file: FileHandle,
    pub origin: IntakeOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropPayload {
    pub files: Vec<FileHandle>,
}

impl DropPayload {
    pub fn new(files: Vec<FileHandle>) -> Self {
        Self { files }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    Drop(DropPayload),
}

/// What the rendering layer must do with the platform event after intake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragResponse {
    /// Suppress the platform's default drag-and-drop navigation.
    pub prevent_default: bool,
    pub selected: Option<FileSelected>,
}

#[derive(Debug, Default)]
pub struct FileIntake {
    drag_active: bool,
}

impl FileIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transient hover flag, consumed only for rendering.
    pub fn drag_active(&self) -> bool {
        self.drag_active
    }

    pub fn on_file_chosen(&mut self, file: Option<FileHandle>) -> Option<FileSelected> {
        let Some(file) = file else {
            debug!("picker change carried no file; ignoring");
            return None;
        };
        Some(FileSelected {
            file,
            origin: IntakeOrigin::Picker,
        })
    }

    pub fn on_drag_enter(&mut self) -> DragResponse {
        self.set_drag_active(true);
        Self::suppressed(None)
    }

    pub fn on_drag_over(&mut self) -> DragResponse {
        self.set_drag_active(true);
        Self::suppressed(None)
    }

    pub fn on_drag_leave(&mut self) -> DragResponse {
        self.set_drag_active(false);
        Self::suppressed(None)
    }

    /// Only the first file of a multi-file drop is used; the rest are discarded.
    pub fn on_drop(&mut self, payload: DropPayload) -> DragResponse {
        self.set_drag_active(false);

        let total = payload.files.len();
        let Some(file) = payload.files.into_iter().next() else {
            debug!("drop payload carried no files; ignoring");
            return Self::suppressed(None);
        };
        if total > 1 {
            debug!(
                used = file.name(),
                discarded = total - 1,
                "multi-file drop; using first file only"
            );
        }

        Self::suppressed(Some(FileSelected {
            file,
            origin: IntakeOrigin::Drop,
        }))
    }

    /// Forwards a raw drag lifecycle event to the matching handler.
    pub fn on_drag_event(&mut self, event: DragEvent) -> DragResponse {
        match event {
            DragEvent::Enter => self.on_drag_enter(),
            DragEvent::Over => self.on_drag_over(),
            DragEvent::Leave => self.on_drag_leave(),
            DragEvent::Drop(payload) => self.on_drop(payload),
        }
    }

    fn set_drag_active(&mut self, active: bool) {
        if self.drag_active != active {
            debug!(drag_active = active, "drag state changed");
        }
        self.drag_active = active;
    }

    fn suppressed(selected: Option<FileSelected>) -> DragResponse {
        DragResponse {
            prevent_default: true,
            selected,
        }
    }
}

#[cfg(test)]
#[path = "tests/intake_tests.rs"]
mod tests;
