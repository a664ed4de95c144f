//! Annotation persistence
//!
//! Annotations are stored as a JSON sidecar file next to the source document.
//! Hosts that want every mutation on disk subscribe a [`JournalWriter`] to the
//! store, which appends one JSON line per change.

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::store::{AnnotationStore, ChangeType, ListenerError};

/// Error types for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Sidecar path for a document: `<document>.markup.json`
///
/// ```
/// use std::path::Path;
/// use markup_core::persistence::sidecar_path;
///
/// let path = sidecar_path(Path::new("/plans/level-2.pdf"));
/// assert_eq!(path, Path::new("/plans/level-2.pdf.markup.json"));
/// ```
pub fn sidecar_path(document: &Path) -> PathBuf {
    let mut path = document.as_os_str().to_owned();
    path.push(".markup.json");
    PathBuf::from(path)
}

/// On-disk layout of the sidecar file
#[derive(Debug, Serialize, Deserialize)]
struct SidecarFile {
    version: u32,
    saved_at: DateTime<Utc>,
    annotations: Vec<Annotation>,
}

const SIDECAR_VERSION: u32 = 1;

/// Write every record in the store, replacing the file atomically
pub fn save_annotations(path: &Path, store: &AnnotationStore) -> PersistenceResult<usize> {
    let annotations: Vec<Annotation> = store.all().into_iter().cloned().collect();
    let count = annotations.len();
    let file = SidecarFile {
        version: SIDECAR_VERSION,
        saved_at: Utc::now(),
        annotations,
    };
    let json = serde_json::to_string_pretty(&file)?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;

    tracing::debug!(path = %path.display(), count, "annotations saved");
    Ok(count)
}

/// Read records from a sidecar file; `None` when the file does not exist
pub fn load_annotations(path: &Path) -> PersistenceResult<Option<Vec<Annotation>>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let file: SidecarFile = serde_json::from_str(&json)?;
    if file.version != SIDECAR_VERSION {
        tracing::warn!(version = file.version, "unexpected sidecar version, reading anyway");
    }
    Ok(Some(file.annotations))
}

/// One line of the change journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub change: ChangeType,
    pub annotation: Annotation,
    pub at: DateTime<Utc>,
}

/// Appends store changes as JSON lines
pub struct JournalWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> JournalWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write_change(
        &mut self,
        change: ChangeType,
        annotation: &Annotation,
    ) -> PersistenceResult<()> {
        let entry = JournalEntry {
            change,
            annotation: annotation.clone(),
            at: Utc::now(),
        };
        serde_json::to_writer(&mut self.out, &entry)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Number of entries written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + 'static> JournalWriter<W> {
    /// Wrap a shared writer as a store subscriber
    pub fn listener(
        writer: Rc<RefCell<Self>>,
    ) -> impl FnMut(ChangeType, &Annotation) -> Result<(), ListenerError> {
        move |change, annotation| {
            writer
                .borrow_mut()
                .write_change(change, annotation)
                .map_err(ListenerError::from)
        }
    }
}

/// Parse a journal back into entries, skipping blank lines
pub fn read_journal(text: &str) -> PersistenceResult<Vec<JournalEntry>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(PersistenceError::from))
        .collect()
}
