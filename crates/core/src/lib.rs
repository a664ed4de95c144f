//! Markup Engine Core Library
//!
//! Interactive annotation layer for paginated documents: a canonical
//! document-space annotation store, a render bridge that keeps scaled live
//! objects on a drawing surface in sync with it, tool-driven pointer input,
//! snapshot undo/redo, clipboard and in-place text editing.

pub mod annotation;
pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod history;
pub mod manipulation;
pub mod persistence;
pub mod render_task;
pub mod store;
pub mod surface;
pub mod text_edit;
pub mod tools;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, AnnotationStyle, Color, Comment,
    FontWeight, Point, Rect, Size, TextContent,
};
pub use bridge::{MeasurementScale, ProjectionParams, RenderBridge, RestoreReport};
pub use clipboard::{Clipboard, PasteTarget};
pub use config::{ConfigError, EngineConfig};
pub use coords::{CoordinateSpace, ScaleChange};
pub use engine::{MarkupEngine, PageControls, Shortcut};
pub use error::{MarkupError, MarkupResult};
pub use history::{HistoryManager, Snapshot};
pub use manipulation::{generate_handles, HandleType, ManipulationHandle, ManipulationState};
pub use persistence::{JournalEntry, JournalWriter, PersistenceError};
pub use render_task::{
    CancellationToken, PageRasterizer, RasterError, RasterizedPage, RenderRequests, RenderTicket,
};
pub use store::{AnnotationStore, ChangeType, ListenerError, SubscriptionId};
pub use surface::{HeadlessSurface, LiveObject, LiveShape, LiveText, ObjectHandle, Surface};
pub use text_edit::{ExitOutcome, TextEditSession, TextEditState};
pub use tools::{Action, Gesture, Tool, ToolDispatcher, ToolStyle};
