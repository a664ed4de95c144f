//! Error taxonomy for the markup engine
//!
//! Nothing here is process-fatal. The worst outcome is a visible error state
//! the host clears with a manual retry.

use crate::annotation::AnnotationId;

/// Errors reported by engine operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    /// Rendering surface or its 2D context is unavailable; retried on the next frame
    #[error("rendering surface is not ready")]
    SurfaceNotReady,

    /// A newer render request superseded this one
    #[error("render of page {page} was canceled")]
    RenderCanceled { page: u32 },

    /// Update or delete against an id the store does not hold
    #[error("annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),

    /// Rasterization exceeded its time bound
    #[error("render of page {page} timed out after {elapsed_ms}ms")]
    RenderTimeout { page: u32, elapsed_ms: u64 },

    /// The external rasterizer failed for another reason
    #[error("rasterizer error: {0}")]
    Rasterizer(String),

    /// A history snapshot could not be encoded or decoded
    #[error("corrupt surface snapshot: {0}")]
    CorruptSnapshot(String),
}

impl MarkupError {
    /// Whether the host should retry or drop this error without telling the user
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MarkupError::SurfaceNotReady | MarkupError::RenderCanceled { .. }
        )
    }

    /// Message suitable for display, or `None` for errors that are dropped silently
    pub fn user_message(&self) -> Option<String> {
        match self {
            MarkupError::RenderCanceled { .. } | MarkupError::SurfaceNotReady => None,
            MarkupError::RenderTimeout { page, .. } => Some(format!(
                "Page {} took too long to render. Try reloading the page.",
                page
            )),
            other => Some(other.to_string()),
        }
    }
}

/// Result type for engine operations
pub type MarkupResult<T> = Result<T, MarkupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_and_cancel_are_recoverable() {
        assert!(MarkupError::SurfaceNotReady.is_recoverable());
        assert!(MarkupError::RenderCanceled { page: 2 }.is_recoverable());
        assert!(!MarkupError::RenderTimeout { page: 1, elapsed_ms: 12_000 }.is_recoverable());
    }

    #[test]
    fn canceled_render_has_no_user_message() {
        assert!(MarkupError::RenderCanceled { page: 3 }.user_message().is_none());
        let timeout = MarkupError::RenderTimeout { page: 3, elapsed_ms: 10_001 };
        assert!(timeout.user_message().unwrap().contains("Page 3"));
    }
}
