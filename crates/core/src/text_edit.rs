//! Text edit session lifecycle
//!
//! A text-bearing annotation is either showing its placeholder or authored
//! content. While an edit session is open the session owns the text buffer and
//! captures keystrokes. Exiting either commits authored text or, when the
//! trimmed buffer is empty, reverts to the placeholder. A short cooldown after
//! every exit keeps the text tool from creating a second box out of the same
//! click sequence.
//!
//! Time is passed in explicitly so transitions can be driven without a clock.

use std::time::{Duration, Instant};

use crate::annotation::{AnnotationId, TextContent};

/// Session state
#[derive(Debug, Clone, PartialEq)]
pub enum TextEditState {
    Idle,
    Editing {
        id: AnnotationId,
        buffer: String,
        /// Content the annotation had when the session opened
        original: TextContent,
        /// The annotation was created by this interaction
        is_new: bool,
    },
    Cooldown {
        until: Instant,
    },
}

/// Result of leaving an edit session
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    /// Nothing was being edited
    NotEditing,
    /// Empty input; `content` is the restored placeholder
    Reverted {
        id: AnnotationId,
        content: TextContent,
        is_new: bool,
    },
    Committed {
        id: AnnotationId,
        content: TextContent,
        is_new: bool,
    },
}

impl ExitOutcome {
    pub fn id(&self) -> Option<AnnotationId> {
        match self {
            ExitOutcome::NotEditing => None,
            ExitOutcome::Reverted { id, .. } | ExitOutcome::Committed { id, .. } => Some(*id),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(
            self,
            ExitOutcome::Reverted { is_new: true, .. } | ExitOutcome::Committed { is_new: true, .. }
        )
    }
}

/// Explicit state machine for placeholder → editing → committed/placeholder
#[derive(Debug)]
pub struct TextEditSession {
    state: TextEditState,
    placeholder_text: String,
    cooldown: Duration,
}

impl TextEditSession {
    pub fn new(placeholder_text: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            state: TextEditState::Idle,
            placeholder_text: placeholder_text.into(),
            cooldown,
        }
    }

    pub fn state(&self) -> &TextEditState {
        &self.state
    }

    /// Placeholder content for a new text box
    pub fn placeholder_content(&self, template: &TextContent) -> TextContent {
        TextContent {
            text: self.placeholder_text.clone(),
            placeholder: true,
            ..template.clone()
        }
    }

    /// Open a session on `id`, returning the content to show while editing
    ///
    /// Placeholder content is cleared outright and switches to the authored
    /// color; authored content is kept for editing.
    pub fn begin(&mut self, id: AnnotationId, current: &TextContent, is_new: bool) -> TextContent {
        let buffer = if current.placeholder {
            String::new()
        } else {
            current.text.clone()
        };
        tracing::debug!(%id, is_new, "text edit started");
        self.state = TextEditState::Editing {
            id,
            buffer: buffer.clone(),
            original: current.clone(),
            is_new,
        };
        TextContent {
            text: buffer,
            placeholder: false,
            ..current.clone()
        }
    }

    /// Replace the buffer with `text`; returns the content to display
    pub fn set_text(&mut self, text: &str) -> Option<TextContent> {
        match &mut self.state {
            TextEditState::Editing {
                buffer, original, ..
            } => {
                buffer.clear();
                buffer.push_str(text);
                Some(TextContent {
                    text: buffer.clone(),
                    placeholder: false,
                    ..original.clone()
                })
            }
            _ => None,
        }
    }

    /// Append typed characters to the buffer
    pub fn append(&mut self, text: &str) -> Option<TextContent> {
        let current = self.buffer()?.to_string();
        self.set_text(&(current + text))
    }

    /// Take font and color from `template`, keeping text and family
    pub fn restyle(&mut self, template: &TextContent) {
        if let TextEditState::Editing { original, .. } = &mut self.state {
            *original = TextContent {
                text: std::mem::take(&mut original.text),
                font_family: std::mem::take(&mut original.font_family),
                placeholder: original.placeholder,
                ..template.clone()
            };
        }
    }

    pub fn buffer(&self) -> Option<&str> {
        match &self.state {
            TextEditState::Editing { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// Close the session and start the creation cooldown
    pub fn exit(&mut self, now: Instant) -> ExitOutcome {
        if !self.is_capturing() {
            return ExitOutcome::NotEditing;
        }
        let TextEditState::Editing {
            id,
            buffer,
            original,
            is_new,
        } = std::mem::replace(&mut self.state, TextEditState::Idle)
        else {
            return ExitOutcome::NotEditing;
        };
        self.state = TextEditState::Cooldown {
            until: now + self.cooldown,
        };

        if buffer.trim().is_empty() {
            tracing::debug!(%id, "text edit reverted to placeholder");
            ExitOutcome::Reverted {
                id,
                content: self.placeholder_content(&original),
                is_new,
            }
        } else {
            tracing::debug!(%id, "text edit committed");
            ExitOutcome::Committed {
                id,
                content: TextContent {
                    text: buffer,
                    placeholder: false,
                    ..original
                },
                is_new,
            }
        }
    }

    /// Leave the cooldown once it has elapsed
    pub fn tick(&mut self, now: Instant) {
        if let TextEditState::Cooldown { until } = self.state {
            if now >= until {
                self.state = TextEditState::Idle;
            }
        }
    }

    /// Whether a pointer-down at `now` may create a new text annotation
    pub fn can_create(&mut self, now: Instant) -> bool {
        self.tick(now);
        matches!(self.state, TextEditState::Idle)
    }

    /// Whether keystrokes belong to the session rather than global shortcuts
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, TextEditState::Editing { .. })
    }

    pub fn editing_id(&self) -> Option<AnnotationId> {
        match &self.state {
            TextEditState::Editing { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Drop any session and cooldown without producing an outcome
    pub fn reset(&mut self) {
        self.state = TextEditState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Color;

    const PLACEHOLDER: &str = "Click to add text";

    fn session() -> TextEditSession {
        TextEditSession::new(PLACEHOLDER, Duration::from_millis(300))
    }

    fn placeholder() -> TextContent {
        TextContent::placeholder(PLACEHOLDER, 16.0, Color::BLUE)
    }

    #[test]
    fn entering_edit_clears_placeholder() {
        let mut session = session();
        let id = AnnotationId::new_v4();
        let shown = session.begin(id, &placeholder(), true);

        assert_eq!(shown.text, "");
        assert!(!shown.placeholder);
        assert_eq!(shown.color, Color::BLUE);
        assert!(session.is_capturing());
        assert_eq!(session.editing_id(), Some(id));
    }

    #[test]
    fn empty_exit_restores_placeholder_exactly() {
        let mut session = session();
        let id = AnnotationId::new_v4();
        session.begin(id, &placeholder(), true);
        session.set_text("   ");

        match session.exit(Instant::now()) {
            ExitOutcome::Reverted { content, is_new, .. } => {
                assert_eq!(content, placeholder());
                assert!(is_new);
            }
            other => panic!("expected revert, got {:?}", other),
        }
    }

    #[test]
    fn restyle_keeps_buffer_and_changes_font() {
        let mut session = session();
        let id = AnnotationId::new_v4();
        session.begin(id, &placeholder(), true);
        session.set_text("Draft");

        session.restyle(&TextContent::authored("", 24.0, Color::RED));
        assert_eq!(session.buffer(), Some("Draft"));
        match session.exit(Instant::now()) {
            ExitOutcome::Committed { content, .. } => {
                assert_eq!(content.text, "Draft");
                assert_eq!(content.font_size, 24.0);
                assert_eq!(content.color, Color::RED);
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn non_empty_exit_commits_authored_text() {
        let mut session = session();
        let id = AnnotationId::new_v4();
        session.begin(id, &placeholder(), false);
        session.append("Hello");
        session.append(", world");

        let outcome = session.exit(Instant::now());
        assert_eq!(outcome.id(), Some(id));
        match outcome {
            ExitOutcome::Committed { content, .. } => {
                assert_eq!(content.text, "Hello, world");
                assert!(!content.placeholder);
                assert_eq!(content.font_size, 16.0);
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn editing_authored_text_keeps_buffer() {
        let mut session = session();
        let authored = TextContent::authored("draft", 12.0, Color::BLACK);
        let shown = session.begin(AnnotationId::new_v4(), &authored, false);
        assert_eq!(shown.text, "draft");
        assert_eq!(session.buffer(), Some("draft"));
    }

    #[test]
    fn cooldown_blocks_creation_until_elapsed() {
        let mut session = session();
        let start = Instant::now();
        session.begin(AnnotationId::new_v4(), &placeholder(), true);
        assert!(!session.can_create(start));

        session.exit(start);
        assert!(!session.is_capturing());
        assert!(!session.can_create(start + Duration::from_millis(100)));
        assert!(session.can_create(start + Duration::from_millis(300)));
        assert_eq!(*session.state(), TextEditState::Idle);
    }

    #[test]
    fn exit_without_session_is_noop() {
        let mut session = session();
        assert_eq!(session.exit(Instant::now()), ExitOutcome::NotEditing);
        assert!(session.set_text("x").is_none());
    }
}
