//! Single-slot clipboard for annotations

use crate::annotation::{Annotation, Rect};

/// Where a paste lands, in document space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PasteTarget {
    pub page_number: u32,
    /// Full page bounds
    pub canvas: Rect,
    /// Currently visible part of the page
    pub viewport: Rect,
}

/// Holds at most one copied annotation
#[derive(Debug, Default)]
pub struct Clipboard {
    slot: Option<Annotation>,
    offset: f64,
}

impl Clipboard {
    pub fn new(offset: f64) -> Self {
        Self { slot: None, offset }
    }

    /// Replace the slot contents with a copy of `annotation`
    pub fn copy(&mut self, annotation: &Annotation) {
        tracing::debug!(id = %annotation.id, "copied to clipboard");
        self.slot = Some(annotation.clone());
    }

    /// Produce a pasteable duplicate, or `None` when the slot is empty
    ///
    /// The copy gets a fresh id and is offset from the held object. When the
    /// offset would leave the canvas it is centered in the viewport instead.
    /// The slot then tracks the pasted copy so repeated pastes cascade.
    pub fn paste(&mut self, target: PasteTarget) -> Option<Annotation> {
        let held = self.slot.as_ref()?;
        let mut copy = held.duplicate();
        copy.page_number = target.page_number;
        copy.translate(self.offset, self.offset);

        if !target.canvas.contains_rect(&copy.bounds()) {
            let bounds = copy.bounds();
            let center = target.viewport.center();
            copy.translate(
                center.x - bounds.center().x,
                center.y - bounds.center().y,
            );
        }

        self.slot = Some(copy.clone());
        Some(copy)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn peek(&self) -> Option<&Annotation> {
        self.slot.as_ref()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, AnnotationStyle, Point, Size};

    fn target() -> PasteTarget {
        PasteTarget {
            page_number: 1,
            canvas: Rect::new(0.0, 0.0, 612.0, 792.0),
            viewport: Rect::new(0.0, 100.0, 600.0, 400.0),
        }
    }

    fn rect(x: f64, y: f64) -> Annotation {
        Annotation::new(
            AnnotationKind::Rectangle,
            1,
            Point::new(x, y),
            Size::new(50.0, 50.0),
            AnnotationStyle::default(),
        )
    }

    #[test]
    fn paste_on_empty_slot_is_noop() {
        let mut clipboard = Clipboard::new(20.0);
        assert!(clipboard.paste(target()).is_none());
    }

    #[test]
    fn paste_offsets_copy_with_new_identity() {
        let original = rect(100.0, 100.0);
        let mut clipboard = Clipboard::new(20.0);
        clipboard.copy(&original);

        let pasted = clipboard.paste(target()).unwrap();
        assert_ne!(pasted.id, original.id);
        assert_eq!(pasted.style, original.style);
        assert_eq!(pasted.position, Point::new(120.0, 120.0));
        assert_eq!(original.position, Point::new(100.0, 100.0));
    }

    #[test]
    fn successive_pastes_cascade() {
        let mut clipboard = Clipboard::new(20.0);
        clipboard.copy(&rect(100.0, 100.0));
        clipboard.paste(target());
        let second = clipboard.paste(target()).unwrap();
        assert_eq!(second.position, Point::new(140.0, 140.0));
    }

    #[test]
    fn paste_outside_canvas_centers_in_viewport() {
        let mut clipboard = Clipboard::new(20.0);
        clipboard.copy(&rect(550.0, 700.0));

        let pasted = clipboard.paste(target()).unwrap();
        assert_eq!(pasted.bounds().center(), Point::new(300.0, 300.0));
    }

    #[test]
    fn copy_overwrites_slot() {
        let mut clipboard = Clipboard::new(20.0);
        clipboard.copy(&rect(0.0, 0.0));
        let second = rect(5.0, 5.0);
        clipboard.copy(&second);
        assert_eq!(clipboard.peek().map(|a| a.id), Some(second.id));
    }
}
