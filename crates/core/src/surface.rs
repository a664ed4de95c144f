//! Live objects and the rendering surface seam
//!
//! A [`LiveObject`] is the view-space visual state of one annotation (or of an
//! in-progress preview). It is never the source of truth: the canonical record
//! lives in the annotation store and the live object only carries a copy of it
//! as of the last commit.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::annotation::{
    point_near_segment, Annotation, AnnotationId, AnnotationKind, AnnotationStyle, Color,
    FontWeight, Point, Rect,
};

/// Renderer-native handle for a live object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

/// Triangular arrowhead placed at an arrow's end point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrowHead {
    /// Top-left of the head's bounding square
    pub left: f64,
    pub top: f64,
    /// Edge of the bounding square
    pub size: f64,
    /// Rotation of the head, `atan2(dy, dx)` of the line vector
    pub angle_degrees: f64,
}

impl ArrowHead {
    /// Rebuild the head for the line `start`→`end`
    pub fn for_line(start: Point, end: Point, size: f64) -> Self {
        let angle = (end.y - start.y).atan2(end.x - start.x);
        Self {
            left: end.x - size / 2.0,
            top: end.y - size / 2.0,
            size,
            angle_degrees: angle.to_degrees(),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.size / 2.0, self.top + self.size / 2.0)
    }
}

/// View-space geometry of a live object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum LiveShape {
    /// Rectangles, stamps, callouts and text boxes
    Rect {
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    /// Rectangle drawn with a scalloped outline
    Cloud {
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        bumps: u32,
    },
    /// Line plus arrowhead grouped under one handle
    Arrow {
        start: Point,
        end: Point,
        head: ArrowHead,
    },
    Measurement {
        start: Point,
        end: Point,
        label: String,
    },
    Path {
        points: Vec<Point>,
    },
}

impl LiveShape {
    /// Axis-aligned view-space bounds
    pub fn bounds(&self) -> Rect {
        match self {
            LiveShape::Rect {
                left,
                top,
                width,
                height,
            }
            | LiveShape::Cloud {
                left,
                top,
                width,
                height,
                ..
            } => Rect::new(*left, *top, *width, *height),
            LiveShape::Ellipse { cx, cy, rx, ry } => {
                Rect::new(cx - rx, cy - ry, rx * 2.0, ry * 2.0)
            }
            LiveShape::Arrow { start, end, .. } | LiveShape::Measurement { start, end, .. } => {
                Rect::from_corners(*start, *end)
            }
            LiveShape::Path { points } => Rect::enclosing(points).unwrap_or_default(),
        }
    }

    /// Largest extent in view pixels, used to reject degenerate previews
    pub fn extent(&self) -> f64 {
        match self {
            LiveShape::Arrow { start, end, .. } | LiveShape::Measurement { start, end, .. } => {
                start.distance_to(end)
            }
            other => {
                let bounds = other.bounds();
                bounds.width.max(bounds.height)
            }
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            LiveShape::Rect { left, top, .. } | LiveShape::Cloud { left, top, .. } => {
                *left += dx;
                *top += dy;
            }
            LiveShape::Ellipse { cx, cy, .. } => {
                *cx += dx;
                *cy += dy;
            }
            LiveShape::Arrow { start, end, head } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
                head.left += dx;
                head.top += dy;
            }
            LiveShape::Measurement { start, end, .. } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
            }
            LiveShape::Path { points } => {
                for point in points.iter_mut() {
                    *point = point.offset(dx, dy);
                }
            }
        }
    }
}

/// View-space text fields of a text-bearing live object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveText {
    pub text: String,
    /// Font size in view pixels
    pub font_size: f64,
    pub font_weight: FontWeight,
    pub font_family: String,
    /// Authored color
    pub color: Color,
    /// Color actually drawn: the placeholder gray while `placeholder` is set
    pub fill: Color,
    pub placeholder: bool,
}

/// One drawable object on the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveObject {
    pub kind: AnnotationKind,
    pub shape: LiveShape,
    pub style: AnnotationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<LiveText>,
    /// False while the object is an uncommitted preview
    pub persistent: bool,
    /// Canonical record as of the last commit; `None` for previews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Annotation>,
}

impl LiveObject {
    /// Non-persistent preview for an in-progress drawing gesture
    pub fn preview(kind: AnnotationKind, shape: LiveShape, style: AnnotationStyle) -> Self {
        Self {
            kind,
            shape,
            style,
            text: None,
            persistent: false,
            data: None,
        }
    }

    /// Weak back-reference to the canonical annotation
    pub fn annotation_id(&self) -> Option<AnnotationId> {
        self.data.as_ref().map(|record| record.id)
    }

    pub fn bounds(&self) -> Rect {
        self.shape.bounds()
    }

    /// Whether `point` (view space) touches this object
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> bool {
        let slack = tolerance + self.style.stroke_width / 2.0;
        match &self.shape {
            LiveShape::Arrow { start, end, .. } | LiveShape::Measurement { start, end, .. } => {
                point_near_segment(point, start, end, slack)
            }
            LiveShape::Path { points } => match points.as_slice() {
                [] => false,
                [only] => point.distance_to(only) <= slack,
                _ => points
                    .windows(2)
                    .any(|pair| point_near_segment(point, &pair[0], &pair[1], slack)),
            },
            LiveShape::Ellipse { cx, cy, rx, ry } => {
                let nx = (point.x - cx) / (rx + slack);
                let ny = (point.y - cy) / (ry + slack);
                nx * nx + ny * ny <= 1.0
            }
            LiveShape::Rect { .. } | LiveShape::Cloud { .. } => {
                self.bounds().contains(point, slack)
            }
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.shape.translate(dx, dy);
    }
}

/// Interactive graphics surface the bridge draws onto
///
/// Implementations map [`ObjectHandle`]s to their own native objects.
pub trait Surface {
    /// Whether the surface and its 2D context are available
    fn is_ready(&self) -> bool;

    /// Create or replace the object for `handle`
    fn draw(&mut self, handle: ObjectHandle, object: &LiveObject);

    fn erase(&mut self, handle: ObjectHandle);

    fn clear(&mut self);
}

#[derive(Debug, Default)]
struct HeadlessState {
    ready: bool,
    objects: BTreeMap<ObjectHandle, LiveObject>,
    draw_calls: usize,
}

/// In-memory surface for tests and headless replay
///
/// Clones share state, so a caller can keep one clone for inspection after
/// handing another to the engine.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                ready: true,
                ..Default::default()
            })),
        }
    }

    /// A surface whose context is not available yet
    pub fn unavailable() -> Self {
        let surface = Self::new();
        surface.set_ready(false);
        surface
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Drawn objects in z-order
    pub fn objects(&self) -> Vec<LiveObject> {
        self.state.borrow().objects.values().cloned().collect()
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<LiveObject> {
        self.state.borrow().objects.get(&handle).cloned()
    }

    /// Drawn object backing an annotation
    pub fn object_for(&self, id: AnnotationId) -> Option<LiveObject> {
        self.state
            .borrow()
            .objects
            .values()
            .find(|object| object.annotation_id() == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn draw_calls(&self) -> usize {
        self.state.borrow().draw_calls
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for HeadlessSurface {
    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    fn draw(&mut self, handle: ObjectHandle, object: &LiveObject) {
        let mut state = self.state.borrow_mut();
        state.draw_calls += 1;
        state.objects.insert(handle, object.clone());
    }

    fn erase(&mut self, handle: ObjectHandle) {
        self.state.borrow_mut().objects.remove(&handle);
    }

    fn clear(&mut self) {
        self.state.borrow_mut().objects.clear();
    }
}
