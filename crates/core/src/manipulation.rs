//! Move and resize handles for live objects
//!
//! Handles are computed in view space from a live object's shape. Dragging a
//! handle reshapes the object relative to its geometry at drag start, so the
//! result never accumulates per-move error.

use crate::annotation::{AnnotationKind, Point, Rect};
use crate::surface::{ArrowHead, LiveObject, LiveShape};

/// Type of manipulation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    /// Corner handles
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,

    /// Edge handles for resizing in one dimension
    Top,
    Bottom,
    Left,
    Right,

    /// Line endpoints of arrows and measurements
    Start,
    End,
}

/// Manipulation handle with position and type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    pub handle_type: HandleType,

    /// Position in view coordinates
    pub position: Point,

    /// Radius of the hit area in view pixels
    pub size: f64,
}

impl ManipulationHandle {
    pub fn new(handle_type: HandleType, position: Point, size: f64) -> Self {
        Self {
            handle_type,
            position,
            size,
        }
    }

    /// Check if a point hits this handle
    pub fn hit_test(&self, point: &Point, tolerance: f64) -> bool {
        point.distance_to(&self.position) <= self.size + tolerance
    }
}

fn box_handles(bounds: Rect, size: f64) -> Vec<ManipulationHandle> {
    let center = bounds.center();
    vec![
        ManipulationHandle::new(HandleType::TopLeft, Point::new(bounds.x, bounds.y), size),
        ManipulationHandle::new(HandleType::TopRight, Point::new(bounds.right(), bounds.y), size),
        ManipulationHandle::new(
            HandleType::BottomLeft,
            Point::new(bounds.x, bounds.bottom()),
            size,
        ),
        ManipulationHandle::new(
            HandleType::BottomRight,
            Point::new(bounds.right(), bounds.bottom()),
            size,
        ),
        ManipulationHandle::new(HandleType::Top, Point::new(center.x, bounds.y), size),
        ManipulationHandle::new(HandleType::Bottom, Point::new(center.x, bounds.bottom()), size),
        ManipulationHandle::new(HandleType::Left, Point::new(bounds.x, center.y), size),
        ManipulationHandle::new(HandleType::Right, Point::new(bounds.right(), center.y), size),
    ]
}

/// Generate resize handles for a live object
///
/// Text boxes and freehand strokes can only be moved and have no handles.
pub fn generate_handles(object: &LiveObject, handle_size: f64) -> Vec<ManipulationHandle> {
    if !object.persistent || object.kind == AnnotationKind::Text {
        return Vec::new();
    }

    match &object.shape {
        LiveShape::Rect { .. } | LiveShape::Cloud { .. } => {
            box_handles(object.bounds(), handle_size)
        }
        LiveShape::Ellipse { cx, cy, rx, ry } => vec![
            ManipulationHandle::new(HandleType::Top, Point::new(*cx, cy - ry), handle_size),
            ManipulationHandle::new(HandleType::Bottom, Point::new(*cx, cy + ry), handle_size),
            ManipulationHandle::new(HandleType::Left, Point::new(cx - rx, *cy), handle_size),
            ManipulationHandle::new(HandleType::Right, Point::new(cx + rx, *cy), handle_size),
        ],
        LiveShape::Arrow { start, end, .. } | LiveShape::Measurement { start, end, .. } => vec![
            ManipulationHandle::new(HandleType::Start, *start, handle_size),
            ManipulationHandle::new(HandleType::End, *end, handle_size),
        ],
        LiveShape::Path { .. } => Vec::new(),
    }
}

/// Handle of `object` under `point`, if any
pub fn hit_handle(
    object: &LiveObject,
    point: &Point,
    handle_size: f64,
    tolerance: f64,
) -> Option<HandleType> {
    generate_handles(object, handle_size)
        .into_iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.handle_type)
}

/// Active resize gesture
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationState {
    /// Type of handle being dragged
    pub handle_type: HandleType,

    /// Shape before the resize started
    pub original_shape: LiveShape,

    /// Drag start position in view coordinates
    pub drag_start: Point,

    /// Current drag position in view coordinates
    pub current_position: Point,

    /// Arrowhead size used when rebuilding arrow heads
    pub arrow_head_size: f64,
}

impl ManipulationState {
    pub fn new(
        handle_type: HandleType,
        original_shape: LiveShape,
        drag_start: Point,
        arrow_head_size: f64,
    ) -> Self {
        Self {
            handle_type,
            original_shape,
            drag_start,
            current_position: drag_start,
            arrow_head_size,
        }
    }

    pub fn update_position(&mut self, position: Point) {
        self.current_position = position;
    }

    /// Shape after applying the drag so far
    pub fn calculate_new_shape(&self) -> LiveShape {
        let dx = self.current_position.x - self.drag_start.x;
        let dy = self.current_position.y - self.drag_start.y;

        match &self.original_shape {
            LiveShape::Rect { .. } => {
                let bounds = self.resized_box(dx, dy);
                LiveShape::Rect {
                    left: bounds.x,
                    top: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                }
            }
            LiveShape::Cloud { bumps, .. } => {
                let bounds = self.resized_box(dx, dy);
                LiveShape::Cloud {
                    left: bounds.x,
                    top: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                    bumps: *bumps,
                }
            }
            LiveShape::Ellipse { cx, cy, rx, ry } => {
                let (rx, ry) = match self.handle_type {
                    HandleType::Top => (*rx, (ry - dy).abs()),
                    HandleType::Bottom => (*rx, (ry + dy).abs()),
                    HandleType::Left => ((rx - dx).abs(), *ry),
                    HandleType::Right => ((rx + dx).abs(), *ry),
                    _ => (*rx, *ry),
                };
                LiveShape::Ellipse {
                    cx: *cx,
                    cy: *cy,
                    rx,
                    ry,
                }
            }
            LiveShape::Arrow { start, end, .. } => {
                let (start, end) = self.moved_endpoints(*start, *end, dx, dy);
                LiveShape::Arrow {
                    start,
                    end,
                    head: ArrowHead::for_line(start, end, self.arrow_head_size),
                }
            }
            LiveShape::Measurement { start, end, label } => {
                let (start, end) = self.moved_endpoints(*start, *end, dx, dy);
                LiveShape::Measurement {
                    start,
                    end,
                    label: label.clone(),
                }
            }
            LiveShape::Path { .. } => self.original_shape.clone(),
        }
    }

    fn resized_box(&self, dx: f64, dy: f64) -> Rect {
        let bounds = self.original_shape.bounds();
        let (mut left, mut top) = (bounds.x, bounds.y);
        let (mut right, mut bottom) = (bounds.right(), bounds.bottom());

        match self.handle_type {
            HandleType::TopLeft => {
                left += dx;
                top += dy;
            }
            HandleType::TopRight => {
                right += dx;
                top += dy;
            }
            HandleType::BottomLeft => {
                left += dx;
                bottom += dy;
            }
            HandleType::BottomRight => {
                right += dx;
                bottom += dy;
            }
            HandleType::Top => top += dy,
            HandleType::Bottom => bottom += dy,
            HandleType::Left => left += dx,
            HandleType::Right => right += dx,
            HandleType::Start | HandleType::End => {}
        }

        Rect::from_corners(Point::new(left, top), Point::new(right, bottom))
    }

    fn moved_endpoints(&self, start: Point, end: Point, dx: f64, dy: f64) -> (Point, Point) {
        match self.handle_type {
            HandleType::Start => (start.offset(dx, dy), end),
            HandleType::End => (start, end.offset(dx, dy)),
            _ => (start, end),
        }
    }
}
