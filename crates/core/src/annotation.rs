//! Canonical annotation data model
//!
//! Every geometric and font field on an [`Annotation`] is stored in document
//! space: page coordinates at intrinsic scale 1.0, origin at the top-left of the
//! page. View-space values are derived by the render bridge and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation
///
/// Stable for the lifetime of the document session.
pub type AnnotationId = uuid::Uuid;

/// A 2D point
///
/// Used for both document-space and view-space coordinates; the owning
/// component decides which space a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn scaled(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Width and height pair
///
/// For `arrow` and `measurement` annotations this is the start→end vector and
/// may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, factor: f64) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }
}

/// Axis-aligned rectangle with a top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two opposite corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Bounding rectangle of a point set, or `None` when empty
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for point in points.iter().skip(1) {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }
        Some(Rect::from_corners(min, max))
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: &Point, tolerance: f64) -> bool {
        point.x >= self.x - tolerance
            && point.x <= self.right() + tolerance
            && point.y >= self.y - tolerance
            && point.y <= self.bottom() + tolerance
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Overlap of two rectangles; zero-sized when they do not intersect
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0))
    }
}

/// Check whether `point` lies within `tolerance` of the segment `start`→`end`
pub fn point_near_segment(point: &Point, start: &Point, end: &Point, tolerance: f64) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-9 {
        return point.distance_to(start) <= tolerance;
    }

    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = Point::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// RGBA color, serialized as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(value: &str) -> Result<Self, ColorParseError> {
        let hex = value
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError(value.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| ColorParseError(value.to_string()))
        };

        match hex.len() {
            3 => {
                let short = |i: usize| channel(i..i + 1).map(|v| v * 17);
                Ok(Color::rgb(short(0)?, short(1)?, short(2)?))
            }
            6 => Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Color::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(ColorParseError(value.to_string())),
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const PLACEHOLDER_GRAY: Color = Color { r: 156, g: 163, b: 175, a: 255 };
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

/// A color string that is not valid hex
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid color: {0:?}")]
pub struct ColorParseError(pub String);

/// Annotation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Rectangle,
    Circle,
    Arrow,
    Text,
    Freehand,
    Stamp,
    Callout,
    Cloud,
    Measurement,
}

impl AnnotationKind {
    /// Types whose `size` is a start→end vector rather than a bounding box
    pub fn is_vector(self) -> bool {
        matches!(self, AnnotationKind::Arrow | AnnotationKind::Measurement)
    }

    /// Types that carry text content and font fields
    pub fn is_text_bearing(self) -> bool {
        matches!(
            self,
            AnnotationKind::Text | AnnotationKind::Callout | AnnotationKind::Stamp
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Visual styling shared by all annotation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationStyle {
    /// Fill color for closed shapes (None for no fill)
    pub fill_color: Option<Color>,

    /// Stroke color for lines and outlines
    pub stroke_color: Color,

    /// Stroke width in document units
    pub stroke_width: f64,

    /// Opacity (0.0 = transparent, 1.0 = opaque)
    pub opacity: f64,
}

impl AnnotationStyle {
    /// Red 2pt stroke, no fill
    pub fn red_markup() -> Self {
        Self {
            fill_color: None,
            stroke_color: Color::RED,
            stroke_width: 2.0,
            opacity: 1.0,
        }
    }

    /// Copy with opacity clamped into `[0, 1]`
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = clamp_opacity(opacity);
        self
    }
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self::red_markup()
    }
}

pub(crate) fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// Text and font fields for text-bearing annotations
///
/// `font_size` is the size at document scale 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    pub font_size: f64,
    pub font_weight: FontWeight,
    pub font_family: String,

    /// Authored text color; placeholders render gray regardless
    pub color: Color,

    /// True while `text` is the placeholder string rather than authored content
    #[serde(default)]
    pub placeholder: bool,
}

impl TextContent {
    pub fn authored(text: impl Into<String>, font_size: f64, color: Color) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_weight: FontWeight::Normal,
            font_family: "Helvetica".to_string(),
            color,
            placeholder: false,
        }
    }

    pub fn placeholder(text: impl Into<String>, font_size: f64, color: Color) -> Self {
        Self {
            placeholder: true,
            ..Self::authored(text, font_size, color)
        }
    }
}

/// A comment attached to an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Canonical annotation record, always in document space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,

    #[serde(rename = "type")]
    pub kind: AnnotationKind,

    /// 1-based page number
    pub page_number: u32,

    pub position: Point,
    pub size: Size,
    pub style: AnnotationStyle,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,

    /// Stroke path for freehand annotations, absolute document coordinates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Point>,

    #[serde(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Annotation {
    /// Create a new annotation with a generated id
    pub fn new(
        kind: AnnotationKind,
        page_number: u32,
        position: Point,
        size: Size,
        style: AnnotationStyle,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AnnotationId::new_v4(),
            kind,
            page_number: page_number.max(1),
            position,
            size,
            style: AnnotationStyle {
                opacity: clamp_opacity(style.opacity),
                ..style
            },
            text: None,
            path: Vec::new(),
            author: None,
            created_at: now,
            modified_at: now,
            comments: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: TextContent) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_path(mut self, path: Vec<Point>) -> Self {
        self.path = path;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// End point for vector types (`position + size`)
    pub fn end_point(&self) -> Point {
        self.position.offset(self.size.width, self.size.height)
    }

    /// Bounding box in document space
    pub fn bounds(&self) -> Rect {
        if self.kind == AnnotationKind::Freehand {
            if let Some(bounds) = Rect::enclosing(&self.path) {
                return bounds;
            }
        }
        if self.kind.is_vector() {
            return Rect::from_corners(self.position, self.end_point());
        }
        Rect::new(
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        )
    }

    /// Move by a document-space delta, including any stroke path
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.position = self.position.offset(dx, dy);
        for point in &mut self.path {
            *point = point.offset(dx, dy);
        }
    }

    /// Clone with a fresh identity and timestamps; comments stay with the original
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        Self {
            id: AnnotationId::new_v4(),
            created_at: now,
            modified_at: now,
            comments: Vec::new(),
            ..self.clone()
        }
    }

    /// Update the modified timestamp to now
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Partial update applied through `AnnotationStore::update`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub position: Option<Point>,
    pub size: Option<Size>,
    pub style: Option<AnnotationStyle>,
    pub text: Option<TextContent>,
    pub path: Option<Vec<Point>>,
    pub comments: Option<Vec<Comment>>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.size.is_none()
            && self.style.is_none()
            && self.text.is_none()
            && self.path.is_none()
            && self.comments.is_none()
    }

    /// Whether applying this patch would leave `annotation` unchanged
    pub fn is_noop_for(&self, annotation: &Annotation) -> bool {
        self.position.map_or(true, |p| p == annotation.position)
            && self.size.map_or(true, |s| s == annotation.size)
            && self.style.as_ref().map_or(true, |s| *s == annotation.style)
            && self
                .text
                .as_ref()
                .map_or(true, |t| Some(t) == annotation.text.as_ref())
            && self.path.as_ref().map_or(true, |p| *p == annotation.path)
            && self
                .comments
                .as_ref()
                .map_or(true, |c| *c == annotation.comments)
    }

    /// Apply the set fields and bump `modified_at`
    pub fn apply_to(&self, annotation: &mut Annotation) {
        if let Some(position) = self.position {
            annotation.position = position;
        }
        if let Some(size) = self.size {
            annotation.size = size;
        }
        if let Some(style) = &self.style {
            annotation.style = style.clone().with_opacity(style.opacity);
        }
        if let Some(text) = &self.text {
            annotation.text = Some(text.clone());
        }
        if let Some(path) = &self.path {
            annotation.path = path.clone();
        }
        if let Some(comments) = &self.comments {
            annotation.comments = comments.clone();
        }
        annotation.touch();
    }
}
