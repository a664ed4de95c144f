//! Document space / view space transform
//!
//! Document space is the page at intrinsic scale 1.0 with a top-left origin.
//! View space is the rendered page: `render_scale = fit_scale * user_zoom`,
//! where `fit_scale` shrinks (never enlarges) the page into its container.

use crate::annotation::{Point, Rect, Size};
use crate::config::EngineConfig;

/// Outcome of an operation that may change the render scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleChange {
    Changed { old: f64, new: f64 },
    Unchanged,
    /// The container has no size yet; the change is applied once it does
    Deferred,
}

impl ScaleChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, ScaleChange::Changed { .. })
    }
}

/// Scale that fits `intrinsic` inside `container`, capped at 1.0
///
/// Returns `None` when either size is not positive.
pub fn fit_scale(container: Size, intrinsic: Size) -> Option<f64> {
    let usable = |size: Size| {
        size.width.is_finite() && size.height.is_finite() && size.width > 0.0 && size.height > 0.0
    };
    if !usable(container) || !usable(intrinsic) {
        return None;
    }

    let width = container.width / intrinsic.width;
    let height = container.height / intrinsic.height;
    Some(width.min(height).min(1.0))
}

/// Current transform between document space and view space
#[derive(Debug, Clone)]
pub struct CoordinateSpace {
    intrinsic: Size,
    container: Option<Size>,
    user_zoom: f64,
    render_scale: f64,
    pending: bool,

    min_zoom: f64,
    max_zoom: f64,
    zoom_in_factor: f64,
    zoom_out_factor: f64,
    max_render_dimension: f64,
    fallback: Size,
}

impl CoordinateSpace {
    pub fn new(config: &EngineConfig) -> Self {
        let fallback = Size::new(config.fallback_page_width, config.fallback_page_height);
        Self {
            intrinsic: fallback,
            container: None,
            user_zoom: 1.0,
            render_scale: 1.0,
            pending: true,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_in_factor: config.zoom_in_factor,
            zoom_out_factor: config.zoom_out_factor,
            max_render_dimension: config.max_render_dimension,
            fallback,
        }
    }

    /// Record the page's native pixel dimensions reported by the rasterizer
    ///
    /// Unusable dimensions fall back to the configured default page size.
    pub fn set_page_dimensions(&mut self, width: f64, height: f64) -> ScaleChange {
        let usable = width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0;
        self.intrinsic = if usable {
            Size::new(width, height)
        } else {
            tracing::warn!(
                width,
                height,
                "unusable page dimensions; falling back to {}x{}",
                self.fallback.width,
                self.fallback.height
            );
            self.fallback
        };
        self.recompute()
    }

    /// Record the container's available size; non-positive sizes mean "not laid out"
    pub fn set_container(&mut self, width: f64, height: f64) -> ScaleChange {
        let laid_out = width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0;
        self.container = laid_out.then(|| Size::new(width, height));
        self.recompute()
    }

    pub fn set_zoom(&mut self, zoom: f64) -> ScaleChange {
        if !zoom.is_finite() {
            return ScaleChange::Unchanged;
        }
        self.user_zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.recompute()
    }

    pub fn zoom_in(&mut self) -> ScaleChange {
        self.set_zoom(self.user_zoom * self.zoom_in_factor)
    }

    pub fn zoom_out(&mut self) -> ScaleChange {
        self.set_zoom(self.user_zoom * self.zoom_out_factor)
    }

    pub fn reset_zoom(&mut self) -> ScaleChange {
        self.set_zoom(1.0)
    }

    /// Recompute the render scale from the current inputs
    pub fn recompute(&mut self) -> ScaleChange {
        let Some(fit) = self
            .container
            .and_then(|container| fit_scale(container, self.intrinsic))
        else {
            self.pending = true;
            return ScaleChange::Deferred;
        };

        let mut scale = fit * self.user_zoom;
        let largest = self.intrinsic.width.max(self.intrinsic.height);
        if largest * scale > self.max_render_dimension {
            let clamped = self.max_render_dimension / largest;
            tracing::debug!(requested = scale, clamped, "render scale clamped to memory bound");
            scale = clamped;
        }

        let was_pending = std::mem::replace(&mut self.pending, false);
        let old = self.render_scale;
        if !was_pending && (scale - old).abs() < f64::EPSILON {
            return ScaleChange::Unchanged;
        }
        self.render_scale = scale;
        ScaleChange::Changed { old, new: scale }
    }

    pub fn render_scale(&self) -> f64 {
        self.render_scale
    }

    pub fn user_zoom(&self) -> f64 {
        self.user_zoom
    }

    pub fn fit_scale(&self) -> Option<f64> {
        self.container
            .and_then(|container| fit_scale(container, self.intrinsic))
    }

    /// Whether a scale computation is waiting on container layout
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn intrinsic_size(&self) -> Size {
        self.intrinsic
    }

    pub fn container(&self) -> Option<Size> {
        self.container
    }

    /// Page size in view pixels at the current scale
    pub fn view_page_size(&self) -> Size {
        self.intrinsic.scaled(self.render_scale)
    }

    pub fn to_view_point(&self, point: Point) -> Point {
        point.scaled(self.render_scale)
    }

    pub fn to_document_point(&self, point: Point) -> Point {
        point.scaled(1.0 / self.render_scale)
    }

    pub fn to_view_length(&self, length: f64) -> f64 {
        length * self.render_scale
    }

    pub fn to_document_length(&self, length: f64) -> f64 {
        length / self.render_scale
    }

    pub fn to_view_rect(&self, rect: Rect) -> Rect {
        rect.scaled(self.render_scale)
    }

    pub fn to_document_rect(&self, rect: Rect) -> Rect {
        rect.scaled(1.0 / self.render_scale)
    }
}
