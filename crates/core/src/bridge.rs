//! Render bridge
//!
//! Keeps live surface objects and canonical annotations consistent. The bridge
//! is the only owner of the mapping between annotation ids and
//! [`ObjectHandle`]s. View-space geometry is always projected from the stored
//! document-space fields; it is never rescaled from a live object's current
//! geometry.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, Color, Point, Rect, Size,
    TextContent,
};
use crate::config::EngineConfig;
use crate::error::{MarkupError, MarkupResult};
use crate::history::Snapshot;
use crate::store::AnnotationStore;
use crate::surface::{ArrowHead, LiveObject, LiveShape, LiveText, ObjectHandle, Surface};

/// Conversion from page units to a real-world length for measurement labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementScale {
    /// Document units per real-world unit
    pub ratio: f64,
    pub unit: String,
    /// Decimal places shown in labels
    pub precision: usize,
}

impl MeasurementScale {
    pub fn new(ratio: f64, unit: impl Into<String>) -> Self {
        Self {
            ratio,
            unit: unit.into(),
            precision: 2,
        }
    }

    pub fn to_real_world(&self, document_length: f64) -> f64 {
        document_length / self.ratio
    }

    pub fn label(&self, document_length: f64) -> String {
        format!(
            "{:.*} {}",
            self.precision,
            self.to_real_world(document_length),
            self.unit
        )
    }
}

impl Default for MeasurementScale {
    /// 72 points per inch
    fn default() -> Self {
        Self::new(72.0, "in")
    }
}

/// Settings the bridge needs to build live objects
#[derive(Debug, Clone)]
pub struct ProjectionParams {
    pub placeholder_color: Color,
    pub arrow_head_size: f64,
    pub hit_tolerance: f64,
    pub measurement: MeasurementScale,
}

impl From<&EngineConfig> for ProjectionParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            placeholder_color: config.placeholder_color,
            arrow_head_size: config.arrow_head_size,
            hit_tolerance: config.hit_tolerance,
            measurement: config.measurement.clone(),
        }
    }
}

/// Scallop count for a cloud of the given document size
pub fn cloud_bumps(size: Size) -> u32 {
    let perimeter = 2.0 * (size.width.abs() + size.height.abs());
    ((perimeter / 40.0).round() as u32).max(4)
}

/// Project a canonical annotation into view space at `scale`
pub fn project(annotation: &Annotation, scale: f64, params: &ProjectionParams) -> LiveObject {
    let origin = annotation.position.scaled(scale);
    let size = annotation.size.scaled(scale);

    let shape = match annotation.kind {
        AnnotationKind::Rectangle
        | AnnotationKind::Text
        | AnnotationKind::Stamp
        | AnnotationKind::Callout => LiveShape::Rect {
            left: origin.x,
            top: origin.y,
            width: size.width,
            height: size.height,
        },
        AnnotationKind::Circle => LiveShape::Ellipse {
            cx: origin.x + size.width / 2.0,
            cy: origin.y + size.height / 2.0,
            rx: size.width / 2.0,
            ry: size.height / 2.0,
        },
        AnnotationKind::Cloud => LiveShape::Cloud {
            left: origin.x,
            top: origin.y,
            width: size.width,
            height: size.height,
            bumps: cloud_bumps(annotation.size),
        },
        AnnotationKind::Arrow => {
            let end = annotation.end_point().scaled(scale);
            LiveShape::Arrow {
                start: origin,
                end,
                head: ArrowHead::for_line(origin, end, params.arrow_head_size),
            }
        }
        AnnotationKind::Measurement => {
            let length = annotation.position.distance_to(&annotation.end_point());
            LiveShape::Measurement {
                start: origin,
                end: annotation.end_point().scaled(scale),
                label: params.measurement.label(length),
            }
        }
        AnnotationKind::Freehand => {
            let points = if annotation.path.is_empty() {
                vec![origin, annotation.end_point().scaled(scale)]
            } else {
                annotation.path.iter().map(|p| p.scaled(scale)).collect()
            };
            LiveShape::Path { points }
        }
    };

    let text = annotation
        .text
        .as_ref()
        .map(|content| live_text(content, scale, params.placeholder_color));

    LiveObject {
        kind: annotation.kind,
        shape,
        style: annotation.style.clone(),
        text,
        persistent: true,
        data: Some(annotation.clone()),
    }
}

/// View-space text for `content` at `scale`
pub fn live_text(content: &TextContent, scale: f64, placeholder_color: Color) -> LiveText {
    LiveText {
        text: content.text.clone(),
        font_size: content.font_size * scale,
        font_weight: content.font_weight,
        font_family: content.font_family.clone(),
        color: content.color,
        fill: if content.placeholder {
            placeholder_color
        } else {
            content.color
        },
        placeholder: content.placeholder,
    }
}

/// Document-space geometry of a live object: `(position, size, path)`
fn document_geometry(object: &LiveObject, scale: f64) -> (Point, Size, Vec<Point>) {
    let to_doc = |p: &Point| p.scaled(1.0 / scale);
    match &object.shape {
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
        } => (
            to_doc(&Point::new(*left, *top)),
            Size::new(width / scale, height / scale),
            Vec::new(),
        ),
        LiveShape::Ellipse { cx, cy, rx, ry } => (
            to_doc(&Point::new(cx - rx, cy - ry)),
            Size::new(rx * 2.0 / scale, ry * 2.0 / scale),
            Vec::new(),
        ),
        LiveShape::Arrow { start, end, .. } | LiveShape::Measurement { start, end, .. } => (
            to_doc(start),
            Size::new((end.x - start.x) / scale, (end.y - start.y) / scale),
            Vec::new(),
        ),
        LiveShape::Path { points } => {
            let path: Vec<Point> = points.iter().map(to_doc).collect();
            let bounds = Rect::enclosing(&path).unwrap_or_default();
            (
                Point::new(bounds.x, bounds.y),
                Size::new(bounds.width, bounds.height),
                path,
            )
        }
    }
}

fn document_text(text: &LiveText, scale: f64) -> TextContent {
    TextContent {
        text: text.text.clone(),
        font_size: text.font_size / scale,
        font_weight: text.font_weight,
        font_family: text.font_family.clone(),
        color: text.color,
        placeholder: text.placeholder,
    }
}

/// Re-derive document-space fields from a live object's view-space state
pub fn derive_patch(object: &LiveObject, scale: f64) -> AnnotationPatch {
    let (position, size, path) = document_geometry(object, scale);
    AnnotationPatch {
        position: Some(position),
        size: Some(size),
        style: Some(object.style.clone()),
        text: object.text.as_ref().map(|text| document_text(text, scale)),
        path: (object.kind == AnnotationKind::Freehand).then_some(path),
        comments: None,
    }
}

fn close(derived: f64, stored: f64) -> bool {
    (derived - stored).abs() <= 1e-9 * stored.abs().max(1.0)
}

/// Keep stored values where the derived ones differ only by rounding
fn settle(patch: &mut AnnotationPatch, record: &Annotation) {
    if let Some(position) = patch.position.as_mut() {
        if close(position.x, record.position.x) && close(position.y, record.position.y) {
            *position = record.position;
        }
    }
    if let Some(size) = patch.size.as_mut() {
        if close(size.width, record.size.width) && close(size.height, record.size.height) {
            *size = record.size;
        }
    }
    if let (Some(text), Some(stored)) = (patch.text.as_mut(), record.text.as_ref()) {
        if close(text.font_size, stored.font_size) {
            text.font_size = stored.font_size;
        }
    }
    if let Some(path) = patch.path.as_mut() {
        let same = path.len() == record.path.len()
            && path
                .iter()
                .zip(&record.path)
                .all(|(a, b)| close(a.x, b.x) && close(a.y, b.y));
        if same {
            path.clone_from(&record.path);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Deferred {
    Load { page: u32, scale: f64 },
    Rescale { scale: f64 },
}

/// Serialized surface state; the body of a history [`Snapshot`]
#[derive(Debug, Serialize, Deserialize)]
struct SurfaceImage {
    page: u32,
    objects: Vec<LiveObject>,
}

/// Store mutations performed while restoring a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub added: Vec<AnnotationId>,
    pub updated: Vec<AnnotationId>,
    pub removed: Vec<AnnotationId>,
}

impl RestoreReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Synchronizes the annotation store with live objects on a [`Surface`]
pub struct RenderBridge {
    surface: Box<dyn Surface>,
    params: ProjectionParams,

    /// Live objects in z-order
    objects: BTreeMap<ObjectHandle, LiveObject>,
    handles: HashMap<AnnotationId, ObjectHandle>,
    next_handle: u64,

    page: u32,
    scale: f64,
    deferred: Option<Deferred>,
}

impl RenderBridge {
    pub fn new(surface: Box<dyn Surface>, params: ProjectionParams) -> Self {
        Self {
            surface,
            params,
            objects: BTreeMap::new(),
            handles: HashMap::new(),
            next_handle: 1,
            page: 1,
            scale: 1.0,
            deferred: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.surface.is_ready()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    /// Whether an operation is waiting for the surface
    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&LiveObject> {
        self.objects.get(&handle)
    }

    pub fn handle_of(&self, id: AnnotationId) -> Option<ObjectHandle> {
        self.handles.get(&id).copied()
    }

    /// Live objects in z-order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectHandle, &LiveObject)> {
        self.objects.iter().map(|(handle, object)| (*handle, object))
    }

    /// Replace every live object with the annotations of `page` at `scale`
    ///
    /// When the surface is unavailable the load is deferred and
    /// [`MarkupError::SurfaceNotReady`] is returned.
    pub fn load_page(
        &mut self,
        store: &AnnotationStore,
        page: u32,
        scale: f64,
    ) -> MarkupResult<usize> {
        self.page = page;
        self.scale = scale;
        if !self.surface.is_ready() {
            return self.defer(Deferred::Load { page, scale });
        }
        self.deferred = None;

        self.clear();
        let annotations = store.get(page);
        for annotation in &annotations {
            self.place(annotation);
        }
        tracing::info!(page, scale, count = annotations.len(), "page annotations loaded");
        Ok(annotations.len())
    }

    /// Re-project every live object at a new render scale
    ///
    /// Persistent objects are rebuilt from their stored document-space
    /// fields; previews have no canonical record and are scaled in place.
    pub fn rescale(&mut self, store: &AnnotationStore, scale: f64) -> MarkupResult<()> {
        let old = self.scale;
        self.scale = scale;
        if !self.surface.is_ready() {
            let pending = match self.deferred {
                Some(Deferred::Load { page, .. }) => Deferred::Load { page, scale },
                _ => Deferred::Rescale { scale },
            };
            return self.defer(pending);
        }

        let handles: Vec<ObjectHandle> = self.objects.keys().copied().collect();
        for handle in handles {
            let Some(object) = self.objects.get(&handle) else {
                continue;
            };
            let rebuilt = match object.annotation_id().and_then(|id| store.find(id)) {
                Some(record) => project(record, scale, &self.params),
                None => rescale_preview(object, old, scale, &self.params),
            };
            self.surface.draw(handle, &rebuilt);
            self.objects.insert(handle, rebuilt);
        }
        tracing::debug!(old, new = scale, objects = self.objects.len(), "live objects rescaled");
        Ok(())
    }

    /// Create (or replace) the live object for a canonical annotation
    pub fn materialize(&mut self, annotation: &Annotation) -> MarkupResult<ObjectHandle> {
        self.ensure_ready()?;
        Ok(self.place(annotation))
    }

    /// Re-project one annotation from the store, e.g. after a non-geometric update
    pub fn refresh(&mut self, id: AnnotationId, store: &AnnotationStore) -> MarkupResult<()> {
        self.ensure_ready()?;
        let record = store.find(id).ok_or(MarkupError::AnnotationNotFound(id))?;
        if record.page_number == self.page {
            self.place(record);
        }
        Ok(())
    }

    /// Add a non-persistent preview object
    pub fn begin_preview(&mut self, object: LiveObject) -> MarkupResult<ObjectHandle> {
        self.ensure_ready()?;
        let handle = self.allocate();
        self.surface.draw(handle, &object);
        self.objects.insert(handle, object);
        Ok(handle)
    }

    /// Mutate a live object in view space and redraw it
    pub fn update_live<F>(&mut self, handle: ObjectHandle, edit: F) -> MarkupResult<()>
    where
        F: FnOnce(&mut LiveObject),
    {
        self.ensure_ready()?;
        if let Some(object) = self.objects.get_mut(&handle) {
            edit(object);
            self.surface.draw(handle, object);
        }
        Ok(())
    }

    /// Remove a live object without touching the store
    pub fn discard(&mut self, handle: ObjectHandle) -> Option<LiveObject> {
        let object = self.objects.remove(&handle)?;
        if let Some(id) = object.annotation_id() {
            self.handles.remove(&id);
        }
        self.surface.erase(handle);
        Some(object)
    }

    /// Turn a preview into a canonical annotation and add it to the store
    pub fn commit_preview(
        &mut self,
        handle: ObjectHandle,
        store: &mut AnnotationStore,
        author: Option<&str>,
    ) -> MarkupResult<AnnotationId> {
        self.ensure_ready()?;
        let Some(object) = self.objects.get(&handle) else {
            return Err(MarkupError::AnnotationNotFound(AnnotationId::nil()));
        };

        let (position, size, path) = document_geometry(object, self.scale);
        let mut annotation =
            Annotation::new(object.kind, self.page, position, size, object.style.clone())
                .with_path(path)
                .with_author(author.map(str::to_string));
        annotation.text = object
            .text
            .as_ref()
            .map(|text| document_text(text, self.scale));

        let id = store.add(annotation.clone());
        self.handles.insert(id, handle);
        let rebuilt = project(&annotation, self.scale, &self.params);
        self.surface.draw(handle, &rebuilt);
        self.objects.insert(handle, rebuilt);

        tracing::debug!(%id, kind = ?annotation.kind, page = self.page, "preview committed");
        Ok(id)
    }

    /// Push a live edit (move, resize, restyle, text) back into the store
    ///
    /// Returns `false` when the derived document-space fields are unchanged.
    pub fn sync_live_edit(
        &mut self,
        handle: ObjectHandle,
        store: &mut AnnotationStore,
    ) -> MarkupResult<bool> {
        self.ensure_ready()?;
        let Some(object) = self.objects.get(&handle) else {
            return Ok(false);
        };
        let Some(id) = object.annotation_id() else {
            return Ok(false);
        };

        let mut patch = derive_patch(object, self.scale);
        let record = store.find(id).ok_or(MarkupError::AnnotationNotFound(id))?;
        settle(&mut patch, record);
        let unchanged = patch.is_noop_for(record);
        if unchanged {
            self.refresh(id, store)?;
            return Ok(false);
        }

        store.update(id, &patch)?;
        self.refresh(id, store)?;
        Ok(true)
    }

    /// Delete an annotation from the store and its live object from the surface
    pub fn remove_annotation(
        &mut self,
        id: AnnotationId,
        store: &mut AnnotationStore,
    ) -> MarkupResult<Annotation> {
        let removed = store.remove(id)?;
        if let Some(handle) = self.handles.remove(&id) {
            self.objects.remove(&handle);
            self.surface.erase(handle);
        }
        Ok(removed)
    }

    /// Topmost persistent object under `point` (view space)
    pub fn hit_test(&self, point: &Point) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .rev()
            .find(|(_, object)| {
                object.persistent && object.hit_test(point, self.params.hit_tolerance)
            })
            .map(|(handle, _)| *handle)
    }

    /// Serialize every persistent live object on the current page
    pub fn capture(&self) -> MarkupResult<Snapshot> {
        let image = SurfaceImage {
            page: self.page,
            objects: self
                .objects
                .values()
                .filter(|object| object.persistent)
                .cloned()
                .collect(),
        };
        serde_json::to_string(&image)
            .map(Snapshot::new)
            .map_err(|error| MarkupError::CorruptSnapshot(error.to_string()))
    }

    /// Restore a captured surface and reconcile the store with it
    ///
    /// Objects are redrawn from the restored records at the current scale.
    pub fn restore(
        &mut self,
        snapshot: &Snapshot,
        store: &mut AnnotationStore,
    ) -> MarkupResult<RestoreReport> {
        self.ensure_ready()?;
        let image: SurfaceImage = serde_json::from_str(snapshot.as_str())
            .map_err(|error| MarkupError::CorruptSnapshot(error.to_string()))?;

        let mut report = RestoreReport::default();
        let restored: HashSet<AnnotationId> = image
            .objects
            .iter()
            .filter_map(LiveObject::annotation_id)
            .collect();

        let stale: Vec<AnnotationId> = store
            .get(image.page)
            .iter()
            .map(|record| record.id)
            .filter(|id| !restored.contains(id))
            .collect();
        for id in stale {
            store.remove(id)?;
            report.removed.push(id);
        }

        for record in image.objects.into_iter().filter_map(|object| object.data) {
            match store.find(record.id) {
                Some(existing) if *existing == record => {}
                Some(_) => {
                    report.updated.push(record.id);
                    store.replace(record)?;
                }
                None => {
                    report.added.push(record.id);
                    store.add(record);
                }
            }
        }

        self.load_page(store, image.page, self.scale)?;
        tracing::debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            "surface snapshot restored"
        );
        Ok(report)
    }

    /// Remove every live object from the surface
    pub fn clear(&mut self) {
        self.objects.clear();
        self.handles.clear();
        self.surface.clear();
    }

    /// Drop every live object and pending surface work and move to `page`
    ///
    /// Nothing is drawn until the next [`load_page`](Self::load_page).
    pub fn switch_page(&mut self, page: u32) {
        self.clear();
        self.deferred = None;
        self.page = page;
    }

    /// Run an operation deferred while the surface was unavailable
    ///
    /// Returns `Ok(true)` when a deferred operation ran.
    pub fn flush_deferred(&mut self, store: &AnnotationStore) -> MarkupResult<bool> {
        let Some(pending) = self.deferred else {
            return Ok(false);
        };
        if !self.surface.is_ready() {
            return Err(MarkupError::SurfaceNotReady);
        }
        self.deferred = None;
        match pending {
            Deferred::Load { page, scale } => {
                self.load_page(store, page, scale)?;
            }
            Deferred::Rescale { scale } => self.rescale(store, scale)?,
        }
        Ok(true)
    }

    fn ensure_ready(&self) -> MarkupResult<()> {
        if self.surface.is_ready() {
            Ok(())
        } else {
            Err(MarkupError::SurfaceNotReady)
        }
    }

    fn defer<T>(&mut self, pending: Deferred) -> MarkupResult<T> {
        tracing::warn!(?pending, "surface not ready; deferring");
        self.deferred = Some(pending);
        Err(MarkupError::SurfaceNotReady)
    }

    fn allocate(&mut self) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn place(&mut self, annotation: &Annotation) -> ObjectHandle {
        let handle = match self.handles.get(&annotation.id) {
            Some(handle) => *handle,
            None => {
                let handle = self.allocate();
                self.handles.insert(annotation.id, handle);
                handle
            }
        };
        let object = project(annotation, self.scale, &self.params);
        self.surface.draw(handle, &object);
        self.objects.insert(handle, object);
        handle
    }
}

fn rescale_preview(
    object: &LiveObject,
    old: f64,
    new: f64,
    params: &ProjectionParams,
) -> LiveObject {
    let ratio = new / old;
    let mut scaled = object.clone();
    scaled.shape = match &object.shape {
        LiveShape::Rect {
            left,
            top,
            width,
            height,
        } => LiveShape::Rect {
            left: left * ratio,
            top: top * ratio,
            width: width * ratio,
            height: height * ratio,
        },
        LiveShape::Cloud {
            left,
            top,
            width,
            height,
            bumps,
        } => LiveShape::Cloud {
            left: left * ratio,
            top: top * ratio,
            width: width * ratio,
            height: height * ratio,
            bumps: *bumps,
        },
        LiveShape::Ellipse { cx, cy, rx, ry } => LiveShape::Ellipse {
            cx: cx * ratio,
            cy: cy * ratio,
            rx: rx * ratio,
            ry: ry * ratio,
        },
        LiveShape::Arrow { start, end, .. } => {
            let (start, end) = (start.scaled(ratio), end.scaled(ratio));
            LiveShape::Arrow {
                start,
                end,
                head: ArrowHead::for_line(start, end, params.arrow_head_size),
            }
        }
        LiveShape::Measurement { start, end, label } => LiveShape::Measurement {
            start: start.scaled(ratio),
            end: end.scaled(ratio),
            label: label.clone(),
        },
        LiveShape::Path { points } => LiveShape::Path {
            points: points.iter().map(|p| p.scaled(ratio)).collect(),
        },
    };
    if let Some(text) = scaled.text.as_mut() {
        text.font_size *= ratio;
    }
    scaled
}
