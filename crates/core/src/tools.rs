//! Tool dispatcher
//!
//! Routes pointer events to the handler for the active tool and owns the
//! lifecycle of in-progress gestures. Handlers return [`Action`]s for the host
//! instead of calling back into it.
//!
//! Existing objects are always movable: a pointer-down that hits a live object
//! starts a move (or a resize when a handle of the selection is hit) whatever
//! the active tool.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, AnnotationStyle, Color,
    FontWeight, Point, Rect, Size, TextContent,
};
use crate::bridge::{live_text, RenderBridge};
use crate::config::EngineConfig;
use crate::error::MarkupError;
use crate::history::HistoryManager;
use crate::manipulation::{hit_handle, ManipulationState};
use crate::store::AnnotationStore;
use crate::surface::{ArrowHead, LiveObject, LiveShape, ObjectHandle};
use crate::text_edit::{ExitOutcome, TextEditSession};

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Rectangle,
    Circle,
    Arrow,
    Freehand,
    Text,
    Stamp,
    Callout,
    Cloud,
    Measurement,
}

impl Tool {
    /// Annotation type produced by a drawing tool
    pub fn annotation_kind(self) -> Option<AnnotationKind> {
        match self {
            Tool::Select => None,
            Tool::Rectangle => Some(AnnotationKind::Rectangle),
            Tool::Circle => Some(AnnotationKind::Circle),
            Tool::Arrow => Some(AnnotationKind::Arrow),
            Tool::Freehand => Some(AnnotationKind::Freehand),
            Tool::Text => Some(AnnotationKind::Text),
            Tool::Stamp => Some(AnnotationKind::Stamp),
            Tool::Callout => Some(AnnotationKind::Callout),
            Tool::Cloud => Some(AnnotationKind::Cloud),
            Tool::Measurement => Some(AnnotationKind::Measurement),
        }
    }
}

/// Style applied to newly drawn annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolStyle {
    /// Stroke and text color
    pub color: Color,
    pub fill_color: Option<Color>,
    pub stroke_width: f64,
    pub opacity: f64,
    /// Font size in document units
    pub font_size: f64,
    pub font_weight: FontWeight,
}

impl ToolStyle {
    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            fill_color: self.fill_color,
            stroke_color: self.color,
            stroke_width: self.stroke_width,
            opacity: 1.0,
        }
        .with_opacity(self.opacity)
    }

    /// Authored text content in this style
    pub fn text(&self, text: impl Into<String>) -> TextContent {
        TextContent {
            font_weight: self.font_weight,
            ..TextContent::authored(text, self.font_size, self.color)
        }
    }
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self {
            color: Color::RED,
            fill_color: None,
            stroke_width: 2.0,
            opacity: 1.0,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
        }
    }
}

/// In-progress pointer gesture
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    /// A preview object follows the pointer
    Drawing {
        handle: ObjectHandle,
        tool: Tool,
        anchor: Point,
    },
    Moving {
        handle: ObjectHandle,
        last: Point,
        moved: bool,
    },
    Resizing {
        handle: ObjectHandle,
        state: ManipulationState,
    },
    /// Background drag with nothing hit
    Panning { last: Point },
}

/// Effect of an input event, for the host to act on
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RenderNeeded,
    Pan { dx: f64, dy: f64 },
    AnnotationCreated(AnnotationId),
    AnnotationUpdated(AnnotationId),
    AnnotationDeleted(AnnotationId),
    PreviewDiscarded,
    SelectionChanged(Option<AnnotationId>),
    TextEditStarted(AnnotationId),
    TextEditFinished { id: AnnotationId, committed: bool },
    ToolChanged(Tool),
    Error(MarkupError),
}

/// Mutable engine state a handler works on
pub struct EditContext<'a> {
    pub bridge: &'a mut RenderBridge,
    pub store: &'a mut AnnotationStore,
    pub history: &'a mut HistoryManager,
    pub text: &'a mut TextEditSession,
    pub selection: &'a mut Option<AnnotationId>,
    pub config: &'a EngineConfig,
    pub style: &'a ToolStyle,
    pub author: Option<&'a str>,
    pub now: Instant,
}

impl EditContext<'_> {
    /// Capture the surface after a commit
    pub fn record_history(&mut self, actions: &mut Vec<Action>) {
        match self.bridge.capture() {
            Ok(snapshot) => {
                self.history.record(snapshot);
            }
            Err(error) => actions.push(Action::Error(error)),
        }
    }

    fn handle_for(&self, id: Option<AnnotationId>) -> Option<ObjectHandle> {
        id.and_then(|id| self.bridge.handle_of(id))
    }
}

/// Pointer-event state machine
#[derive(Debug, Default)]
pub struct ToolDispatcher {
    tool: Tool,
    gesture: Gesture,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Switch tools; returns whether the tool changed
    pub fn set_tool(&mut self, tool: Tool) -> bool {
        let changed = self.tool != tool;
        self.tool = tool;
        changed
    }

    pub fn pointer_down(&mut self, ctx: &mut EditContext<'_>, point: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        if !ctx.bridge.is_ready() {
            actions.push(Action::Error(MarkupError::SurfaceNotReady));
            return actions;
        }
        if self.gesture != Gesture::Idle {
            // The previous release never arrived
            actions.extend(self.pointer_up(ctx, point));
        }

        if let Some(handle) = ctx.handle_for(*ctx.selection) {
            let resize = ctx.bridge.object(handle).and_then(|object| {
                hit_handle(
                    object,
                    &point,
                    ctx.config.handle_size,
                    ctx.config.hit_tolerance,
                )
                .map(|handle_type| {
                    ManipulationState::new(
                        handle_type,
                        object.shape.clone(),
                        point,
                        ctx.config.arrow_head_size,
                    )
                })
            });
            if let Some(state) = resize {
                self.gesture = Gesture::Resizing { handle, state };
                return actions;
            }
        }

        if let Some(handle) = ctx.bridge.hit_test(&point) {
            let id = ctx.bridge.object(handle).and_then(LiveObject::annotation_id);
            if id.is_some() && id == ctx.text.editing_id() {
                // Clicks inside the box being edited belong to the editor
                return actions;
            }
            self.select(ctx, id, &mut actions);
            self.gesture = Gesture::Moving {
                handle,
                last: point,
                moved: false,
            };
            return actions;
        }

        self.select(ctx, None, &mut actions);
        match self.tool {
            Tool::Select => self.gesture = Gesture::Panning { last: point },
            Tool::Text => {
                if ctx.text.can_create(ctx.now) {
                    self.create_text(ctx, point, &mut actions);
                } else {
                    tracing::debug!("text creation suppressed during cooldown");
                }
            }
            tool => self.begin_drawing(ctx, tool, point, &mut actions),
        }
        actions
    }

    pub fn pointer_move(&mut self, ctx: &mut EditContext<'_>, point: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        let result = match &mut self.gesture {
            Gesture::Idle => return actions,
            Gesture::Drawing {
                handle,
                tool,
                anchor,
            } => {
                let (handle, tool, anchor) = (*handle, *tool, *anchor);
                let label = release_label(ctx, anchor, point);
                let head_size = ctx.config.arrow_head_size;
                ctx.bridge.update_live(handle, |object| {
                    object.shape = preview_shape(tool, &object.shape, anchor, point, head_size, label);
                })
            }
            Gesture::Moving {
                handle,
                last,
                moved,
            } => {
                let (dx, dy) = (point.x - last.x, point.y - last.y);
                *last = point;
                *moved = true;
                ctx.bridge
                    .update_live(*handle, |object| object.translate(dx, dy))
            }
            Gesture::Resizing { handle, state } => {
                state.update_position(point);
                let shape = state.calculate_new_shape();
                ctx.bridge
                    .update_live(*handle, |object| object.shape = shape)
            }
            Gesture::Panning { last } => {
                actions.push(Action::Pan {
                    dx: point.x - last.x,
                    dy: point.y - last.y,
                });
                *last = point;
                return actions;
            }
        };

        match result {
            Ok(()) => actions.push(Action::RenderNeeded),
            Err(error) => actions.push(Action::Error(error)),
        }
        actions
    }

    pub fn pointer_up(&mut self, ctx: &mut EditContext<'_>, point: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Panning { .. } => {}
            Gesture::Drawing {
                handle,
                tool,
                anchor,
            } => {
                let label = release_label(ctx, anchor, point);
                let head_size = ctx.config.arrow_head_size;
                let reshaped = ctx.bridge.update_live(handle, |object| {
                    object.shape =
                        preview_shape(tool, &object.shape, anchor, point, head_size, label);
                });
                match reshaped {
                    Ok(()) => self.commit_drawing(ctx, handle, &mut actions),
                    Err(error) => {
                        ctx.bridge.discard(handle);
                        actions.push(Action::Error(error));
                    }
                }
            }
            Gesture::Moving { handle, moved, .. } => {
                if moved {
                    self.sync(ctx, handle, &mut actions);
                }
            }
            Gesture::Resizing { handle, .. } => self.sync(ctx, handle, &mut actions),
        }
        actions
    }

    /// Abort the current gesture, reverting any uncommitted live change
    pub fn cancel_gesture(&mut self, ctx: &mut EditContext<'_>) -> Vec<Action> {
        let mut actions = Vec::new();
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Panning { .. } => {}
            Gesture::Drawing { handle, .. } => {
                ctx.bridge.discard(handle);
                actions.push(Action::PreviewDiscarded);
            }
            Gesture::Moving { handle, .. } | Gesture::Resizing { handle, .. } => {
                let id = ctx.bridge.object(handle).and_then(LiveObject::annotation_id);
                if let Some(id) = id {
                    if let Err(error) = ctx.bridge.refresh(id, ctx.store) {
                        actions.push(Action::Error(error));
                    }
                }
                actions.push(Action::RenderNeeded);
            }
        }
        actions
    }

    /// Follow a render-scale change of `ratio` in the middle of a gesture
    ///
    /// A drawing keeps its anchor on the same document point. Moves and
    /// resizes are reverted, since rescaling redraws their objects from the
    /// store.
    pub fn rescale_gesture(&mut self, ctx: &mut EditContext<'_>, ratio: f64) -> Vec<Action> {
        match &mut self.gesture {
            Gesture::Drawing { anchor, .. } => {
                *anchor = anchor.scaled(ratio);
                Vec::new()
            }
            Gesture::Moving { .. } | Gesture::Resizing { .. } => {
                tracing::debug!("gesture canceled by scale change");
                self.cancel_gesture(ctx)
            }
            Gesture::Idle | Gesture::Panning { .. } => Vec::new(),
        }
    }

    /// Change the selection, closing a text edit on a different annotation first
    pub fn select(
        &mut self,
        ctx: &mut EditContext<'_>,
        id: Option<AnnotationId>,
        actions: &mut Vec<Action>,
    ) {
        if let Some(editing) = ctx.text.editing_id() {
            if Some(editing) != id {
                self.finish_text_edit_into(ctx, actions);
            }
        }
        if *ctx.selection != id {
            *ctx.selection = id;
            actions.push(Action::SelectionChanged(id));
        }
    }

    /// Open a text edit session on an existing text-bearing annotation
    pub fn begin_text_edit(&mut self, ctx: &mut EditContext<'_>, id: AnnotationId) -> Vec<Action> {
        let mut actions = Vec::new();
        self.select(ctx, Some(id), &mut actions);
        self.open_session(ctx, id, false, &mut actions);
        actions
    }

    /// Replace the text of the open session
    pub fn text_input(&mut self, ctx: &mut EditContext<'_>, text: &str, append: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(id) = ctx.text.editing_id() else {
            return actions;
        };
        let content = if append {
            ctx.text.append(text)
        } else {
            ctx.text.set_text(text)
        };
        let (Some(content), Some(handle)) = (content, ctx.bridge.handle_of(id)) else {
            return actions;
        };
        let live = live_text(
            &content,
            ctx.bridge.scale(),
            ctx.bridge.params().placeholder_color,
        );
        match ctx.bridge.update_live(handle, |object| object.text = Some(live)) {
            Ok(()) => actions.push(Action::RenderNeeded),
            Err(error) => actions.push(Action::Error(error)),
        }
        actions
    }

    /// Close the open text edit session, committing or reverting it
    pub fn finish_text_edit(&mut self, ctx: &mut EditContext<'_>) -> Vec<Action> {
        let mut actions = Vec::new();
        self.finish_text_edit_into(ctx, &mut actions);
        actions
    }

    fn finish_text_edit_into(&mut self, ctx: &mut EditContext<'_>, actions: &mut Vec<Action>) {
        let outcome = ctx.text.exit(ctx.now);
        let is_new = outcome.is_new();
        let (id, content, committed) = match outcome {
            ExitOutcome::NotEditing => return,
            ExitOutcome::Reverted { id, content, .. } => (id, content, false),
            ExitOutcome::Committed { id, content, .. } => (id, content, true),
        };

        let changed = match ctx.store.find(id) {
            Some(record) => record.text.as_ref() != Some(&content),
            None => {
                tracing::debug!(%id, "edited annotation vanished before the session closed");
                return;
            }
        };
        if changed {
            let patch = AnnotationPatch {
                text: Some(content),
                ..Default::default()
            };
            match ctx.store.update(id, &patch) {
                Ok(()) => actions.push(Action::AnnotationUpdated(id)),
                Err(error) => actions.push(Action::Error(error)),
            }
        }
        if let Err(error) = ctx.bridge.refresh(id, ctx.store) {
            actions.push(Action::Error(error));
        }
        if changed {
            ctx.record_history(actions);
        }
        actions.push(Action::TextEditFinished { id, committed });

        if is_new && self.tool == Tool::Text {
            self.tool = Tool::Select;
            actions.push(Action::ToolChanged(Tool::Select));
        }
    }

    fn open_session(
        &mut self,
        ctx: &mut EditContext<'_>,
        id: AnnotationId,
        is_new: bool,
        actions: &mut Vec<Action>,
    ) {
        let Some(current) = ctx.store.find(id).and_then(|record| record.text.clone()) else {
            tracing::debug!(%id, "annotation has no text to edit");
            return;
        };
        let Some(handle) = ctx.bridge.handle_of(id) else {
            return;
        };

        let shown = ctx.text.begin(id, &current, is_new);
        let live = live_text(
            &shown,
            ctx.bridge.scale(),
            ctx.bridge.params().placeholder_color,
        );
        match ctx.bridge.update_live(handle, |object| object.text = Some(live)) {
            Ok(()) => actions.push(Action::TextEditStarted(id)),
            Err(error) => {
                ctx.text.reset();
                actions.push(Action::Error(error));
            }
        }
    }

    fn create_text(&mut self, ctx: &mut EditContext<'_>, point: Point, actions: &mut Vec<Action>) {
        let scale = ctx.bridge.scale();
        let position = point.scaled(1.0 / scale);
        let content = ctx.text.placeholder_content(&ctx.style.text(""));
        let size = Size::new(ctx.config.text_box_width, content.font_size * 1.4);

        let mut style = ctx.style.annotation_style();
        style.stroke_width = 0.0;
        let annotation = Annotation::new(
            AnnotationKind::Text,
            ctx.bridge.page(),
            position,
            size,
            style,
        )
        .with_text(content)
        .with_author(ctx.author.map(str::to_string));

        if let Err(error) = ctx.bridge.materialize(&annotation) {
            actions.push(Action::Error(error));
            return;
        }
        let id = ctx.store.add(annotation);
        actions.push(Action::AnnotationCreated(id));
        ctx.record_history(actions);
        self.select(ctx, Some(id), actions);
        self.open_session(ctx, id, true, actions);
    }

    fn begin_drawing(
        &mut self,
        ctx: &mut EditContext<'_>,
        tool: Tool,
        point: Point,
        actions: &mut Vec<Action>,
    ) {
        let Some(kind) = tool.annotation_kind() else {
            return;
        };
        let shape = preview_shape(
            tool,
            &LiveShape::Path { points: Vec::new() },
            point,
            point,
            ctx.config.arrow_head_size,
            String::new(),
        );
        let mut object = LiveObject::preview(kind, shape, ctx.style.annotation_style());

        let scale = ctx.bridge.scale();
        let placeholder_color = ctx.bridge.params().placeholder_color;
        object.text = match kind {
            AnnotationKind::Stamp => {
                let mut label = ctx.style.text(ctx.config.stamp_label.clone());
                label.font_weight = FontWeight::Bold;
                Some(live_text(&label, scale, placeholder_color))
            }
            AnnotationKind::Callout => {
                let placeholder = ctx.text.placeholder_content(&ctx.style.text(""));
                Some(live_text(&placeholder, scale, placeholder_color))
            }
            _ => None,
        };

        match ctx.bridge.begin_preview(object) {
            Ok(handle) => {
                self.gesture = Gesture::Drawing {
                    handle,
                    tool,
                    anchor: point,
                };
                actions.push(Action::RenderNeeded);
            }
            Err(error) => actions.push(Action::Error(error)),
        }
    }

    fn commit_drawing(
        &mut self,
        ctx: &mut EditContext<'_>,
        handle: ObjectHandle,
        actions: &mut Vec<Action>,
    ) {
        let degenerate = match ctx.bridge.object(handle) {
            Some(object) => match &object.shape {
                LiveShape::Path { points } => {
                    points.len() < ctx.config.freehand_min_points
                        || object.shape.extent() < ctx.config.min_shape_size
                }
                shape => shape.extent() < ctx.config.min_shape_size,
            },
            None => return,
        };
        if degenerate {
            ctx.bridge.discard(handle);
            tracing::debug!("degenerate preview discarded");
            actions.push(Action::PreviewDiscarded);
            return;
        }

        match ctx.bridge.commit_preview(handle, ctx.store, ctx.author) {
            Ok(id) => {
                actions.push(Action::AnnotationCreated(id));
                self.select(ctx, Some(id), actions);
                ctx.record_history(actions);
            }
            Err(error) => {
                ctx.bridge.discard(handle);
                actions.push(Action::Error(error));
            }
        }
    }

    fn sync(&mut self, ctx: &mut EditContext<'_>, handle: ObjectHandle, actions: &mut Vec<Action>) {
        let id = ctx.bridge.object(handle).and_then(LiveObject::annotation_id);
        match ctx.bridge.sync_live_edit(handle, ctx.store) {
            Ok(true) => {
                if let Some(id) = id {
                    actions.push(Action::AnnotationUpdated(id));
                }
                ctx.record_history(actions);
            }
            Ok(false) => {}
            Err(error) => actions.push(Action::Error(error)),
        }
    }
}

/// Measurement label for a preview spanning `anchor`→`point` in view space
fn release_label(ctx: &EditContext<'_>, anchor: Point, point: Point) -> String {
    let length = anchor.distance_to(&point) / ctx.bridge.scale();
    ctx.bridge.params().measurement.label(length)
}

/// Preview geometry for `tool` spanning `anchor`→`point`
fn preview_shape(
    tool: Tool,
    current: &LiveShape,
    anchor: Point,
    point: Point,
    head_size: f64,
    label: String,
) -> LiveShape {
    match tool {
        Tool::Circle => {
            let center = anchor.midpoint(&point);
            let radius = anchor.distance_to(&point) / 2.0;
            LiveShape::Ellipse {
                cx: center.x,
                cy: center.y,
                rx: radius,
                ry: radius,
            }
        }
        Tool::Arrow => LiveShape::Arrow {
            start: anchor,
            end: point,
            head: ArrowHead::for_line(anchor, point, head_size),
        },
        Tool::Measurement => LiveShape::Measurement {
            start: anchor,
            end: point,
            label,
        },
        Tool::Freehand => {
            let mut points = match current {
                LiveShape::Path { points } if !points.is_empty() => points.clone(),
                _ => vec![anchor],
            };
            if points.last() != Some(&point) {
                points.push(point);
            }
            LiveShape::Path { points }
        }
        Tool::Cloud => {
            let bounds = Rect::from_corners(anchor, point);
            LiveShape::Cloud {
                left: bounds.x,
                top: bounds.y,
                width: bounds.width,
                height: bounds.height,
                bumps: 0,
            }
        }
        _ => {
            let bounds = Rect::from_corners(anchor, point);
            LiveShape::Rect {
                left: bounds.x,
                top: bounds.y,
                width: bounds.width,
                height: bounds.height,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ProjectionParams;
    use crate::surface::HeadlessSurface;
    use std::time::Duration;

    struct Harness {
        bridge: RenderBridge,
        store: AnnotationStore,
        history: HistoryManager,
        text: TextEditSession,
        selection: Option<AnnotationId>,
        config: EngineConfig,
        style: ToolStyle,
        dispatcher: ToolDispatcher,
        now: Instant,
    }

    impl Harness {
        fn new(tool: Tool) -> Self {
            let config = EngineConfig::default();
            let mut bridge = RenderBridge::new(
                Box::new(HeadlessSurface::new()),
                ProjectionParams::from(&config),
            );
            let store = AnnotationStore::new();
            bridge.load_page(&store, 1, 1.0).unwrap();
            let mut history = HistoryManager::new(config.history_limit);
            history.reset(bridge.capture().unwrap());
            let mut dispatcher = ToolDispatcher::new();
            dispatcher.set_tool(tool);
            Self {
                bridge,
                store,
                history,
                text: TextEditSession::new(config.placeholder_text.clone(), config.text_cooldown()),
                selection: None,
                style: config.default_style.clone(),
                config,
                dispatcher,
                now: Instant::now(),
            }
        }

        fn run<F>(&mut self, event: F) -> Vec<Action>
        where
            F: FnOnce(&mut ToolDispatcher, &mut EditContext<'_>) -> Vec<Action>,
        {
            let mut ctx = EditContext {
                bridge: &mut self.bridge,
                store: &mut self.store,
                history: &mut self.history,
                text: &mut self.text,
                selection: &mut self.selection,
                config: &self.config,
                style: &self.style,
                author: Some("tester"),
                now: self.now,
            };
            event(&mut self.dispatcher, &mut ctx)
        }

        fn drag(&mut self, from: Point, to: Point) -> Vec<Action> {
            let mut actions = self.run(|d, ctx| d.pointer_down(ctx, from));
            actions.extend(self.run(|d, ctx| d.pointer_move(ctx, to)));
            actions.extend(self.run(|d, ctx| d.pointer_up(ctx, to)));
            actions
        }
    }

    #[test]
    fn rectangle_drag_commits_annotation() {
        let mut h = Harness::new(Tool::Rectangle);
        let actions = h.drag(Point::new(10.0, 10.0), Point::new(60.0, 40.0));

        assert_eq!(h.store.len(), 1);
        let record = h.store.all()[0].clone();
        assert_eq!(record.position, Point::new(10.0, 10.0));
        assert_eq!(record.size, Size::new(50.0, 30.0));
        assert_eq!(record.author.as_deref(), Some("tester"));
        assert!(actions.contains(&Action::AnnotationCreated(record.id)));
        assert_eq!(h.selection, Some(record.id));
        assert_eq!(h.history.undo_len(), 1);
    }

    #[test]
    fn degenerate_click_creates_nothing() {
        let mut h = Harness::new(Tool::Rectangle);
        let actions = h.drag(Point::new(10.0, 10.0), Point::new(12.0, 11.0));
        assert!(h.store.is_empty());
        assert!(h.bridge.is_empty());
        assert!(actions.contains(&Action::PreviewDiscarded));
        assert_eq!(h.history.undo_len(), 0);
    }

    #[test]
    fn circle_preview_uses_half_distance_radius() {
        let mut h = Harness::new(Tool::Circle);
        h.drag(Point::new(0.0, 0.0), Point::new(60.0, 80.0));
        let record = h.store.all()[0].clone();
        assert_eq!(record.kind, AnnotationKind::Circle);
        assert_eq!(record.size, Size::new(100.0, 100.0));
        assert_eq!(record.position, Point::new(-20.0, -10.0));
    }

    #[test]
    fn freehand_collects_points() {
        let mut h = Harness::new(Tool::Freehand);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(0.0, 0.0)));
        h.run(|d, ctx| d.pointer_move(ctx, Point::new(10.0, 5.0)));
        h.run(|d, ctx| d.pointer_move(ctx, Point::new(20.0, 0.0)));
        h.run(|d, ctx| d.pointer_up(ctx, Point::new(20.0, 0.0)));

        let record = h.store.all()[0].clone();
        assert_eq!(record.path.len(), 3);
        assert_eq!(record.size, Size::new(20.0, 5.0));
    }

    #[test]
    fn hitting_existing_object_moves_it_in_drawing_tool() {
        let mut h = Harness::new(Tool::Rectangle);
        h.drag(Point::new(10.0, 10.0), Point::new(60.0, 60.0));
        let id = h.store.all()[0].id;

        let actions = h.drag(Point::new(30.0, 30.0), Point::new(40.0, 50.0));
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.find(id).unwrap().position, Point::new(20.0, 30.0));
        assert!(actions.contains(&Action::AnnotationUpdated(id)));
        assert_eq!(h.history.undo_len(), 2);
    }

    #[test]
    fn corner_handle_resizes_selection() {
        let mut h = Harness::new(Tool::Select);
        h.dispatcher.set_tool(Tool::Rectangle);
        h.drag(Point::new(10.0, 10.0), Point::new(60.0, 60.0));
        let id = h.store.all()[0].id;

        h.drag(Point::new(60.0, 60.0), Point::new(80.0, 90.0));
        let record = h.store.find(id).unwrap();
        assert_eq!(record.position, Point::new(10.0, 10.0));
        assert_eq!(record.size, Size::new(70.0, 80.0));
    }

    #[test]
    fn select_tool_pans_on_background() {
        let mut h = Harness::new(Tool::Select);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(100.0, 100.0)));
        let actions = h.run(|d, ctx| d.pointer_move(ctx, Point::new(90.0, 120.0)));
        assert_eq!(actions, vec![Action::Pan { dx: -10.0, dy: 20.0 }]);
        h.run(|d, ctx| d.pointer_up(ctx, Point::new(90.0, 120.0)));
        assert!(h.store.is_empty());
    }

    #[test]
    fn text_tool_creates_placeholder_and_edits() {
        let mut h = Harness::new(Tool::Text);
        let actions = h.run(|d, ctx| d.pointer_down(ctx, Point::new(50.0, 50.0)));
        let id = h.store.all()[0].id;
        assert!(actions.contains(&Action::TextEditStarted(id)));
        assert!(h.text.is_capturing());

        let record = h.store.find(id).unwrap();
        assert!(record.text.as_ref().unwrap().placeholder);

        h.run(|d, ctx| d.text_input(ctx, "Hello", true));
        let actions = h.run(|d, ctx| d.finish_text_edit(ctx));
        assert!(actions.contains(&Action::TextEditFinished { id, committed: true }));
        assert!(actions.contains(&Action::ToolChanged(Tool::Select)));
        assert_eq!(h.dispatcher.tool(), Tool::Select);

        let text = h.store.find(id).unwrap().text.clone().unwrap();
        assert_eq!(text.text, "Hello");
        assert!(!text.placeholder);
    }

    #[test]
    fn text_cooldown_blocks_second_box() {
        let mut h = Harness::new(Tool::Text);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(50.0, 50.0)));
        h.run(|d, ctx| d.finish_text_edit(ctx));

        h.dispatcher.set_tool(Tool::Text);
        h.now += Duration::from_millis(100);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(300.0, 300.0)));
        assert_eq!(h.store.len(), 1);

        h.now += Duration::from_millis(300);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(300.0, 400.0)));
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn clicking_away_from_edit_commits_and_does_not_chain() {
        let mut h = Harness::new(Tool::Text);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(50.0, 50.0)));
        h.run(|d, ctx| d.text_input(ctx, "note", false));

        let actions = h.run(|d, ctx| d.pointer_down(ctx, Point::new(400.0, 400.0)));
        assert_eq!(h.store.len(), 1);
        assert!(!h.text.is_capturing());
        assert!(actions.contains(&Action::ToolChanged(Tool::Select)));
    }

    #[test]
    fn stamp_carries_label() {
        let mut h = Harness::new(Tool::Stamp);
        h.drag(Point::new(10.0, 10.0), Point::new(110.0, 50.0));
        let text = h.store.all()[0].text.clone().unwrap();
        assert_eq!(text.text, "APPROVED");
        assert_eq!(text.font_weight, FontWeight::Bold);
    }

    #[test]
    fn cancel_gesture_discards_preview() {
        let mut h = Harness::new(Tool::Arrow);
        h.run(|d, ctx| d.pointer_down(ctx, Point::new(0.0, 0.0)));
        h.run(|d, ctx| d.pointer_move(ctx, Point::new(50.0, 0.0)));
        let actions = h.run(|d, ctx| d.cancel_gesture(ctx));
        assert_eq!(actions, vec![Action::PreviewDiscarded]);
        assert!(h.bridge.is_empty());
        assert_eq!(*h.dispatcher.gesture(), Gesture::Idle);
    }
}
