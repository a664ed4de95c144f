//! Markup engine facade
//!
//! [`MarkupEngine`] wires the coordinate space, annotation store, render
//! bridge, tool dispatcher, history, clipboard and text edit session together
//! and exposes the host interface: tool selection, tool style, page controls,
//! pointer and keyboard input.
//!
//! Everything runs on the caller's thread. Operations that need wall-clock
//! time have `_at` variants taking an explicit [`Instant`].

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, Comment, Point, Rect, TextContent,
};
use crate::bridge::{live_text, ProjectionParams, RenderBridge};
use crate::clipboard::{Clipboard, PasteTarget};
use crate::config::EngineConfig;
use crate::coords::{CoordinateSpace, ScaleChange};
use crate::error::{MarkupError, MarkupResult};
use crate::history::{HistoryManager, Snapshot};
use crate::render_task::{PageRasterizer, RasterError, RasterizedPage, RenderRequests, RenderTicket};
use crate::store::{AnnotationStore, ChangeType, ListenerError, SubscriptionId};
use crate::surface::{LiveObject, Surface};
use crate::text_edit::TextEditSession;
use crate::tools::{Action, EditContext, Tool, ToolDispatcher, ToolStyle};

/// Global keyboard shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shortcut {
    Undo,
    Redo,
    Copy,
    Paste,
    Delete,
    /// Back to the select tool
    Escape,
}

/// The document-markup engine
pub struct MarkupEngine {
    config: EngineConfig,
    coords: CoordinateSpace,
    store: AnnotationStore,
    bridge: RenderBridge,
    dispatcher: ToolDispatcher,
    history: HistoryManager,
    clipboard: Clipboard,
    text: TextEditSession,
    renders: RenderRequests,
    style: ToolStyle,
    selection: Option<AnnotationId>,
    author: Option<String>,

    current_page: u32,
    total_pages: u32,
    /// The current page finished rasterizing and its live objects were requested
    page_ready: bool,
    /// History needs a baseline once deferred live objects exist
    baseline_pending: bool,
    /// Top-left of the visible viewport in view pixels
    scroll: Point,
}

impl MarkupEngine {
    pub fn new(config: EngineConfig, surface: Box<dyn Surface>, total_pages: u32) -> Self {
        let bridge = RenderBridge::new(surface, ProjectionParams::from(&config));
        Self {
            coords: CoordinateSpace::new(&config),
            store: AnnotationStore::new(),
            bridge,
            dispatcher: ToolDispatcher::new(),
            history: HistoryManager::new(config.history_limit),
            clipboard: Clipboard::new(config.paste_offset),
            text: TextEditSession::new(config.placeholder_text.clone(), config.text_cooldown()),
            renders: RenderRequests::new(config.render_timeout()),
            style: config.default_style.clone(),
            selection: None,
            author: None,
            current_page: 1,
            total_pages: total_pages.max(1),
            page_ready: false,
            baseline_pending: false,
            scroll: Point::ORIGIN,
            config,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    // ----- host setup -------------------------------------------------------

    /// Register a persistence (or UI) subscriber on the annotation store
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(ChangeType, &Annotation) -> Result<(), ListenerError> + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Seed the store from persisted records
    ///
    /// If the current page is already shown its live objects are rebuilt and
    /// history restarts from the loaded state.
    pub fn load_annotations(
        &mut self,
        records: impl IntoIterator<Item = Annotation>,
    ) -> MarkupResult<usize> {
        let before = self.store.len();
        self.store.load(records);
        let loaded = self.store.len() - before;
        tracing::info!(loaded, "annotations hydrated");

        if self.page_ready {
            self.show_page_objects()?;
        }
        Ok(loaded)
    }

    /// Container size in pixels; zero or negative means "not laid out yet"
    pub fn set_container_size(&mut self, width: f64, height: f64) -> MarkupResult<ScaleChange> {
        let change = self.coords.set_container(width, height);
        self.apply_scale_change(change)
    }

    /// Scroll position of the viewport over the rendered page, in view pixels
    pub fn set_scroll_offset(&mut self, x: f64, y: f64) {
        self.scroll = Point::new(x, y);
    }

    // ----- rendering --------------------------------------------------------

    /// Start a render of the current page, canceling any render in flight
    pub fn request_page_render(&mut self, now: Instant) -> RenderTicket {
        self.renders
            .begin(self.current_page, self.coords.render_scale(), now)
    }

    /// Accept a rasterizer result
    ///
    /// Canceled and timed-out renders leave no partial state. Returns the scale
    /// change caused by the page's native dimensions; on
    /// [`ScaleChange::Changed`] the host should render again at the new scale.
    pub fn on_page_rendered(
        &mut self,
        ticket: &RenderTicket,
        result: Result<RasterizedPage, RasterError>,
        now: Instant,
    ) -> MarkupResult<ScaleChange> {
        let rasterized = self.renders.complete(ticket, result, now)?;
        let change = self
            .coords
            .set_page_dimensions(rasterized.intrinsic_width, rasterized.intrinsic_height);

        if self.page_ready {
            return self.apply_scale_change(change);
        }

        self.page_ready = true;
        tracing::info!(
            page = self.current_page,
            scale = self.coords.render_scale(),
            "page rendered"
        );
        self.show_page_objects()?;
        Ok(change)
    }

    /// Render the current page synchronously through `rasterizer`
    pub fn render_page_with(
        &mut self,
        rasterizer: &mut dyn PageRasterizer,
    ) -> MarkupResult<ScaleChange> {
        let ticket = self.request_page_render(Instant::now());
        let result = rasterizer.render_page(
            ticket.page_number,
            ticket.render_scale,
            ticket.token(),
        );
        self.on_page_rendered(&ticket, result, Instant::now())
    }

    /// Per-frame housekeeping: retry deferred surface work, expire cooldowns
    ///
    /// Returns whether deferred work ran.
    pub fn on_frame(&mut self, now: Instant) -> MarkupResult<bool> {
        self.text.tick(now);
        if !self.bridge.has_deferred() {
            return Ok(false);
        }
        let flushed = match self.bridge.flush_deferred(&self.store) {
            Err(MarkupError::SurfaceNotReady) => return Ok(false),
            other => other?,
        };
        if flushed && self.baseline_pending {
            self.take_baseline()?;
        }
        Ok(flushed)
    }

    // ----- tools ------------------------------------------------------------

    pub fn set_active_tool(&mut self, tool: Tool) -> Vec<Action> {
        self.set_active_tool_at(tool, Instant::now())
    }

    pub fn set_active_tool_at(&mut self, tool: Tool, now: Instant) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(now);
        let mut actions = dispatcher.cancel_gesture(&mut ctx);
        actions.extend(dispatcher.finish_text_edit(&mut ctx));
        if dispatcher.set_tool(tool) {
            tracing::debug!(?tool, "active tool changed");
            actions.push(Action::ToolChanged(tool));
        }
        actions
    }

    /// Set the style for new annotations and restyle the current selection
    pub fn set_tool_style(&mut self, style: ToolStyle) -> Vec<Action> {
        self.style = style;
        let mut actions = Vec::new();
        let Some(id) = self.selection else {
            return actions;
        };
        let Some(handle) = self.bridge.handle_of(id) else {
            return actions;
        };

        // The box being edited shows the uncommitted buffer; only its stored
        // text may reach the store
        let editing = self.text.editing_id() == Some(id);
        let committed = if editing {
            self.store.find(id).and_then(|record| record.text.clone())
        } else {
            None
        };

        let scale = self.bridge.scale();
        let placeholder_color = self.config.placeholder_color;
        let style = self.style.clone();
        let restyle = move |object: &mut LiveObject| {
            let mut next = style.annotation_style();
            if object.kind == AnnotationKind::Text {
                next.stroke_width = object.style.stroke_width;
            }
            object.style = next;
            let source = match (committed, object.text.as_ref()) {
                (Some(committed), _) => Some((
                    committed.text,
                    committed.placeholder,
                    committed.font_family,
                )),
                (None, Some(text)) => Some((
                    text.text.clone(),
                    text.placeholder,
                    text.font_family.clone(),
                )),
                (None, None) => None,
            };
            if let Some((text, placeholder, font_family)) = source {
                let content = TextContent {
                    text,
                    placeholder,
                    font_family,
                    ..style.text("")
                };
                object.text = Some(live_text(&content, scale, placeholder_color));
            }
        };

        if let Err(error) = self.bridge.update_live(handle, restyle) {
            actions.push(Action::Error(error));
            return actions;
        }
        match self.bridge.sync_live_edit(handle, &mut self.store) {
            Ok(true) => {
                actions.push(Action::AnnotationUpdated(id));
                self.record_history(&mut actions);
            }
            Ok(false) => {}
            Err(error) => actions.push(Action::Error(error)),
        }
        if editing {
            self.text.restyle(&self.style.text(""));
            self.redraw_edit_buffer();
        }
        actions
    }

    pub fn tool_style(&self) -> &ToolStyle {
        &self.style
    }

    pub fn active_tool(&self) -> Tool {
        self.dispatcher.tool()
    }

    // ----- page controls ----------------------------------------------------

    pub fn page_controls(&mut self) -> PageControls<'_> {
        PageControls { engine: self }
    }

    pub fn next_page(&mut self) -> MarkupResult<bool> {
        self.go_to_page(self.current_page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> MarkupResult<bool> {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    /// Switch pages: cancels the in-flight render, ends editing and starts a
    /// fresh page-scoped history once the new page is rendered
    pub fn go_to_page(&mut self, page: u32) -> MarkupResult<bool> {
        if page < 1 || page > self.total_pages || page == self.current_page {
            return Ok(false);
        }

        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.cancel_gesture(&mut ctx);
        let mut ignored = Vec::new();
        dispatcher.select(&mut ctx, None, &mut ignored);

        self.renders.cancel_active();
        self.bridge.switch_page(page);
        self.history.clear();
        self.current_page = page;
        self.page_ready = false;
        self.baseline_pending = false;
        tracing::info!(page, "page changed");
        Ok(true)
    }

    pub fn zoom_in(&mut self) -> MarkupResult<ScaleChange> {
        let change = self.coords.zoom_in();
        self.apply_scale_change(change)
    }

    pub fn zoom_out(&mut self) -> MarkupResult<ScaleChange> {
        let change = self.coords.zoom_out();
        self.apply_scale_change(change)
    }

    pub fn reset_zoom(&mut self) -> MarkupResult<ScaleChange> {
        let change = self.coords.reset_zoom();
        self.apply_scale_change(change)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> MarkupResult<ScaleChange> {
        let change = self.coords.set_zoom(zoom);
        self.apply_scale_change(change)
    }

    pub fn undo(&mut self) -> MarkupResult<bool> {
        self.ensure_restorable()?;
        match self.history.undo() {
            Some(snapshot) => self.restore(&snapshot),
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> MarkupResult<bool> {
        self.ensure_restorable()?;
        match self.history.redo() {
            Some(snapshot) => self.restore(&snapshot),
            None => Ok(false),
        }
    }

    // ----- pointer and keyboard input ---------------------------------------

    pub fn pointer_down(&mut self, point: Point) -> Vec<Action> {
        self.pointer_down_at(point, Instant::now())
    }

    pub fn pointer_move(&mut self, point: Point) -> Vec<Action> {
        self.pointer_move_at(point, Instant::now())
    }

    pub fn pointer_up(&mut self, point: Point) -> Vec<Action> {
        self.pointer_up_at(point, Instant::now())
    }

    /// Press at `point`; rejected until the current page has been rendered
    pub fn pointer_down_at(&mut self, point: Point, now: Instant) -> Vec<Action> {
        if !self.page_ready {
            tracing::debug!(page = self.current_page, "pointer input before page render");
            return vec![Action::Error(MarkupError::SurfaceNotReady)];
        }
        let (dispatcher, mut ctx) = self.split(now);
        dispatcher.pointer_down(&mut ctx, point)
    }

    pub fn pointer_move_at(&mut self, point: Point, now: Instant) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(now);
        dispatcher.pointer_move(&mut ctx, point)
    }

    pub fn pointer_up_at(&mut self, point: Point, now: Instant) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(now);
        dispatcher.pointer_up(&mut ctx, point)
    }

    /// Handle a global shortcut; ignored while a text edit captures keys
    pub fn key(&mut self, shortcut: Shortcut) -> Vec<Action> {
        self.key_at(shortcut, Instant::now())
    }

    pub fn key_at(&mut self, shortcut: Shortcut, now: Instant) -> Vec<Action> {
        if self.text.is_capturing() {
            tracing::debug!(?shortcut, "shortcut ignored while editing text");
            return Vec::new();
        }

        let outcome = match shortcut {
            Shortcut::Undo => self.undo(),
            Shortcut::Redo => self.redo(),
            Shortcut::Copy => {
                self.copy();
                Ok(false)
            }
            Shortcut::Paste => return self.paste_at(now),
            Shortcut::Delete => return self.delete_selection_at(now),
            Shortcut::Escape => {
                let mut actions = self.set_active_tool_at(Tool::Select, now);
                actions.extend(self.select_at(None, now));
                return actions;
            }
        };
        match outcome {
            Ok(true) => vec![Action::RenderNeeded],
            Ok(false) => Vec::new(),
            Err(error) => vec![Action::Error(error)],
        }
    }

    // ----- text -------------------------------------------------------------

    /// Append typed text to the open edit session
    pub fn text_input(&mut self, text: &str) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.text_input(&mut ctx, text, true)
    }

    /// Replace the whole buffer of the open edit session
    pub fn set_edit_text(&mut self, text: &str) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.text_input(&mut ctx, text, false)
    }

    pub fn finish_text_edit(&mut self) -> Vec<Action> {
        self.finish_text_edit_at(Instant::now())
    }

    pub fn finish_text_edit_at(&mut self, now: Instant) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(now);
        dispatcher.finish_text_edit(&mut ctx)
    }

    /// Open an edit session on an existing text-bearing annotation
    pub fn begin_text_edit(&mut self, id: AnnotationId) -> Vec<Action> {
        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.begin_text_edit(&mut ctx, id)
    }

    pub fn is_text_editing(&self) -> bool {
        self.text.is_capturing()
    }

    // ----- editing ----------------------------------------------------------

    pub fn select(&mut self, id: Option<AnnotationId>) -> Vec<Action> {
        self.select_at(id, Instant::now())
    }

    pub fn select_at(&mut self, id: Option<AnnotationId>, now: Instant) -> Vec<Action> {
        let id = id.filter(|id| self.store.contains(*id));
        let (dispatcher, mut ctx) = self.split(now);
        let mut actions = Vec::new();
        dispatcher.select(&mut ctx, id, &mut actions);
        actions
    }

    /// Copy the selected annotation; returns whether anything was copied
    pub fn copy(&mut self) -> bool {
        match self.selection.and_then(|id| self.store.find(id)) {
            Some(annotation) => {
                self.clipboard.copy(annotation);
                true
            }
            None => false,
        }
    }

    pub fn paste(&mut self) -> Vec<Action> {
        self.paste_at(Instant::now())
    }

    /// Paste the clipboard onto the current page and select the copy
    pub fn paste_at(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.page_ready || self.clipboard.is_empty() {
            return actions;
        }
        if !self.bridge.is_ready() {
            actions.push(Action::Error(MarkupError::SurfaceNotReady));
            return actions;
        }
        let target = self.paste_target();
        let Some(annotation) = self.clipboard.paste(target) else {
            return actions;
        };

        if let Err(error) = self.bridge.materialize(&annotation) {
            actions.push(Action::Error(error));
            return actions;
        }
        let id = self.store.add(annotation);
        actions.push(Action::AnnotationCreated(id));
        let (dispatcher, mut ctx) = self.split(now);
        dispatcher.select(&mut ctx, Some(id), &mut actions);
        ctx.record_history(&mut actions);
        actions
    }

    pub fn delete_selection(&mut self) -> Vec<Action> {
        self.delete_selection_at(Instant::now())
    }

    pub fn delete_selection_at(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(id) = self.selection else {
            return actions;
        };

        let (dispatcher, mut ctx) = self.split(now);
        actions.extend(dispatcher.cancel_gesture(&mut ctx));
        if ctx.text.editing_id() == Some(id) {
            ctx.text.reset();
        }
        match ctx.bridge.remove_annotation(id, ctx.store) {
            Ok(_) => {
                actions.push(Action::AnnotationDeleted(id));
                *ctx.selection = None;
                actions.push(Action::SelectionChanged(None));
                ctx.record_history(&mut actions);
            }
            Err(error) => actions.push(Action::Error(error)),
        }
        actions
    }

    /// Append a comment to an annotation's ordered comment list
    pub fn add_comment(
        &mut self,
        id: AnnotationId,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> MarkupResult<()> {
        let mut comments = self
            .store
            .find(id)
            .map(|record| record.comments.clone())
            .ok_or(MarkupError::AnnotationNotFound(id))?;
        comments.push(Comment::new(author, text));

        let patch = AnnotationPatch {
            comments: Some(comments),
            ..Default::default()
        };
        self.store.update(id, &patch)?;
        if self.bridge.handle_of(id).is_some() {
            self.bridge.refresh(id, &self.store)?;
            let mut actions = Vec::new();
            self.record_history(&mut actions);
        }
        Ok(())
    }

    // ----- queries ----------------------------------------------------------

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Annotations of the current page in creation order
    pub fn annotations(&self) -> Vec<&Annotation> {
        self.store.get(self.current_page)
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.store.find(id)
    }

    pub fn bridge(&self) -> &RenderBridge {
        &self.bridge
    }

    /// Live object currently drawn for `id`
    pub fn live_object(&self, id: AnnotationId) -> Option<&LiveObject> {
        self.bridge
            .handle_of(id)
            .and_then(|handle| self.bridge.object(handle))
    }

    pub fn selection(&self) -> Option<AnnotationId> {
        self.selection
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_page_ready(&self) -> bool {
        self.page_ready
    }

    pub fn render_scale(&self) -> f64 {
        self.coords.render_scale()
    }

    pub fn user_zoom(&self) -> f64 {
        self.coords.user_zoom()
    }

    pub fn coordinates(&self) -> &CoordinateSpace {
        &self.coords
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ----- internals --------------------------------------------------------

    fn split(&mut self, now: Instant) -> (&mut ToolDispatcher, EditContext<'_>) {
        (
            &mut self.dispatcher,
            EditContext {
                bridge: &mut self.bridge,
                store: &mut self.store,
                history: &mut self.history,
                text: &mut self.text,
                selection: &mut self.selection,
                config: &self.config,
                style: &self.style,
                author: self.author.as_deref(),
                now,
            },
        )
    }

    fn record_history(&mut self, actions: &mut Vec<Action>) {
        let (_, mut ctx) = self.split(Instant::now());
        ctx.record_history(actions);
    }

    fn apply_scale_change(&mut self, change: ScaleChange) -> MarkupResult<ScaleChange> {
        if let ScaleChange::Changed { old, new } = change {
            tracing::info!(old, new, zoom = self.coords.user_zoom(), "render scale changed");
            if self.page_ready {
                if old > 0.0 {
                    let (dispatcher, mut ctx) = self.split(Instant::now());
                    dispatcher.rescale_gesture(&mut ctx, new / old);
                }
                self.bridge.rescale(&self.store, new)?;
                self.redraw_edit_buffer();
            }
        }
        Ok(change)
    }

    /// Re-project drops the uncommitted buffer of an open text edit; show it again
    fn redraw_edit_buffer(&mut self) {
        let Some(buffer) = self.text.buffer().map(str::to_owned) else {
            return;
        };
        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.text_input(&mut ctx, &buffer, false);
    }

    /// Build live objects for the current page and restart history from them
    ///
    /// An unavailable surface defers both until [`on_frame`](Self::on_frame).
    fn show_page_objects(&mut self) -> MarkupResult<()> {
        match self
            .bridge
            .load_page(&self.store, self.current_page, self.coords.render_scale())
        {
            Ok(_) => self.take_baseline(),
            Err(MarkupError::SurfaceNotReady) => {
                // Deferred by the bridge; on_frame finishes the load
                self.baseline_pending = true;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    fn take_baseline(&mut self) -> MarkupResult<()> {
        let baseline = self.bridge.capture()?;
        self.history.reset(baseline);
        self.baseline_pending = false;
        Ok(())
    }

    fn ensure_restorable(&mut self) -> MarkupResult<()> {
        if !self.bridge.is_ready() {
            return Err(MarkupError::SurfaceNotReady);
        }
        let (dispatcher, mut ctx) = self.split(Instant::now());
        dispatcher.cancel_gesture(&mut ctx);
        dispatcher.finish_text_edit(&mut ctx);
        Ok(())
    }

    fn restore(&mut self, snapshot: &Snapshot) -> MarkupResult<bool> {
        self.history.begin_restore();
        let result = self.bridge.restore(snapshot, &mut self.store);
        self.history.end_restore();

        if let Some(id) = self.selection {
            if !self.store.contains(id) {
                self.selection = None;
            }
        }
        result?;
        Ok(true)
    }

    /// Paste placement in document space: the page and its visible part
    fn paste_target(&self) -> PasteTarget {
        let page = self.coords.intrinsic_size();
        let canvas = Rect::new(0.0, 0.0, page.width, page.height);
        let viewport = match self.coords.container() {
            Some(container) => self
                .coords
                .to_document_rect(Rect::new(
                    self.scroll.x,
                    self.scroll.y,
                    container.width,
                    container.height,
                ))
                .intersection(&canvas),
            None => canvas,
        };
        PasteTarget {
            page_number: self.current_page,
            canvas,
            viewport,
        }
    }
}

/// Page navigation, zoom and history controls for the host toolbar
pub struct PageControls<'a> {
    engine: &'a mut MarkupEngine,
}

impl PageControls<'_> {
    pub fn current_page(&self) -> u32 {
        self.engine.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.engine.total_pages
    }

    /// User zoom factor
    pub fn scale(&self) -> f64 {
        self.engine.coords.user_zoom()
    }

    pub fn render_scale(&self) -> f64 {
        self.engine.coords.render_scale()
    }

    pub fn next_page(&mut self) -> MarkupResult<bool> {
        self.engine.next_page()
    }

    pub fn prev_page(&mut self) -> MarkupResult<bool> {
        self.engine.prev_page()
    }

    pub fn zoom_in(&mut self) -> MarkupResult<ScaleChange> {
        self.engine.zoom_in()
    }

    pub fn zoom_out(&mut self) -> MarkupResult<ScaleChange> {
        self.engine.zoom_out()
    }

    pub fn reset_zoom(&mut self) -> MarkupResult<ScaleChange> {
        self.engine.reset_zoom()
    }

    pub fn undo(&mut self) -> MarkupResult<bool> {
        self.engine.undo()
    }

    pub fn redo(&mut self) -> MarkupResult<bool> {
        self.engine.redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationStyle, Size};
    use crate::surface::HeadlessSurface;

    struct FixedPage;

    impl PageRasterizer for FixedPage {
        fn render_page(
            &mut self,
            _page_number: u32,
            _render_scale: f64,
            _token: &crate::render_task::CancellationToken,
        ) -> Result<RasterizedPage, RasterError> {
            Ok(RasterizedPage {
                bitmap: Vec::new(),
                intrinsic_width: 612.0,
                intrinsic_height: 792.0,
                rotation: 0,
            })
        }
    }

    fn engine() -> (MarkupEngine, HeadlessSurface) {
        let surface = HeadlessSurface::new();
        let mut engine = MarkupEngine::new(EngineConfig::default(), Box::new(surface.clone()), 3)
            .with_author("reviewer");
        engine.set_container_size(2000.0, 2000.0).unwrap();
        engine.render_page_with(&mut FixedPage).unwrap();
        (engine, surface)
    }

    fn draw(engine: &mut MarkupEngine, from: Point, to: Point) -> Vec<Action> {
        let mut actions = engine.pointer_down(from);
        actions.extend(engine.pointer_move(to));
        actions.extend(engine.pointer_up(to));
        actions
    }

    #[test]
    fn drawing_creates_annotation_and_history() {
        let (mut engine, surface) = engine();
        engine.set_active_tool(Tool::Rectangle);
        draw(&mut engine, Point::new(10.0, 10.0), Point::new(110.0, 60.0));

        assert_eq!(engine.annotations().len(), 1);
        assert_eq!(surface.len(), 1);
        assert!(engine.can_undo());

        assert_eq!(engine.undo(), Ok(true));
        assert!(engine.annotations().is_empty());
        assert!(surface.is_empty());

        assert_eq!(engine.redo(), Ok(true));
        assert_eq!(engine.annotations().len(), 1);
    }

    #[test]
    fn shortcuts_are_ignored_while_editing_text() {
        let (mut engine, _surface) = engine();
        engine.set_active_tool(Tool::Text);
        engine.pointer_down(Point::new(50.0, 50.0));
        assert!(engine.is_text_editing());

        assert!(engine.key(Shortcut::Undo).is_empty());
        assert_eq!(engine.annotations().len(), 1);
    }

    #[test]
    fn copy_paste_selects_offset_copy() {
        let (mut engine, _surface) = engine();
        engine.set_active_tool(Tool::Rectangle);
        draw(&mut engine, Point::new(100.0, 100.0), Point::new(150.0, 150.0));
        let original = engine.selection().unwrap();

        assert!(engine.copy());
        let actions = engine.key(Shortcut::Paste);
        let pasted = engine.selection().unwrap();
        assert_ne!(pasted, original);
        assert!(actions.contains(&Action::AnnotationCreated(pasted)));
        assert_eq!(
            engine.annotation(pasted).unwrap().position,
            Point::new(120.0, 120.0)
        );
    }

    #[test]
    fn delete_removes_selection() {
        let (mut engine, surface) = engine();
        engine.set_active_tool(Tool::Arrow);
        draw(&mut engine, Point::new(10.0, 10.0), Point::new(80.0, 10.0));
        let id = engine.selection().unwrap();

        let actions = engine.key(Shortcut::Delete);
        assert!(actions.contains(&Action::AnnotationDeleted(id)));
        assert!(engine.annotation(id).is_none());
        assert!(surface.is_empty());

        engine.undo().unwrap();
        assert!(engine.annotation(id).is_some());
    }

    #[test]
    fn restyle_applies_to_selection() {
        let (mut engine, _surface) = engine();
        engine.set_active_tool(Tool::Rectangle);
        draw(&mut engine, Point::new(10.0, 10.0), Point::new(60.0, 60.0));
        let id = engine.selection().unwrap();

        let style = ToolStyle {
            color: crate::annotation::Color::BLUE,
            stroke_width: 4.0,
            ..ToolStyle::default()
        };
        let actions = engine.set_tool_style(style);
        assert!(actions.contains(&Action::AnnotationUpdated(id)));
        let record = engine.annotation(id).unwrap();
        assert_eq!(record.style.stroke_color, crate::annotation::Color::BLUE);
        assert_eq!(record.style.stroke_width, 4.0);
    }

    #[test]
    fn page_change_resets_page_state() {
        let (mut engine, surface) = engine();
        engine.set_active_tool(Tool::Rectangle);
        draw(&mut engine, Point::new(10.0, 10.0), Point::new(60.0, 60.0));

        assert_eq!(engine.page_controls().next_page(), Ok(true));
        assert_eq!(engine.current_page(), 2);
        assert!(surface.is_empty());
        assert!(!engine.can_undo());
        assert!(engine.selection().is_none());
        assert!(!engine.is_page_ready());

        engine.render_page_with(&mut FixedPage).unwrap();
        assert!(engine.annotations().is_empty());
        assert_eq!(engine.page_controls().prev_page(), Ok(true));
        engine.render_page_with(&mut FixedPage).unwrap();
        assert_eq!(surface.len(), 1);
        assert_eq!(engine.page_controls().prev_page(), Ok(false));
    }

    #[test]
    fn comments_are_appended_in_order() {
        let (mut engine, _surface) = engine();
        engine
            .load_annotations(vec![Annotation::new(
                AnnotationKind::Rectangle,
                1,
                Point::new(5.0, 5.0),
                Size::new(20.0, 20.0),
                AnnotationStyle::default(),
            )])
            .unwrap();
        let id = engine.annotations()[0].id;

        engine.add_comment(id, "ana", "first").unwrap();
        engine.add_comment(id, "ben", "second").unwrap();
        let comments = &engine.annotation(id).unwrap().comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].author, "ben");
        let missing = AnnotationId::new_v4();
        assert_eq!(
            engine.add_comment(missing, "x", "y"),
            Err(MarkupError::AnnotationNotFound(missing))
        );
        assert!(engine.can_undo());
    }

    #[test]
    fn stale_render_is_dropped() {
        let (mut engine, _surface) = engine();
        let now = Instant::now();
        let first = engine.request_page_render(now);
        let second = engine.request_page_render(now);

        let page = RasterizedPage {
            bitmap: Vec::new(),
            intrinsic_width: 612.0,
            intrinsic_height: 792.0,
            rotation: 0,
        };
        let stale = engine.on_page_rendered(&first, Ok(page.clone()), now);
        assert_eq!(stale, Err(MarkupError::RenderCanceled { page: 1 }));
        assert!(engine.on_page_rendered(&second, Ok(page), now).is_ok());
    }
}
