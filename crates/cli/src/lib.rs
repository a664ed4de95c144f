use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markup_core::persistence::{load_annotations, save_annotations};
use markup_core::render_task::{CancellationToken, PageRasterizer, RasterError, RasterizedPage};
use markup_core::{
    Action, Annotation, EngineConfig, HeadlessSurface, JournalWriter, MarkupEngine, MarkupResult,
    Point, ScaleChange, Shortcut, Tool, ToolStyle,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Parser)]
#[command(name = "markup-cli")]
#[command(about = "Headless driver for the markup engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON gesture script and print the resulting annotations.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Engine configuration file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Annotation sidecar to load before replaying.
        #[arg(long)]
        load: Option<PathBuf>,
        /// Append one JSON line per store change to this file.
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Write the final annotations to this sidecar file.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print the effective engine configuration.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

/// A gesture script: page geometry plus the input events to replay
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: [f64; 2],
    #[serde(default = "default_container")]
    pub container: [f64; 2],
    #[serde(default)]
    pub author: Option<String>,
    pub steps: Vec<Step>,
}

fn default_pages() -> u32 {
    1
}

fn default_page_size() -> [f64; 2] {
    [612.0, 792.0]
}

fn default_container() -> [f64; 2] {
    [1200.0, 1200.0]
}

/// One replayed input event; coordinates are view pixels
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Tool { tool: Tool },
    Style { style: ToolStyle },
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    /// Down, move and up in one step
    Drag { from: [f64; 2], to: [f64; 2] },
    Key { key: Shortcut },
    Type { text: String },
    FinishText,
    Zoom { zoom: f64 },
    ZoomIn,
    ZoomOut,
    Page { page: u32 },
    /// Select the n-th annotation of the current page, or clear with `null`
    Select { index: Option<usize> },
    Comment { index: usize, author: String, text: String },
    /// Advance the replay clock
    Wait { ms: u64 },
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    page: u32,
    scale: f64,
    zoom: f64,
    undo_depth: usize,
    redo_depth: usize,
    annotations: Vec<Annotation>,
    errors: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Replay {
            script,
            config,
            load,
            journal,
            save,
        } => run_replay(
            &script,
            config.as_deref(),
            load.as_deref(),
            journal.as_deref(),
            save.as_deref(),
        ),
        Commands::Config { config } => run_config(config.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Defaults, then the optional file, then `MARKUP_*` overrides
fn effective_config(path: Option<&Path>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config
        .apply_env()
        .context("invalid MARKUP_* environment override")?;
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn run_config(path: Option<&Path>) -> Result<()> {
    let config = effective_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_replay(
    script_path: &Path,
    config: Option<&Path>,
    load: Option<&Path>,
    journal: Option<&Path>,
    save: Option<&Path>,
) -> Result<()> {
    let config = effective_config(config)?;
    let json = fs::read_to_string(script_path)
        .with_context(|| format!("failed to read script {}", script_path.display()))?;
    let script: Script = serde_json::from_str(&json)
        .with_context(|| format!("invalid script {}", script_path.display()))?;

    let mut engine = MarkupEngine::new(config, Box::new(HeadlessSurface::new()), script.pages);
    if let Some(author) = script.author.clone() {
        engine = engine.with_author(author);
    }

    if let Some(path) = load {
        let records = load_annotations(path)
            .with_context(|| format!("failed to load annotations from {}", path.display()))?
            .unwrap_or_default();
        engine.load_annotations(records)?;
    }

    if let Some(path) = journal {
        let file = File::create(path)
            .with_context(|| format!("failed to create journal {}", path.display()))?;
        let writer = Rc::new(RefCell::new(JournalWriter::new(BufWriter::new(file))));
        engine.subscribe(JournalWriter::listener(writer));
    }

    let output = replay(&mut engine, &script)?;

    if let Some(path) = save {
        save_annotations(path, engine.store())
            .with_context(|| format!("failed to write annotations to {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn replay(engine: &mut MarkupEngine, script: &Script) -> Result<ReplayOutput> {
    let mut rasterizer = BlankPages {
        width: script.page_size[0],
        height: script.page_size[1],
    };
    let mut now = Instant::now();
    let mut errors = Vec::new();

    engine.set_container_size(script.container[0], script.container[1])?;
    render(engine, &mut rasterizer, now).context("initial page render failed")?;

    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(index, ?step, "replaying step");
        let actions = match apply(engine, &mut rasterizer, step, &mut now) {
            Ok(actions) => actions,
            Err(error) => {
                errors.push(format!("step {index}: {error}"));
                continue;
            }
        };
        for action in actions {
            if let Action::Error(error) = action {
                errors.push(format!("step {index}: {error}"));
            }
        }
    }

    let history = engine.history();
    Ok(ReplayOutput {
        page: engine.current_page(),
        scale: engine.render_scale(),
        zoom: engine.user_zoom(),
        undo_depth: history.undo_len(),
        redo_depth: history.redo_len(),
        annotations: engine.annotations().into_iter().cloned().collect(),
        errors,
    })
}

fn apply(
    engine: &mut MarkupEngine,
    rasterizer: &mut BlankPages,
    step: &Step,
    now: &mut Instant,
) -> MarkupResult<Vec<Action>> {
    let at = *now;
    let actions = match step {
        Step::Tool { tool } => engine.set_active_tool_at(*tool, at),
        Step::Style { style } => engine.set_tool_style(style.clone()),
        Step::Down { x, y } => engine.pointer_down_at(Point::new(*x, *y), at),
        Step::Move { x, y } => engine.pointer_move_at(Point::new(*x, *y), at),
        Step::Up { x, y } => engine.pointer_up_at(Point::new(*x, *y), at),
        Step::Drag { from, to } => {
            let mut actions = engine.pointer_down_at(Point::new(from[0], from[1]), at);
            actions.extend(engine.pointer_move_at(Point::new(to[0], to[1]), at));
            actions.extend(engine.pointer_up_at(Point::new(to[0], to[1]), at));
            actions
        }
        Step::Key { key } => engine.key_at(*key, at),
        Step::Type { text } => engine.text_input(text),
        Step::FinishText => engine.finish_text_edit_at(at),
        Step::Zoom { zoom } => {
            let change = engine.set_zoom(*zoom)?;
            rerender(engine, rasterizer, change, at)?
        }
        Step::ZoomIn => {
            let change = engine.zoom_in()?;
            rerender(engine, rasterizer, change, at)?
        }
        Step::ZoomOut => {
            let change = engine.zoom_out()?;
            rerender(engine, rasterizer, change, at)?
        }
        Step::Page { page } => {
            if engine.go_to_page(*page)? {
                render(engine, rasterizer, at)?;
            }
            Vec::new()
        }
        Step::Select { index } => {
            let id = match index {
                Some(index) => engine.annotations().get(*index).map(|record| record.id),
                None => None,
            };
            engine.select_at(id, at)
        }
        Step::Comment {
            index,
            author,
            text,
        } => {
            if let Some(id) = engine.annotations().get(*index).map(|record| record.id) {
                engine.add_comment(id, author.clone(), text.clone())?;
            }
            Vec::new()
        }
        Step::Wait { ms } => {
            *now += Duration::from_millis(*ms);
            engine.on_frame(*now)?;
            Vec::new()
        }
    };
    Ok(actions)
}

fn render(
    engine: &mut MarkupEngine,
    rasterizer: &mut BlankPages,
    now: Instant,
) -> MarkupResult<ScaleChange> {
    let ticket = engine.request_page_render(now);
    let result = rasterizer.render_page(ticket.page_number, ticket.render_scale, ticket.token());
    engine.on_page_rendered(&ticket, result, now)
}

fn rerender(
    engine: &mut MarkupEngine,
    rasterizer: &mut BlankPages,
    change: ScaleChange,
    now: Instant,
) -> MarkupResult<Vec<Action>> {
    if change.is_changed() {
        render(engine, rasterizer, now)?;
        return Ok(vec![Action::RenderNeeded]);
    }
    Ok(Vec::new())
}

/// Rasterizer stand-in reporting a fixed page size and no pixels
struct BlankPages {
    width: f64,
    height: f64,
}

impl PageRasterizer for BlankPages {
    fn render_page(
        &mut self,
        _page_number: u32,
        _render_scale: f64,
        token: &CancellationToken,
    ) -> Result<RasterizedPage, RasterError> {
        if token.is_cancelled() {
            return Err(RasterError::Canceled);
        }
        Ok(RasterizedPage {
            bitmap: Vec::new(),
            intrinsic_width: self.width,
            intrinsic_height: self.height,
            rotation: 0,
        })
    }
}
