//! tt - tiptour CLI
//!
//! Validates, records, stores and plays tooltip workflows against an HTML
//! page loaded in memory. Results go to stdout as JSON, logs to stderr.

mod script;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tiptour::error::{Error, ErrorCode};
use tiptour::prelude::*;
use tiptour::workflow::completion::complete_or_fallback;
use tiptour::workflow::{storage, Mode, WorkflowError};

use script::Script;
use settings::Settings;

/// Clock step while running on wall time, so Ctrl+C is noticed promptly.
const REALTIME_STEP_MS: Millis = 50;

#[derive(Parser)]
#[command(name = "tt")]
#[command(about = "tiptour - cursor-following tooltips and replayable workflows")]
#[command(version)]
struct Cli {
    /// Settings file (default: ~/.tiptour/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Workflow storage directory
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Guide,
    Auto,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Guide => Mode::Guide,
            ModeArg::Auto => Mode::Auto,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    // === Workflow documents ===
    /// Check a workflow document
    Validate { file: PathBuf },
    /// Save a workflow document after validating it
    Import { file: PathBuf },
    /// Print a stored workflow
    Export {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored workflows
    List,
    /// Summarize a stored workflow
    Show {
        id: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a stored workflow
    Delete { id: String },

    // === Page runs ===
    /// Play a workflow (stored id or file) against a page
    Play {
        workflow: String,
        #[arg(long)]
        page: PathBuf,
        /// Scripted user input, one JSON event per line
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Give up after this many ms of page time
        #[arg(long, default_value = "60000")]
        limit: Millis,
        /// Run on the wall clock instead of virtual time
        #[arg(long)]
        realtime: bool,
    },
    /// Record button clicks from a scripted session
    Record {
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        script: PathBuf,
        #[arg(long, default_value = "workflow")]
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        /// Store the recording
        #[arg(long)]
        save: bool,
    },
    /// Report `data-tip` hover targets for a scripted session
    Hover {
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        script: PathBuf,
    },
    /// Smooth a sequence of pointer samples ("x,y")
    Smooth {
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        friction: Option<f64>,
        #[arg(required = true)]
        points: Vec<String>,
    },

    // === Assistant ===
    /// Ask the completion endpoint a question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Interactive guided tours: one command per stdin line, `click <css>` to press
    Guide {
        #[arg(long)]
        page: PathBuf,
        /// Tours file (JSON list); defaults to the demo tours
        #[arg(long)]
        tours: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

/// Structured form of any command failure.
fn structured(e: &anyhow::Error) -> Error {
    if let Some(err) = e.downcast_ref::<Error>() {
        return err.clone();
    }
    match e.downcast_ref::<WorkflowError>() {
        Some(WorkflowError::Invalid(errors)) => {
            Error::invalid_document("workflow failed validation")
                .with_context(serde_json::json!({ "errors": errors }))
        }
        Some(WorkflowError::Core(err)) => err.clone(),
        _ => Error::new(ErrorCode::Unknown, format!("{:#}", e)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Settings::load(cli.config.as_deref()).and_then(|settings| {
        let ctx = Ctx { settings, dir: cli.dir };
        run(&ctx, cli.command)
    });

    if let Err(e) = result {
        let _ = print_json(&Output::<()>::err(structured(&e)));
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

struct Ctx {
    settings: Settings,
    dir: Option<PathBuf>,
}

impl Ctx {
    fn storage(&self) -> Result<WorkflowStorage> {
        match self.dir.as_ref().or(self.settings.workflows_dir.as_ref()) {
            Some(dir) => WorkflowStorage::with_dir(dir),
            None => WorkflowStorage::new(),
        }
    }

    fn page(&self, path: &Path, realtime: bool) -> Result<Page> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("reading page {}", path.display()))?;
        let doc = Document::from_html(&html);
        let page = if realtime { Page::realtime(doc) } else { Page::headless(doc) };
        let v = &self.settings.viewport;
        Ok(page
            .with_viewport(v.width, v.height)
            .with_url(&format!("file://{}", path.display())))
    }

    /// A path to an existing file, otherwise a stored id.
    fn workflow(&self, which: &str) -> Result<Workflow> {
        let path = Path::new(which);
        if path.is_file() {
            return read_workflow(path);
        }
        let wf = self.storage()?.load(which)?;
        let report = validate(&serde_json::to_value(&wf)?);
        if !report.ok {
            return Err(WorkflowError::Invalid(report.errors).into());
        }
        Ok(wf)
    }
}

/// Parses and validates a workflow file.
fn read_workflow(path: &Path) -> Result<Workflow> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Workflow::from_json(&text)?)
}

fn run(ctx: &Ctx, command: Commands) -> Result<()> {
    match command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Import { file } => cmd_import(ctx, &file),
        Commands::Export { id, output } => cmd_export(ctx, &id, output.as_deref()),
        Commands::List => cmd_list(ctx),
        Commands::Show { id, all } => cmd_show(ctx, &id, all),
        Commands::Delete { id } => cmd_delete(ctx, &id),
        Commands::Play { workflow, page, script, mode, limit, realtime } => {
            cmd_play(ctx, &workflow, &page, script.as_deref(), mode, limit, realtime)
        }
        Commands::Record { page, script, id, name, save } => {
            cmd_record(ctx, &page, &script, &id, name.as_deref(), save)
        }
        Commands::Hover { page, script } => cmd_hover(ctx, &page, &script),
        Commands::Smooth { radius, friction, points } => cmd_smooth(ctx, radius, friction, &points),
        Commands::Ask { question } => cmd_ask(ctx, &question.join(" ")),
        Commands::Guide { page, tours } => cmd_guide(ctx, &page, tours.as_deref()),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
//  Documents
// ══════════════════════════════════════════════════════════════════════════════

fn cmd_validate(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::invalid_document(format!("{}: {}", file.display(), e)))?;
    let report = validate(&doc);
    print_json(&Output::ok(&report))?;
    if !report.ok {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_import(ctx: &Ctx, file: &Path) -> Result<()> {
    let wf = read_workflow(file)?;
    let path = ctx.storage()?.save(&wf)?;
    print_json(&Output::ok(serde_json::json!({ "id": wf.id, "path": path })))
}

fn cmd_export(ctx: &Ctx, id: &str, output: Option<&Path>) -> Result<()> {
    let wf = ctx.storage()?.load(id)?;
    let text = storage::to_json(&wf)?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Exported {} to {}", id, path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn cmd_list(ctx: &Ctx) -> Result<()> {
    let ids = ctx.storage()?.list()?;
    print_json(&Output::ok(ids))
}

#[derive(Serialize)]
struct Summary<'a> {
    id: &'a str,
    name: Option<&'a str>,
    steps: usize,
    by_type: std::collections::BTreeMap<&'static str, usize>,
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a [Step]>,
}

fn cmd_show(ctx: &Ctx, id: &str, all: bool) -> Result<()> {
    let wf = ctx.storage()?.load(id)?;
    let mut by_type = std::collections::BTreeMap::new();
    for step in &wf.steps {
        *by_type.entry(step.kind.as_str()).or_insert(0) += 1;
    }
    let report = tiptour::workflow::validate_workflow(&wf);
    print_json(&Output::ok(Summary {
        id: &wf.id,
        name: wf.name.as_deref(),
        steps: wf.steps.len(),
        by_type,
        valid: report.ok,
        errors: report.errors,
        detail: all.then_some(wf.steps.as_slice()),
    }))
}

fn cmd_delete(ctx: &Ctx, id: &str) -> Result<()> {
    ctx.storage()?.delete(id)?;
    print_json(&Output::ok(serde_json::json!({ "deleted": id })))
}

// ══════════════════════════════════════════════════════════════════════════════
//  Page runs
// ══════════════════════════════════════════════════════════════════════════════

fn load_script(path: Option<&Path>) -> Result<Script> {
    let events = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            script::parse(&text)?
        }
        None => Vec::new(),
    };
    Ok(Script::new(events))
}

/// Flag flipped by Ctrl+C.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;
    Ok(running)
}

#[derive(Serialize)]
struct PlayReport {
    workflow: String,
    state: PlayerState,
    stats: PlayStats,
    elapsed_ms: Millis,
    script_events: usize,
}

fn cmd_play(
    ctx: &Ctx,
    which: &str,
    page_path: &Path,
    script_path: Option<&Path>,
    mode: Option<ModeArg>,
    limit: Millis,
    realtime: bool,
) -> Result<()> {
    let wf = ctx.workflow(which)?;
    let mut page = ctx.page(page_path, realtime)?;
    let mut script = load_script(script_path)?;

    let mut config = ctx.settings.player.clone();
    if let Some(m) = mode {
        config.mode = m.into();
    }
    let mut player = Player::new(&mut page, wf, config)?;
    let running = if realtime { Some(interrupt_flag()?) } else { None };
    if realtime {
        eprintln!("Playing {} (Ctrl+C to stop)", player.workflow().display_name());
    }

    let start = page.now();
    script.arm(&mut page);
    player.play(&mut page);

    let mut lp = EventLoop::new();
    if realtime {
        lp = lp.with_max_step(REALTIME_STEP_MS);
    }
    let horizon = start.saturating_add(limit);
    lp.run_until(&mut page, &mut [&mut player, &mut script], horizon, |_| {
        running.as_ref().is_some_and(|r| !r.load(Ordering::SeqCst))
    });
    if player.state() == PlayerState::Playing {
        player.stop(&mut page);
    }

    print_json(&Output::ok(PlayReport {
        workflow: player.workflow().id.clone(),
        state: player.state(),
        stats: player.stats().clone(),
        elapsed_ms: page.now().saturating_sub(start),
        script_events: script.applied(),
    }))
}

fn cmd_record(
    ctx: &Ctx,
    page_path: &Path,
    script_path: &Path,
    id: &str,
    name: Option<&str>,
    save: bool,
) -> Result<()> {
    let mut page = ctx.page(page_path, false)?;
    let mut script = load_script(Some(script_path))?;
    let mut recorder = Recorder::new();

    recorder.start();
    script.arm(&mut page);
    let mut lp = EventLoop::new();
    while !script.is_done() && !page.has_navigated() {
        let Some(next) = page.scheduler().next_deadline() else {
            break;
        };
        lp.run_until(&mut page, &mut [&mut recorder, &mut script], next, |_| false);
    }
    lp.run_until_idle(&mut page, &mut [&mut recorder, &mut script]);
    recorder.stop();

    let wf = recorder.get_workflow(id, name);
    if save {
        let path = ctx.storage()?.save(&wf)?;
        eprintln!("Saved: {}", path.display());
    }
    print_json(&Output::ok(wf))
}

fn cmd_hover(ctx: &Ctx, page_path: &Path, script_path: &Path) -> Result<()> {
    let mut page = ctx.page(page_path, false)?;
    let mut script = load_script(Some(script_path))?;
    let mut tracker = HoverTracker::new();

    script.arm(&mut page);
    let mut lp = EventLoop::new();
    let mut updates = Vec::new();
    while !script.is_done() {
        let Some(next) = page.scheduler().next_deadline() else {
            break;
        };
        lp.run_until(&mut page, &mut [&mut tracker, &mut script], next, |_| false);
        updates.extend(page.take_notifications().into_iter().map(|n| n.detail));
    }
    lp.run_until_idle(&mut page, &mut [&mut tracker, &mut script]);
    updates.extend(page.take_notifications().into_iter().map(|n| n.detail));

    print_json(&Output::ok(updates))
}

#[derive(Serialize)]
struct SmoothSample {
    pointer: Point,
    smooth: Point,
    distance: f64,
    has_moved: bool,
}

fn parse_point(s: &str) -> Result<Point> {
    let (x, y) = s
        .split_once(',')
        .with_context(|| format!("expected x,y but got {:?}", s))?;
    Ok(Point::new(
        x.trim().parse().with_context(|| format!("bad x in {:?}", s))?,
        y.trim().parse().with_context(|| format!("bad y in {:?}", s))?,
    ))
}

fn cmd_smooth(ctx: &Ctx, radius: Option<f64>, friction: Option<f64>, points: &[String]) -> Result<()> {
    let tooltip = &ctx.settings.player.tooltip;
    let mut cursor = SmoothCursor::new(CursorConfig {
        radius: radius.unwrap_or(tooltip.smooth_radius),
        friction: friction.unwrap_or(tooltip.friction),
        ..CursorConfig::default()
    });
    let mut samples = Vec::with_capacity(points.len());
    for raw in points {
        let p = parse_point(raw)?;
        let has_moved = cursor.update(p, UpdateOptions::default());
        samples.push(SmoothSample {
            pointer: p,
            smooth: cursor.smooth_position(),
            distance: cursor.distance(),
            has_moved,
        });
    }
    print_json(&Output::ok(samples))
}

// ══════════════════════════════════════════════════════════════════════════════
//  Assistant
// ══════════════════════════════════════════════════════════════════════════════

fn cmd_ask(ctx: &Ctx, question: &str) -> Result<()> {
    let client = ChatCompletionClient::new(ctx.settings.completion.clone())?;
    if !client.check_connection() {
        tracing::warn!("{} did not answer the models probe", client.config().endpoint);
    }
    let answer = complete_or_fallback(&client, question);
    print_json(&Output::ok(serde_json::json!({ "question": question, "answer": answer })))
}

fn cmd_guide(ctx: &Ctx, page_path: &Path, tours: Option<&Path>) -> Result<()> {
    let registry = match tours {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TourRegistry::from_tours(serde_json::from_str(&text)?)
        }
        None => TourRegistry::demo(),
    };
    let mut page = ctx.page(page_path, false)?;
    let mut tooltip = TooltipController::new(&mut page, ctx.settings.player.tooltip.clone())?;
    let client = ChatCompletionClient::new(ctx.settings.completion.clone())?;
    let mut handler = CommandHandler::new(registry, client);
    let running = interrupt_flag()?;

    eprintln!("Type a command (Ctrl+D to quit), `click <css>` to press an element");
    for line in io::stdin().lock().lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let reply = match input.strip_prefix("click ") {
            Some(css) => {
                let Some(el) = page.document().query_selector(css.trim())? else {
                    eprintln!("nothing matches {}", css.trim());
                    continue;
                };
                let path = page.document().path(el);
                match handler.advance_on_click(&mut page, &mut tooltip, el, &path) {
                    Some(reply) => reply,
                    None => continue,
                }
            }
            None => handler.respond(&mut page, &mut tooltip, input),
        };
        EventLoop::new().run_until_idle(&mut page, &mut [&mut tooltip]);
        print_json(&Output::ok(serde_json::json!({
            "reply": reply,
            "tour": handler.current_tour().map(|t| t.id.as_str()),
            "step": handler.current_step().map(|s| s.target.as_str()),
        })))?;
    }
    Ok(())
}
