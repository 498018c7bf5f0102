//! Manoir CLI - graph checks, route planning and dry runs
//!
//! Real screen capture and input injection live outside this crate. `run`
//! wires a dry-run input port and a frame matcher fed from still
//! screenshots so a configuration can be exercised end to end.

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use env_logger::Env;
use image::RgbaImage;

use manoir_pilot::clock::SystemClock;
use manoir_pilot::config::{GraphFile, Settings};
use manoir_pilot::engine::Engine;
use manoir_pilot::persist::JsonFileStore;
use manoir_pilot::ports::{
    DryRunInput, FrameVision, Match, Point, VisionError, VisionPort, WindowId,
};
use manoir_pilot::EngineContext;

#[derive(Parser)]
#[command(name = "manoir")]
#[command(about = "State-graph navigation and scheduling for emulator windows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a graph file and list its issues
    Check { graph: PathBuf },
    /// Print the route between two states
    Plan {
        graph: PathBuf,
        from: String,
        to: String,
    },
    /// Run the engine against still screenshots, without sending input
    Run {
        settings: PathBuf,
        graph: PathBuf,
        /// Screenshot shown by a window, repeatable
        #[arg(long = "frame", value_name = "WINDOW=PNG")]
        frames: Vec<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Check { graph } => check(&graph),
        Command::Plan { graph, from, to } => plan(&graph, &from, &to),
        Command::Run {
            settings,
            graph,
            frames,
        } => run(&settings, &graph, &frames),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path) -> Result<(), Box<dyn Error>> {
    let (graph, errors, issues) = GraphFile::load(path)?.into_parts()?;
    println!(
        "{}: {} states, {} transitions, {} known errors",
        path.display(),
        graph.states().len(),
        graph.transitions().len(),
        errors.len()
    );
    if issues.is_empty() {
        println!("No issues found");
    } else {
        for issue in &issues {
            println!("  - {}", issue);
        }
    }
    Ok(())
}

fn plan(path: &Path, from: &str, to: &str) -> Result<(), Box<dyn Error>> {
    let (graph, _, _) = GraphFile::load(path)?.into_parts()?;
    let route = graph.find_path(from, to)?;
    if route.is_empty() {
        println!("Already in '{}'", to);
        return Ok(());
    }
    for (step, &id) in route.transitions.iter().enumerate() {
        if let Some(transition) = graph.transition(id) {
            println!("{:>2}. {}", step + 1, transition.label);
        }
    }
    if !route.complete {
        println!("    ... continues after re-detection");
    }
    Ok(())
}

fn run(settings_path: &Path, graph_path: &Path, frames: &[String]) -> Result<(), Box<dyn Error>> {
    let settings = Settings::load(settings_path)?;
    let (graph, errors, _) = GraphFile::load(graph_path)?.into_parts()?;

    let mut matcher = FrameVision::new();
    if let Some(dir) = &settings.template_dir {
        matcher = matcher.with_template_dir(dir.clone());
    }
    let mut vision = StillFrames::new(matcher);
    for arg in frames {
        let (window, path) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected WINDOW=PNG, got '{}'", arg))?;
        vision.show(WindowId::new(window), image::open(path)?.to_rgba8());
    }

    let store = JsonFileStore::new(settings.data_dir.clone());
    let ctx = EngineContext::new(
        settings,
        graph,
        errors,
        Box::new(vision),
        Box::new(DryRunInput::new()),
        Arc::new(SystemClock),
        Box::new(store),
    );
    let mut engine = Engine::from_settings(ctx);

    let control = engine.control();
    ctrlc::set_handler(move || {
        log::info!("Stop requested");
        control.request_stop();
    })?;

    let result = engine.run();
    println!("{}", serde_json::to_string_pretty(&engine.statuses())?);
    result?;
    Ok(())
}

/// Feeds the same screenshot back after every invalidation, standing in
/// for a live capture
struct StillFrames {
    matcher: FrameVision,
    stills: HashMap<WindowId, RgbaImage>,
}

impl StillFrames {
    fn new(matcher: FrameVision) -> Self {
        Self {
            matcher,
            stills: HashMap::new(),
        }
    }

    fn show(&mut self, window: WindowId, frame: RgbaImage) {
        self.matcher.update_image(&window, frame.clone());
        self.stills.insert(window, frame);
    }
}

impl VisionPort for StillFrames {
    fn find_image(
        &mut self,
        window: &WindowId,
        template: &str,
        threshold: f32,
    ) -> Result<Option<Match>, VisionError> {
        self.matcher.find_image(window, template, threshold)
    }

    fn find_text(&mut self, window: &WindowId, text: &str) -> Result<Option<Point>, VisionError> {
        self.matcher.find_text(window, text)
    }

    fn invalidate(&mut self, window: &WindowId) {
        if let Some(frame) = self.stills.get(window) {
            self.matcher.update_image(window, frame.clone());
        }
    }
}
