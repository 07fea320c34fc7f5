use std::cell::Cell;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::{ArgAction, Parser};
use editor::{EditorConfig, ModelEvent, VideoEditorModel};
use engine::{MainLoop, Pipeline, path_to_uri};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Joins media clips into one timestamped MP4 render.
#[derive(Debug, Parser)]
#[command(name = "reel", version)]
struct Cli {
    /// JSON config file; defaults to the per-user config when present.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory receiving the rendered file.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Print model events as JSON lines on stdout.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Clips to join, as paths or file:// uris.
    #[arg(required = true, value_name = "CLIPS")]
    clips: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("reel: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let mut config = EditorConfig::load_or_default(cli.config.as_deref())?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    fs::create_dir_all(&config.output_dir)?;
    debug!(?config, "configuration resolved");

    let mut main_loop = MainLoop::new();
    let mut model = VideoEditorModel::new(Pipeline::with_ffmpeg(), config, main_loop.handle());

    let succeeded = Rc::new(Cell::new(false));
    {
        let succeeded = Rc::clone(&succeeded);
        let quit = main_loop.handle();
        let json = cli.json;
        model.subscribe(move |event| {
            report(event, json);
            match event {
                ModelEvent::RenderComplete => {
                    succeeded.set(true);
                    quit.quit();
                }
                ModelEvent::Error(_) => quit.quit(),
                _ => {}
            }
        });
    }

    for clip in &cli.clips {
        let uri = clip_uri(clip)?;
        if !model.append(&uri) {
            return Err(format!("could not add clip {clip}").into());
        }
    }

    if !model.render() {
        return Ok(ExitCode::FAILURE);
    }
    main_loop.run(&mut model);

    Ok(if succeeded.get() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Keeps uris as given and turns paths into absolute `file://` uris.
fn clip_uri(clip: &str) -> std::io::Result<String> {
    if clip.contains("://") {
        return Ok(clip.to_string());
    }
    Ok(path_to_uri(&std::path::absolute(Path::new(clip))?))
}

fn report(event: &ModelEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(error) => warn!(%error, "failed to encode event"),
        }
        return;
    }

    match event {
        ModelEvent::ProgressChanged(progress) => println!("progress {:5.1}%", progress * 100.0),
        ModelEvent::RenderComplete => println!("render complete"),
        ModelEvent::Error(error) => eprintln!("{}: {}", error.kind.category(), error.message),
        other => debug!(event = ?other, "model event"),
    }
}
