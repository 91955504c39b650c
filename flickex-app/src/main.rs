mod app;
mod cli;
mod display;
mod fatal;
mod input;
mod logging;

use anyhow::{Context, Result};
use app::{App, DisplaySettings, ExitStatus};
use clap::Parser;
use cli::Cli;
use flickex_cache::{ResourceCache, StimulusLayout};
use flickex_experiment::{Experiment, ProgressStore, ResultsExporter, RunConfig};
use flickex_image::PnmLoader;
use flickex_render::SkiaTextureFactory;
use flickex_timing::HighPrecisionTimer;

/// Exit code when the operator ends the run early.
const EXIT_ABORTED: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let logger = match logging::setup_logging(&cli.log_level, cli.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("failed to start logging: {err}");
            std::process::exit(1);
        }
    };

    match run(cli) {
        Ok(ExitStatus::Completed) => log::info!("run complete, results saved"),
        Ok(ExitStatus::Aborted) => {
            logger.flush();
            std::process::exit(EXIT_ABORTED);
        }
        Err(err) => fatal::report_and_exit(&err),
    }
}

fn run(cli: Cli) -> Result<ExitStatus> {
    let mut config = RunConfig::from_path(&cli.config)
        .with_context(|| format!("cannot load run configuration {}", cli.config.display()))?;
    if let Some(dir) = cli.results_dir {
        config.output.directory = dir;
    }

    let display = DisplaySettings {
        distance: config.distance,
        mirror: config.mirror_images,
        windowed: cli.windowed,
    };
    let layout = StimulusLayout::new(&config.folder, &config.extension);
    let loader = PnmLoader::new(config.channel_map());
    let polarity = config.polarity;
    let flicker = config.flicker;
    let resume = config.resume;
    let instructions = config.instructions.clone();
    let output = config.output.clone();

    let mut run = config.into_run().context("invalid run configuration")?;
    let progress = if resume {
        let store = ProgressStore::in_directory(&output.directory)?;
        store.resume(&mut run)?;
        Some(store)
    } else {
        None
    };

    let mut cache = ResourceCache::new(loader, SkiaTextureFactory::new(), layout, flicker);
    let screens = cache
        .load_screens(&instructions, "startscreen", "responsescreen")
        .context("cannot load instruction screens")?;

    let mut experiment = Experiment::new(
        HighPrecisionTimer::new(),
        run,
        polarity,
        cache,
        screens,
        ResultsExporter::new(output),
    )?;
    if let Some(store) = progress {
        experiment = experiment.with_progress(store);
    }

    App::new(experiment, display).run()
}
