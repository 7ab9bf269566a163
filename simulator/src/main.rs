use anyhow::Context;
use clap::Parser;
use compcore::geometry::calibrate_geometry;
use compcore::interface::{AveragingMethod, Header};
use compcore::telemetry::LogManager;
use compcore::WaveType;
use generator::profile::SyntheticSource;
use output::writer::JsonProductSink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod output;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Quick-invert driver for synthetic coronal polarimeter observations")]
struct Args {
    /// Observing date (YYYYMMDD); repeat for several dates
    #[arg(long = "date")]
    dates: Vec<String>,
    /// Spectral line: 1074, 1079 or 1083
    #[arg(long, default_value_t = 1074)]
    wave_type: u32,
    /// Averaging method of the input: mean or median
    #[arg(long, default_value = "median")]
    method: String,
    /// Reduce the synoptic program instead of the waves program
    #[arg(long, default_value_t = false)]
    synoptic: bool,
    /// Input stacks are synthesized from a denser scan
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Load the run from a YAML workflow config instead of the flags above
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Calibrate the geometry of a synthetic raw frame and print it
    #[arg(long, default_value_t = false)]
    calibrate: bool,
    /// Dates reduced concurrently
    #[arg(long)]
    jobs: Option<usize>,
}

impl Args {
    fn workflow(&self) -> anyhow::Result<WorkflowConfig> {
        let mut config = match &self.config {
            Some(path) => WorkflowConfig::load(path)?,
            None => WorkflowConfig {
                dates: self.dates.clone(),
                wave_types: vec![WaveType::try_from(self.wave_type)?],
                methods: vec![self.method.parse::<AveragingMethod>()?],
                synoptic: self.synoptic,
                synthetic: self.synthetic,
                ..Default::default()
            },
        };
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        Ok(config)
    }
}

fn calibrate(config: &WorkflowConfig) -> anyhow::Result<()> {
    let ctx = config.load_context()?;
    let (frame, flat) = generator::template::raw_frame(&ctx, &config.generator)?;
    let calibration = calibrate_geometry(&ctx, frame.view(), &flat, &LogManager::for_file("synthetic raw frame"))
        .context("calibrating synthetic frame")?;

    let mut header = Header::new();
    calibration.model.to_header(&mut header, ctx.beam_size);
    println!("{}", serde_json::to_string_pretty(&calibration.model)?);
    for card in header.cards() {
        println!("{:<8} = {}", card.key, card.value.as_string());
    }
    for warning in &calibration.notes.warnings {
        log::warn!("{warning}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.workflow()?;

    if args.calibrate {
        return calibrate(&config);
    }

    let requests = config.requests();
    if requests.is_empty() {
        anyhow::bail!("nothing to reduce: pass --date or list dates in the workflow config");
    }

    let ctx = config.load_context()?;
    let source = Arc::new(SyntheticSource::new(ctx.clone(), config.generator.clone()));
    let sink = Arc::new(JsonProductSink::new(&config.output)?);
    let runner = Runner::new(ctx, config.options.clone(), source, sink.clone());

    let runtime = TokioBuilder::new_multi_thread()
        .worker_threads(config.jobs.max(1))
        .enable_all()
        .build()
        .context("creating reduction runtime")?;

    let summary = runtime.block_on(async {
        tokio::select! {
            summary = runner.run_all(requests, config.jobs) => Ok(summary),
            interrupted = signal::ctrl_c() => {
                interrupted.context("awaiting Ctrl+C")?;
                log::warn!("interrupted; files in progress finish but no new ones start");
                let mut summary = output::model::RunSummary {
                    metrics: runner.metrics().snapshot(),
                    ..Default::default()
                };
                summary.interrupted = true;
                Ok::<_, anyhow::Error>(summary)
            }
        }
    })?;

    let path = sink.write_summary(&summary)?;
    println!(
        "Reduced {} / failed {} / skipped {} ({} warnings) -> {}",
        summary.metrics.processed,
        summary.metrics.failed,
        summary.metrics.skipped,
        summary.metrics.warnings,
        path.display()
    );
    for failure in &summary.failures {
        eprintln!("{}: {:?}: {}", failure.input, failure.kind, failure.message);
    }
    Ok(())
}
