//! Latent Worker Provisioning Demo
//!
//! Provisions a worker through Grid Engine or HTCondor, runs a few
//! start/stop cycles, and shows the native specification submitted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use drover_demos::{
    create_progress_bar, print_block, print_header, print_info, print_result, print_section,
    print_success, print_warning,
};
use drover_drm::{MockDrm, SchedulerSession};
use drover_latent::tracing_config::init_tracing;
use drover_latent::{
    DroverConfig, GridEngineOptions, HtCondorOptions, LatentError, LatentWorker, VariantConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Gridengine,
    Htcondor,
}

#[derive(Parser, Debug)]
#[command(name = "demo-provision")]
#[command(about = "Provision latent workers through a batch scheduler")]
struct Args {
    /// Scheduler dialect
    #[arg(long, value_enum, default_value = "htcondor")]
    variant: Variant,

    /// Worker name
    #[arg(short, long, default_value = "demo-worker")]
    name: String,

    /// Command started on the execution node
    #[arg(long, default_value = "/opt/worker/bin/start-worker")]
    command: String,

    /// Seconds the job may wait unscheduled
    #[arg(short, long, default_value = "1200")]
    missing_timeout: u64,

    /// Number of start/stop cycles
    #[arg(short, long, default_value = "3")]
    cycles: u64,

    /// Load settings from a YAML file instead of the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the real DRMAA library instead of the in-memory scheduler
    #[arg(long)]
    drmaa: bool,

    /// Raise the configured log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(args: &Args) -> anyhow::Result<DroverConfig> {
    if let Some(path) = &args.config {
        return DroverConfig::load(Some(path.as_path()))
            .with_context(|| format!("loading {}", path.display()));
    }

    // Flags take precedence over DROVER_* variables.
    let mut config = DroverConfig::default().merge_env();
    config.worker.name = args.name.clone();
    config.worker.start_command = args.command.clone();
    config.worker.missing_timeout_secs = args.missing_timeout;
    config.variant = match args.variant {
        Variant::Gridengine => VariantConfig::GridEngine(GridEngineOptions::default()),
        Variant::Htcondor => VariantConfig::HtCondor(HtCondorOptions::default()),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;

    if let Err(e) = init_tracing(config.tracing().with_verbosity(args.verbose)) {
        eprintln!("tracing disabled: {e}");
    }

    print_header("Latent Worker Provisioning Demo");

    let session = if args.drmaa {
        config.open_session()
    } else {
        Arc::new(SchedulerSession::new(Arc::new(MockDrm::new())))
    };

    print_section("Setup");
    print_result("Scheduler client", session.client_name());
    print_result("Variant", config.variant.kind());
    print_result("Worker", &config.worker.name);
    print_result("Missing timeout", format!("{}s", config.worker.missing_timeout_secs));

    let worker_session = Arc::clone(&session);
    let worker_config = config.clone();
    let mut worker = tokio::task::spawn_blocking(move || {
        LatentWorker::from_config(worker_session, &worker_config)
    })
    .await??;

    print_result("Contact", session.contact().unwrap_or_default());

    print_section("Native Specification");
    print_block(&worker.native_specification());

    print_section("Provisioning Cycles");
    let pb = create_progress_bar(args.cycles, "cycling");
    let mut job_ids = Vec::new();
    for _ in 0..args.cycles {
        let job_id = worker.start().await?;
        pb.set_message(format!("job {job_id}"));
        match worker.stop(false).await {
            Ok(()) => {}
            Err(LatentError::TerminationFailed { job_id, message }) => {
                pb.suspend(|| print_warning(&format!("job {job_id}: {message}")));
            }
            Err(e) => return Err(e.into()),
        }
        job_ids.push(job_id);
        pb.inc(1);
    }
    pb.finish_and_clear();

    for (cycle, job_id) in job_ids.iter().enumerate() {
        print_result(&format!("Cycle {}", cycle + 1), job_id);
    }

    println!();
    print_success(&format!("{} provisioning cycles completed", job_ids.len()));
    if !args.drmaa {
        print_info("Ran against the in-memory scheduler; pass --drmaa to use libdrmaa");
    }

    Ok(())
}
