//! sippcap: turn a SIP packet capture into a pair of SIPp scenarios

mod config;
mod logging;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sippcap_capture::CaptureReader;
use sippcap_scenario::{Event, Role, ScenarioGenerator};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Args;
use crate::logging::setup_logging;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = setup_logging(&args.logging_config()) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = args.settings()?;
    let input = args.input_file;

    let data = tokio::fs::read(&input)
        .await
        .with_context(|| format!("reading capture {}", input.display()))?;
    let packets = CaptureReader::from_bytes(data)
        .packets()
        .with_context(|| format!("parsing capture {}", input.display()))?;
    info!("read {} SIP messages from {}", packets.len(), input.display());

    let generator = Arc::new(ScenarioGenerator::new(settings));
    let events = generator.split_roles(&packets)?;

    let uac = spawn_role(Arc::clone(&generator), Role::Uac, events.caller);
    let uas = spawn_role(Arc::clone(&generator), Role::Uas, events.callee);
    let (uac, uas) = tokio::try_join!(uac, uas).context("scenario task failed")?;
    let pair = generator.pair(uac?, uas?);

    let output_dir = generator.settings().output_dir.clone();
    let paths = tokio::task::spawn_blocking(move || pair.write_to(&output_dir))
        .await
        .context("writer task failed")??;

    for path in paths {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

// one blocking task per role
fn spawn_role(
    generator: Arc<ScenarioGenerator>,
    role: Role,
    events: Vec<Event>,
) -> JoinHandle<sippcap_scenario::Result<Vec<u8>>> {
    tokio::task::spawn_blocking(move || {
        let document = generator.build_document(role, &events)?;
        info!(role = %role, bytes = document.len(), "scenario built");
        Ok(document)
    })
}
