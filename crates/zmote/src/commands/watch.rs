//! Watch command: background discovery, one line per event until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;

use zmote_core::{DiscoveryEvent, DiscoveryRegistry};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::util::load(global)?;
    let registry = DiscoveryRegistry::new(cfg.discovery_config());

    let mut events = registry.events();
    registry.start_background();
    tracing::info!("background discovery started, press Ctrl-C to stop");

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => match event {
                Ok(event) => output::print_output(&render(&event, &global.output), global.quiet),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    registry.stop().await;
    Ok(())
}

fn render(event: &DiscoveryEvent, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Table | OutputFormat::Plain => match event {
            DiscoveryEvent::Started => "discovery started".into(),
            DiscoveryEvent::DeviceDiscovered { device } => format!("found    {device}"),
            DiscoveryEvent::Finished { found, error: None } => {
                format!("discovery finished, {found} device(s)")
            }
            DiscoveryEvent::Finished {
                found,
                error: Some(error),
            } => format!("discovery failed after {found} device(s): {error}"),
        },
    }
}
