//! Check command: ask a device for its UUID.

use serde::Serialize;

use crate::cli::{DeviceArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct CheckResult {
    device: String,
    uuid: String,
    url: String,
    online: bool,
}

pub async fn handle(args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;
    let device = util::resolve_device(&cfg, args.device.as_deref(), global)?;
    let config = util::locate(&cfg, device.config).await?;

    let service = util::transmit_service(&config);
    service.register(&config)?;
    let online = service.check_online(&config).await;
    service.shutdown();
    let online = online?;

    let result = CheckResult {
        device: device.name,
        url: config.url().unwrap_or_default().to_owned(),
        uuid: config.uuid,
        online,
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| {
            format!(
                "{} ({}) at {} is {}",
                r.device,
                r.uuid,
                r.url,
                output::status_label(r.online, color)
            )
        },
        |r| output::status_label(r.online, false),
    );
    output::print_output(&out, global.quiet);

    if result.online {
        Ok(())
    } else {
        Err(CliError::Communication {
            message: format!("Device '{}' did not answer at {}", result.uuid, result.url),
        })
    }
}
