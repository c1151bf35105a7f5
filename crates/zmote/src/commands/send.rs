//! send-key / send-code handlers.

use zmote_core::ZmoteConfig;

use crate::cli::{GlobalOpts, SendCodeArgs, SendKeyArgs};
use crate::error::CliError;
use crate::output;

use super::util;

async fn prepare(device: &str, global: &GlobalOpts) -> Result<(String, ZmoteConfig), CliError> {
    let cfg = util::load(global)?;
    let resolved = util::resolve_device(&cfg, Some(device), global)?;
    let config = util::locate(&cfg, resolved.config).await?;
    Ok((resolved.name, config))
}

pub async fn handle_key(args: SendKeyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (name, config) = prepare(&args.device, global).await?;

    let service = util::transmit_service(&config);
    service.register(&config)?;
    let sent = service.send_key(&config, &args.button, args.repeat).await;
    service.shutdown();

    if !sent? {
        return Err(CliError::ButtonNotFound {
            button: args.button,
            device: name,
        });
    }

    output::print_output(&format!("Sent {} to {name}", args.button), global.quiet);
    Ok(())
}

pub async fn handle_code(args: SendCodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (name, config) = prepare(&args.device, global).await?;

    let service = util::transmit_service(&config);
    service.register(&config)?;
    let sent = service.send_code(&config, &args.code, args.repeat).await;
    service.shutdown();
    sent?;

    output::print_output(&format!("Sent code to {name}"), global.quiet);
    Ok(())
}
