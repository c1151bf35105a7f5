//! Config subcommand handlers.

use zmote_config::{Config, DeviceProfile};

use crate::cli::{AddDeviceArgs, ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&util::config_file(global).display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => show(global),
        ConfigCommand::Add(add) => add_device(add, global),
    }
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;
    let out = match global.output {
        OutputFormat::Json => output::render_json(&cfg, false),
        OutputFormat::JsonCompact => output::render_json(&cfg, true),
        OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

fn add_device(args: AddDeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_file(global);
    let mut cfg: Config = util::load(global)?;

    let profile = DeviceProfile {
        uuid: args.uuid.trim().to_owned(),
        url: args.url,
        config_file: args.remote_file,
        remote: args.remote,
        retry: args.retry,
        timeout: args.device_timeout,
    };
    zmote_config::profile_to_zmote_config(&profile, &cfg.defaults)?;

    let replaced = cfg.devices.insert(args.name.clone(), profile).is_some();
    if args.default || cfg.default_device.is_none() {
        cfg.default_device = Some(args.name.clone());
    }
    zmote_config::save_config_to(&cfg, &path)?;

    let verb = if replaced { "Updated" } else { "Added" };
    output::print_output(
        &format!("{verb} device '{}' in {}", args.name, path.display()),
        global.quiet,
    );
    Ok(())
}
