//! Buttons command: list the keys of a device's remote file.

use serde::Serialize;
use tabled::Tabled;

use zmote_core::CodeCache;

use crate::cli::{DeviceArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Button {
    key: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    toggle: Option<String>,
}

#[derive(Tabled)]
struct ButtonRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Toggle")]
    toggle: String,
    #[tabled(rename = "Code")]
    code: String,
}

impl From<&Button> for ButtonRow {
    fn from(b: &Button) -> Self {
        Self {
            key: b.key.clone(),
            toggle: if b.toggle.is_some() { "yes" } else { "" }.into(),
            code: abbreviate(&b.code, 40),
        }
    }
}

fn abbreviate(code: &str, max: usize) -> String {
    match code.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &code[..idx]),
        None => code.to_owned(),
    }
}

pub fn handle(args: &DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;
    let device = util::resolve_device(&cfg, args.device.as_deref(), global)?;
    let path = device.config.require_config_file()?;

    let cache = CodeCache::open(path)?;
    let buttons: Vec<Button> = cache
        .entries()?
        .into_iter()
        .map(|(key, code)| Button {
            key,
            code: code.main().to_owned(),
            toggle: code.alternate().map(str::to_owned),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &buttons,
        |b| ButtonRow::from(b),
        |b| b.key.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::abbreviate;

    #[test]
    fn abbreviates_long_codes() {
        assert_eq!(abbreviate("38000,1,1", 40), "38000,1,1");
        assert_eq!(abbreviate("38000,1,1", 5), "38000...");
    }
}
