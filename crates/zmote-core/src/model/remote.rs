// ── Remote configuration document ──
//
// Serde model of the JSON remote files exported for zmote devices:
// `{ "brand", "model", "name", "keys": [ { "key", "name", "code", "tcode" } ] }`.
// Every field is optional on input; validation happens when the code
// cache is built.

use serde::{Deserialize, Serialize};

/// A parsed remote configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteDocument {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "keys")]
    pub buttons: Option<Vec<ButtonEntry>>,
}

/// One button of a remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ButtonEntry {
    /// Button identifier used for lookups.
    #[serde(default)]
    pub key: Option<String>,
    /// Display name chosen by the user.
    #[serde(default)]
    pub name: Option<String>,
    /// Main infrared code.
    #[serde(default)]
    pub code: Option<String>,
    /// Toggle code sent on every other press.
    #[serde(default)]
    pub tcode: Option<String>,
}

impl RemoteDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn buttons(&self) -> &[ButtonEntry] {
        self.buttons.as_deref().unwrap_or_default()
    }
}

/// Normalize a button key for lookup: trimmed and lowercased.
/// Returns `None` for blank keys.
pub fn normalize_key(key: &str) -> Option<String> {
    let trimmed = key.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
