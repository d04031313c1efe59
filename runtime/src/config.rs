//! Pass configuration.
//!
//! The compile cache never looks inside a [`PassConfig`]; it is forwarded to
//! the [`PassManager`](crate::passes::PassManager), which decides per pass
//! whether it runs and hands it the string attributes.

use std::collections::BTreeMap;

use bon::bon;

/// Per-pass enable flags and free-form string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassConfig {
    enables: BTreeMap<String, bool>,
    attributes: BTreeMap<String, String>,
}

#[bon]
impl PassConfig {
    /// Create a pass configuration with builder pattern.
    #[builder]
    pub fn new(
        #[builder(default)] enables: BTreeMap<String, bool>,
        #[builder(default)] attributes: BTreeMap<String, String>,
    ) -> Self {
        Self { enables, attributes }
    }
}

impl PassConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_PASS_ENABLES` - `Name:1;Other:0` (a bare `Name` enables it)
    /// * `KILN_PASS_ATTRIBUTES` - `Key=Value;Other=Value`
    pub fn from_env() -> Self {
        let enables = std::env::var("KILN_PASS_ENABLES").map(|s| parse_enables(&s)).unwrap_or_default();
        let attributes = std::env::var("KILN_PASS_ATTRIBUTES").map(|s| parse_attributes(&s)).unwrap_or_default();
        Self { enables, attributes }
    }

    /// Whether `pass` should run; passes not mentioned fall back to `default`.
    pub fn is_enabled(&self, pass: &str, default: bool) -> bool {
        self.enables.get(pass).copied().unwrap_or(default)
    }

    pub fn set_enabled(&mut self, pass: impl Into<String>, enabled: bool) {
        self.enables.insert(pass.into(), enabled);
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn enables(&self) -> &BTreeMap<String, bool> {
        &self.enables
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Parse `Name:1;Other:0`. Values `0`, `false`, `off` disable; anything else enables.
pub fn parse_enables(raw: &str) -> BTreeMap<String, bool> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, value)) => {
                let disabled = matches!(value.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off");
                (name.trim().to_string(), !disabled)
            }
            None => (entry.to_string(), true),
        })
        .collect()
}

/// Parse `Key=Value;Other=Value`. Entries without `=` are ignored.
pub fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
