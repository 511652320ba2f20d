use serde::Deserialize;

/// Settings for a [`Registrate`](crate::Registrate) host.
///
/// Deserializable so a host can read it from its own config file; missing
/// fields fall back to [`RegistrateConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrateConfig {
    /// Namespace of every entry id this host declares.
    pub mod_id: String,
    /// Locale of the lang provider the host hands out.
    pub locale: String,
}

impl RegistrateConfig {
    pub fn new(mod_id: impl Into<String>) -> Self {
        Self {
            mod_id: mod_id.into(),
            ..Self::default()
        }
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

impl Default for RegistrateConfig {
    fn default() -> Self {
        Self {
            mod_id: "registrate".to_string(),
            locale: "en_us".to_string(),
        }
    }
}
