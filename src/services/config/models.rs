use serde::{Deserialize, Serialize};

/// How `get_url` materializes a locator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrlMode {
    /// `data:<mime>;base64,<payload>`
    #[default]
    DataUrl,
    /// `blob:nyafile/<uuid>`, owned by the record and revoked on reload.
    ObjectUrl,
}

/// Representation a pinned key is derived into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    /// A URL, following the store's `UrlMode`.
    #[default]
    DataUrl,
    Text,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub identifier: String,
    pub url_mode: UrlMode,
    pub default_pin_kind: PinKind,
    /// Fixed seed for candidate selection. `None` uses the thread RNG.
    pub seed: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            identifier: "default".into(),
            url_mode: UrlMode::DataUrl,
            default_pin_kind: PinKind::DataUrl,
            seed: None,
        }
    }
}

impl StoreConfig {
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}
