use std::collections::HashMap;
use std::fs;

use tracing::warn;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ipfs_gateway: String,
    /// Bound on the block-confirmation wait; `None` waits indefinitely.
    pub confirmation_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ipfs_gateway: mint_core::DEFAULT_IPFS_GATEWAY.to_string(),
            confirmation_timeout_secs: Some(120),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("gallery.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("ipfs_gateway") {
                settings.ipfs_gateway = v.clone();
            }
            if let Some(v) = file_cfg.get("confirmation_timeout_secs") {
                apply_timeout(&mut settings, v);
            }
        }
    }

    if let Ok(v) = std::env::var("GALLERY__IPFS_GATEWAY") {
        settings.ipfs_gateway = v;
    }
    if let Ok(v) = std::env::var("GALLERY__CONFIRMATION_TIMEOUT_SECS") {
        apply_timeout(&mut settings, &v);
    }

    if Url::parse(&settings.ipfs_gateway).is_err() {
        warn!(
            gateway = %settings.ipfs_gateway,
            "invalid ipfs gateway; falling back to the default"
        );
        settings.ipfs_gateway = mint_core::DEFAULT_IPFS_GATEWAY.to_string();
    }

    settings
}

fn apply_timeout(settings: &mut Settings, raw: &str) {
    if let Ok(parsed) = raw.parse::<u64>() {
        settings.confirmation_timeout_secs = if parsed == 0 { None } else { Some(parsed) };
    }
}
