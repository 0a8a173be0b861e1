use std::{fs, path::Path};

use serde::Deserialize;
use shared::domain::PageSize;
use tracing::warn;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_SETTINGS_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub default_page_size: PageSize,
    pub sort_prediction_years: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 10,
            default_page_size: PageSize::Fifteen,
            sort_prediction_years: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    default_page_size: Option<u32>,
    sort_prediction_years: Option<bool>,
}

/// Defaults, then `dashboard.toml` in the working directory, then the environment.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable settings file"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.default_page_size {
        set_page_size(settings, v);
    }
    if let Some(v) = file_cfg.sort_prediction_years {
        settings.sort_prediction_years = v;
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DASHBOARD_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("APP__DEFAULT_PAGE_SIZE") {
        if let Ok(parsed) = v.trim().parse::<u32>() {
            set_page_size(settings, parsed);
        }
    }

    if let Some(v) = lookup("APP__SORT_PREDICTION_YEARS") {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => settings.sort_prediction_years = true,
            "0" | "false" | "no" => settings.sort_prediction_years = false,
            _ => {}
        }
    }
}

fn set_page_size(settings: &mut ClientSettings, raw: u32) {
    match PageSize::try_from(raw) {
        Ok(size) => settings.default_page_size = size,
        Err(error) => warn!(%error, "keeping default page size"),
    }
}

/// Parses the service base URL so relative endpoint joins keep any path prefix.
pub fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let raw = raw.trim();
    let raw = if raw.is_empty() {
        ClientSettings::default().api_base_url
    } else {
        raw.to_string()
    };

    let with_scheme = if raw.contains("://") {
        raw
    } else {
        format!("http://{raw}")
    };
    let with_slash = if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    };

    let url = Url::parse(&with_slash)
        .map_err(|err| ClientError::Config(format!("invalid api base url '{with_slash}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "unsupported api base url scheme '{other}'"
        ))),
    }
}
