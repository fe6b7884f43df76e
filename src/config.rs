//! Runtime configuration, optionally read from a TOML file.
//!
//! ```toml
//! request_delay_ms = 2000
//! checkpoint_every = 25
//! images_dir = "data/images"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Challenge page; the id is passed as the `ci` query parameter.
    pub page_url: String,
    /// Slide bundle endpoint holding the challenge images.
    pub media_url: String,
    pub user_agent: String,
    pub referer: String,
    pub timeout_secs: u64,
    /// Pause between two consecutive fetches.
    pub request_delay_ms: u64,
    /// Save the store after this many merged challenges. 0 saves only at the end.
    pub checkpoint_every: usize,
    pub images_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_url: "https://www.nejm.org/image-challenge".into(),
            media_url: "https://csvc.nejm.org/ContentServer/images".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .into(),
            referer: "https://www.nejm.org/".into(),
            timeout_secs: 15,
            request_delay_ms: 1000,
            checkpoint_every: 10,
            images_dir: PathBuf::from("images"),
        }
    }
}

impl Config {
    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("couldn't read {}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
