pub mod status;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use ade_sync_core::{Configuration, IcsFeedSource, TimeWindow};
use ade_sync_google::{FileCredentialStore, GoogleCalendar};
use anyhow::{Context, Result};
use tracing::debug;

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub verbose: bool,
    pub json: bool,
}

/// Everything a command needs: the validated configuration, the window and
/// both adapters.
pub struct Setup {
    pub config: Configuration,
    pub window: TimeWindow,
    pub source: IcsFeedSource,
    pub destination: Arc<GoogleCalendar>,
}

impl Setup {
    pub fn load(config_path: Option<&Path>, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let config = Configuration::load(config_path).context("Failed to load configuration")?;
        debug!(path = %config.path.display(), "Loaded configuration");

        let window = config.sync.window(from, to)?;
        let source = IcsFeedSource::from_settings(&config.ade)?;

        let tokens = Arc::new(FileCredentialStore::from_settings(&config.google));
        let destination = GoogleCalendar::new(
            config.google.calendar_id.clone(),
            tokens,
            config.google.timeout,
        )?;

        Ok(Setup {
            config,
            window,
            source,
            destination: Arc::new(destination),
        })
    }
}
