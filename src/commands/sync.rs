use std::process::ExitCode;

use ade_sync_core::{SyncEngine, SyncError};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::warn;

use super::{Output, Setup};
use crate::render::{Render, ResultRender};
use crate::utils::tui;

/// Exit status of a run interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn run(setup: Setup, output: Output) -> Result<ExitCode> {
    let engine = SyncEngine::from_settings(&setup.config.sync);

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight requests");
            cancel.cancel();
        }
    });

    let spinner = tui::create_spinner(setup.window.render(), output.verbose || output.json);
    let result = engine
        .run(&setup.source, setup.destination.clone(), &setup.window)
        .await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(SyncError::RunCancelled) => {
            eprintln!("{}", "Cancelled before any change was made".yellow());
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(err) => return Err(err).context("Sync failed"),
    };

    if output.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", setup.window.render());
        println!("{}", result.render(output.verbose));
    }

    if result.has_failures() {
        Ok(ExitCode::FAILURE)
    } else if result.summary.skipped > 0 {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
