use std::process::ExitCode;

use ade_sync_core::SyncEngine;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use super::{Output, Setup};
use crate::render::{PlanRender, Render};
use crate::utils::tui;

pub async fn run(setup: Setup, output: Output) -> Result<ExitCode> {
    let engine = SyncEngine::from_settings(&setup.config.sync);

    let spinner = tui::create_spinner(setup.window.render(), output.verbose || output.json);
    let plan = engine
        .plan(&setup.source, setup.destination.as_ref(), &setup.window)
        .await;
    spinner.finish_and_clear();

    let plan = plan.context("Failed to compute changes")?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", setup.window.render());
    println!("{}", plan.render(output.verbose));
    if !plan.is_empty() {
        println!("\n{}", "Run `ade-ga-sync sync` to apply.".dimmed());
    }

    Ok(ExitCode::SUCCESS)
}
