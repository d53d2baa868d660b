use indicatif::{ProgressBar, ProgressStyle};

/// Spinner on stderr while a slow step runs. Hidden in verbose mode, where
/// the debug log already shows progress.
pub fn create_spinner(message: String, verbose: bool) -> ProgressBar {
    if verbose {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["-", "\\", "|", "/"])
            .template("{msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
