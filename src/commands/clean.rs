//! Clean step: remove the preset's output directory.

use crate::artifacts::{CleanOutcome, clean_preset, format_size};
use crate::commands::session::Session;
use crate::error::Result;

pub fn clean(session: &Session) -> Result<CleanOutcome> {
    let settings = session.settings();
    let console = session.console();
    let preset = &settings.preset;

    console.warning(format!("Cleaning build artifacts for preset: {preset}"));

    let outcome = clean_preset(&settings.project_root, preset)?;
    match outcome {
        CleanOutcome::Removed(bytes) => {
            console.success(format!("Cleaned: out/{preset}"));
            console.verbose(1, format!("Reclaimed {}", format_size(bytes)));
        }
        CleanOutcome::Missing => {
            console.info(format!("Nothing to clean (out/{preset} doesn't exist)"));
        }
    }

    Ok(outcome)
}
