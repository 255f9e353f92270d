//! # Schedule files
//!
//! Annealing schedules are short enough to maintain by hand, so they live in plain
//! text: one [`AnnealingStage`] record per line, eight whitespace-separated fields
//! (see [`crate::fit_config::annealing`] for the record grammar). Blank lines and
//! `#` comment lines are skipped, so a production schedule can document itself:
//!
//! ```text
//! # hot start: free the ambiguities, inflate variances
//! 0 0 1 10.0 0.1 10.0 1.0 1e-5
//! 1 0 1 2.0 0.05 10.0 1.0 1e-6
//! # final pass at nominal variance
//! 1 1 0 0.0 0.01 10.0 1.0 1e-6
//! ```
//!
//! Parsed stages carry no schedule position and no hit updaters; both are attached
//! when the schedule is handed to a [`FitParams`](crate::fit_config::FitParams)
//! constructor.

use camino::Utf8Path;

use crate::constants::AnnealingSchedule;
use crate::fit_config::annealing::AnnealingStage;
use crate::kinfit_errors::KinFitError;

/// Parse a whole schedule from text, one stage record per line.
///
/// Blank lines and lines starting with `#` are skipped. Any malformed record aborts
/// the parse; the error carries the 1-based line number of the offending record and
/// no partial schedule is returned.
pub fn parse_schedule(text: &str) -> Result<AnnealingSchedule, KinFitError> {
    let mut schedule = AnnealingSchedule::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let stage: AnnealingStage = line
            .parse()
            .map_err(|source| KinFitError::ParseStage {
                line: lineno + 1,
                source,
            })?;
        schedule.push(stage);
    }

    log::debug!("parsed annealing schedule with {} stages", schedule.len());
    Ok(schedule)
}

/// Read a schedule file.
///
/// Arguments
/// ---------
/// * `path`: path to a schedule text file.
///
/// Return
/// ------
/// * The parsed schedule, or a [`KinFitError`] for I/O and record failures.
pub fn read_schedule(path: &Utf8Path) -> Result<AnnealingSchedule, KinFitError> {
    let text = std::fs::read_to_string(path)?;
    parse_schedule(&text)
}
