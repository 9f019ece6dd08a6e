//! Process exit codes
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success: workbook written |
//! | 1 | Failure: bad input, bad config, render or IO error |
//! | 2 | Usage: missing or invalid arguments, nothing written |

use std::process;

/// Exit codes of `fechou-report`.
///
/// These are stable API for scripts that call the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    Usage = 2,
}

impl ExitCode {
    /// Get the numeric value
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code())
    }
}
