//! CLI Exit Code Registry
//!
//! Every exit code the `tvmerge` binary can return is defined here.
//! Cron jobs and wrapper scripts branch on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                      |
//! |------|--------------------------------------------------------------|
//! | 0    | Success (failed sources and unmatched channels are not errors) |
//! | 1    | General error (unspecified)                                  |
//! | 2    | Usage error (bad arguments, unreadable input file)           |
//! | 3    | Configuration could not be read, parsed or validated         |
//! | 4    | Lineup or playlist could not be loaded, or is empty          |
//! | 5    | Guide or report could not be written                         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable input file.
pub const EXIT_USAGE: u8 = 2;

/// Config file missing, not valid TOML, or rejected by validation.
pub const EXIT_CONFIG: u8 = 3;

/// Lineup or playlist unavailable, malformed, or without channels.
pub const EXIT_LINEUP: u8 = 4;

/// Output guide, report or log file could not be written.
pub const EXIT_OUTPUT: u8 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE, EXIT_CONFIG, EXIT_LINEUP, EXIT_OUTPUT];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
