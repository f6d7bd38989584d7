//! Tunables for the terminal chart/log viewer.

/// How many of the most recent raw log lines to keep around for the scrollback pane.
pub const SCROLLBACK_LINES: usize = 1000;

/// Longest log line kept verbatim; longer lines are truncated.
pub const MAX_LINE_LENGTH: usize = 500;
