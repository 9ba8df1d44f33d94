//! Compile-time bounds shared by the parser and the executor.

/// Maximum number of stages in one pipeline.
pub const MAX_STAGES: usize = 8;
/// An executable name must be strictly shorter than this.
pub const EXE_MAX: usize = 64;
/// The combined argument text of a stage must be strictly shorter than this.
pub const ARG_MAX: usize = 256;

pub const PIPE_CHAR: char = '|';
pub const QUOTE_CHAR: char = '"';

pub const EXIT_CMD: &str = "exit";
pub const SH_PROMPT: &str = "dsh4> ";

/// Exit status of `dsh -c` when the line does not parse.
pub const PARSE_ERROR_STATUS: i32 = 3;
