use crate::limits::MAX_STAGES;
use thiserror::Error;

/// Rejections produced while turning a line into a [`crate::parser::Pipeline`].
///
/// The `Display` text is the one-line diagnostic shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("warning: no commands provided")]
    NoCommands,
    #[error("error: piping limited to {MAX_STAGES} commands")]
    TooManyStages,
    #[error("error: command or arguments exceeded size limits")]
    CmdOrArgsTooBig,
    #[error("error: empty command in pipeline")]
    EmptyStage,
    #[error("error: missing file name after redirection")]
    MissingRedirectTarget,
    #[error("error: command line contains a NUL byte")]
    NulByte,
}

/// Resource failures while building or supervising a pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("error: command execution failed: pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("error: command execution failed: fork: {0}")]
    Fork(#[source] nix::Error),
    #[error("error: command execution failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Status recorded as the pipeline result when execution aborts.
    pub fn status(&self) -> i32 {
        match self {
            ExecError::Pipe(e) | ExecError::Fork(e) => *e as i32,
            ExecError::Io(e) => e.raw_os_error().unwrap_or(1),
        }
    }
}
