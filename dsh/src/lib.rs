//! Command-pipeline execution engine: parse a line into stages, wire them
//! with pipes and file redirections, spawn them and collect the last stage's
//! status.

pub mod builtin;
pub mod capture;
pub mod config;
pub mod error;
pub mod exec;
pub mod limits;
pub mod parser;
pub mod shell;

pub use builtin::{Builtin, Console, Flow, ShellState};
pub use capture::CaptureChannel;
pub use error::{ExecError, ParseError};
pub use exec::{launch, spawn, Endpoints, Launch, Running, Termination};
pub use parser::{parse_line, Pipeline, Stage};
pub use shell::Shell;
