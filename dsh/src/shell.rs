//! Per-line step of the terminal loop.

use crate::builtin::{Console, Flow, ShellState};
use crate::exec::execute;
use crate::limits::PARSE_ERROR_STATUS;
use crate::parser::{parse_line, Pipeline};
use std::io;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Shell {
    state: ShellState,
}

impl Shell {
    pub fn new() -> Self {
        Shell::default()
    }

    pub fn last_rc(&self) -> i32 {
        self.state.last_rc
    }

    /// Parses and runs one line on the inherited stdio. Diagnostics go to
    /// stderr; a parse error leaves the recorded status untouched.
    pub fn run_line(&mut self, line: &str) -> Flow {
        match parse_line(line) {
            Ok(pipeline) => self.run_pipeline(pipeline),
            Err(e) => {
                eprintln!("{e}");
                Flow::Continue
            }
        }
    }

    /// Runs `line` as a whole non-interactive invocation and returns the
    /// process exit status; a line that does not parse is [`PARSE_ERROR_STATUS`].
    pub fn run_command(&mut self, line: &str) -> i32 {
        match parse_line(line) {
            Ok(pipeline) => {
                self.run_pipeline(pipeline);
                self.state.last_rc
            }
            Err(e) => {
                eprintln!("{e}");
                PARSE_ERROR_STATUS
            }
        }
    }

    fn run_pipeline(&mut self, pipeline: Pipeline) -> Flow {
        debug!(stages = pipeline.len(), "parsed line");
        let (mut out, mut err) = (io::stdout(), io::stderr());
        let mut con = Console { out: &mut out, err: &mut err };
        match execute(pipeline, &mut self.state, &mut con) {
            Ok(flow) => flow,
            Err(e) => {
                eprintln!("{e}");
                self.state.last_rc = e.status();
                Flow::Continue
            }
        }
    }
}
