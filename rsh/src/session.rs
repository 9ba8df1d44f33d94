//! One connected peer: receive a line, run it, stream the output back,
//! terminate the response, repeat.

use crate::frame::{decode_request, send_eof, send_message, COMM_BUFF_SZ, MSG_CLIENT_EXIT, MSG_STOP_SERVER, STOP_SERVER_CMD};
use dsh::limits::EXIT_CMD;
use dsh::{launch, parse_line, CaptureChannel, Console, Endpoints, Flow, Launch, Pipeline, ShellState};
use std::io::{self, Read, Write};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("peer closed the connection")]
    Disconnected,
    #[error("communication error: {0}")]
    Io(#[from] io::Error),
}

/// Why a session finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent `exit`; keep serving other connections.
    ClientExit,
    /// The peer sent `stop-server`; the whole server should halt.
    StopServer,
}

enum State {
    AwaitLine,
    Dispatch(String),
    Terminate(SessionEnd),
}

pub struct Session<S> {
    stream: S,
    buf: Vec<u8>,
    shell: ShellState,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Session { stream, buf: vec![0u8; COMM_BUFF_SZ], shell: ShellState::default() }
    }

    pub fn last_rc(&self) -> i32 {
        self.shell.last_rc
    }

    pub fn run(&mut self) -> Result<SessionEnd, SessionError> {
        let mut state = State::AwaitLine;
        loop {
            state = match state {
                State::AwaitLine => State::Dispatch(self.receive()?),
                State::Dispatch(line) => self.dispatch(&line)?,
                State::Terminate(end) => return Ok(end),
            };
        }
    }

    fn receive(&mut self) -> Result<String, SessionError> {
        loop {
            match self.stream.read(&mut self.buf) {
                Ok(0) => return Err(SessionError::Disconnected),
                Ok(n) => return Ok(decode_request(&self.buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<State, SessionError> {
        debug!(line, "received command");
        match line.trim() {
            STOP_SERVER_CMD => {
                send_message(&mut self.stream, MSG_STOP_SERVER)?;
                return Ok(State::Terminate(SessionEnd::StopServer));
            }
            EXIT_CMD => {
                send_message(&mut self.stream, MSG_CLIENT_EXIT)?;
                return Ok(State::Terminate(SessionEnd::ClientExit));
            }
            _ => {}
        }
        match parse_line(line) {
            Ok(pipeline) => self.run_pipeline(pipeline),
            Err(e) => {
                send_message(&mut self.stream, &format!("{e}\n"))?;
                Ok(State::AwaitLine)
            }
        }
    }

    fn run_pipeline(&mut self, pipeline: Pipeline) -> Result<State, SessionError> {
        let mut capture = match CaptureChannel::open() {
            Ok(c) => c,
            Err(e) => {
                self.shell.last_rc = e.status();
                send_message(&mut self.stream, &format!("{e}\n"))?;
                return Ok(State::AwaitLine);
            }
        };
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let ends = match capture.sink() {
            Some(fd) => Endpoints::inherit().stdout(fd),
            None => Endpoints::inherit(),
        };
        let launched = launch(pipeline, ends, &mut self.shell, &mut Console { out: &mut out, err: &mut err });
        self.stream.write_all(&out)?;
        self.stream.write_all(&err)?;
        match launched {
            Ok(Launch::Done(Flow::Continue)) => {}
            Ok(Launch::Done(Flow::Exit)) => {
                send_message(&mut self.stream, MSG_CLIENT_EXIT)?;
                return Ok(State::Terminate(SessionEnd::ClientExit));
            }
            Ok(Launch::Spawned(running)) => {
                let forwarded = capture.forward_to(&mut self.stream);
                // children still writing see EPIPE instead of blocking
                drop(capture);
                let term = running.wait();
                self.shell.last_rc = term.status();
                if let Err(e) = forwarded {
                    warn!(error = %e, "failed to forward command output");
                    return Err(e.into());
                }
                term.report(&mut self.stream)?;
            }
            Err(e) => {
                self.shell.last_rc = e.status();
                self.stream.write_all(format!("{e}\n").as_bytes())?;
            }
        }
        send_eof(&mut self.stream)?;
        Ok(State::AwaitLine)
    }
}
