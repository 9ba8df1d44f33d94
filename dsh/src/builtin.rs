//! Commands the shell runs itself instead of spawning a program.

use crate::limits::EXIT_CMD;
use std::io::{self, Write};

/// Banner printed by `dragon`.
pub const DRAGON: &[u8] = include_bytes!("../assets/dragon.txt");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Cd,
    Rc,
    Dragon,
}

/// What the calling loop should do after a line ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Mutable state carried across lines of one shell or session.
#[derive(Debug, Default, Clone)]
pub struct ShellState {
    /// Result of the most recent pipeline or built-in.
    pub last_rc: i32,
}

/// Output streams for a built-in running in the calling process.
pub struct Console<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl Builtin {
    pub fn classify(name: &str) -> Option<Builtin> {
        match name {
            EXIT_CMD => Some(Builtin::Exit),
            "cd" => Some(Builtin::Cd),
            "rc" => Some(Builtin::Rc),
            "dragon" => Some(Builtin::Dragon),
            _ => None,
        }
    }

    /// Runs in the calling process. `args` excludes the command name.
    pub fn run(self, args: &[String], state: &mut ShellState, con: &mut Console<'_>) -> io::Result<Flow> {
        match self {
            Builtin::Exit => return Ok(Flow::Exit),
            Builtin::Cd => {
                if let [dir] = args {
                    state.last_rc = change_dir(dir, con.err)?;
                }
            }
            Builtin::Rc => {
                writeln!(con.out, "{}", state.last_rc)?;
                state.last_rc = 0;
            }
            Builtin::Dragon => {
                print_dragon(con.out)?;
                state.last_rc = 0;
            }
        }
        con.out.flush()?;
        Ok(Flow::Continue)
    }

    /// Body of a built-in that landed inside a spawned stage. Returns the
    /// child's exit status; nothing here touches the parent's state.
    pub(crate) fn run_in_child(self, last_rc: i32, out: &mut dyn Write) -> i32 {
        let res = match self {
            Builtin::Exit | Builtin::Cd => Ok(()),
            Builtin::Rc => writeln!(out, "{last_rc}"),
            Builtin::Dragon => print_dragon(out),
        };
        match res.and_then(|_| out.flush()) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }
}

/// Changes the calling process's directory; returns the status to record.
pub fn change_dir(dir: &str, err: &mut dyn Write) -> io::Result<i32> {
    match std::env::set_current_dir(dir) {
        Ok(()) => Ok(0),
        Err(e) => {
            writeln!(err, "Error in cd: {}", os_message(&e))?;
            Ok(e.raw_os_error().unwrap_or(1))
        }
    }
}

pub fn print_dragon(out: &mut dyn Write) -> io::Result<()> {
    out.write_all(DRAGON)?;
    out.write_all(b"\n")
}

// io::Error's Display appends "(os error N)"; the shell prints the bare text.
pub(crate) fn os_message(e: &io::Error) -> String {
    let text = e.to_string();
    match text.rfind(" (os error") {
        Some(i) => text[..i].to_string(),
        None => text,
    }
}
