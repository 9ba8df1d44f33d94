#![allow(dead_code)]
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const LIMIT: Duration = Duration::from_secs(20);

pub struct Outcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn dsh_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dsh"));
    cmd.env_remove("DSH_LOG");
    cmd
}

/// `dsh -c <line>`
pub fn run_line(line: &str) -> Outcome {
    let mut cmd = dsh_command();
    cmd.arg("-c").arg(line);
    finish(cmd, None)
}

/// Feeds `script` to dsh's stdin, one command per line.
pub fn run_script(script: &str, cwd: Option<&Path>) -> Outcome {
    run_script_bytes(script.as_bytes(), cwd)
}

pub fn run_script_bytes(script: &[u8], cwd: Option<&Path>) -> Outcome {
    let mut cmd = dsh_command();
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    finish(cmd, Some(script))
}

fn finish(mut cmd: Command, stdin: Option<&[u8]>) -> Outcome {
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn dsh");
    if let Some(text) = stdin {
        let mut pipe = child.stdin.take().expect("child stdin");
        pipe.write_all(text).expect("write script");
    }
    let out = reader(child.stdout.take().expect("child stdout"));
    let err = reader(child.stderr.take().expect("child stderr"));
    let status = wait_with_timeout(&mut child, LIMIT);
    Outcome {
        code: status.code().unwrap_or(-1),
        stdout: out.join().expect("stdout reader"),
        stderr: err.join().expect("stderr reader"),
    }
}

fn reader<R: Read + Send + 'static>(mut r: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut s = String::new();
        let _ = r.read_to_string(&mut s);
        s
    })
}

pub fn wait_with_timeout(child: &mut Child, limit: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(st) = child.try_wait().expect("try_wait") {
            return st;
        }
        if start.elapsed() > limit {
            let _ = child.kill();
            let _ = child.wait();
            panic!("dsh did not finish within {limit:?}");
        }
        thread::sleep(Duration::from_millis(20));
    }
}
