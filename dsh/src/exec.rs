//! Pipeline builder and process supervisor.
//!
//! Every pipe end is an [`OwnedFd`] held by a [`PipeSet`]. The parent drops
//! the set as soon as the last stage is forked; each child takes its own copy
//! of the set, wires the ends it needs onto stdio and drops the rest before
//! `execvp`. All ends are also close-on-exec, so a descriptor can't outlive
//! its role through a concurrent fork elsewhere in the process.

use crate::builtin::{change_dir, os_message, Builtin, Console, Flow, ShellState};
use crate::error::ExecError;
use crate::parser::{Pipeline, Stage};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, pipe2, ForkResult, Pid};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use tracing::{debug, warn};

const STDIN: RawFd = libc::STDIN_FILENO;
const STDOUT: RawFd = libc::STDOUT_FILENO;
const STDERR: RawFd = libc::STDERR_FILENO;

/// Where the first stage reads from and the last stage writes to.
/// `None` inherits the caller's descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Endpoints<'a> {
    stdin: Option<BorrowedFd<'a>>,
    stdout: Option<BorrowedFd<'a>>,
}

impl<'a> Endpoints<'a> {
    pub fn inherit() -> Self {
        Endpoints::default()
    }

    pub fn stdin(mut self, fd: BorrowedFd<'a>) -> Self {
        self.stdin = Some(fd);
        self
    }

    /// The last stage's stdout and stderr both go to `fd`.
    pub fn stdout(mut self, fd: BorrowedFd<'a>) -> Self {
        self.stdout = Some(fd);
        self
    }
}

/// Anonymous pipes joining adjacent stages; pipe `i` feeds stage `i + 1`.
#[derive(Default)]
struct PipeSet {
    pipes: Vec<(OwnedFd, OwnedFd)>,
}

impl PipeSet {
    fn open(count: usize) -> Result<Self, ExecError> {
        let mut set = PipeSet { pipes: Vec::with_capacity(count) };
        for _ in 0..count {
            // on failure the ends opened so far drop with `set`
            set.pipes.push(cloexec_pipe().map_err(ExecError::Pipe)?);
        }
        Ok(set)
    }

    fn read_end(&self, i: usize) -> RawFd {
        self.pipes[i].0.as_raw_fd()
    }

    fn write_end(&self, i: usize) -> RawFd {
        self.pipes[i].1.as_raw_fd()
    }
}

/// Children spawned for one pipeline, in stage order.
#[must_use = "children must be waited on"]
#[derive(Debug)]
pub struct Running {
    pids: Vec<Pid>,
}

impl Running {
    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }

    /// Reaps every child and returns how the last stage ended.
    pub fn wait(mut self) -> Termination {
        supervise(&std::mem::take(&mut self.pids))
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if !self.pids.is_empty() {
            let _ = supervise(&std::mem::take(&mut self.pids));
        }
    }
}

/// Result of handing a parsed line to [`launch`].
#[derive(Debug)]
pub enum Launch {
    /// A built-in ran in the calling process; nothing to wait for.
    Done(Flow),
    Spawned(Running),
}

/// Runs single-stage built-ins in place, applies a leading `cd` of a longer
/// pipeline to the calling process, and spawns whatever is left.
pub fn launch(
    mut pipeline: Pipeline,
    ends: Endpoints<'_>,
    state: &mut ShellState,
    con: &mut Console<'_>,
) -> Result<Launch, ExecError> {
    let Some(first) = pipeline.first() else {
        return Ok(Launch::Done(Flow::Continue));
    };
    let builtin = Builtin::classify(first.exe());
    if pipeline.len() == 1 {
        if let Some(b) = builtin {
            let flow = b.run(first.args(), state, con)?;
            return Ok(Launch::Done(flow));
        }
    } else if builtin == Some(Builtin::Cd) {
        if let Some(cd) = pipeline.shift() {
            if let [dir] = cd.args() {
                let rc = change_dir(dir, con.err)?;
                if rc != 0 {
                    state.last_rc = rc;
                    return Ok(Launch::Done(Flow::Continue));
                }
            }
        }
    }
    spawn(pipeline, ends, state.last_rc).map(Launch::Spawned)
}

/// Runs `pipeline` to completion on the caller's stdio.
pub fn execute(pipeline: Pipeline, state: &mut ShellState, con: &mut Console<'_>) -> Result<Flow, ExecError> {
    match launch(pipeline, Endpoints::inherit(), state, con)? {
        Launch::Done(flow) => Ok(flow),
        Launch::Spawned(running) => {
            let term = running.wait();
            state.last_rc = term.status();
            term.report(con.err)?;
            Ok(Flow::Continue)
        }
    }
}

/// Forks one child per stage. Built-in names inside a spawned stage run their
/// child body instead of `execvp`; `last_rc` is what `rc` prints there.
pub fn spawn(pipeline: Pipeline, ends: Endpoints<'_>, last_rc: i32) -> Result<Running, ExecError> {
    let stages = pipeline.into_stages();
    let count = stages.len();
    if count == 0 {
        return Ok(Running { pids: Vec::new() });
    }
    let argvs = stages
        .iter()
        .map(Stage::c_argv)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ExecError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let mut pipes = PipeSet::open(count - 1)?;

    // buffered parent output must not be duplicated into the children
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let mut pids = Vec::with_capacity(count);
    for (idx, (stage, argv)) in stages.iter().zip(&argvs).enumerate() {
        // SAFETY: the child only rewires descriptors and then execs or _exits.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let pipes = std::mem::take(&mut pipes);
                let code = run_child(stage, argv, idx, count, pipes, ends, last_rc);
                // SAFETY: terminate without running the parent's atexit/drop logic
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = child.as_raw(), stage = idx, exe = stage.exe(), "spawned stage");
                pids.push(child);
            }
            Err(e) => {
                warn!(error = %e, stage = idx, "fork failed");
                drop(pipes);
                let _ = supervise(&pids);
                return Err(ExecError::Fork(e));
            }
        }
    }
    drop(pipes);
    Ok(Running { pids })
}

/// Waits for each pid exactly once; the pipeline's result is the last one's.
pub fn supervise(pids: &[Pid]) -> Termination {
    let mut status = Termination::Exited(0);
    for (i, &pid) in pids.iter().enumerate() {
        let res = wait_for(pid);
        debug!(pid = pid.as_raw(), result = ?res, "reaped stage");
        if i + 1 == pids.len() {
            status = match res {
                Ok(ws) => Termination::from(ws),
                Err(e) => {
                    warn!(pid = pid.as_raw(), error = %e, "waitpid failed");
                    Termination::Unknown
                }
            };
        }
    }
    status
}

fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// How the last stage of a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(Signal),
    /// No usable status could be collected.
    Unknown,
}

impl Termination {
    /// Shell-style encoding: the exit code, or 128 plus the signal number.
    pub fn status(self) -> i32 {
        match self {
            Termination::Exited(code) => code,
            Termination::Signaled(sig) => 128 + sig as i32,
            Termination::Unknown => 1,
        }
    }

    /// Writes the diagnostic for a signalled stage to `err`; silent otherwise.
    pub fn report<W: Write + ?Sized>(self, err: &mut W) -> io::Result<()> {
        if let Termination::Signaled(sig) = self {
            writeln!(err, "Child terminated by signal {}", sig as i32)?;
            err.flush()?;
        }
        Ok(())
    }
}

impl From<WaitStatus> for Termination {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => Termination::Exited(code),
            WaitStatus::Signaled(_, sig, _) => Termination::Signaled(sig),
            other => {
                warn!(status = ?other, "unexpected wait status");
                Termination::Unknown
            }
        }
    }
}

/// `pipe2(O_CLOEXEC)` with both ends kept off descriptors 0-2, so wiring a
/// child's stdio never lands on an end that is about to be closed.
pub(crate) fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    let (r, w) = pipe2(OFlag::O_CLOEXEC)?;
    Ok((above_stdio(r)?, above_stdio(w)?))
}

fn above_stdio(fd: OwnedFd) -> nix::Result<OwnedFd> {
    if fd.as_raw_fd() > STDERR {
        return Ok(fd);
    }
    let raw = fcntl(fd.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(STDERR + 1))?;
    // SAFETY: fcntl just returned this descriptor and nothing else owns it
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

// ---- child side ----

struct SetupError {
    context: String,
    source: io::Error,
}

impl SetupError {
    fn new(context: impl Into<String>, source: impl Into<io::Error>) -> Self {
        SetupError { context: context.into(), source: source.into() }
    }

    fn status(&self) -> i32 {
        self.source.raw_os_error().unwrap_or(1)
    }
}

/// Unbuffered writer on an inherited descriptor. Never closes it and never
/// touches the std handles, whose locks may be held by a thread that did
/// not survive the fork.
fn raw_writer(fd: RawFd) -> ManuallyDrop<File> {
    // SAFETY: stdio descriptors stay open for the life of the child
    ManuallyDrop::new(unsafe { File::from_raw_fd(fd) })
}

fn child_report(msg: &str) {
    let _ = raw_writer(STDERR).write_all(msg.as_bytes());
}

fn dup_onto(src: RawFd, dst: RawFd) -> nix::Result<()> {
    if src != dst {
        dup2(src, dst)?;
        return Ok(());
    }
    // already in place; only make sure it survives exec
    let flags = FdFlag::from_bits_truncate(fcntl(dst, FcntlArg::F_GETFD)?);
    if flags.contains(FdFlag::FD_CLOEXEC) {
        fcntl(dst, FcntlArg::F_SETFD(flags - FdFlag::FD_CLOEXEC))?;
    }
    Ok(())
}

fn run_child(
    stage: &Stage,
    argv: &[CString],
    idx: usize,
    count: usize,
    pipes: PipeSet,
    ends: Endpoints<'_>,
    last_rc: i32,
) -> i32 {
    // the Rust runtime ignores SIGPIPE and exec would carry that over
    // SAFETY: single-threaded after fork, no handler is being replaced
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };
    if let Err(e) = wire_child(stage, idx, count, pipes, ends) {
        child_report(&format!("{}: {}\n", e.context, os_message(&e.source)));
        return e.status();
    }
    if let Some(b) = Builtin::classify(stage.exe()) {
        return b.run_in_child(last_rc, &mut *raw_writer(STDOUT));
    }
    let err = match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    let msg = match err {
        Errno::ENOENT => "Command not found in PATH\n".to_string(),
        Errno::EACCES => "Permission denied\n".to_string(),
        other => format!("Execution error: {}\n", other.desc()),
    };
    child_report(&msg);
    err as i32
}

/// Pipe wiring first, then endpoint fallbacks, then file redirections, so a
/// stage's own `<`/`>` wins over whatever the pipeline gave it.
fn wire_child(stage: &Stage, idx: usize, count: usize, pipes: PipeSet, ends: Endpoints<'_>) -> Result<(), SetupError> {
    let last = idx + 1 == count;
    if idx > 0 {
        dup_onto(pipes.read_end(idx - 1), STDIN).map_err(|e| SetupError::new("dup2 stdin", e))?;
    } else if let Some(fd) = ends.stdin {
        dup_onto(fd.as_raw_fd(), STDIN).map_err(|e| SetupError::new("dup2 stdin", e))?;
    }
    if !last {
        dup_onto(pipes.write_end(idx), STDOUT).map_err(|e| SetupError::new("dup2 stdout", e))?;
    } else if let Some(fd) = ends.stdout {
        dup_onto(fd.as_raw_fd(), STDOUT).map_err(|e| SetupError::new("dup2 stdout", e))?;
        dup_onto(fd.as_raw_fd(), STDERR).map_err(|e| SetupError::new("dup2 stderr", e))?;
    }
    drop(pipes);
    for fd in [ends.stdin, ends.stdout].into_iter().flatten() {
        let raw = fd.as_raw_fd();
        if raw > STDERR {
            let _ = close(raw);
        }
    }

    if let Some(path) = stage.input() {
        let file = File::open(path).map_err(|e| SetupError::new(path.display().to_string(), e))?;
        dup_onto(file.as_raw_fd(), STDIN).map_err(|e| SetupError::new("dup2 input redirection", e))?;
    }
    if let Some(out) = stage.output() {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(out.append)
            .truncate(!out.append)
            .mode(0o644)
            .open(&out.path)
            .map_err(|e| SetupError::new(out.path.display().to_string(), e))?;
        dup_onto(file.as_raw_fd(), STDOUT).map_err(|e| SetupError::new("dup2 output redirection", e))?;
    }
    Ok(())
}
