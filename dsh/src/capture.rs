//! Capture channel: a pipe whose write end is handed to a pipeline as its
//! output endpoint while the parent reads the other end incrementally.

use crate::error::ExecError;
use crate::exec::cloexec_pipe;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

/// Bytes moved per read from the capture pipe.
pub const CAPTURE_CHUNK: usize = 4096;

pub struct CaptureChannel {
    reader: File,
    writer: Option<OwnedFd>,
}

impl CaptureChannel {
    pub fn open() -> Result<Self, ExecError> {
        let (r, w) = cloexec_pipe().map_err(ExecError::Pipe)?;
        Ok(CaptureChannel { reader: File::from(r), writer: Some(w) })
    }

    /// Write end for [`crate::exec::Endpoints::stdout`]. `None` once sealed.
    pub fn sink(&self) -> Option<BorrowedFd<'_>> {
        self.writer.as_ref().map(|w| w.as_fd())
    }

    /// Closes the parent's write end so the reader sees EOF once every
    /// child holding a copy has exited.
    pub fn seal(&mut self) {
        self.writer = None;
    }

    /// Seals, then copies everything the children write into `out` as it
    /// arrives. Returns the number of bytes forwarded.
    pub fn forward_to<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<u64> {
        self.seal();
        let mut buf = [0u8; CAPTURE_CHUNK];
        let mut total = 0u64;
        loop {
            let n = match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            out.write_all(&buf[..n])?;
            out.flush()?;
            total += n as u64;
        }
        Ok(total)
    }

    pub fn collect(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.forward_to(&mut out)?;
        Ok(out)
    }
}
