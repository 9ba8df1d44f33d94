//! Wire format of the remote shell.
//!
//! Requests are one command line, optionally newline terminated, followed by
//! a NUL. Responses are the raw output of the command followed by a single
//! [`EOF_CHAR`]. There are no length prefixes; the peer scans for the
//! sentinel.

use std::io::{self, Read, Write};

/// End-of-response marker (ASCII EOT).
pub const EOF_CHAR: u8 = 0x04;
/// Request terminator appended by the client.
pub const REQ_TERMINATOR: u8 = 0;
/// Size of the session receive buffer; one receive is one command line.
pub const COMM_BUFF_SZ: usize = 64 * 1024;

pub const DEF_PORT: u16 = 1234;
pub const DEF_SVR_IFACE: &str = "0.0.0.0";
pub const DEF_CLI_HOST: &str = "127.0.0.1";

pub const STOP_SERVER_CMD: &str = "stop-server";
pub const MSG_STOP_SERVER: &str = "Server shutting down...\n";
pub const MSG_CLIENT_EXIT: &str = "Connection closed\n";

pub fn send_eof<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    w.write_all(&[EOF_CHAR])?;
    w.flush()
}

/// Sends `msg` and terminates the response.
pub fn send_message<W: Write + ?Sized>(w: &mut W, msg: &str) -> io::Result<()> {
    w.write_all(msg.as_bytes())?;
    send_eof(w)
}

/// Client side: the bytes to put on the wire for `line`.
pub fn encode_request(line: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(REQ_TERMINATOR);
    buf
}

/// Server side: recovers the command line from one received chunk.
/// Terminators are dropped first, then one trailing newline.
pub fn decode_request(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && raw[end - 1] == REQ_TERMINATOR {
        end -= 1;
    }
    let mut line = &raw[..end];
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest.strip_suffix(b"\r").unwrap_or(rest);
    }
    String::from_utf8_lossy(line).into_owned()
}

/// Copies one response into `out`, stopping at the sentinel. A peer that
/// closes before sending it is an `UnexpectedEof`.
pub fn read_response<R: Read + ?Sized, W: Write + ?Sized>(r: &mut R, out: &mut W) -> io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut total = 0u64;
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "server closed before end of output")),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[..n];
        match chunk.iter().position(|&b| b == EOF_CHAR) {
            Some(i) => {
                out.write_all(&chunk[..i])?;
                out.flush()?;
                return Ok(total + i as u64);
            }
            None => {
                out.write_all(chunk)?;
                total += n as u64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_terminator_and_newline() {
        assert_eq!(decode_request(b"ls -l\0"), "ls -l");
        assert_eq!(decode_request(b"ls -l\n"), "ls -l");
        assert_eq!(decode_request(b"ls -l\n\0"), "ls -l");
        assert_eq!(decode_request(b"ls -l\r\n"), "ls -l");
        assert_eq!(decode_request(b"ls -l"), "ls -l");
        assert_eq!(decode_request(b"\0"), "");
    }

    #[test]
    fn only_one_newline_is_stripped() {
        assert_eq!(decode_request(b"echo\n\n\0"), "echo\n");
    }

    #[test]
    fn encode_appends_terminator() {
        assert_eq!(encode_request("pwd"), b"pwd\0");
    }

    #[test]
    fn message_ends_with_sentinel() {
        let mut out = Vec::new();
        send_message(&mut out, MSG_CLIENT_EXIT).unwrap();
        assert_eq!(out.last(), Some(&EOF_CHAR));
        assert_eq!(&out[..out.len() - 1], MSG_CLIENT_EXIT.as_bytes());
    }

    #[test]
    fn response_stops_at_sentinel() {
        let wire = [b"hello\n".as_slice(), &[EOF_CHAR], b"next"].concat();
        let mut r = wire.as_slice();
        let mut out = Vec::new();
        assert_eq!(read_response(&mut r, &mut out).unwrap(), 6);
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn response_without_sentinel_is_an_error() {
        let mut r: &[u8] = b"partial";
        let mut out = Vec::new();
        let err = read_response(&mut r, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(out, b"partial");
    }
}
