use crate::frame::{encode_request, read_response, COMM_BUFF_SZ, STOP_SERVER_CMD};
use dsh::limits::EXIT_CMD;
use std::io::{self, BufRead, Write};
use std::net::{TcpStream, ToSocketAddrs};

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Ok(Client { stream: TcpStream::connect(addr)? })
    }

    /// Sends one command line and copies its output into `out`.
    pub fn exec<W: Write + ?Sized>(&mut self, line: &str, out: &mut W) -> io::Result<u64> {
        let req = encode_request(line);
        if req.len() > COMM_BUFF_SZ {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "command line too long"));
        }
        self.stream.write_all(&req)?;
        self.stream.flush()?;
        read_response(&mut self.stream, out)
    }

    /// Reads lines from `input` and executes each remotely until end of input,
    /// `exit` or `stop-server`.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W, prompt: Option<&str>) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            if let Some(p) = prompt {
                out.write_all(p.as_bytes())?;
                out.flush()?;
            }
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                if prompt.is_some() {
                    out.write_all(b"\n")?;
                }
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            let cmd = line.trim_end_matches(['\n', '\r']);
            match self.exec(cmd, out) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                    eprintln!("error: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            }
            if matches!(cmd.trim(), EXIT_CMD | STOP_SERVER_CMD) {
                return Ok(());
            }
        }
    }
}
