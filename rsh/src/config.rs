//! Command line of the `rsh` binary.

use crate::frame::{DEF_CLI_HOST, DEF_PORT, DEF_SVR_IFACE};
use anyhow::{bail, Result};

pub const USAGE: &str = "usage: rsh [-c [ADDR] | -s [ADDR] | -h]\n  \
-c [ADDR]  connect to a server (default 127.0.0.1:1234)\n  \
-s [ADDR]  run a server (default 0.0.0.0:1234)\n  \
ADDR is host:port, host or :port";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Client(String),
    Server(String),
    Help,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Mode> {
    let mut args = args.into_iter().peekable();
    let mut mode = None;
    while let Some(a) = args.next() {
        let server = match a.as_str() {
            "-c" | "--client" => false,
            "-s" | "--server" => true,
            "-h" | "--help" => return Ok(Mode::Help),
            other => bail!("unknown argument: {other}\n{USAGE}"),
        };
        if mode.is_some() {
            bail!("-c and -s are mutually exclusive\n{USAGE}");
        }
        let addr = args.next_if(|v| !v.starts_with('-') || v.starts_with(':'));
        mode = Some(if server {
            Mode::Server(resolve_addr(addr.as_deref(), DEF_SVR_IFACE)?)
        } else {
            Mode::Client(resolve_addr(addr.as_deref(), DEF_CLI_HOST)?)
        });
    }
    Ok(mode.unwrap_or_else(|| Mode::Client(format!("{DEF_CLI_HOST}:{DEF_PORT}"))))
}

/// Fills in whichever of host and port `addr` leaves out.
fn resolve_addr(addr: Option<&str>, default_host: &str) -> Result<String> {
    let Some(addr) = addr else {
        return Ok(format!("{default_host}:{DEF_PORT}"));
    };
    let (host, port) = match addr.rsplit_once(':') {
        Some((h, p)) => (h, p),
        None => (addr, ""),
    };
    let host = if host.is_empty() { default_host } else { host };
    let port = if port.is_empty() {
        DEF_PORT
    } else {
        match port.parse::<u16>() {
            Ok(p) => p,
            Err(_) => bail!("invalid port: {port}"),
        }
    };
    Ok(format!("{host}:{port}"))
}
