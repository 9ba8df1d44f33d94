use anyhow::{Context, Result};
use dsh::config::{init_logging, Config};
use rsh::config::{parse_args, Mode, USAGE};
use rsh::{Client, Server};
use std::env;
use std::io;
use tracing::info;

fn main() -> Result<()> {
    init_logging("RSH_LOG", "info");
    match parse_args(env::args().skip(1))? {
        Mode::Help => eprintln!("{USAGE}"),
        Mode::Server(addr) => {
            let server = Server::bind(addr.as_str()).with_context(|| format!("bind {addr}"))?;
            info!(addr = %server.local_addr()?, "listening");
            server.serve().context("accept failed")?;
        }
        Mode::Client(addr) => {
            let mut client = Client::connect(addr.as_str()).with_context(|| format!("connect {addr}"))?;
            info!(%addr, "connected");
            let cfg = Config::from_env();
            let prompt = atty::is(atty::Stream::Stdin).then_some(cfg.prompt.as_str());
            let stdout = io::stdout();
            client.run(io::stdin().lock(), &mut stdout.lock(), prompt)?;
        }
    }
    Ok(())
}
