use anyhow::{anyhow, bail, Result};
use dsh::config::{init_logging, Config};
use dsh::{Flow, Shell};
use std::env;
use std::io::{self, BufRead, Write};

const USAGE: &str = "usage: dsh [-c LINE]\n       reads command lines from stdin when -c is not given";

fn main() -> Result<()> {
    init_logging("DSH_LOG", "off");
    let mut args = env::args().skip(1);
    let mut script: Option<String> = None;
    while let Some(a) = args.next() {
        match a.as_str() {
            "-c" => script = Some(args.next().ok_or_else(|| anyhow!("missing line after -c"))?),
            "-h" | "--help" => {
                eprintln!("{USAGE}");
                return Ok(());
            }
            other => bail!("unknown arg: {other}"),
        }
    }

    let mut shell = Shell::new();
    if let Some(line) = script {
        std::process::exit(shell.run_command(&line));
    }

    let cfg = Config::from_env();
    let interactive = atty::is(atty::Stream::Stdin);
    let mut input = io::stdin().lock();
    let mut buf = Vec::new();
    loop {
        if interactive {
            print!("{}", cfg.prompt);
            io::stdout().flush()?;
        }
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            if interactive {
                println!();
            }
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let cmd = line.trim_end_matches(['\n', '\r']);
        if shell.run_line(cmd) == Flow::Exit {
            break;
        }
    }
    Ok(())
}
