
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use test_util::{free_port, spawn_server_bin, wait_with_timeout, Conn, LIMIT};

#[test]
fn cd_persists_within_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let canon = dir.path().canonicalize().unwrap();
    let port = free_port();
    let mut server = spawn_server_bin(port);
    let mut c = Conn::open(([127, 0, 0, 1], port).into());
    assert_eq!(c.exec(&format!("cd {}", canon.display())), "");
    assert_eq!(c.exec("pwd"), format!("{}\n", canon.display()));
    assert_eq!(c.exec("cd /definitely/not/here"), "Error in cd: No such file or directory\n");
    assert_eq!(c.exec("rc"), "2\n");
    assert_eq!(c.exec("stop-server"), "Server shutting down...\n");
    let status = wait_with_timeout(&mut server, LIMIT);
    assert!(status.success());
}

#[test]
fn client_binary_talks_to_server_binary() {
    let port = free_port();
    let mut server = spawn_server_bin(port);
    let mut client = Command::new(env!("CARGO_BIN_EXE_rsh"))
        .arg("-c")
        .arg(format!("127.0.0.1:{port}"))
        .env("RSH_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rsh client");
    client
        .stdin
        .take()
        .unwrap()
        .write_all(b"echo over the wire\nseq 3 | wc -l\nstop-server\n")
        .unwrap();
    let mut out = String::new();
    client.stdout.take().unwrap().read_to_string(&mut out).unwrap();
    assert!(wait_with_timeout(&mut client, LIMIT).success());
    assert!(wait_with_timeout(&mut server, LIMIT).success());
    assert!(out.starts_with("over the wire\n"), "out: {out:?}");
    assert!(out.ends_with("Server shutting down...\n"), "out: {out:?}");
    assert!(!out.contains("dsh4> "));
}

#[test]
fn unknown_flag_fails() {
    let out = Command::new(env!("CARGO_BIN_EXE_rsh"))
        .arg("--bogus")
        .env("RSH_LOG", "off")
        .output()
        .expect("run rsh");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown argument"));
}
