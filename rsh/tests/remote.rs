
use rsh::frame::{EOF_CHAR, MSG_CLIENT_EXIT, MSG_STOP_SERVER};
use rsh::Client;
use std::net::TcpStream;
use test_util::{start_server, Conn};

#[test]
fn single_command_output_comes_back() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec("echo hello"), "hello\n");
    assert_eq!(c.exec(r#"echo "a   b""#), "a   b\n");
}

#[test]
fn pipeline_output_comes_from_last_stage() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec(r#"printf "b\na\nc\n" | sort | head -n 2"#), "a\nb\n");
    assert_eq!(c.exec("echo abc | tr a-z A-Z"), "ABC\n");
}

#[test]
fn last_stage_stderr_is_sent_to_the_client() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec("no_such_command_rsh_test"), "Command not found in PATH\n");
    assert!(c.exec("ls /definitely/not/here").contains("No such file"));
}

#[test]
fn large_output_is_streamed() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    let out = c.exec(r#"head -c 200000 /dev/zero | tr "\0" x"#);
    assert_eq!(out.len(), 200000);
    assert!(out.bytes().all(|b| b == b'x'));
    assert_eq!(c.exec("echo after"), "after\n");
}

#[test]
fn builtins_run_in_the_session() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec(r#"sh -c "exit 4""#), "");
    assert_eq!(c.exec("rc"), "4\n");
    assert_eq!(c.exec("rc"), "0\n");
    let dragon = c.exec("dragon");
    assert!(dragon.lines().count() > 5);
}

#[test]
fn parse_errors_are_returned_as_text() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec(""), "warning: no commands provided\n");
    assert_eq!(c.exec("a|b|c|d|e|f|g|h|i"), "error: piping limited to 8 commands\n");
    assert_eq!(c.exec("echo ok |"), "error: empty command in pipeline\n");
}

#[test]
fn newline_terminated_requests_are_accepted() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    c.send_raw(b"echo raw\n");
    assert_eq!(c.response(), b"raw\n");
}

#[test]
fn each_response_carries_exactly_one_sentinel() {
    let (addr, _server) = start_server();
    let mut c = Conn::open(addr);
    c.send_raw(b"echo one\0");
    assert_eq!(c.response(), b"one\n");
    c.send_raw(b"echo two\0");
    let second = c.response();
    assert_eq!(second, b"two\n");
    assert!(!second.contains(&EOF_CHAR));
}

#[test]
fn exit_closes_only_the_session() {
    let (addr, server) = start_server();
    let mut first = Conn::open(addr);
    assert_eq!(first.exec("exit"), MSG_CLIENT_EXIT);
    let mut second = Conn::open(addr);
    assert_eq!(second.exec("echo still here"), "still here\n");
    assert_eq!(second.exec("rc"), "0\n");
    assert!(!server.is_finished());
}

#[test]
fn dropped_client_does_not_stop_the_server() {
    let (addr, _server) = start_server();
    {
        let mut c = Conn::open(addr);
        c.send_raw(b"echo half\0");
    }
    let mut next = Conn::open(addr);
    assert_eq!(next.exec("echo next"), "next\n");
}

#[test]
fn stop_server_shuts_the_listener() {
    let (addr, server) = start_server();
    let mut c = Conn::open(addr);
    assert_eq!(c.exec("stop-server"), MSG_STOP_SERVER);
    server.join().expect("server thread").expect("serve");
    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn client_runs_a_script() {
    let (addr, _server) = start_server();
    let mut client = Client::connect(addr).expect("connect");
    let script = "echo one\necho two | tr a-z A-Z\nexit\necho never\n";
    let mut out = Vec::new();
    client.run(script.as_bytes(), &mut out, None).expect("run");
    assert_eq!(String::from_utf8(out).unwrap(), format!("one\nTWO\n{MSG_CLIENT_EXIT}"));
}

#[test]
fn client_exec_reports_bytes() {
    let (addr, _server) = start_server();
    let mut client = Client::connect(addr).expect("connect");
    let mut out = Vec::new();
    assert_eq!(client.exec("printf 12345", &mut out).expect("exec"), 5);
    assert_eq!(out, b"12345");
}
