//! Runs the sippcap binary against a synthetic capture

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::{Command, Output};

const CLIENT: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

fn sip(start: &str, cseq: &str) -> Vec<u8> {
    format!(
        "{}\r\nVia: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK-1\r\nFrom: <sip:a@10.0.0.1>;tag=1\r\n\
         To: <sip:b@10.0.0.2>\r\nCall-ID: c1@10.0.0.1\r\nCSeq: {}\r\nContent-Length: 0\r\n\r\n",
        start, cseq
    )
    .into_bytes()
}

fn eth_ipv4_udp(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; 12];
    pkt.extend_from_slice(&0x0800u16.to_be_bytes());

    pkt.extend_from_slice(&[0x45, 0]);
    pkt.extend_from_slice(&((28 + payload.len()) as u16).to_be_bytes());
    pkt.extend_from_slice(&[0, 0, 0, 0, 64, 17, 0, 0]);
    pkt.extend_from_slice(&src.octets());
    pkt.extend_from_slice(&dst.octets());

    pkt.extend_from_slice(&5060u16.to_be_bytes());
    pkt.extend_from_slice(&5060u16.to_be_bytes());
    pkt.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    pkt.extend_from_slice(&[0, 0]);
    pkt.extend_from_slice(payload);
    pkt
}

fn write_capture(path: &Path) {
    let frames = vec![
        eth_ipv4_udp(CLIENT, SERVER, &sip("INVITE sip:b@10.0.0.2 SIP/2.0", "1 INVITE")),
        eth_ipv4_udp(SERVER, CLIENT, &sip("SIP/2.0 200 OK", "1 INVITE")),
        eth_ipv4_udp(CLIENT, SERVER, &sip("ACK sip:b@10.0.0.2 SIP/2.0", "1 ACK")),
    ];

    let mut file = Vec::new();
    file.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    file.extend_from_slice(&2u16.to_le_bytes());
    file.extend_from_slice(&4u16.to_le_bytes());
    file.extend_from_slice(&[0; 8]);
    file.extend_from_slice(&65535u32.to_le_bytes());
    file.extend_from_slice(&1u32.to_le_bytes());
    for (i, data) in frames.iter().enumerate() {
        file.extend_from_slice(&(1_700_000_000 + i as u32).to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(&(data.len() as u32).to_le_bytes());
        file.extend_from_slice(&(data.len() as u32).to_le_bytes());
        file.extend_from_slice(data);
    }
    fs::write(path, file).unwrap();
}

fn sippcap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sippcap"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("SIPPCAP_CONFIG")
        .output()
        .unwrap()
}

#[test]
fn writes_both_scenarios() {
    let tmp = tempfile::tempdir().unwrap();
    let capture = tmp.path().join("call.pcap");
    let out = tmp.path().join("out");
    write_capture(&capture);

    let output = sippcap(&[
        "-i",
        capture.to_str().unwrap(),
        "-c",
        "10.0.0.1",
        "-s",
        "10.0.0.2",
        "-n",
        "cli call",
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let uac = fs::read_to_string(out.join("UAC.xml")).unwrap();
    let uas = fs::read_to_string(out.join("UAS.xml")).unwrap();
    assert!(uac.contains("<scenario name=\"cli call\">"));
    assert!(uac.contains("<recv response=\"200\" optional=\"false\" rrs=\"true\">"));
    assert!(uas.contains("<recv request=\"INVITE\" optional=\"false\" rrs=\"true\">"));
    assert!(!uac.contains("10.0.0.") && !uas.contains("10.0.0."));
}

#[test]
fn unknown_role_fails_without_output() {
    let tmp = tempfile::tempdir().unwrap();
    let capture = tmp.path().join("call.pcap");
    let out = tmp.path().join("out");
    write_capture(&capture);

    let output = sippcap(&[
        "-i",
        capture.to_str().unwrap(),
        "-c",
        "10.0.0.1",
        "-s",
        "10.9.9.9",
        "-o",
        out.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No SIP packets matching 10.9.9.9"));
    assert!(!out.exists());
}

#[test]
fn missing_capture_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.pcap");
    let output = sippcap(&["-i", missing.to_str().unwrap(), "-c", "10.0.0.1", "-s", "10.0.0.2"]);
    assert_eq!(output.status.code(), Some(1));
}
