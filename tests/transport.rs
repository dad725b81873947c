extern crate asset_fetch;
extern crate env_logger;
extern crate tempfile;

use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use asset_fetch::prelude::*;
use asset_fetch::transport;

fn file_params(root: &std::path::Path) -> ResourceParams {
    let mut params = ResourceParams::default();
    params.scheme = Scheme::File;
    params.root = root.to_owned();
    params
}

#[test]
fn file_transport() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/a.txt"), b"hello").unwrap();

    let address = Address::new(Scheme::File, "", 0);
    let transport = FileTransport::new(dir.path());

    assert_eq!(transport.fetch(&address, "docs/a.txt").unwrap(), b"hello");
    assert_eq!(transport.fetch(&address, "/docs/a.txt").unwrap(), b"hello");
    assert_eq!(transport.fetch(&address, "./docs/a.txt").unwrap(), b"hello");

    match transport.fetch(&address, "docs/b.txt") {
        Err(Error::TransportFailure(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    fs::write(dir.path().join("secret"), b"secret").unwrap();
    match transport.fetch(&address, "docs/../secret") {
        Err(Error::TransportFailure(msg)) => assert!(msg.contains("escapes")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn blocking_fetch() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.bin"), [1u8, 2, 3]).unwrap();

    let address = Address::new(Scheme::File, "", 0);
    let transport = FileTransport::new(dir.path());

    let mut bytes = None;
    transport::fetch(
        &transport,
        &address,
        "a.bin",
        |v| bytes = Some(v),
        |err| panic!("{}", err),
    );
    assert_eq!(bytes, Some(vec![1, 2, 3]));

    let mut failure = None;
    transport::fetch(
        &transport,
        &address,
        "b.bin",
        |_| panic!("unexpected success"),
        |err| failure = Some(err),
    );
    assert!(failure.is_some());
}

#[test]
fn load_from_directory() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("conf.json"), r#"{"name": "crate", "v": [1, 2]}"#).unwrap();
    fs::write(dir.path().join("note.txt"), "hello").unwrap();

    let res = ResourceManager::new(file_params(dir.path())).unwrap();
    res.register(JsonLoader).unwrap();
    res.register(TextLoader).unwrap();

    let json = res
        .load::<asset_fetch::serde_json::Value>("/conf.json", false)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(json["name"], "crate");
    assert_eq!(json["v"][1], 2);

    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();
    res.request::<String, _, _>(
        "note.txt",
        false,
        move |v| tx.send(Ok(v)).unwrap(),
        move |err| tx2.send(Err(err)).unwrap(),
    )
    .unwrap();

    let text = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(text.as_str(), "hello");

    // Malformed payloads are decode failures, not transport ones.
    match res.load::<asset_fetch::serde_json::Value>("note.txt", false).unwrap().wait() {
        Err(Error::DecodeFailure(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    match res.load::<String>("missing.txt", false).unwrap().wait() {
        Err(Error::TransportFailure(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn http_unreachable() {
    let _ = env_logger::try_init();

    let mut params = ResourceParams::default();
    params.port = 1;
    params.timeout_ms = 2_000;

    let res = ResourceManager::new(params).unwrap();
    res.register(BytesLoader).unwrap();

    match res.load::<Vec<u8>>("/a.bin", false).unwrap().wait() {
        Err(Error::TransportFailure(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(
        res.state::<Vec<u8>>("/a.bin").unwrap(),
        ResourceState::Absent
    );
}
