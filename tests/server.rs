use srs_resolver::{Config, Server};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn start(config: Config) -> (SocketAddr, oneshot::Sender<()>) {
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(server.run(async move {
        let _ = stop_rx.await;
        Ok::<(), std::io::Error>(())
    }));
    (addr, stop_tx)
}

async fn ask(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn local_config(fallback: &str) -> Config {
    Config {
        listen: "127.0.0.1:0".to_string(),
        fallback_address: fallback.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_scenarios_without_fallback() {
    let (addr, _stop) = start(local_config("")).await;

    let cases = [
        (
            "get SRS0=abc123=12345=example.com=damian\n",
            "200 damian@example.com\n",
        ),
        (
            "get SRS0=abc123=12345=example.com=user@forwarder.com\n",
            "200 user@example.com\n",
        ),
        ("get user@example.com\n", "200 user@example.com\n"),
        ("get SRS0=incomplete\n", "500 invalid request\n"),
        ("put something\n", "500 invalid request\n"),
    ];

    for (request, expected) in cases {
        assert_eq!(ask(addr, request).await, expected, "request {request:?}");
    }
}

#[tokio::test]
async fn test_fallback_address_is_returned() {
    let (addr, _stop) = start(local_config("root@example.com")).await;

    assert_eq!(
        ask(addr, "get SRS0=incomplete\n").await,
        "200 root@example.com\n"
    );
    assert_eq!(
        ask(addr, "get <not valid>\n").await,
        "200 root@example.com\n"
    );
    assert_eq!(ask(addr, "put something\n").await, "500 invalid request\n");
}

#[tokio::test]
async fn test_client_closing_early_gets_read_error() {
    let (addr, _stop) = start(local_config("")).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"get user@example.com").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert_eq!(response, "500 read error\n");
}

#[tokio::test]
async fn test_concurrent_connections_are_independent() {
    let (addr, _stop) = start(local_config("")).await;

    // A silent client must not hold up other connections.
    let _idle = TcpStream::connect(addr).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        handles.push(tokio::spawn(async move {
            ask(addr, &format!("get SRS1=h=t=example.org=user{i}\n")).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("200 user{i}@example.org\n"));
    }
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let config = Config {
        listen: "not-an-address".to_string(),
        ..Default::default()
    };
    assert!(Server::bind(&config).await.is_err());
}

#[tokio::test]
async fn test_local_mailbox_fallback_is_served() {
    let config = local_config("postmaster");
    config.validate().unwrap();
    let (addr, _stop) = start(config).await;

    assert_eq!(ask(addr, "get SRS0=incomplete\n").await, "200 postmaster\n");
}
