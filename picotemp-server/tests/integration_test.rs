//! Integration tests for the sensor server.
//!
//! These bind real sockets on ephemeral ports and talk to the responder over
//! HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use picotemp_common::Reading;
use picotemp_server::connection::CONNECTION_TIMEOUT;
use picotemp_server::indicator::EVENT_QUEUE_CAPACITY;
use picotemp_server::thermometer::FixedThermometer;
use picotemp_server::{
    ConnectionLoop, RequestEvent, Result, ServerError, Thermometer, bind_listener, event_channel,
};

struct FailingThermometer;

impl Thermometer for FailingThermometer {
    fn read(&mut self) -> Result<Reading> {
        Err(ServerError::Thermometer("sensor not responding".to_string()))
    }
}

/// Start a connection loop on an ephemeral port. The event receiver is
/// returned undrained.
fn start_server<T>(thermometer: T) -> (SocketAddr, mpsc::Receiver<RequestEvent>)
where
    T: Thermometer + 'static,
{
    let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let (events, rx) = event_channel();

    tokio::spawn(ConnectionLoop::new(listener, thermometer, events).run());

    (addr, rx)
}

fn fixed(celsius: f64) -> FixedThermometer {
    FixedThermometer(Reading::from_celsius(celsius))
}

#[tokio::test]
async fn test_get_returns_reading_as_json() {
    let (addr, mut rx) = start_server(fixed(23.456));

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(response.headers()["connection"].to_str().unwrap(), "close");
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"tempC":23.456,"tempF":74.2208}"#
    );

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, RequestEvent::default());
}

#[tokio::test]
async fn test_any_path_is_answered() {
    let (addr, _rx) = start_server(fixed(21.5));

    let response = reqwest::get(format!("http://{}/anything/else?x=1", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"tempC":21.5,"tempF":70.7}"#
    );
}

#[tokio::test]
async fn test_full_event_queue_does_not_block_requests() {
    let (addr, mut rx) = start_server(fixed(25.0));

    for _ in 0..EVENT_QUEUE_CAPACITY + 2 {
        let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.text().await.unwrap(),
            r#"{"tempC":25.0,"tempF":77.0}"#
        );
    }

    // Let the last exchange finish reporting before draining
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Only the first events fit; the rest were dropped
    for _ in 0..EVENT_QUEUE_CAPACITY {
        assert!(rx.try_recv().is_ok());
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_thermometer_failure_returns_500() {
    let (addr, mut rx) = start_server(FailingThermometer);

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "");

    // The request was still served, so the indicator hears about it
    assert!(
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_silent_client_is_cut_off() {
    let (addr, _rx) = start_server(fixed(23.456));

    // Connects but never sends a request
    let mut silent = TcpStream::connect(addr).await.unwrap();

    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(CONNECTION_TIMEOUT * 2, silent.read(&mut buf))
        .await
        .expect("connection was not closed after the deadline")
        .unwrap_or(0);
    assert_eq!(n, 0);

    // The loop moved on to the next connection
    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
}
