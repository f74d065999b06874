//! Error types for the sensor server.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur on the sensor side.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] picotemp_common::Error),

    /// The listener could not be created. Fatal at startup.
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed. Transient.
    #[error("Listener accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer did not finish the exchange before the deadline.
    #[error("Connection deadline exceeded")]
    Timeout,

    /// The temperature sensor could not be read.
    #[error("Thermometer read failed: {0}")]
    Thermometer(String),

    /// The reading could not be serialized.
    #[error("Failed to encode reading: {0}")]
    Encode(#[source] picotemp_common::Error),

    /// The status LED could not be driven.
    #[error("Failed to change LED state: {0}")]
    Led(String),

    /// I/O error on an accepted connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
