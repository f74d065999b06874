//! Sensor-side responder for picotemp.
//!
//! Serves the local temperature as JSON over a minimal HTTP/1.1 responder and
//! blinks a status LED for every request served.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  try_send  ┌─────────────────┐
//! │ ConnectionLoop  │───────────>│    Indicator    │──> LED
//! │  (accept, GET)  │  (cap. 3)  │  (blink task)   │
//! └─────────────────┘            └─────────────────┘
//! ```
//!
//! # Response
//!
//! ```text
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//! Content-Length: 32
//! Connection: close
//!
//! {"tempC":23.456,"tempF":74.2208}
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod indicator;
pub mod led;
pub mod shutdown;
pub mod thermometer;

pub use config::ServerConfig;
pub use connection::{Acceptor, ConnectionLoop, bind_listener};
pub use error::{Result, ServerError};
pub use indicator::{Delivery, EventSender, Indicator, RequestEvent, event_channel};
pub use led::StatusLed;
pub use thermometer::Thermometer;
