//! Prometheus exporter for a remote temperature sensor.
//!
//! The exporter polls the sensor's JSON endpoint and exposes the reading via
//! an HTTP `/metrics` endpoint. Readings are cached for two seconds so that
//! any number of concurrent scrapes cost the sensor at most one request per
//! window.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Sensor (HTTP)  │<────│      Cache      │<────│   HTTP Server   │
//! │   GET / JSON    │     │   (2 s TTL)     │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! PICO_SERVER_URL=http://picotemp.lan/ picotemp-exporter
//! picotemp-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod cache;
pub mod client;
pub mod collector;
pub mod config;
pub mod http;

pub use cache::{CACHE_TTL, Cache, CacheSnapshot, CacheStats};
pub use client::{FETCH_TIMEOUT, SensorClient, SensorError, SensorSource};
pub use collector::{SharedCollector, TemperatureCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
