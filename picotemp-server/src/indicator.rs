//! Visual request feedback.
//!
//! The connection loop reports each completed exchange through a bounded
//! queue; the [`Indicator`] task drains it and blinks the status LED. The
//! producer side never waits: when the queue is full the event is dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{Instrument, Span, debug, error, info_span};

use crate::led::StatusLed;

/// Events that may be pending before new ones are dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 3;

/// Toggles per event when the event does not say.
pub const DEFAULT_BLINKS: u32 = 5;

/// Time the LED holds each state while blinking.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// "A request was served."
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestEvent {
    /// Number of LED toggles; `0` means [`DEFAULT_BLINKS`].
    pub blinks: u32,
}

impl RequestEvent {
    pub fn new(blinks: u32) -> Self {
        Self { blinks }
    }

    fn toggles(&self) -> u32 {
        if self.blinks == 0 {
            DEFAULT_BLINKS
        } else {
            self.blinks
        }
    }
}

/// Outcome of [`EventSender::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Dropped,
}

/// Non-blocking producer half of the event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<RequestEvent>,
}

impl EventSender {
    /// Enqueue `event` if there is room. Never waits and never fails.
    pub fn notify(&self, event: RequestEvent) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                debug!("Indicator busy, request event dropped");
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Indicator gone, request event dropped");
                Delivery::Dropped
            }
        }
    }
}

/// Create the bounded queue between the connection loop and the indicator.
pub fn event_channel() -> (EventSender, mpsc::Receiver<RequestEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (EventSender { tx }, rx)
}

/// Blinks a status LED once per request event.
pub struct Indicator<L> {
    led: L,
    interval: Duration,
    span: Span,
}

impl<L: StatusLed> Indicator<L> {
    pub fn new(led: L) -> Self {
        Self {
            led,
            interval: BLINK_INTERVAL,
            span: info_span!("indicator"),
        }
    }

    /// Log inside `span` instead of the default `indicator` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Consume events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<RequestEvent>) {
        let span = self.span.clone();
        async move {
            while let Some(event) = events.recv().await {
                debug!(blinks = event.toggles(), "Request event");
                self.blink(event.toggles()).await;
            }
            debug!("Event queue closed, indicator stopping");
        }
        .instrument(span)
        .await
    }

    /// Toggle the LED `toggles` times starting from on, then leave it on.
    pub async fn blink(&mut self, toggles: u32) {
        let mut on = true;
        for _ in 0..toggles {
            on = !on;
            self.set(on);
            tokio::time::sleep(self.interval).await;
        }
        self.set(true);
    }

    /// Drive the LED, logging failures.
    pub fn set(&mut self, on: bool) {
        if let Err(e) = self.led.set(on) {
            error!(error = %e, "Failed to change LED state");
        }
    }
}
