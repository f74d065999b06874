//! Process shutdown signals.

use std::future::Future;
use std::io;

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Interrupt,
    Terminate,
}

/// Install the Ctrl+C and SIGTERM handlers and return a future resolving on
/// the first of them. Handlers are registered before this returns, so no
/// signal delivered afterwards is missed.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = Shutdown>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => Shutdown::Interrupt,
            _ = terminate.recv() => Shutdown::Terminate,
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = Shutdown>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Shutdown::Interrupt,
            Err(_) => std::future::pending().await,
        }
    })
}
