use std::io;

use tokio::signal::{
    self,
    unix::{SignalKind, signal},
};

/// Resolves once SIGINT or SIGTERM arrives, with the name of the signal.
pub async fn wait_for_termination() -> io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
