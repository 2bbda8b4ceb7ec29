use tokio::sync::broadcast::error::RecvError;

use crate::common;

/// Foreground engine host: brings sync online, runs the 1 Hz driver for a
/// session that is already running, and prints every outward event as a
/// JSON line until interrupted.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;
    let mut events = engine.subscribe();

    engine.go_online().await;
    engine.start_driver_if_running();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                engine.shutdown().await;
                break;
            }
        }
    }
    Ok(())
}
