use std::sync::Arc;

use cadence_core::storage::{EngineConfig, FileStore, Store};
use cadence_core::{Engine, SystemClock};

/// Build a bootstrapped engine over the on-disk store. Each CLI invocation
/// is one short-lived host process; the session's wall-clock timestamps
/// carry the timer across invocations.
pub async fn build_engine() -> Result<Arc<Engine>, Box<dyn std::error::Error>> {
    let store = Store::new(Arc::new(FileStore::open_default()?));
    let engine = Engine::new(store, Arc::new(SystemClock), EngineConfig::load());
    engine.bootstrap().await?;
    Ok(engine)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
