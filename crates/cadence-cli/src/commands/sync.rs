use clap::Subcommand;

use crate::common;

#[derive(Subcommand)]
pub enum SyncAction {
    /// Reconcile local and remote state now
    Now,
    /// Print the coarse sync status
    Status,
}

pub async fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;

    match action {
        SyncAction::Now => {
            engine.reconcile().await?;
            common::print_json(&serde_json::json!({ "status": engine.sync_status() }))?;
        }
        SyncAction::Status => {
            common::print_json(&serde_json::json!({ "status": engine.sync_status() }))?;
        }
    }
    engine.shutdown().await;
    Ok(())
}
