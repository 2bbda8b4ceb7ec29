use clap::Subcommand;

use crate::common;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's completed sessions
    Today,
    /// Closed days, keyed by date
    History,
}

pub async fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;

    match action {
        StatsAction::Today => common::print_json(&engine.snapshot_daily())?,
        StatsAction::History => common::print_json(&engine.snapshot_historical())?,
    }
    engine.shutdown().await;
    Ok(())
}
