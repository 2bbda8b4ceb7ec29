use clap::Subcommand;

use cadence_core::Command;

use crate::common;

#[derive(Subcommand)]
pub enum BreakAction {
    /// Start a short break
    Short,
    /// Start a long break
    Long,
    /// Skip the current break and return to a dormant focus phase
    Skip,
}

pub async fn run(action: BreakAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;

    let command = match action {
        BreakAction::Short => Command::StartShortBreak,
        BreakAction::Long => Command::StartLongBreak,
        BreakAction::Skip => Command::SkipBreak,
    };
    engine.dispatch(command).await?;

    common::print_json(&engine.snapshot_session())?;
    engine.shutdown().await;
    Ok(())
}
