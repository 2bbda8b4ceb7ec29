use clap::Subcommand;

use cadence_core::Command;

use crate::common;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start {
        /// Project to record the session under
        #[arg(long)]
        project: Option<String>,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop and reset to a dormant focus phase
    Stop,
    /// Print the current session with derived times as JSON
    Status,
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;

    match action {
        TimerAction::Start { project } => {
            if let Some(project) = project {
                engine
                    .dispatch(Command::UpdateSessionProject { project })
                    .await?;
            }
            engine.dispatch(Command::StartTimer).await?;
        }
        TimerAction::Pause => engine.dispatch(Command::PauseTimer).await?,
        TimerAction::Resume => engine.dispatch(Command::ResumeTimer).await?,
        TimerAction::Stop => engine.dispatch(Command::StopTimer).await?,
        TimerAction::Status => {}
    }

    let session = engine.snapshot_session();
    let now = engine.now();
    common::print_json(&serde_json::json!({
        "session": session,
        "elapsed": session.elapsed(now),
        "remaining": session.remaining(now),
        "complete": session.is_complete(now),
    }))?;
    engine.shutdown().await;
    Ok(())
}
