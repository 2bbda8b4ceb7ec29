use clap::Subcommand;

use cadence_core::Command;

use crate::common;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Set the project label on the current session
    Set {
        /// Project name
        name: String,
    },
}

pub async fn run(action: ProjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = common::build_engine().await?;

    match action {
        ProjectAction::Set { name } => {
            engine
                .dispatch(Command::UpdateSessionProject { project: name })
                .await?;
        }
    }

    common::print_json(&engine.snapshot_session())?;
    engine.shutdown().await;
    Ok(())
}
