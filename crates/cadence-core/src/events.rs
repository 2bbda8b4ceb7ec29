//! Outward events broadcast to presentation layers.
//!
//! Every session mutation produces an event after it has been persisted,
//! so observers never see state that is not yet durable.

use serde::Serialize;

use crate::stats::CompletedSession;
use crate::timer::Session;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The session record changed (command, tick, or remote update).
    UpdateSession { session: Session },
    /// A Focus phase finished and was appended to the daily ledger.
    SessionCompleted { completed: CompletedSession },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use chrono::{TimeZone, Utc};

    #[test]
    fn update_session_uses_the_documented_action_tag() {
        let session = Session::new(
            &Settings::default(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        );
        let json = serde_json::to_value(EngineEvent::UpdateSession { session }).unwrap();
        assert_eq!(json["action"], "updateSession");
        assert_eq!(json["session"]["status"], "stopped");
    }
}
