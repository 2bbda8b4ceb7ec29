mod driver;
mod session;

pub use driver::{TickOutcome, TimerDriver};
pub use session::{BreakKind, Phase, Session, Status};
