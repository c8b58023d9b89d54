pub mod governor;
pub mod limits;

pub use governor::{BreachCause, DenyReason, EntryDecision, RiskGovernor, TickDecision};
pub use limits::RiskLimits;
