//! Background refresh scheduling and the quote board facade.

mod board;
mod scheduler;
mod state;

pub use board::{QuoteBoard, QuoteSnapshot};
pub use scheduler::{ReconcileReport, Scheduler, WATCHDOG_GRACE};
pub use state::{KeyPhase, KeyStatus};
