//! Display rendering and logging.

mod aggregator;
mod fragment;
mod logging;
mod rotation;

pub use aggregator::{Aggregator, PLACEHOLDER};
pub use fragment::{render_fragment, FragmentStyle, DEGRADED_MARKER};
pub use logging::setup_logging;
pub use rotation::Rotation;
