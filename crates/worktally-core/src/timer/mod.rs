mod cycle;
mod engine;
mod observer;
mod schedule;

pub use cycle::{CycleEngine, CycleState, PhaseCompletion};
pub use engine::{format_hms, StoppedRun, TrackerEngine, TrackerState, TrackerStatus};
pub use observer::TrackerObserver;
pub use schedule::{CycleDurations, Phase};
