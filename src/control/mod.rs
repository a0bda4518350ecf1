//! Run control shared by every worker
//!
//! - `GoalCounter`: bounded count of accepted items, with compensation
//! - `RunControl`: stop and goal flags plus the cancellation token they drive

mod goal;
mod run_control;

pub use goal::GoalCounter;
pub use run_control::RunControl;
