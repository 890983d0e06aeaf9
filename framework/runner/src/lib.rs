mod cli;
mod container;
mod duration;
mod init;
mod metrics;
mod monitor;
mod plan;
mod process;
mod progress;
mod run;
mod scheduler;
mod signal;
mod types;

pub mod prelude {
    pub use crate::cli::StressCli;
    pub use crate::container::{ContainerUnavailable, StressTarget};
    pub use crate::duration::{InvalidDurationFormat, StressDuration};
    pub use crate::init::init;
    pub use crate::plan::{InvalidPlanSpec, RunDescriptor, RunPlan};
    pub use crate::run::run;
    pub use crate::types::StressResult;
}
