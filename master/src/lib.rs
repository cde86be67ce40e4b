pub mod coordinator;

pub use coordinator::{EtlSettings, TaskCoordinator, TaskPlan};
