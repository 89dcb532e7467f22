//! Background synchronization.

mod scheduler;

pub use scheduler::{SchedulerHandle, SyncScheduler, TickReport};
