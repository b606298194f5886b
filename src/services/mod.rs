pub mod activity;

pub use activity::{ActivityEntry, ActivityLog, ActivityStats, DEFAULT_ACTIVITY_CAPACITY};
