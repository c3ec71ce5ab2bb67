//! Proactive scheduling: per-user schedules, leader election, outreach.

pub mod leader;
pub mod proactive;
pub mod schedule;

pub use leader::LeaderElector;
pub use proactive::{ProactiveScheduler, SchedulerDeps};
pub use schedule::{FollowUp, FollowUpKind, ScheduleManager, ScheduleRecord};
