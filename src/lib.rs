//! Momentum: weekly habit tracking with targets, a shared stopwatch and
//! Google Calendar/Tasks alongside.
//!
//! The `momentum-d` binary serves the JSON API over SQLite; the `momentum`
//! binary is a terminal client for it.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod google;
pub mod metrics;
pub mod models;
pub mod reorder;
pub mod rollover;
pub mod telemetry;
pub mod timer;
pub mod week;

pub use dashboard::{ActivitySummary, WeeklyDashboard, WeeklySummary};
pub use error::MomentumError;
pub use models::{Activity, ActivityGoal, ActivityType, DailyEntry, Id, WeeklyGoal, WeeklyReflection};
pub use timer::{StopOutcome, TimerStatus, TimerSync};
