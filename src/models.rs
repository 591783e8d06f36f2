//! Records stored by the service and the request bodies that create or change them.
//!
//! Dates travel as `YYYY-MM-DD`. Time activities record minutes per day and set
//! their weekly target in hours; count activities use one unit for both.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::MomentumError;

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[cfg_attr(test, derive(fake::Dummy))]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivityType {
    Time,
    Count,
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Time
    }
}

impl ActivityType {
    pub fn default_unit(self) -> &'static str {
        match self {
            ActivityType::Time => "hours",
            ActivityType::Count => "times",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Id,
    pub name: String,
    pub is_active: bool,
    pub activity_type: ActivityType,
    pub target_unit: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(test, derive(fake::Dummy))]
pub struct NewActivity {
    pub name: String,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub target_unit: Option<String>,
    /// Weekly target for the current week, written alongside the activity.
    #[serde(default)]
    pub initial_target: Option<f64>,
    /// The initial target of a time activity was given in minutes rather than hours.
    #[serde(default)]
    pub target_in_minutes: bool,
}

impl NewActivity {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if self.name.trim().is_empty() {
            return Err(MomentumError::invalid("activity name cannot be empty"));
        }
        if matches!(self.initial_target, Some(t) if t < 0.0) {
            return Err(MomentumError::invalid("weekly target cannot be negative"));
        }
        Ok(())
    }

    pub fn unit(&self) -> String {
        self.target_unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.activity_type.default_unit())
            .to_string()
    }

    /// The initial weekly target in the unit goals are stored in, if one is worth writing.
    pub fn initial_target_value(&self) -> Option<f64> {
        let target = self.initial_target.filter(|t| *t > 0.0)?;
        if self.activity_type == ActivityType::Time && self.target_in_minutes {
            Some(target / 60.0)
        } else {
            Some(target)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    pub name: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub target_unit: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyEntry {
    pub id: Id,
    pub activity_id: Id,
    pub entry_date: NaiveDate,
    pub value_amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInput {
    pub activity_id: Id,
    pub entry_date: NaiveDate,
    pub value_amount: f64,
}

impl EntryInput {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if !self.value_amount.is_finite() || self.value_amount < 0.0 {
            return Err(MomentumError::invalid("value_amount must be zero or more"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub activity_id: Option<Id>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WeeklyGoal {
    pub id: Id,
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub target_value: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalInput {
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub target_value: f64,
}

impl GoalInput {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if !self.target_value.is_finite() || self.target_value < 0.0 {
            return Err(MomentumError::invalid("target_value must be zero or more"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WeeklyReflection {
    pub id: Id,
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub reflection_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionInput {
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub reflection_text: String,
}

/// A checklist item attached to an activity for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActivityGoal {
    pub id: Id,
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub goal_text: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityGoal {
    pub activity_id: Id,
    pub week_start_date: NaiveDate,
    pub goal_text: String,
}

impl NewActivityGoal {
    pub fn validate(&self) -> Result<(), MomentumError> {
        if self.goal_text.trim().is_empty() {
            return Err(MomentumError::invalid("goal text cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToggleInput {
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekQuery {
    pub week_start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderInput {
    pub from: Id,
    pub to: Id,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    #[test]
    fn test_unit_defaults_by_type() {
        let mut activity: NewActivity = Faker.fake();
        activity.target_unit = None;

        activity.activity_type = ActivityType::Time;
        assert_eq!(activity.unit(), "hours");

        activity.activity_type = ActivityType::Count;
        assert_eq!(activity.unit(), "times");

        activity.target_unit = Some("  pages ".to_string());
        assert_eq!(activity.unit(), "pages");
    }

    #[test]
    fn test_initial_target_in_minutes_converts_to_hours() {
        let mut activity: NewActivity = Faker.fake();
        activity.activity_type = ActivityType::Time;
        activity.initial_target = Some(90.0);
        activity.target_in_minutes = true;
        assert_eq!(activity.initial_target_value(), Some(1.5));

        // Count activities ignore the minutes flag.
        activity.activity_type = ActivityType::Count;
        assert_eq!(activity.initial_target_value(), Some(90.0));

        activity.initial_target = Some(0.0);
        assert_eq!(activity.initial_target_value(), None);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut activity: NewActivity = Faker.fake();
        activity.name = "   ".to_string();
        activity.initial_target = None;
        assert!(activity.validate().is_err());
    }

    #[test]
    fn test_negative_entry_is_rejected() {
        let entry = EntryInput {
            activity_id: 1,
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            value_amount: -5.0,
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_activity_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ActivityType::Count).unwrap(), "\"count\"");
        let parsed: ActivityType = serde_json::from_str("\"time\"").unwrap();
        assert_eq!(parsed, ActivityType::Time);
    }
}
