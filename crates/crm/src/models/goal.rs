//! Sales goals and progress tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{patch, patch_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum GoalType {
    #[default]
    Individual,
    Team,
    Department,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GoalCategory {
    #[default]
    Revenue,
    Deals,
    Activities,
    ConversionRate,
    NewClients,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum GoalPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Goal {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub goal_type: GoalType,
    pub category: GoalCategory,
    pub period: GoalPeriod,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub creator_id: i64,
    pub assignee_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: GoalStatus,
    pub progress_percentage: f64,
    pub reward_description: Option<String>,
    pub penalty_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Goal joined with assignee and creator names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GoalView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub goal: Goal,
    pub assignee_name: Option<String>,
    pub creator_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalCreate {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub goal_type: GoalType,
    #[serde(default)]
    pub category: GoalCategory,
    #[serde(default)]
    pub period: GoalPeriod,
    pub target_value: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub assignee_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub reward_description: Option<String>,
    pub penalty_description: Option<String>,
}

fn default_unit() -> String {
    "BRL".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal_type: Option<GoalType>,
    pub category: Option<GoalCategory>,
    pub period: Option<GoalPeriod>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
    pub assignee_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<GoalStatus>,
    pub reward_description: Option<String>,
    pub penalty_description: Option<String>,
}

impl Goal {
    pub fn apply(&mut self, update: GoalUpdate, now: DateTime<Utc>) {
        patch(&mut self.title, update.title);
        patch_opt(&mut self.description, update.description);
        patch(&mut self.goal_type, update.goal_type);
        patch(&mut self.category, update.category);
        patch(&mut self.period, update.period);
        patch(&mut self.target_value, update.target_value);
        patch(&mut self.current_value, update.current_value);
        patch(&mut self.unit, update.unit);
        patch_opt(&mut self.assignee_id, update.assignee_id);
        patch(&mut self.start_date, update.start_date);
        patch(&mut self.end_date, update.end_date);
        patch_opt(&mut self.reward_description, update.reward_description);
        patch_opt(&mut self.penalty_description, update.penalty_description);

        if let Some(status) = update.status {
            if status == GoalStatus::Completed && self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
            self.status = status;
        }
        self.progress_percentage = progress_percentage(self.current_value, self.target_value);
    }

    /// Record a new current value. Reaching the target completes an active goal.
    pub fn record_progress(&mut self, current_value: f64, now: DateTime<Utc>) {
        self.current_value = current_value;
        self.progress_percentage = progress_percentage(current_value, self.target_value);
        if self.progress_percentage >= 100.0 && self.status == GoalStatus::Active {
            self.status = GoalStatus::Completed;
            self.completed_at = Some(now);
        }
    }
}

/// `current / target` as a percentage capped at 100.
#[must_use]
pub fn progress_percentage(current: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (current / target * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(target: f64) -> Goal {
        let now = Utc::now();
        Goal {
            id: 1,
            title: "Q3 revenue".into(),
            description: None,
            goal_type: GoalType::Individual,
            category: GoalCategory::Revenue,
            period: GoalPeriod::Quarterly,
            target_value: target,
            current_value: 0.0,
            unit: "BRL".into(),
            creator_id: 1,
            assignee_id: Some(2),
            start_date: now,
            end_date: now,
            completed_at: None,
            status: GoalStatus::Active,
            progress_percentage: 0.0,
            reward_description: None,
            penalty_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_progress_caps_at_hundred() {
        assert!((progress_percentage(50.0, 200.0) - 25.0).abs() < f64::EPSILON);
        assert!((progress_percentage(500.0, 200.0) - 100.0).abs() < f64::EPSILON);
        assert!(progress_percentage(10.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reaching_target_completes_active_goal() {
        let now = Utc::now();
        let mut g = goal(1000.0);
        g.record_progress(400.0, now);
        assert_eq!(g.status, GoalStatus::Active);

        g.record_progress(1000.0, now);
        assert_eq!(g.status, GoalStatus::Completed);
        assert_eq!(g.completed_at, Some(now));
    }

    #[test]
    fn test_paused_goal_stays_paused() {
        let mut g = goal(100.0);
        g.status = GoalStatus::Paused;
        g.record_progress(150.0, Utc::now());
        assert_eq!(g.status, GoalStatus::Paused);
        assert!((g.progress_percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_completion_stamps_time() {
        let now = Utc::now();
        let mut g = goal(100.0);
        g.apply(
            GoalUpdate {
                status: Some(GoalStatus::Completed),
                ..Default::default()
            },
            now,
        );
        assert_eq!(g.completed_at, Some(now));
    }
}
