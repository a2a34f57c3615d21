//! Gamification domain: activity ledger types, streak calculation,
//! achievement unlock evaluation, level derivation, leaderboard ranking.
//!
//! Streak and unlock logic are pure functions so they can be tested without
//! a database; the service layer wires them into transactions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-bearing user action recorded in the activity ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ActivityType {
    Login,
    JobPosted,
    ApplicationSent,
    ApplicationAccepted,
    JobCompleted,
    ProfileUpdated,
}

impl ActivityType {
    /// Fixed per-type point award
    pub fn points(&self) -> i64 {
        match self {
            Self::Login => 5,
            Self::JobPosted => 10,
            Self::ApplicationSent => 15,
            Self::ApplicationAccepted => 25,
            Self::JobCompleted => 50,
            Self::ProfileUpdated => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::JobPosted => "job_posted",
            Self::ApplicationSent => "application_sent",
            Self::ApplicationAccepted => "application_accepted",
            Self::JobCompleted => "job_completed",
            Self::ProfileUpdated => "profile_updated",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub points: i64,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Level is always derived from points, never stored
pub fn level_for(total_points: i64) -> i64 {
    total_points / 100 + 1
}

// ============================================================================
// Streak calculation
// ============================================================================

/// A user's streak counters plus the timestamp of the last counted activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub current: i32,
    pub longest: i32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl StreakState {
    /// Fold a new activity timestamp into the streak.
    ///
    /// Day buckets are elapsed whole days (24h slices), not calendar-day
    /// boundaries: an activity 23 hours after the last one lands in day 0
    /// even if midnight passed in between.
    ///
    /// Same-day activity does not advance `last_activity`; only an activity
    /// a full day or more later moves the anchor.
    pub fn advanced(&self, now: DateTime<Utc>) -> StreakState {
        let Some(last) = self.last_activity else {
            // First-ever activity
            return StreakState {
                current: 1,
                longest: self.longest.max(1),
                last_activity: Some(now),
            };
        };

        let days_since = (now - last).num_days().abs();

        if days_since == 0 {
            *self
        } else if days_since == 1 {
            let current = self.current + 1;
            StreakState {
                current,
                longest: self.longest.max(current),
                last_activity: Some(now),
            }
        } else {
            StreakState {
                current: 1,
                longest: self.longest,
                last_activity: Some(now),
            }
        }
    }
}

// ============================================================================
// Achievement catalog
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AchievementCategory {
    Streak,
    Jobs,
    Applications,
    Profile,
    Community,
}

/// Unlock criteria kind. Unrecognized kinds deserialize to `Unknown`, which
/// never satisfies — a criteria typo disables an achievement rather than
/// erroring or unlocking it for everyone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    StreakDays,
    JobsCompleted,
    TotalPoints,
    #[serde(other)]
    Unknown,
}

impl CriteriaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreakDays => "streak_days",
            Self::JobsCompleted => "jobs_completed",
            Self::TotalPoints => "total_points",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "streak_days" => Self::StreakDays,
            "jobs_completed" => Self::JobsCompleted,
            "total_points" => Self::TotalPoints,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementCriteria {
    #[serde(rename = "type")]
    pub kind: CriteriaType,
    pub target: i64,
}

/// Admin-managed catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    pub criteria: AchievementCriteria,
    /// Bonus points granted on unlock
    pub points: i64,
    pub is_active: bool,
    pub sort_order: i32,
}

/// Request DTO for admin catalog inserts
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAchievementRequest {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    pub criteria: AchievementCriteria,
    pub points: i64,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Unlock evaluation
// ============================================================================

/// User stats the evaluator reads (besides the running point total)
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput {
    pub current_streak: i32,
    pub jobs_completed: i32,
}

/// Result of one evaluation pass
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// Ids of achievements unlocked by this pass, in catalog order
    pub newly_unlocked: Vec<Uuid>,
    /// Point total including unlock bonuses
    pub total_points: i64,
}

/// Run one forward pass over the catalog.
///
/// The point total mutates live during the pass: a `total_points` achievement
/// later in catalog order sees bonuses from achievements unlocked earlier in
/// the same call. Achievements already in `unlocked` are skipped, which makes
/// repeated evaluation idempotent.
pub fn evaluate_unlocks(
    catalog: &[Achievement],
    unlocked: &HashSet<Uuid>,
    input: &EvaluationInput,
    total_points: i64,
) -> EvaluationOutcome {
    let mut newly_unlocked = Vec::new();
    let mut total_points = total_points;

    for achievement in catalog {
        if !achievement.is_active || unlocked.contains(&achievement.id) {
            continue;
        }

        let satisfied = match achievement.criteria.kind {
            CriteriaType::StreakDays => {
                i64::from(input.current_streak) >= achievement.criteria.target
            }
            CriteriaType::JobsCompleted => {
                i64::from(input.jobs_completed) >= achievement.criteria.target
            }
            CriteriaType::TotalPoints => total_points >= achievement.criteria.target,
            CriteriaType::Unknown => false,
        };

        if satisfied {
            newly_unlocked.push(achievement.id);
            total_points += achievement.points;
        }
    }

    EvaluationOutcome {
        newly_unlocked,
        total_points,
    }
}

// ============================================================================
// Leaderboard and stats projections
// ============================================================================

/// Projected identity plus point data, before ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub total_points: i64,
    pub current_streak: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    #[serde(flatten)]
    pub user: LeaderboardUser,
}

/// Order by points descending and assign 1-based ranks. The sort is stable,
/// so ties keep their storage order — no further tie-break is defined.
pub fn rank_leaderboard(mut users: Vec<LeaderboardUser>) -> Vec<LeaderboardEntry> {
    users.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    users
        .into_iter()
        .enumerate()
        .map(|(i, user)| LeaderboardEntry {
            rank: (i + 1) as u32,
            user,
        })
        .collect()
}

/// Achievement as it appears in a user's stats (with unlock time)
#[derive(Debug, Clone, Serialize)]
pub struct UnlockedAchievement {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    pub points: i64,
    pub unlocked_at: DateTime<Utc>,
}

/// GET /gamification/stats response
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub level: i64,
    pub total_points: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub achievements: Vec<UnlockedAchievement>,
    pub recent_activities: Vec<ActivityEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn achievement(id: Uuid, kind: CriteriaType, target: i64, points: i64) -> Achievement {
        Achievement {
            id,
            name: format!("test-{}", id),
            description: String::new(),
            icon: "star".to_string(),
            category: AchievementCategory::Jobs,
            criteria: AchievementCriteria { kind, target },
            points,
            is_active: true,
            sort_order: 0,
        }
    }

    // ---- streak ----

    #[test]
    fn first_activity_starts_streak_at_one() {
        let state = StreakState {
            current: 0,
            longest: 0,
            last_activity: None,
        };
        let now = at(1_700_000_000);
        let next = state.advanced(now);
        assert_eq!(next.current, 1);
        assert_eq!(next.longest, 1);
        assert_eq!(next.last_activity, Some(now));
    }

    #[test]
    fn same_day_activity_changes_nothing() {
        let start = at(1_700_000_000);
        let state = StreakState {
            current: 3,
            longest: 5,
            last_activity: Some(start),
        };
        // 23 hours later is still day 0, even across midnight
        let next = state.advanced(start + Duration::hours(23));
        assert_eq!(next.current, 3);
        assert_eq!(next.longest, 5);
        assert_eq!(next.last_activity, Some(start), "anchor must not advance");
    }

    #[test]
    fn next_day_extends_streak() {
        let start = at(1_700_000_000);
        let state = StreakState {
            current: 3,
            longest: 3,
            last_activity: Some(start),
        };
        // 25 hours elapsed truncates to 1 whole day
        let now = start + Duration::hours(25);
        let next = state.advanced(now);
        assert_eq!(next.current, 4);
        assert_eq!(next.longest, 4);
        assert_eq!(next.last_activity, Some(now));
    }

    #[test]
    fn gap_resets_current_but_not_longest() {
        let start = at(1_700_000_000);
        let state = StreakState {
            current: 7,
            longest: 10,
            last_activity: Some(start),
        };
        let now = start + Duration::days(2);
        let next = state.advanced(now);
        assert_eq!(next.current, 1);
        assert_eq!(next.longest, 10);
        assert_eq!(next.last_activity, Some(now));
    }

    #[test]
    fn longest_never_drops_below_current() {
        let mut state = StreakState {
            current: 0,
            longest: 0,
            last_activity: None,
        };
        let mut now = at(1_700_000_000);
        for _ in 0..5 {
            state = state.advanced(now);
            assert!(state.longest >= state.current);
            now += Duration::days(1);
        }
        assert_eq!(state.current, 5);
        assert_eq!(state.longest, 5);
    }

    // ---- level ----

    #[test]
    fn level_derivation_boundaries() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(250), 3);
    }

    // ---- unlock evaluation ----

    #[test]
    fn threshold_unlocks_add_bonus_points() {
        let a = achievement(Uuid::new_v4(), CriteriaType::JobsCompleted, 5, 20);
        let input = EvaluationInput {
            current_streak: 0,
            jobs_completed: 5,
        };
        let outcome = evaluate_unlocks(&[a.clone()], &HashSet::new(), &input, 100);
        assert_eq!(outcome.newly_unlocked, vec![a.id]);
        assert_eq!(outcome.total_points, 120);
    }

    #[test]
    fn already_unlocked_is_skipped() {
        let a = achievement(Uuid::new_v4(), CriteriaType::JobsCompleted, 5, 20);
        let unlocked: HashSet<Uuid> = [a.id].into_iter().collect();
        let input = EvaluationInput {
            current_streak: 0,
            jobs_completed: 50,
        };
        let outcome = evaluate_unlocks(&[a], &unlocked, &input, 100);
        assert!(outcome.newly_unlocked.is_empty());
        assert_eq!(outcome.total_points, 100, "bonus must not double-count");
    }

    #[test]
    fn evaluation_is_idempotent() {
        let a = achievement(Uuid::new_v4(), CriteriaType::StreakDays, 3, 30);
        let input = EvaluationInput {
            current_streak: 3,
            jobs_completed: 0,
        };

        let first = evaluate_unlocks(&[a.clone()], &HashSet::new(), &input, 0);
        assert_eq!(first.newly_unlocked, vec![a.id]);

        let unlocked: HashSet<Uuid> = first.newly_unlocked.iter().copied().collect();
        let second = evaluate_unlocks(&[a], &unlocked, &input, first.total_points);
        assert!(second.newly_unlocked.is_empty());
        assert_eq!(second.total_points, 30);
    }

    #[test]
    fn unknown_criteria_never_unlocks() {
        let a = achievement(Uuid::new_v4(), CriteriaType::Unknown, 0, 1000);
        let input = EvaluationInput {
            current_streak: 100,
            jobs_completed: 100,
        };
        let outcome = evaluate_unlocks(&[a], &HashSet::new(), &input, 1_000_000);
        assert!(outcome.newly_unlocked.is_empty());
    }

    #[test]
    fn inactive_achievements_are_skipped() {
        let mut a = achievement(Uuid::new_v4(), CriteriaType::TotalPoints, 10, 5);
        a.is_active = false;
        let input = EvaluationInput {
            current_streak: 0,
            jobs_completed: 0,
        };
        let outcome = evaluate_unlocks(&[a], &HashSet::new(), &input, 100);
        assert!(outcome.newly_unlocked.is_empty());
    }

    #[test]
    fn bonus_points_are_visible_later_in_same_pass() {
        // First unlock pushes the running total over the second's threshold.
        let first = achievement(Uuid::new_v4(), CriteriaType::JobsCompleted, 1, 60);
        let second = achievement(Uuid::new_v4(), CriteriaType::TotalPoints, 100, 10);
        let input = EvaluationInput {
            current_streak: 0,
            jobs_completed: 1,
        };

        let outcome = evaluate_unlocks(
            &[first.clone(), second.clone()],
            &HashSet::new(),
            &input,
            50,
        );
        assert_eq!(outcome.newly_unlocked, vec![first.id, second.id]);
        assert_eq!(outcome.total_points, 120);
    }

    #[test]
    fn criteria_type_round_trips_with_unknown_fallback() {
        assert_eq!(CriteriaType::from_str("streak_days"), CriteriaType::StreakDays);
        assert_eq!(CriteriaType::from_str("total_points"), CriteriaType::TotalPoints);
        assert_eq!(CriteriaType::from_str("logins_per_hour"), CriteriaType::Unknown);
    }

    // ---- leaderboard ----

    fn board_user(name: &str, points: i64) -> LeaderboardUser {
        LeaderboardUser {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            avatar: None,
            total_points: points,
            current_streak: 0,
        }
    }

    #[test]
    fn leaderboard_ranks_by_points_descending() {
        let entries = rank_leaderboard(vec![
            board_user("a", 300),
            board_user("b", 100),
            board_user("c", 200),
        ]);

        let points: Vec<i64> = entries.iter().map(|e| e.user.total_points).collect();
        assert_eq!(points, vec![300, 200, 100]);
        let ranks: Vec<u32> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn ties_keep_storage_order() {
        let first = board_user("first", 100);
        let second = board_user("second", 100);
        let first_id = first.user_id;

        let entries = rank_leaderboard(vec![first, second]);
        assert_eq!(entries[0].user.user_id, first_id);
    }

    // ---- composed scenario ----

    #[test]
    fn two_completions_on_consecutive_days() {
        // Day one: job_completed is worth 50 points, first activity ever.
        let mut points = 0i64;
        let mut streak = StreakState {
            current: 0,
            longest: 0,
            last_activity: None,
        };
        let day_one = at(1_700_000_000);

        points += ActivityType::JobCompleted.points();
        streak = streak.advanced(day_one);
        assert_eq!(points, 50);
        assert_eq!(level_for(points), 1);
        assert_eq!(streak.current, 1);

        // Day two: another completion a day later.
        points += ActivityType::JobCompleted.points();
        streak = streak.advanced(day_one + Duration::days(1));
        assert_eq!(points, 100);
        assert_eq!(level_for(points), 2);
        assert_eq!(streak.current, 2);
        assert_eq!(streak.longest, 2);
    }
}
