//! Gamification orchestrator.
//!
//! Composes the activity ledger, streak calculator, and achievement
//! evaluator into one transaction per activity event, and serves the
//! stats/leaderboard/catalog read paths.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::gamification::{
    evaluate_unlocks, level_for, rank_leaderboard, Achievement, AchievementCategory,
    AchievementCriteria, ActivityEvent, ActivityType, CreateAchievementRequest, CriteriaType,
    EvaluationInput, LeaderboardEntry, LeaderboardUser, StatsResponse, StreakState,
    UnlockedAchievement,
};
use crate::error::{on_unique_violation, ApiError, ApiResult};
use crate::services::cache::{keys, RedisCache};

/// Default and maximum leaderboard sizes
const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, sqlx::FromRow)]
struct GamificationRow {
    current_streak: i32,
    longest_streak: i32,
    last_activity_date: Option<DateTime<Utc>>,
    total_points: i64,
    jobs_completed: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct AchievementRow {
    id: Uuid,
    name: String,
    description: String,
    icon: String,
    category: AchievementCategory,
    criteria_type: String,
    criteria_target: i64,
    points: i64,
    is_active: bool,
    sort_order: i32,
}

impl From<AchievementRow> for Achievement {
    fn from(r: AchievementRow) -> Self {
        Achievement {
            id: r.id,
            name: r.name,
            description: r.description,
            icon: r.icon,
            category: r.category,
            criteria: AchievementCriteria {
                kind: CriteriaType::from_str(&r.criteria_type),
                target: r.criteria_target,
            },
            points: r.points,
            is_active: r.is_active,
            sort_order: r.sort_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    activity_type: ActivityType,
    points: i64,
    metadata: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityEvent {
    fn from(r: ActivityRow) -> Self {
        ActivityEvent {
            id: r.id,
            user_id: r.user_id,
            activity_type: r.activity_type,
            points: r.points,
            metadata: r.metadata,
            occurred_at: r.occurred_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnlockedRow {
    id: Uuid,
    name: String,
    description: String,
    icon: String,
    category: AchievementCategory,
    points: i64,
    unlocked_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LeaderboardRow {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    avatar: Option<String>,
    total_points: i64,
    current_streak: i32,
}

/// Orchestrates all writes to the `gamification.*` fields of the user
/// aggregate. No other component touches them.
#[derive(Clone)]
pub struct GamificationService {
    db: PgPool,
    cache: RedisCache,
}

impl GamificationService {
    pub fn new(db: PgPool, cache: RedisCache) -> Self {
        Self { db, cache }
    }

    /// Record a point-bearing activity for a user.
    ///
    /// Ledger append, point accrual, streak advance, and achievement unlocks
    /// all commit together; the user row is locked for the duration so
    /// concurrent activities serialize rather than clobber each other.
    pub async fn record_activity(
        &self,
        user_id: Uuid,
        activity: ActivityType,
        metadata: Option<serde_json::Value>,
    ) -> ApiResult<ActivityEvent> {
        let mut tx = self.db.begin().await?;

        let user: GamificationRow = sqlx::query_as(
            r#"
            SELECT current_streak, longest_streak, last_activity_date, total_points, jobs_completed
            FROM users WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

        let now = Utc::now();
        let points = activity.points();
        let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        let event_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO activity_events (id, user_id, activity_type, points, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(activity)
        .bind(points)
        .bind(&metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let streak = StreakState {
            current: user.current_streak,
            longest: user.longest_streak,
            last_activity: user.last_activity_date,
        }
        .advanced(now);

        let catalog = load_active_catalog(&mut tx).await?;
        let unlocked: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT achievement_id FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let outcome = evaluate_unlocks(
            &catalog,
            &unlocked,
            &EvaluationInput {
                current_streak: streak.current,
                jobs_completed: user.jobs_completed,
            },
            user.total_points + points,
        );

        for achievement_id in &outcome.newly_unlocked {
            sqlx::query(
                r#"
                INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(achievement_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE users SET
                total_points = $1,
                current_streak = $2,
                longest_streak = $3,
                last_activity_date = $4,
                updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(outcome.total_points)
        .bind(streak.current)
        .bind(streak.longest)
        .bind(streak.last_activity)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if !outcome.newly_unlocked.is_empty() {
            tracing::info!(
                user_id = %user_id,
                unlocked = outcome.newly_unlocked.len(),
                "Achievements unlocked"
            );
        }

        // Best-effort cache invalidation; the TTL covers misses
        if let Err(e) = self.cache.delete_pattern(keys::leaderboard_pattern()).await {
            tracing::warn!(error = %e, "Failed to invalidate leaderboard cache");
        }

        Ok(ActivityEvent {
            id: event_id,
            user_id,
            activity_type: activity,
            points,
            metadata,
            occurred_at: now,
        })
    }

    /// Gamification stats for one user: derived level, points, streaks,
    /// unlocked achievements, and the ten most recent ledger entries.
    pub async fn stats(&self, user_id: Uuid) -> ApiResult<StatsResponse> {
        let user: GamificationRow = sqlx::query_as(
            r#"
            SELECT current_streak, longest_streak, last_activity_date, total_points, jobs_completed
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

        let unlocked = sqlx::query_as::<_, UnlockedRow>(
            r#"
            SELECT a.id, a.name, a.description, a.icon, a.category, a.points, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = $1
            ORDER BY ua.unlocked_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let recent = self.recent_activities(user_id, 10).await?;

        Ok(StatsResponse {
            level: level_for(user.total_points),
            total_points: user.total_points,
            current_streak: user.current_streak,
            longest_streak: user.longest_streak,
            achievements: unlocked
                .into_iter()
                .map(|r| UnlockedAchievement {
                    id: r.id,
                    name: r.name,
                    description: r.description,
                    icon: r.icon,
                    category: r.category,
                    points: r.points,
                    unlocked_at: r.unlocked_at,
                })
                .collect(),
            recent_activities: recent,
        })
    }

    /// Newest-first slice of the activity ledger
    pub async fn recent_activities(&self, user_id: Uuid, limit: i64) -> ApiResult<Vec<ActivityEvent>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, user_id, activity_type, points, metadata, occurred_at
            FROM activity_events
            WHERE user_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ActivityEvent::from).collect())
    }

    /// Top users by total points, 1-based ranks, ties in storage order
    pub async fn leaderboard(&self, limit: Option<i64>) -> ApiResult<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT);

        let cache_key = keys::leaderboard(limit);
        if let Some(cached) = self.cache.get::<Vec<LeaderboardEntry>>(&cache_key).await {
            return Ok(cached);
        }

        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT id AS user_id, first_name, last_name, email, avatar, total_points, current_streak
            FROM users
            ORDER BY total_points DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let entries = rank_leaderboard(
            rows.into_iter()
                .map(|r| LeaderboardUser {
                    user_id: r.user_id,
                    name: format!("{} {}", r.first_name, r.last_name),
                    email: r.email,
                    avatar: r.avatar,
                    total_points: r.total_points,
                    current_streak: r.current_streak,
                })
                .collect(),
        );

        if let Err(e) = self.cache.set(&cache_key, &entries).await {
            tracing::warn!(error = %e, "Failed to cache leaderboard");
        }

        Ok(entries)
    }

    /// Active achievement catalog, sorted by (category, sort_order)
    pub async fn achievements(&self) -> ApiResult<Vec<Achievement>> {
        if let Some(cached) = self
            .cache
            .get::<Vec<Achievement>>(keys::achievement_catalog())
            .await
        {
            return Ok(cached);
        }

        let mut tx = self.db.begin().await?;
        let catalog = load_active_catalog(&mut tx).await?;
        tx.commit().await?;

        if let Err(e) = self.cache.set(keys::achievement_catalog(), &catalog).await {
            tracing::warn!(error = %e, "Failed to cache achievement catalog");
        }

        Ok(catalog)
    }

    /// Admin catalog insert. Name uniqueness is the database's job.
    pub async fn create_achievement(
        &self,
        req: CreateAchievementRequest,
    ) -> ApiResult<Achievement> {
        let id = Uuid::new_v4();
        let sort_order = req.sort_order.unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO achievements
                (id, name, description, icon, category, criteria_type, criteria_target,
                 points, is_active, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.icon)
        .bind(req.category)
        .bind(req.criteria.kind.as_str())
        .bind(req.criteria.target)
        .bind(req.points)
        .bind(req.is_active)
        .bind(sort_order)
        .execute(&self.db)
        .await
        .map_err(|e| on_unique_violation(e, "An achievement with this name already exists"))?;

        if let Err(e) = self.cache.delete_pattern(keys::achievement_catalog()).await {
            tracing::warn!(error = %e, "Failed to invalidate achievement catalog cache");
        }

        Ok(Achievement {
            id,
            name: req.name,
            description: req.description,
            icon: req.icon,
            category: req.category,
            criteria: req.criteria,
            points: req.points,
            is_active: req.is_active,
            sort_order,
        })
    }
}

/// Catalog in evaluation order. The same ordering serves the public catalog
/// endpoint, so "catalog order" means one thing everywhere.
async fn load_active_catalog(
    tx: &mut Transaction<'_, Postgres>,
) -> ApiResult<Vec<Achievement>> {
    let rows = sqlx::query_as::<_, AchievementRow>(
        r#"
        SELECT id, name, description, icon, category, criteria_type, criteria_target,
               points, is_active, sort_order
        FROM achievements
        WHERE is_active = true
        ORDER BY category, sort_order, created_at
        "#,
    )
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(Achievement::from).collect())
}
