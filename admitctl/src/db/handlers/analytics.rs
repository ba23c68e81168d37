//! Aggregate queries for the dashboard and leaderboards.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::{
    api::models::{
        dashboard::{CourseBreakdown, DashboardStats, StatusBreakdown},
        students::StudentStatus,
    },
    db::errors::Result,
    leaderboard::{AgentTally, Window},
};

#[derive(FromRow)]
struct StatusCountRow {
    pub status: StudentStatus,
    pub count: i64,
}

#[derive(FromRow)]
struct CourseRow {
    pub course: String,
    pub students: i64,
    pub approved: i64,
}

#[derive(FromRow)]
struct UserCountsRow {
    pub active_agents: i64,
    pub pending_registrations: i64,
}

#[derive(FromRow)]
struct IncentiveTotalsRow {
    pub paid: Decimal,
    pub unpaid: Decimal,
}

/// Tallies for every active agent, including agents with no admissions.
///
/// Only `approved` students count. A student's decision time is the admin review
/// when there was one, else the coordinator approval (two-tier mode).
#[instrument(skip(db), err)]
pub async fn agent_tallies(db: &PgPool, window: Option<Window>) -> Result<Vec<AgentTally>> {
    let tallies = sqlx::query_as::<_, AgentTally>(
        r#"
        WITH decided AS (
            SELECT s.agent_id,
                   COALESCE(i.amount, 0) AS amount,
                   COALESCE(s.admin_reviewed_at, s.coordinator_approved_at) AS decided_at
            FROM students s
            LEFT JOIN incentives i ON i.student_id = s.id
            WHERE s.status = 'approved'
        )
        SELECT u.id AS agent_id,
               u.username,
               u.first_name,
               u.last_name,
               u.agent_code,
               COUNT(d.agent_id) AS total_admissions,
               COALESCE(SUM(d.amount), 0) AS total_incentive,
               COUNT(d.agent_id) FILTER (
                   WHERE $1::timestamptz IS NOT NULL AND d.decided_at >= $1 AND d.decided_at < $2
               ) AS period_admissions,
               COALESCE(SUM(d.amount) FILTER (
                   WHERE $1::timestamptz IS NOT NULL AND d.decided_at >= $1 AND d.decided_at < $2
               ), 0) AS period_incentive
        FROM users u
        LEFT JOIN decided d ON d.agent_id = u.id
        WHERE u.role = 'agent' AND u.status = 'active'
        GROUP BY u.id
        "#,
    )
    .bind(window.map(|w| w.start))
    .bind(window.map(|w| w.end))
    .fetch_all(db)
    .await?;

    Ok(tallies)
}

#[instrument(skip(db), err)]
pub async fn dashboard_stats(db: &PgPool) -> Result<DashboardStats> {
    let statuses = sqlx::query_as::<_, StatusCountRow>("SELECT status, COUNT(*) AS count FROM students GROUP BY status")
        .fetch_all(db)
        .await?;

    let mut breakdown = StatusBreakdown::default();
    for row in &statuses {
        match row.status {
            StudentStatus::Pending => breakdown.pending = row.count,
            StudentStatus::CoordinatorApproved => breakdown.coordinator_approved = row.count,
            StudentStatus::Approved => breakdown.approved = row.count,
            StudentStatus::Rejected => breakdown.rejected = row.count,
        }
    }

    let courses = sqlx::query_as::<_, CourseRow>(
        r#"
        SELECT course,
               COUNT(*) AS students,
               COUNT(*) FILTER (WHERE status = 'approved') AS approved
        FROM students
        GROUP BY course
        ORDER BY COUNT(*) DESC, course ASC
        "#,
    )
    .fetch_all(db)
    .await?;

    let users = sqlx::query_as::<_, UserCountsRow>(
        r#"
        SELECT COUNT(*) FILTER (WHERE role = 'agent' AND status = 'active') AS active_agents,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending_registrations
        FROM users
        "#,
    )
    .fetch_one(db)
    .await?;

    let incentives = sqlx::query_as::<_, IncentiveTotalsRow>(
        r#"
        SELECT COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0) AS paid,
               COALESCE(SUM(amount) FILTER (WHERE status = 'unpaid'), 0) AS unpaid
        FROM incentives
        "#,
    )
    .fetch_one(db)
    .await?;

    Ok(DashboardStats {
        total_admissions: statuses.iter().map(|r| r.count).sum(),
        active_agents: users.active_agents,
        pending_registrations: users.pending_registrations,
        status_breakdown: breakdown,
        course_breakdown: courses
            .into_iter()
            .map(|c| CourseBreakdown {
                course: c.course,
                students: c.students,
                approved: c.approved,
            })
            .collect(),
        incentives_paid: incentives.paid,
        incentives_unpaid: incentives.unpaid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::{approve_test_student, create_test_student, create_test_user};
    use chrono::{Duration, Utc};

    #[sqlx::test]
    #[test_log::test]
    async fn test_agent_tallies_count_only_approved(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let idle = create_test_user(&pool, Role::Agent).await;
        let approved = create_test_student(&pool, agent.id, "BSc").await;
        create_test_student(&pool, agent.id, "BSc").await;
        approve_test_student(&pool, approved.id, Decimal::from(3000)).await;

        let overall = agent_tallies(&pool, None).await.unwrap();
        assert_eq!(overall.len(), 2);
        let mine = overall.iter().find(|t| t.agent_id == agent.id).unwrap();
        assert_eq!(mine.total_admissions, 1);
        assert_eq!(mine.total_incentive, Decimal::from(3000));
        assert_eq!(mine.period_admissions, 0);
        let other = overall.iter().find(|t| t.agent_id == idle.id).unwrap();
        assert_eq!(other.total_admissions, 0);

        let now = Utc::now();
        let current = Window {
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
        };
        let windowed = agent_tallies(&pool, Some(current)).await.unwrap();
        let mine = windowed.iter().find(|t| t.agent_id == agent.id).unwrap();
        assert_eq!(mine.period_admissions, 1);
        assert_eq!(mine.period_incentive, Decimal::from(3000));

        let past = Window {
            start: now - Duration::days(30),
            end: now - Duration::days(29),
        };
        let windowed = agent_tallies(&pool, Some(past)).await.unwrap();
        assert!(windowed.iter().all(|t| t.period_admissions == 0));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dashboard_stats(pool: PgPool) {
        let agent = create_test_user(&pool, Role::Agent).await;
        let first = create_test_student(&pool, agent.id, "BSc").await;
        create_test_student(&pool, agent.id, "BCA").await;
        approve_test_student(&pool, first.id, Decimal::from(3000)).await;

        let stats = dashboard_stats(&pool).await.unwrap();
        assert_eq!(stats.total_admissions, 2);
        assert_eq!(stats.active_agents, 1);
        assert_eq!(
            stats.status_breakdown,
            StatusBreakdown {
                pending: 1,
                approved: 1,
                ..Default::default()
            }
        );
        assert_eq!(stats.incentives_unpaid, Decimal::from(3000));
        assert_eq!(stats.incentives_paid, Decimal::ZERO);
        assert_eq!(stats.course_breakdown.len(), 2);
    }
}
