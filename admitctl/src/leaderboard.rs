//! Agent ranking and leaderboard time windows.
//!
//! Rankings are computed from per-agent tallies loaded by
//! [`crate::db::handlers::analytics::agent_tallies`]. Agents are ordered by
//! admissions, then incentive total, then username so ties are stable.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::api::models::leaderboard::{LeaderboardEntry, LeaderboardKind, LeaderboardPeriod, LeaderboardResponse, LeaderboardSummary};
use crate::api::models::users::full_name;
use crate::errors::Error;
use crate::types::UserId;

/// Half-open `[start, end)` interval over decision timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Monday 00:00 UTC of the week containing `now`
    pub fn weekly(now: DateTime<Utc>) -> Self {
        let monday = now.date_naive() - Days::new(u64::from(now.weekday().num_days_from_monday()));
        let start = midnight(monday);
        Self {
            start,
            end: start + chrono::Duration::days(7),
        }
    }

    /// The calendar month containing `now`
    pub fn monthly(now: DateTime<Utc>) -> Self {
        let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
        let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
        Self {
            start: midnight(first),
            end: midnight(next),
        }
    }

    /// Parse a client supplied range. Date-only ends include the whole day.
    pub fn parse_range(start: &str, end: &str) -> Result<Self, Error> {
        let start = parse_bound(start, false)?;
        let end = parse_bound(end, true)?;
        if start >= end {
            return Err(Error::BadRequest {
                message: "start_date must be before end_date".to_string(),
            });
        }
        Ok(Self { start, end })
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Parse one end of a date filter. A date-only `end` moves to the next midnight.
pub fn parse_bound(value: &str, is_end: bool) -> Result<DateTime<Utc>, Error> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let date = if is_end { date + Days::new(1) } else { date };
        return Ok(midnight(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(Error::BadRequest {
        message: format!("Invalid date '{value}'. Use YYYY-MM-DD"),
    })
}

/// Per-agent counts for one leaderboard query
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AgentTally {
    pub agent_id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub agent_code: Option<String>,
    pub total_admissions: i64,
    pub total_incentive: Decimal,
    pub period_admissions: i64,
    pub period_incentive: Decimal,
}

/// Order tallies into a leaderboard. With a window, period figures decide the order.
pub fn rank(mut tallies: Vec<AgentTally>, kind: LeaderboardKind, window: Option<Window>) -> LeaderboardResponse {
    let by_period = window.is_some();
    tallies.sort_by(|a, b| {
        let key = |t: &AgentTally| {
            if by_period {
                (t.period_admissions, t.period_incentive)
            } else {
                (t.total_admissions, t.total_incentive)
            }
        };
        key(b).cmp(&key(a)).then_with(|| a.username.cmp(&b.username))
    });

    let summary = LeaderboardSummary {
        total_period_admissions: tallies
            .iter()
            .map(|t| if by_period { t.period_admissions } else { t.total_admissions })
            .sum(),
        total_period_incentives: tallies
            .iter()
            .map(|t| if by_period { t.period_incentive } else { t.total_incentive })
            .sum(),
    };

    let leaderboard: Vec<LeaderboardEntry> = tallies
        .into_iter()
        .enumerate()
        .map(|(index, t)| LeaderboardEntry {
            full_name: full_name(&t.first_name, &t.last_name, &t.username),
            agent_id: t.agent_id,
            username: t.username,
            agent_code: t.agent_code,
            total_admissions: t.total_admissions,
            total_incentive: t.total_incentive,
            period_admissions: by_period.then_some(t.period_admissions),
            period_incentive: by_period.then_some(t.period_incentive),
            rank: index + 1,
            is_top_3: index < 3,
        })
        .collect();

    LeaderboardResponse {
        total_agents: leaderboard.len(),
        leaderboard,
        kind,
        period: window.map(|w| LeaderboardPeriod { start: w.start, end: w.end }),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn tally(username: &str, total: (i64, i64), period: (i64, i64)) -> AgentTally {
        AgentTally {
            agent_id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            agent_code: None,
            total_admissions: total.0,
            total_incentive: Decimal::from(total.1),
            period_admissions: period.0,
            period_incentive: Decimal::from(period.1),
        }
    }

    #[test]
    fn test_weekly_window_starts_monday() {
        // 2025-03-13 is a Thursday
        let window = Window::weekly(at("2025-03-13T15:30:00Z"));
        assert_eq!(window.start, at("2025-03-10T00:00:00Z"));
        assert_eq!(window.end, at("2025-03-17T00:00:00Z"));

        let monday = Window::weekly(at("2025-03-10T00:00:00Z"));
        assert_eq!(monday.start, at("2025-03-10T00:00:00Z"));
    }

    #[test]
    fn test_monthly_window_rolls_over_year() {
        let window = Window::monthly(at("2024-12-31T23:59:59Z"));
        assert_eq!(window.start, at("2024-12-01T00:00:00Z"));
        assert_eq!(window.end, at("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_parse_range() {
        let window = Window::parse_range("2025-01-01", "2025-01-31").unwrap();
        assert_eq!(window.start, at("2025-01-01T00:00:00Z"));
        assert_eq!(window.end, at("2025-02-01T00:00:00Z"));

        let window = Window::parse_range("2025-01-01T08:00:00.250", "2025-01-02T00:00:00Z").unwrap();
        assert_eq!(window.end, at("2025-01-02T00:00:00Z"));

        assert!(Window::parse_range("2025-02-01", "2025-01-01").is_err());
        assert!(Window::parse_range("yesterday", "2025-01-01").is_err());
    }

    #[test]
    fn test_rank_overall_by_admissions_then_incentive() {
        let board = rank(
            vec![
                tally("carol", (3, 9000), (0, 0)),
                tally("alice", (5, 12000), (0, 0)),
                tally("bob", (3, 15000), (0, 0)),
                tally("dave", (0, 0), (0, 0)),
            ],
            LeaderboardKind::Overall,
            None,
        );

        let names: Vec<&str> = board.leaderboard.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol", "dave"]);
        assert_eq!(board.leaderboard[0].rank, 1);
        assert!(board.leaderboard[2].is_top_3);
        assert!(!board.leaderboard[3].is_top_3);
        assert!(board.leaderboard[0].period_admissions.is_none());
        assert_eq!(board.summary.total_period_admissions, 11);
        assert!(board.period.is_none());
    }

    #[test]
    fn test_rank_window_uses_period_figures() {
        let window = Window::weekly(at("2025-03-13T12:00:00Z"));
        let board = rank(
            vec![tally("alice", (10, 30000), (1, 3000)), tally("bob", (2, 6000), (2, 6000))],
            LeaderboardKind::Weekly,
            Some(window),
        );

        assert_eq!(board.leaderboard[0].username, "bob");
        assert_eq!(board.leaderboard[0].period_admissions, Some(2));
        assert_eq!(board.summary.total_period_incentives, Decimal::from(9000));
        assert_eq!(board.total_agents, 2);
        assert_eq!(board.period.as_ref().unwrap().start, window.start);

        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["type"], "weekly");
        assert_eq!(json["leaderboard"][0]["period_incentive"], serde_json::json!(6000.0));
    }
}
