//! Aggregate request statistics
//!
//! Counts over the whole table and over the past day, week and month, plus
//! token (Qwen) or character (translate) totals and averages.

use crate::llm::reply::now_millis;
use crate::request_log::db::{Error, RequestLog};
use rusqlite::params;
use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Qwen request statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QwenStats {
    pub count: i64,
    pub past_day_count: i64,
    pub past_week_count: i64,
    pub past_month_count: i64,
    pub total_token: i64,
    pub total_token_input: i64,
    pub total_token_output: i64,
    pub total_token_output_think: i64,
    pub avg_token: Option<f64>,
    pub avg_token_input: Option<f64>,
    pub avg_token_output: Option<f64>,
    pub avg_token_output_think: Option<f64>,
    /// Latest request time (ms)
    pub last_time: Option<i64>,
}

/// Translate request statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateStats {
    pub count: i64,
    pub past_day_count: i64,
    pub past_week_count: i64,
    pub past_month_count: i64,
    pub total_input_chars: i64,
    pub total_output_chars: i64,
    pub avg_input_chars: Option<f64>,
    pub avg_output_chars: Option<f64>,
    pub last_time: Option<i64>,
}

impl RequestLog {
    /// Qwen statistics as of now
    pub fn qwen_stats(&self) -> Result<QwenStats, Error> {
        self.qwen_stats_at(now_millis())
    }

    /// Qwen statistics as of `now` (ms)
    pub fn qwen_stats_at(&self, now: i64) -> Result<QwenStats, Error> {
        let conn = self.conn();
        let stats = conn.query_row(
            "SELECT
                COUNT(*),
                SUM(CASE WHEN request_time > ?1 THEN 1 ELSE 0 END),
                SUM(CASE WHEN request_time > ?2 THEN 1 ELSE 0 END),
                SUM(CASE WHEN request_time > ?3 THEN 1 ELSE 0 END),
                SUM(token_total),
                SUM(token_input),
                SUM(token_output),
                SUM(token_output_think),
                AVG(token_total),
                AVG(token_input),
                AVG(token_output),
                AVG(token_output_think),
                MAX(request_time)
             FROM qwen_requests",
            params![now - DAY_MS, now - 7 * DAY_MS, now - 30 * DAY_MS],
            |row| {
                Ok(QwenStats {
                    count: row.get(0)?,
                    past_day_count: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    past_week_count: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    past_month_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    total_token: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    total_token_input: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    total_token_output: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                    total_token_output_think: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
                    avg_token: row.get(8)?,
                    avg_token_input: row.get(9)?,
                    avg_token_output: row.get(10)?,
                    avg_token_output_think: row.get(11)?,
                    last_time: row.get(12)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Translate statistics as of now
    pub fn translate_stats(&self) -> Result<TranslateStats, Error> {
        self.translate_stats_at(now_millis())
    }

    /// Translate statistics as of `now` (ms)
    pub fn translate_stats_at(&self, now: i64) -> Result<TranslateStats, Error> {
        let conn = self.conn();
        let stats = conn.query_row(
            "SELECT
                COUNT(*),
                SUM(CASE WHEN request_time > ?1 THEN 1 ELSE 0 END),
                SUM(CASE WHEN request_time > ?2 THEN 1 ELSE 0 END),
                SUM(CASE WHEN request_time > ?3 THEN 1 ELSE 0 END),
                SUM(LENGTH(input)),
                SUM(LENGTH(output)),
                AVG(LENGTH(input)),
                AVG(LENGTH(output)),
                MAX(request_time)
             FROM translate_requests",
            params![now - DAY_MS, now - 7 * DAY_MS, now - 30 * DAY_MS],
            |row| {
                Ok(TranslateStats {
                    count: row.get(0)?,
                    past_day_count: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    past_week_count: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    past_month_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    total_input_chars: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    total_output_chars: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    avg_input_chars: row.get(6)?,
                    avg_output_chars: row.get(7)?,
                    last_time: row.get(8)?,
                })
            },
        )?;
        Ok(stats)
    }
}
