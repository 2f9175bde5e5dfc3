//! Request rows: inserts and reads

use crate::llm::adapters::ChatMessage;
use crate::llm::reply::{ChatRecord, UsageCounters, WebCitation};
use crate::request_log::db::{Error, RequestLog};
use rusqlite::{params, Row};

/// One Qwen chat request
#[derive(Debug, Clone, PartialEq)]
pub struct QwenRequestRow {
    /// Milliseconds since the Unix epoch
    pub request_time: i64,
    pub response_time: i64,
    pub messages: Vec<ChatMessage>,
    pub reply: Option<String>,
    pub think: Option<String>,
    pub web: Option<Vec<WebCitation>>,
    pub usage: Option<UsageCounters>,
    pub model: String,
}

impl QwenRequestRow {
    /// Row for a request whose reply is not known yet
    pub fn pending(
        request_time: i64,
        response_time: i64,
        messages: Vec<ChatMessage>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            request_time,
            response_time,
            messages,
            reply: None,
            think: None,
            web: None,
            usage: None,
            model: model.into(),
        }
    }

    /// Fill in the reply fields from the final record
    pub fn complete(mut self, record: &ChatRecord) -> Self {
        self.reply = record.content.clone();
        self.think = record.think.clone();
        self.web = record.web.clone();
        self.usage = record.usage;
        self
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(Self, String, Option<String>)> {
        let usage = match (
            row.get::<_, Option<i64>>("token_total")?,
            row.get::<_, Option<i64>>("token_input")?,
            row.get::<_, Option<i64>>("token_output")?,
        ) {
            (Some(total), Some(input), Some(output)) => Some(UsageCounters {
                input: input as u64,
                output: output as u64,
                total: total as u64,
                output_think: row
                    .get::<_, Option<i64>>("token_output_think")?
                    .map(|n| n as u64),
            }),
            _ => None,
        };
        let row_data = Self {
            request_time: row.get("request_time")?,
            response_time: row.get("response_time")?,
            messages: Vec::new(),
            reply: row.get("reply")?,
            think: row.get("think")?,
            web: None,
            usage,
            model: row.get("model")?,
        };
        Ok((row_data, row.get("messages_json")?, row.get("web_json")?))
    }
}

/// One translate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequestRow {
    pub request_time: i64,
    pub response_time: i64,
    pub input: String,
    pub output: String,
    pub input_lang: String,
    pub output_lang: String,
}

impl RequestLog {
    /// Insert a Qwen request row, returning its id
    pub fn insert_qwen_request(&self, row: &QwenRequestRow) -> Result<i64, Error> {
        let messages_json = serde_json::to_string(&row.messages)?;
        let web_json = row.web.as_ref().map(serde_json::to_string).transpose()?;
        let usage = row.usage.as_ref();

        let conn = self.conn();
        conn.execute(
            "INSERT INTO qwen_requests (
                request_time, response_time, messages_json, reply, think, web_json,
                token_total, token_input, token_output, token_output_think, model
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.request_time,
                row.response_time,
                messages_json,
                row.reply,
                row.think,
                web_json,
                usage.map(|u| u.total as i64),
                usage.map(|u| u.input as i64),
                usage.map(|u| u.output as i64),
                usage.and_then(|u| u.output_think).map(|n| n as i64),
                row.model,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent Qwen requests, newest first
    pub fn recent_qwen_requests(&self, limit: usize) -> Result<Vec<QwenRequestRow>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM qwen_requests ORDER BY request_time DESC, id DESC LIMIT ?1",
        )?;
        let raw = stmt
            .query_map(params![limit as i64], QwenRequestRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(mut row, messages_json, web_json)| -> Result<QwenRequestRow, Error> {
                row.messages = serde_json::from_str(&messages_json)?;
                row.web = web_json.as_deref().map(serde_json::from_str).transpose()?;
                Ok(row)
            })
            .collect()
    }

    /// Insert a translate request row, returning its id
    pub fn insert_translate_request(&self, row: &TranslateRequestRow) -> Result<i64, Error> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO translate_requests (
                request_time, response_time, input, output, input_lang, output_lang
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.request_time,
                row.response_time,
                row.input,
                row.output,
                row.input_lang,
                row.output_lang,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent translate requests, newest first
    pub fn recent_translate_requests(
        &self,
        limit: usize,
    ) -> Result<Vec<TranslateRequestRow>, Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT request_time, response_time, input, output, input_lang, output_lang
             FROM translate_requests ORDER BY request_time DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TranslateRequestRow {
                    request_time: row.get(0)?,
                    response_time: row.get(1)?,
                    input: row.get(2)?,
                    output: row.get(3)?,
                    input_lang: row.get(4)?,
                    output_lang: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
