//! Text-to-image jobs
//!
//! Create an ERNIE-ViLG job, poll it until it finishes, then optionally
//! download the image.

use crate::baidu::auth::BaiduClient;
use crate::baidu::poll::{poll_until, PollPolicy, PollStatus};
use crate::baidu::BaiduError;
use crate::llm::adapters::AdapterError;
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tracing::info;

/// Job creation endpoint
pub const CREATE_URL: &str = "https://aip.baidubce.com/rpc/2.0/ernievilg/v1/txt2imgv2";

/// Job query endpoint
pub const QUERY_URL: &str = "https://aip.baidubce.com/rpc/2.0/ernievilg/v1/getImgv2";

/// Task id as text; the vendor may send it as a number
pub(crate) fn task_id_text(value: Option<&JsonValue>) -> Result<String, AdapterError> {
    match value {
        Some(JsonValue::String(id)) => Ok(id.clone()),
        Some(JsonValue::Number(id)) => Ok(id.to_string()),
        _ => Err(AdapterError::InvalidResponse("missing task_id".to_string())),
    }
}

/// Text-to-image client
#[derive(Debug)]
pub struct ImageGenerator {
    client: BaiduClient,
    poll: PollPolicy,
}

impl ImageGenerator {
    pub fn new(client: BaiduClient) -> Self {
        Self {
            client,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn client(&self) -> &BaiduClient {
        &self.client
    }

    /// Start a 1024x1024 job, returning its task id
    pub fn create_task(&self, text: &str) -> Result<String, AdapterError> {
        let body = json!({"prompt": text, "width": 1024, "height": 1024});
        let response = self.client.post_json(CREATE_URL, &body)?;
        task_id_text(response.get("data").and_then(|data| data.get("task_id")))
    }

    /// Current job info
    pub fn query_task(&self, task_id: &str) -> Result<JsonValue, AdapterError> {
        let response = self.client.post_json(QUERY_URL, &json!({"task_id": task_id}))?;
        response
            .get("data")
            .cloned()
            .ok_or_else(|| AdapterError::InvalidResponse("missing data".to_string()))
    }

    fn check(&self, task_id: &str) -> Result<PollStatus<String>, AdapterError> {
        let info = self.query_task(task_id)?;
        let status = info
            .get("task_status")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        match status.as_deref() {
            Some("RUNNING") => Ok(PollStatus::Pending),
            Some("SUCCESS") => info
                .pointer("/sub_task_result_list/0/final_image_list/0/img_url")
                .and_then(JsonValue::as_str)
                .map(|url| PollStatus::Done(url.to_string()))
                .ok_or_else(|| AdapterError::InvalidResponse("missing img_url".to_string())),
            _ => Ok(PollStatus::Failed(info)),
        }
    }

    /// Generate an image and return its URL; with `path` it is also saved
    pub fn to_url(&self, text: &str, path: Option<&Path>) -> Result<String, BaiduError> {
        if text.is_empty() {
            return Err(BaiduError::InvalidInput("text must not be empty".to_string()));
        }
        let task_id = self.create_task(text)?;
        let url = poll_until(&self.poll, || self.check(&task_id))?;
        info!(task_id = %task_id, "image job finished");

        if let Some(path) = path {
            let bytes = self.client.download(&url)?;
            std::fs::write(path, bytes)?;
        }
        self.client
            .record_call(json!({"text": text, "task_id": task_id, "url": url}));
        Ok(url)
    }
}
