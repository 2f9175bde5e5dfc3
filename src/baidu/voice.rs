//! Text-to-voice
//!
//! Long-text synthesis jobs (create, poll, fetch) and direct short-text
//! synthesis.

use crate::baidu::auth::BaiduClient;
use crate::baidu::image::task_id_text;
use crate::baidu::poll::{poll_until, PollPolicy, PollStatus};
use crate::baidu::BaiduError;
use crate::llm::adapters::transport::HttpRequest;
use crate::llm::adapters::AdapterError;
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use tracing::{info, warn};

/// Direct synthesis endpoint
pub const TEXT2AUDIO_URL: &str = "https://tsn.baidu.com/text2audio";

/// Job creation endpoint
pub const CREATE_URL: &str = "https://aip.baidubce.com/rpc/2.0/tts/v1/create";

/// Job query endpoint
pub const QUERY_URL: &str = "https://aip.baidubce.com/rpc/2.0/tts/v1/query";

/// Direct synthesis accepts at most this many characters
pub const DIRECT_MAX_CHARS: usize = 60;

/// Speech parameters (vendor scale 0-15, person id)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceParams {
    pub speed: u8,
    pub pitch: u8,
    pub volume: u8,
    pub person: u8,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speed: 5,
            pitch: 5,
            volume: 5,
            person: 4,
        }
    }
}

/// Text-to-voice client
#[derive(Debug)]
pub struct VoiceSynthesizer {
    client: BaiduClient,
    poll: PollPolicy,
    params: VoiceParams,
}

impl VoiceSynthesizer {
    pub fn new(client: BaiduClient) -> Self {
        Self {
            client,
            poll: PollPolicy::default(),
            params: VoiceParams::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_params(mut self, params: VoiceParams) -> Self {
        self.params = params;
        self
    }

    pub fn client(&self) -> &BaiduClient {
        &self.client
    }

    /// Synthesize short text directly, returning MP3 bytes
    ///
    /// Text beyond 60 characters is cut off.
    pub fn synthesize(&self, text: &str, path: Option<&Path>) -> Result<Vec<u8>, BaiduError> {
        if text.is_empty() {
            return Err(BaiduError::InvalidInput("text must not be empty".to_string()));
        }
        let text: String = if text.chars().count() > DIRECT_MAX_CHARS {
            warn!(max = DIRECT_MAX_CHARS, "voice text too long, truncating");
            text.chars().take(DIRECT_MAX_CHARS).collect()
        } else {
            text.to_string()
        };

        let params = self.params;
        let request = HttpRequest::post_form(
            TEXT2AUDIO_URL,
            [
                ("tok", self.client.token()?),
                ("tex", text.clone()),
                ("cuid", self.client.cuid().to_string()),
                ("ctp", "1".to_string()),
                ("lan", "zh".to_string()),
                ("spd", params.speed.to_string()),
                ("pit", params.pitch.to_string()),
                ("vol", params.volume.to_string()),
                ("per", params.person.to_string()),
                ("aue", "3".to_string()),
            ],
        )
        .header("Accept", "*/*");
        let bytes = self.client.send_raw(&request)?.body;

        if let Some(path) = path {
            std::fs::write(path, &bytes)?;
        }
        self.client.record_call(json!({
            "text": text,
            "path": path.map(|p| p.display().to_string()),
        }));
        Ok(bytes)
    }

    /// Start a synthesis job, returning its task id
    pub fn create_task(&self, text: &str) -> Result<String, AdapterError> {
        let params = self.params;
        let body = json!({
            "text": text,
            "format": "mp3-16k",
            "voice": params.person,
            "lang": "zh",
            "speed": params.speed,
            "pitch": params.pitch,
            "volume": params.volume,
            "enable_subtitle": 0,
        });
        let response = self.client.post_json(CREATE_URL, &body)?;
        task_id_text(response.get("task_id"))
    }

    /// Current job info
    pub fn query_task(&self, task_id: &str) -> Result<JsonValue, AdapterError> {
        let response = self
            .client
            .post_json(QUERY_URL, &json!({"task_ids": [task_id]}))?;
        response
            .pointer("/tasks_info/0")
            .cloned()
            .ok_or_else(|| AdapterError::InvalidResponse("missing tasks_info".to_string()))
    }

    fn check(&self, task_id: &str) -> Result<PollStatus<String>, AdapterError> {
        let info = self.query_task(task_id)?;
        let status = info
            .get("task_status")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        match status.as_deref() {
            Some("Running") => Ok(PollStatus::Pending),
            Some("Success") => info
                .pointer("/task_result/speech_url")
                .and_then(JsonValue::as_str)
                .map(|url| PollStatus::Done(url.to_string()))
                .ok_or_else(|| AdapterError::InvalidResponse("missing speech_url".to_string())),
            _ => Ok(PollStatus::Failed(info)),
        }
    }

    /// Synthesize through a job and return the audio URL; with `path` it is also saved
    pub fn to_url(&self, text: &str, path: Option<&Path>) -> Result<String, BaiduError> {
        if text.is_empty() {
            return Err(BaiduError::InvalidInput("text must not be empty".to_string()));
        }
        let task_id = self.create_task(text)?;
        let url = poll_until(&self.poll, || self.check(&task_id))?;
        info!(task_id = %task_id, "voice job finished");

        if let Some(path) = path {
            let bytes = self.client.download(&url)?;
            std::fs::write(path, bytes)?;
        }
        self.client
            .record_call(json!({"text": text, "task_id": task_id, "url": url}));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baidu::auth::tests::{fake_client, token_reply};
    use crate::baidu::poll::JobError;
    use crate::llm::adapters::transport::FakeReply;
    use std::time::Duration;

    fn audio() -> FakeReply {
        FakeReply::Raw {
            status: 200,
            content_type: "audio/mp3".to_string(),
            body: b"ID3".to_vec(),
        }
    }

    #[test]
    fn test_synthesize_truncates_and_fills_form() {
        let voice = VoiceSynthesizer::new(fake_client(vec![token_reply(), audio()]));
        let long: String = "字".repeat(70);
        assert_eq!(voice.synthesize(&long, None).unwrap(), b"ID3".to_vec());

        let requests = voice.client().transport().as_fake().unwrap().requests();
        let request = &requests[1];
        assert_eq!(request.url, TEXT2AUDIO_URL);
        assert_eq!(request.form_value("tex").unwrap().chars().count(), 60);
        assert_eq!(request.form_value("tok"), Some("tok-1"));
        assert_eq!(request.form_value("per"), Some("4"));
        assert_eq!(request.form_value("aue"), Some("3"));
        assert_eq!(request.form_value("cuid"), Some(voice.client().cuid()));
    }

    #[test]
    fn test_synthesize_error_code() {
        let voice = VoiceSynthesizer::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"err_no": 500, "error_code": 500, "err_msg": "notsupport."})),
        ]));
        assert!(matches!(
            voice.synthesize("你好", None),
            Err(BaiduError::Adapter(AdapterError::Vendor(_)))
        ));
    }

    #[test]
    fn test_to_url_times_out() {
        let running = || {
            FakeReply::Json(json!({"tasks_info": [{"task_id": "v1", "task_status": "Running"}]}))
        };
        let voice = VoiceSynthesizer::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"task_id": "v1", "task_status": "Created"})),
            running(),
        ]))
        .with_poll_policy(PollPolicy {
            interval: Duration::from_millis(1),
            timeout: Duration::ZERO,
        });
        assert!(matches!(
            voice.to_url("长文本", None),
            Err(BaiduError::Job(JobError::TimedOut(_)))
        ));
    }

    #[test]
    fn test_to_url_success() {
        let voice = VoiceSynthesizer::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"task_id": "v1"})),
            FakeReply::Json(json!({"tasks_info": [{
                "task_id": "v1",
                "task_status": "Success",
                "task_result": {"speech_url": "https://audio/v1.mp3"}
            }]})),
        ]));
        assert_eq!(voice.to_url("长文本", None).unwrap(), "https://audio/v1.mp3");
        let requests = voice.client().transport().as_fake().unwrap().requests();
        assert_eq!(requests[2].json_body().unwrap()["task_ids"][0], "v1");
    }
}
