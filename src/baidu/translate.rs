//! Baidu Fanyi translation
//!
//! Requests are signed with `md5(appid + text + salt + appkey)`.

use crate::baidu::BaiduError;
use crate::llm::adapters::transport::{HttpRequest, SyncTransport, Transport, UreqTransport};
use crate::llm::adapters::AdapterError;
use crate::llm::reply::{char_len, now_millis};
use crate::request_log::{RequestLog, TranslateRequestRow};
use md5::{Digest, Md5};
use rand::Rng;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Fanyi endpoint
pub const TRANSLATE_URL: &str = "http://api.fanyi.baidu.com/api/trans/vip/translate";

/// Default maximum input length in characters
pub const DEFAULT_MAX_LEN: usize = 6000;

/// Fanyi language codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Zh,
    En,
    Yue,
    Kor,
    Th,
    Pt,
    El,
    Bul,
    Fin,
    Slo,
    Cht,
    Wyw,
    Fra,
    Ara,
    De,
    Nl,
    Est,
    Cs,
    Swe,
    Vie,
    Jp,
    Spa,
    Ru,
    It,
    Pl,
    Dan,
    Rom,
    Hu,
}

impl Lang {
    pub const ALL: [Lang; 28] = [
        Lang::Zh,
        Lang::En,
        Lang::Yue,
        Lang::Kor,
        Lang::Th,
        Lang::Pt,
        Lang::El,
        Lang::Bul,
        Lang::Fin,
        Lang::Slo,
        Lang::Cht,
        Lang::Wyw,
        Lang::Fra,
        Lang::Ara,
        Lang::De,
        Lang::Nl,
        Lang::Est,
        Lang::Cs,
        Lang::Swe,
        Lang::Vie,
        Lang::Jp,
        Lang::Spa,
        Lang::Ru,
        Lang::It,
        Lang::Pl,
        Lang::Dan,
        Lang::Rom,
        Lang::Hu,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Lang::Zh => "zh",
            Lang::En => "en",
            Lang::Yue => "yue",
            Lang::Kor => "kor",
            Lang::Th => "th",
            Lang::Pt => "pt",
            Lang::El => "el",
            Lang::Bul => "bul",
            Lang::Fin => "fin",
            Lang::Slo => "slo",
            Lang::Cht => "cht",
            Lang::Wyw => "wyw",
            Lang::Fra => "fra",
            Lang::Ara => "ara",
            Lang::De => "de",
            Lang::Nl => "nl",
            Lang::Est => "est",
            Lang::Cs => "cs",
            Lang::Swe => "swe",
            Lang::Vie => "vie",
            Lang::Jp => "jp",
            Lang::Spa => "spa",
            Lang::Ru => "ru",
            Lang::It => "it",
            Lang::Pl => "pl",
            Lang::Dan => "dan",
            Lang::Rom => "rom",
            Lang::Hu => "hu",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lang::ALL
            .iter()
            .copied()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| format!("unknown language code: {}", s))
    }
}

/// Source language, which may be left to the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLang {
    Auto,
    Lang(Lang),
}

impl SourceLang {
    pub fn code(&self) -> &'static str {
        match self {
            SourceLang::Auto => "auto",
            SourceLang::Lang(lang) => lang.code(),
        }
    }
}

impl FromStr for SourceLang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(SourceLang::Auto)
        } else {
            s.parse().map(SourceLang::Lang)
        }
    }
}

fn is_zh(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// Language of the first Latin letter or Chinese character in `text`
pub fn detect_lang(text: &str) -> Option<Lang> {
    text.chars().find_map(|ch| {
        if ch.is_ascii_alphabetic() {
            Some(Lang::En)
        } else if is_zh(ch) {
            Some(Lang::Zh)
        } else {
            None
        }
    })
}

/// Fanyi client
#[derive(Debug)]
pub struct Translator {
    app_id: String,
    app_key: String,
    max_len: usize,
    transport: Transport,
    request_log: Option<Arc<RequestLog>>,
}

impl Translator {
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self::with_transport(app_id, app_key, Transport::Real(UreqTransport::new()))
    }

    /// Create translator with custom transport (for testing)
    pub fn with_transport(
        app_id: impl Into<String>,
        app_key: impl Into<String>,
        transport: Transport,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
            max_len: DEFAULT_MAX_LEN,
            transport,
            request_log: None,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_request_log(mut self, log: Arc<RequestLog>) -> Self {
        self.request_log = Some(log);
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Request signature
    pub fn sign(&self, text: &str, salt: u32) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.app_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(salt.to_string().as_bytes());
        hasher.update(self.app_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn request(&self, text: &str, from: SourceLang, to: Lang) -> Result<JsonValue, AdapterError> {
        let salt: u32 = rand::thread_rng().gen_range(32768..65536);
        let request = HttpRequest::get(TRANSLATE_URL)
            .query("q", text)
            .query("from", from.code())
            .query("to", to.code())
            .query("appid", &self.app_id)
            .query("salt", salt.to_string())
            .query("sign", self.sign(text, salt));
        debug!(from = from.code(), to = to.code(), len = char_len(text), "translate request");

        let response = self.transport.send(&request)?;
        if !response.is_json() {
            return Err(AdapterError::UnexpectedContentType(response.content_type));
        }
        let json = response.json()?;
        if json.get("error_code").is_some() {
            return Err(AdapterError::Vendor(json));
        }
        Ok(json)
    }

    /// Translate text
    ///
    /// Without `from` the language is detected (falling back to vendor
    /// auto-detection); without `to` English goes to Chinese and everything
    /// else to English.
    pub fn translate(
        &self,
        text: &str,
        from: Option<SourceLang>,
        to: Option<Lang>,
    ) -> Result<String, BaiduError> {
        let len = char_len(text);
        if len > self.max_len {
            return Err(BaiduError::InvalidInput(format!(
                "text length {} exceeds maximum {}",
                len, self.max_len
            )));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(BaiduError::InvalidInput("text must not be empty".to_string()));
        }

        let from = from.unwrap_or_else(|| {
            detect_lang(text)
                .map(SourceLang::Lang)
                .unwrap_or(SourceLang::Auto)
        });
        let to = to.unwrap_or(if from == SourceLang::Lang(Lang::En) {
            Lang::Zh
        } else {
            Lang::En
        });

        let request_time = now_millis();
        let response = self.request(text, from, to)?;
        let response_time = now_millis();

        let output = response
            .get("trans_result")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| AdapterError::InvalidResponse("missing trans_result".to_string()))?
            .iter()
            .filter_map(|item| item.get("dst").and_then(JsonValue::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(log) = &self.request_log {
            log.insert_translate_request(&TranslateRequestRow {
                request_time,
                response_time,
                input: text.to_string(),
                output: output.clone(),
                input_lang: from.code().to_string(),
                output_lang: to.code().to_string(),
            })?;
        }
        Ok(output)
    }
}
