//! Streamed reply assembly
//!
//! A Qwen SSE response is turned into one shared accumulator and two cursors
//! over it. The think cursor yields reasoning fragments, the text cursor
//! yields reply fragments. Both pull from the same underlying line stream,
//! so reasoning must be drained before the reply text can be read.

use crate::llm::adapters::transport_types::{AdapterError, LineStream};
use crate::llm::reply::extract::{
    data_payload, extract_record, extract_text, extract_think, extract_usage, extract_web,
};
use crate::llm::reply::record::{char_len, ChatRecord, RecordHandle};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Called once with the final record when the line stream is exhausted
pub type CompletionHook = Box<dyn FnOnce(&ChatRecord) + Send>;

/// Stream protocol violations
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream produced no parseable content")]
    NoContent,

    #[error("must first use up think generator")]
    ThinkNotDrained,

    #[error("malformed stream event: {0}")]
    Malformed(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

struct ReplyState {
    lines: LineStream,
    record: RecordHandle,
    think_emptied: bool,
    exhausted: bool,
    hook: Option<CompletionHook>,
}

impl ReplyState {
    /// Next data event, skipping keep-alives; `None` once the stream is closed
    fn next_event(&mut self) -> Option<Result<JsonValue, StreamError>> {
        if self.exhausted {
            return None;
        }
        while let Some(line) = self.lines.next() {
            let line = match line {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            let Some(payload) = data_payload(&line) else {
                continue;
            };
            let event = serde_json::from_str::<JsonValue>(payload)
                .map_err(|err| StreamError::Malformed(err.to_string()));
            if let Ok(json) = &event {
                self.absorb_common(json);
            }
            return Some(event);
        }
        self.finish();
        None
    }

    /// Usage is last-wins, citations first-non-empty-wins
    fn absorb_common(&mut self, json: &JsonValue) {
        let usage = extract_usage(json);
        let mut record = self.record.lock();
        if usage.is_some() {
            record.usage = usage;
        }
        if record.web.is_none() {
            record.web = extract_web(json);
        }
    }

    fn finish(&mut self) {
        self.exhausted = true;
        self.think_emptied = true;
        let final_record = {
            let mut record = self.record.lock();
            record.content.get_or_insert_with(String::new);
            if record.think.as_deref() == Some("") {
                record.think = None;
            }
            record.clone()
        };
        debug!(len = final_record.len, "reply stream closed");
        if let Some(hook) = self.hook.take() {
            hook(&final_record);
        }
    }
}

type SharedState = Arc<Mutex<ReplyState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ReplyState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Result of starting a streamed reply
pub struct StreamReply {
    /// The reply record, filled in as the cursors advance
    pub record: RecordHandle,
    pub text: TextCursor,
    pub think: ThinkCursor,
}

impl fmt::Debug for StreamReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReply")
            .field("record", &self.record.snapshot())
            .finish_non_exhaustive()
    }
}

/// Wrap a line stream into a reply record and its two cursors
///
/// Consumes lines up to the first data event eagerly; everything after is
/// read lazily by the cursors.
pub fn assemble_stream(
    mut lines: LineStream,
    hook: Option<CompletionHook>,
) -> Result<StreamReply, StreamError> {
    let mut first = None;
    for line in lines.by_ref() {
        let line = line?;
        if let Some(payload) = data_payload(&line) {
            first = Some(
                serde_json::from_str::<JsonValue>(payload)
                    .map_err(|err| StreamError::Malformed(err.to_string()))?,
            );
            break;
        }
    }
    let first = first.ok_or(StreamError::NoContent)?;

    let record = extract_record(&first);
    let think_emptied = record.think.is_none();
    let record = RecordHandle::new(record);

    let state = Arc::new(Mutex::new(ReplyState {
        lines,
        record: record.clone(),
        think_emptied,
        exhausted: false,
        hook,
    }));

    Ok(StreamReply {
        record,
        text: TextCursor {
            state: Arc::clone(&state),
            started: false,
            done: false,
        },
        think: ThinkCursor {
            state,
            started: false,
            done: false,
        },
    })
}

/// Reply text fragments, in order
pub struct TextCursor {
    state: SharedState,
    started: bool,
    done: bool,
}

impl Iterator for TextCursor {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut state = lock(&self.state);
        if !state.think_emptied {
            return Some(Err(StreamError::ThinkNotDrained));
        }

        if !self.started {
            self.started = true;
            let initial = state.record.update(|record| {
                record.content.get_or_insert_with(String::new).clone()
            });
            if !initial.is_empty() {
                return Some(Ok(initial));
            }
        }

        loop {
            match state.next_event() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Some(Ok(json)) => {
                    let Some(fragment) = extract_text(&json) else {
                        continue;
                    };
                    state.record.update(|record| {
                        record
                            .content
                            .get_or_insert_with(String::new)
                            .push_str(&fragment);
                        record.len += char_len(&fragment);
                    });
                    return Some(Ok(fragment));
                }
            }
        }
    }
}

impl fmt::Debug for TextCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextCursor")
            .field("started", &self.started)
            .field("done", &self.done)
            .finish()
    }
}

/// Deep-thinking fragments, in order
///
/// Ends at the first event without reasoning text; that event's reply text
/// becomes the start of the record content.
pub struct ThinkCursor {
    state: SharedState,
    started: bool,
    done: bool,
}

impl Iterator for ThinkCursor {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut state = lock(&self.state);
        if state.think_emptied {
            self.done = true;
            return None;
        }

        if !self.started {
            self.started = true;
            let initial = state.record.lock().think.clone().unwrap_or_default();
            if !initial.is_empty() {
                return Some(Ok(initial));
            }
        }

        match state.next_event() {
            None => {
                self.done = true;
                None
            }
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            Some(Ok(json)) => match extract_think(&json) {
                Some(fragment) => {
                    state.record.update(|record| {
                        record
                            .think
                            .get_or_insert_with(String::new)
                            .push_str(&fragment);
                    });
                    Some(Ok(fragment))
                }
                None => {
                    let text = extract_text(&json).unwrap_or_default();
                    state.record.update(|record| {
                        record.len = char_len(&text);
                        record.content = Some(text);
                    });
                    state.think_emptied = true;
                    self.done = true;
                    None
                }
            },
        }
    }
}

impl fmt::Debug for ThinkCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThinkCursor")
            .field("started", &self.started)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sse(events: &[JsonValue]) -> LineStream {
        let mut lines = Vec::new();
        for event in events {
            lines.push(Ok(format!("data:{}", event)));
            lines.push(Ok(String::new()));
        }
        Box::new(lines.into_iter())
    }

    fn text_event(text: &str) -> JsonValue {
        json!({"output": {"choices": [{"message": {"content": text}}]}})
    }

    fn think_event(think: &str) -> JsonValue {
        json!({"output": {"choices": [{"message": {"content": "", "reasoning_content": think}}]}})
    }

    #[test]
    fn test_text_concatenation_matches_content() {
        let reply = assemble_stream(
            sse(&[text_event("Hel"), text_event("lo"), text_event(" you")]),
            None,
        )
        .unwrap();
        let text: String = reply.text.collect::<Result<_, _>>().unwrap();
        let record = reply.record.snapshot();
        assert_eq!(text, "Hello you");
        assert_eq!(record.content.as_deref(), Some("Hello you"));
        assert_eq!(record.len, 9);
    }

    #[test]
    fn test_empty_stream_is_error() {
        let lines: LineStream = Box::new(
            vec![Ok(String::new()), Ok(":ping".to_string())].into_iter(),
        );
        assert!(matches!(
            assemble_stream(lines, None),
            Err(StreamError::NoContent)
        ));
    }

    #[test]
    fn test_malformed_first_event() {
        let lines: LineStream = Box::new(vec![Ok("data:{oops".to_string())].into_iter());
        assert!(matches!(
            assemble_stream(lines, None),
            Err(StreamError::Malformed(_))
        ));
    }

    #[test]
    fn test_text_before_think_is_rejected() {
        let mut reply = assemble_stream(
            sse(&[think_event("a"), think_event("b"), text_event("done")]),
            None,
        )
        .unwrap();
        assert!(matches!(
            reply.text.next(),
            Some(Err(StreamError::ThinkNotDrained))
        ));
        assert!(matches!(
            reply.text.next(),
            Some(Err(StreamError::ThinkNotDrained))
        ));

        let think: String = reply.think.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(think, "ab");
        let text: String = reply.text.collect::<Result<_, _>>().unwrap();
        assert_eq!(text, "done");
        assert_eq!(reply.record.snapshot().think.as_deref(), Some("ab"));
    }

    #[test]
    fn test_think_cursor_without_reasoning_is_empty() {
        let mut reply = assemble_stream(sse(&[text_event("x")]), None).unwrap();
        assert!(reply.think.next().is_none());
        assert_eq!(reply.text.next().unwrap().unwrap(), "x");
    }

    #[test]
    fn test_usage_last_wins() {
        let mut last = text_event("b");
        last["usage"] = json!({"input_tokens": 3, "output_tokens": 4, "total_tokens": 7});
        let mut first = text_event("a");
        first["usage"] = json!({"input_tokens": 3, "output_tokens": 1, "total_tokens": 4});

        let reply = assemble_stream(sse(&[first, last, text_event("c")]), None).unwrap();
        let _: Vec<_> = reply.text.collect();
        let usage = reply.record.snapshot().usage.unwrap();
        assert_eq!(usage.output, 4);
        assert_eq!(usage.total, 7);
    }

    #[test]
    fn test_hook_fires_once_on_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut reply = assemble_stream(
            sse(&[text_event("a"), text_event("b")]),
            Some(Box::new(move |record: &ChatRecord| {
                assert_eq!(record.text(), "ab");
                seen.fetch_add(1, Ordering::SeqCst);
            }) as CompletionHook),
        )
        .unwrap();
        let _: Vec<_> = reply.text.by_ref().collect();
        assert!(reply.text.next().is_none());
        assert!(reply.think.next().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_line_error_surfaces() {
        let lines: LineStream = Box::new(
            vec![
                Ok(format!("data:{}", text_event("a"))),
                Err(AdapterError::Network("reset".to_string())),
            ]
            .into_iter(),
        );
        let mut reply = assemble_stream(lines, None).unwrap();
        assert_eq!(reply.text.next().unwrap().unwrap(), "a");
        assert!(matches!(
            reply.text.next(),
            Some(Err(StreamError::Adapter(_)))
        ));
        assert!(reply.text.next().is_none());
    }
}
