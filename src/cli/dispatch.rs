//! CLI command dispatch
//!
//! Maps each command to its client, built from the configuration.

use crate::baidu::{
    BaiduClient, Character, ErnieChat, ImageGenerator, Translator, VoiceSynthesizer,
};
use crate::cli::{Args, Command, EXIT_DB_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::{Config, ConfigError};
use crate::llm::adapters::{create_qwen_adapter, Transport};
use crate::llm::{ChatOptions, ChatReply, QwenChat, StreamReply};
use crate::request_log::{self, RequestLog};
use anyhow::{bail, Context};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

const CLI_SESSION: &str = "cli";

/// Run one command and return the exit code
pub fn run_cli(args: Args, config: &Config) -> ExitCode {
    match run_command(args.command, config) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let db_error = err.chain().any(|cause| {
        cause.downcast_ref::<request_log::Error>().is_some()
            || matches!(
                cause.downcast_ref::<ConfigError>(),
                Some(ConfigError::MissingDatabase)
            )
    });
    if db_error {
        EXIT_DB_ERROR
    } else {
        EXIT_FAILURE
    }
}

fn open_request_log(config: &Config) -> anyhow::Result<Option<Arc<RequestLog>>> {
    match &config.request_log {
        Some(log) => {
            let db = RequestLog::open(&log.path)
                .with_context(|| format!("opening request log {}", log.path.display()))?;
            Ok(Some(Arc::new(db)))
        }
        None => Ok(None),
    }
}

fn baidu_client(config: &Config) -> anyhow::Result<BaiduClient> {
    let baidu = config.baidu()?;
    Ok(BaiduClient::new(&baidu.api_key, &baidu.secret_key)
        .with_token_valid_seconds(baidu.token_valid_seconds))
}

/// ERNIE client carrying the configured default character
fn ernie_chat(config: &Config) -> anyhow::Result<ErnieChat> {
    let mut ernie = ErnieChat::new(baidu_client(config)?);
    if let Some(character) = &config.baidu()?.character {
        ernie = ernie.with_character(character);
    }
    Ok(ernie)
}

fn run_command(command: Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Chat {
            text,
            session,
            system,
            web,
            web_mark,
            think,
            stream,
        } => {
            let options = ChatOptions {
                system,
                web: web || web_mark,
                web_mark,
                think,
                stream: stream || think,
                limits: Default::default(),
            };
            let chat = qwen_chat(config)?;
            match text {
                Some(text) => qwen_turn(&chat, &text, session.as_ref(), &options),
                None => {
                    let session = session.unwrap_or_else(|| CLI_SESSION.to_string());
                    for_each_stdin_line(|line| qwen_turn(&chat, line, Some(&session), &options))
                }
            }
        }
        Command::Polish { text } => {
            println!("{}", qwen_chat(config)?.polish(&text)?);
            Ok(())
        }
        Command::Ernie {
            text,
            character,
            no_character,
            session,
        } => {
            let ernie = ernie_chat(config)?;
            let character = match (character, no_character) {
                (_, true) => Character::Disabled,
                (Some(custom), false) => Character::Custom(custom),
                (None, false) => Character::Default,
            };
            match text {
                Some(text) => {
                    let reply = ernie.chat(&text, character, session.as_ref())?;
                    println!("{}", reply);
                    Ok(())
                }
                None => {
                    let session = session.unwrap_or_else(|| CLI_SESSION.to_string());
                    for_each_stdin_line(|line| {
                        let reply = ernie.chat(line, character.clone(), Some(&session))?;
                        println!("{}", reply);
                        Ok(())
                    })
                }
            }
        }
        Command::Modify { text } => {
            println!("{}", ernie_chat(config)?.modify(&text)?);
            Ok(())
        }
        Command::Translate { text, from, to } => {
            let settings = config.translate()?;
            let mut translator = Translator::new(&settings.app_id, &settings.app_key)
                .with_max_len(settings.max_len);
            if let Some(log) = open_request_log(config)? {
                translator = translator.with_request_log(log);
            }
            println!("{}", translator.translate(&text, from, to)?);
            Ok(())
        }
        Command::Image { text, out } => {
            let generator = ImageGenerator::new(baidu_client(config)?);
            println!("{}", generator.to_url(&text, out.as_deref())?);
            Ok(())
        }
        Command::Voice { text, out, job } => {
            let voice = VoiceSynthesizer::new(baidu_client(config)?);
            if job {
                println!("{}", voice.to_url(&text, out.as_deref())?);
            } else {
                let Some(out) = out else {
                    bail!("voice without --job needs --out");
                };
                let bytes = voice.synthesize(&text, Some(&out))?;
                println!("wrote {} bytes to {}", bytes.len(), out.display());
            }
            Ok(())
        }
        Command::Stats { json } => {
            let db = RequestLog::open(config.request_log_path()?)?;
            let qwen = db.qwen_stats()?;
            let translate = db.translate_stats()?;
            if json {
                let stats = serde_json::json!({ "qwen": qwen, "translate": translate });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "qwen: {} requests ({} day, {} week, {} month), {} tokens, last {}",
                    qwen.count,
                    qwen.past_day_count,
                    qwen.past_week_count,
                    qwen.past_month_count,
                    qwen.total_token,
                    format_time(qwen.last_time)
                );
                println!(
                    "translate: {} requests ({} day, {} week, {} month), {} chars in, {} chars out, last {}",
                    translate.count,
                    translate.past_day_count,
                    translate.past_week_count,
                    translate.past_month_count,
                    translate.total_input_chars,
                    translate.total_output_chars,
                    format_time(translate.last_time)
                );
            }
            Ok(())
        }
    }
}

fn qwen_chat(config: &Config) -> anyhow::Result<QwenChat> {
    let settings = config.qwen()?;
    let adapter = create_qwen_adapter(settings, Transport::default())?;
    let mut chat = QwenChat::new(adapter).with_history_limits(settings.history_limits());
    if let Some(system) = &settings.system {
        chat = chat.with_system(system);
    }
    if let Some(log) = open_request_log(config)? {
        chat = chat.with_request_log(log);
    }
    Ok(chat)
}

fn qwen_turn(
    chat: &QwenChat,
    text: &str,
    session: Option<&String>,
    options: &ChatOptions,
) -> anyhow::Result<()> {
    match chat.chat(text, session, options)? {
        ChatReply::Complete(record) => println!("{}", record.text()),
        ChatReply::Stream(reply) => print_stream(reply)?,
    }
    Ok(())
}

fn print_stream(reply: StreamReply) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    let mut thought = false;
    for fragment in reply.think {
        if !thought {
            writeln!(stdout, "[think]")?;
            thought = true;
        }
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    if thought {
        writeln!(stdout, "\n[/think]")?;
    }
    for fragment in reply.text {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    let record = reply.record.snapshot();
    if let Some(web) = &record.web {
        for citation in web {
            writeln!(stdout, "[{}] {} {}", citation.index, citation.title, citation.url)?;
        }
    }
    Ok(())
}

fn for_each_stdin_line(
    mut turn: impl FnMut(&str) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        turn(line)?;
    }
    Ok(())
}

fn format_time(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|time| {
            time.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "never");
        assert_ne!(format_time(Some(0)), "never");
    }

    #[test]
    fn test_missing_database_maps_to_db_exit() {
        let err = anyhow::Error::new(ConfigError::MissingDatabase);
        assert_eq!(exit_code_for(&err), EXIT_DB_ERROR);
        let err = anyhow::anyhow!("network down");
        assert_eq!(exit_code_for(&err), EXIT_FAILURE);
    }

    #[test]
    fn test_ernie_chat_uses_configured_character() {
        let config = Config::from_toml(
            "[baidu]\napi_key = \"ak\"\nsecret_key = \"sk\"\ncharacter = \"温和的助手\"\n",
        )
        .unwrap();
        assert_eq!(ernie_chat(&config).unwrap().character(), Some("温和的助手"));

        let bare = Config::from_toml("[baidu]\napi_key = \"ak\"\nsecret_key = \"sk\"\n").unwrap();
        assert_eq!(ernie_chat(&bare).unwrap().character(), None);
    }

    #[test]
    fn test_stats_requires_database() {
        let config = Config::default();
        let command = Command::Stats { json: false };
        let err = run_command(command, &config).unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_DB_ERROR);
    }

    #[test]
    fn test_stats_reads_log() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config::from_toml(&format!(
            "[request_log]\npath = \"{}\"\n",
            temp_dir.path().join("requests.db").display()
        ))
        .unwrap();
        run_command(Command::Stats { json: true }, &config).unwrap();
    }
}
