//! Interactive console for the voice conversation pipeline.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;
use voicechat::audio::{CaptureHints, Recorder};
use voicechat::chat::{self, AppMode, ChatClient, Conversation, TurnOutcome};
use voicechat::config::AppConfig;
use voicechat::session::{start_session_job, SessionMessage};
use voicechat::speak::{speak_reply, NullSynthesizer, SpeechSynthesizer};
use voicechat::transcribe::TranscribeClient;
use voicechat::{init_logging, log_debug, log_panic};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    voicechat::telemetry::init_tracing(&config);

    std::panic::set_hook(Box::new(|info| {
        log_panic(info);
        eprintln!("voicechat crashed; run with --logs and check the debug log");
    }));

    if config.list_input_devices {
        return list_input_devices();
    }

    run(config)
}

fn list_input_devices() -> Result<()> {
    let devices = Recorder::list_devices().context("failed to enumerate input devices")?;
    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        for name in devices {
            println!("{name}");
        }
    }
    Ok(())
}

fn run(config: AppConfig) -> Result<()> {
    let mode = config.mode.unwrap_or_else(chat::load_mode);
    let chat_client = ChatClient::new(&config.server_url, config.http_timeout_secs)
        .context("failed to build the chat client")?;
    let transcriber = TranscribeClient::new(&config.server_url, config.http_timeout_secs)
        .context("failed to build the transcription client")?;
    let mut conversation = Conversation::new(mode);
    let mut synth = NullSynthesizer;

    // This host has no live recognizer; takes rely on the upload fallback.
    log_debug(&format!(
        "no speech listener available on this host (requested lang {})",
        config.listener_lang
    ));

    println!("voicechat [{}] ({})", mode.label(), mode.subtitle());
    println!(
        "Commands: /voice  /mode <quota_saver|quality>  /new  /export <path>  /import <path>  /debug  /quit"
    );
    print_last_message(&conversation);

    let lines = spawn_stdin_reader();
    prompt();
    loop {
        let line = match lines.recv() {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim().to_string();
        match line.as_str() {
            "" => {}
            "/quit" | "/exit" => break,
            "/new" => {
                conversation.reset();
                print_last_message(&conversation);
            }
            "/voice" => {
                run_voice_take(&config, &lines, &chat_client, &transcriber, &mut conversation, &mut synth);
            }
            other if other.starts_with("/mode") => {
                apply_mode_command(other, &mut conversation);
            }
            "/debug" => {
                print_debug(&conversation);
            }
            other if other.starts_with("/export") => {
                export_history(other, &conversation);
            }
            other if other.starts_with("/import") => {
                import_history(other, &mut conversation);
            }
            text => {
                run_text(text, &chat_client, &mut conversation, &mut synth);
            }
        }
        prompt();
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_last_message(conversation: &Conversation) {
    if let Some(message) = conversation.messages().last() {
        println!("[{}] {}", message.ts, message.content);
    }
}

fn run_text(
    text: &str,
    chat_client: &ChatClient,
    conversation: &mut Conversation,
    synth: &mut dyn SpeechSynthesizer,
) {
    match conversation.run_text_turn(chat_client, text) {
        TurnOutcome::Reply(turn) => {
            print_last_message(conversation);
            print_turn_diagnostics(&turn);
            speak_reply(synth, &turn.reply);
        }
        TurnOutcome::Apologized => print_last_message(conversation),
        TurnOutcome::Busy => println!("Still working on the previous turn."),
        TurnOutcome::Ignored => {}
    }
}

/// Record one take and run the voice exchange. Enter stops the take early;
/// otherwise the endpointing detector or the hard cap ends it.
fn run_voice_take(
    config: &AppConfig,
    lines: &mpsc::Receiver<String>,
    chat_client: &ChatClient,
    transcriber: &TranscribeClient,
    conversation: &mut Conversation,
    synth: &mut dyn SpeechSynthesizer,
) {
    if conversation.is_busy() {
        println!("Still working on the previous turn.");
        return;
    }

    let job = start_session_job(
        config.session_config(),
        config.input_device.clone(),
        CaptureHints::default(),
        None,
    );
    println!("Listening... press Enter to stop.");

    let take = loop {
        match job.receiver.try_recv() {
            Ok(SessionMessage::Closed(take)) => break Some(take),
            Ok(SessionMessage::Rejected(err)) => {
                println!("Could not start recording: {err}");
                break None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                println!("Recording worker exited unexpectedly.");
                break None;
            }
        }
        if let Ok(_line) = lines.try_recv() {
            job.request_stop();
        }
        thread::sleep(Duration::from_millis(25));
    };

    if let Some(handle) = job.handle {
        let _ = handle.join();
    }
    let Some(take) = take else { return };

    println!(
        "Captured {} ms (stop: {}).",
        take.metrics.capture_ms,
        take.metrics.stop.label()
    );

    match conversation.run_voice_turn(chat_client, transcriber, take) {
        TurnOutcome::Reply(turn) => {
            print_transcribed_turn(conversation);
            print_turn_diagnostics(&turn);
            speak_reply(synth, &turn.reply);
        }
        TurnOutcome::Apologized => print_last_message(conversation),
        TurnOutcome::Busy => println!("Still working on the previous turn."),
        TurnOutcome::Ignored => {}
    }
}

/// Echo the transcribed user turn, then the reply.
fn print_transcribed_turn(conversation: &Conversation) {
    let messages = conversation.messages();
    if messages.len() >= 2 {
        let user = &messages[messages.len() - 2];
        println!("You said: {}", user.content);
    }
    print_last_message(conversation);
}

fn print_turn_diagnostics(turn: &voicechat::chat::ChatTurnResult) {
    if let Some(model) = turn.used_model.as_deref() {
        log_debug(&format!(
            "turn diagnostics: used_model={model} hops={:?} errors={}",
            turn.hops_used,
            turn.model_errors.len()
        ));
    }
}

fn apply_mode_command(command: &str, conversation: &mut Conversation) {
    let value = command.trim_start_matches("/mode").trim();
    match value.to_lowercase().as_str() {
        "quota_saver" => conversation.set_mode(AppMode::QuotaSaver),
        "quality" => conversation.set_mode(AppMode::Quality),
        "" => {
            let mode = conversation.mode();
            println!("Mode: {} ({})", mode.label(), mode.subtitle());
            return;
        }
        other => {
            println!("Unknown mode '{other}'. Use quota_saver or quality.");
            return;
        }
    }
    let mode = conversation.mode();
    println!("Mode set to {} ({})", mode.label(), mode.subtitle());
}

fn print_debug(conversation: &Conversation) {
    match conversation.last_turn() {
        Some(turn) => {
            println!("used_model: {}", turn.used_model.as_deref().unwrap_or("-"));
            println!(
                "last_tried_model: {}",
                turn.last_tried_model.as_deref().unwrap_or("-")
            );
            println!("hops_used: {}", turn.hops_used.map_or("-".to_string(), |h| h.to_string()));
            if turn.model_errors.is_empty() {
                println!("model_errors: none");
            } else {
                for err in &turn.model_errors {
                    println!("model_error: {err}");
                }
            }
        }
        None => println!("No completed exchange yet."),
    }
}

fn export_history(command: &str, conversation: &Conversation) {
    let path = command.trim_start_matches("/export").trim();
    let path = if path.is_empty() { "chat.json" } else { path };
    match conversation
        .export_json()
        .and_then(|json| std::fs::write(path, json).context("failed to write export file"))
    {
        Ok(()) => println!("Exported chat history to {path}"),
        Err(err) => println!("Export failed: {err}"),
    }
}

fn import_history(command: &str, conversation: &mut Conversation) {
    let path = command.trim_start_matches("/import").trim();
    if path.is_empty() {
        println!("Usage: /import <path>");
        return;
    }
    let result = std::fs::read_to_string(path)
        .context("failed to read import file")
        .and_then(|json| conversation.import_json(&json));
    match result {
        Ok(()) => {
            println!("Imported {} messages from {path}", conversation.messages().len());
        }
        Err(err) => println!("Import failed: {err}"),
    }
}

/// Forward stdin lines over a channel so the voice loop can poll for the
/// stop gesture without blocking.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
