//! A demo that sends one message to the store assistant.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use shopkeeper::App;
use shopkeeper::config::{ConfigError, LogSettings, Settings};
use shopkeeper::core::conversation::Metadata;
use shopkeeper::logging;

const DEMO_MESSAGE: &str = "List the first 5 products in the store";

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _guard = logging::init(&LogSettings::from_env());

    match run().await {
        Ok(code) => code,
        Err(err) => {
            error!("unhandled error: {err:#}");
            eprintln!("{} {err:#}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err @ ConfigError::Missing(_)) => {
            error!("{err}");
            error!("please set these variables in the environment");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };
    debug!("loaded settings: {settings:?}");

    let app = App::from_settings(&settings)
        .await
        .context("failed to open the conversation store")?;
    info!("app initialized");
    app.probe_tool_server().await;

    let conversation = app.create_conversation(Metadata::new()).await;
    let conversation_id = conversation.conversation_id.to_string();
    info!("created new conversation with id: {conversation_id}");

    info!("sending message: {DEMO_MESSAGE}");
    println!("{}👤 {}", BAR_CHAR.bright_green(), DEMO_MESSAGE.bright_white());

    let progress_bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let envelope = app.process_message(&conversation_id, DEMO_MESSAGE).await;

    // Finish the progress bar before printing anything else.
    progress_bar.finish_and_clear();

    if envelope.success {
        info!("agent response: {}", envelope.response);
        println!("{}🤖 {}", BAR_CHAR.bright_cyan(), envelope.response.bright_white());
        return Ok(ExitCode::SUCCESS);
    }

    let detail = envelope.error.as_deref().unwrap_or("unknown error");
    error!("error: {detail}");
    println!("{}🤖 {}", BAR_CHAR.bright_yellow(), envelope.response);
    Ok(ExitCode::FAILURE)
}
