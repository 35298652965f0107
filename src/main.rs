//! Fanyi CLI - social media post translator.

use anyhow::{Context, Result};
use clap::Parser;
use fanyi::config::Config;
use fanyi::console::Console;
use fanyi::pipeline::{Pipeline, TranslationResult};
use fanyi::rate_limit::{KeywordClassifier, RateLimiter, SystemClock};
use fanyi::sources::FxTwitterSource;
use fanyi::translator::{GeminiClient, Translator};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;

/// Translate social media posts with an LLM.
#[derive(Parser, Debug)]
#[command(name = "fanyi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Post URLs (twitter.com or x.com) to translate.
    urls: Vec<String>,

    /// Translate every post link found in this message.
    #[arg(long, conflicts_with_all = ["urls", "text"])]
    message: Option<String>,

    /// Translate this text as-is instead of a post.
    #[arg(long, conflicts_with = "urls")]
    text: Option<String>,

    /// Target language (defaults to the configured one).
    #[arg(short, long)]
    language: Option<String>,

    /// Path to the config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print the rate limit summary after the run.
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let console = Console::new();
    console.section("Fanyi - Post Translator");

    // Load configuration
    console.step("Loading configuration...");
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.apply_env();

    // Check if this is first run (API key not configured)
    if !config.api.is_configured() {
        let config_path = match &args.config {
            Some(path) => path.clone(),
            None => Config::config_path()?,
        };
        console.warning(&format!(
            "API key not configured. Please edit: {}",
            config_path.display()
        ));
        console.info("Set your Gemini API key in the config file or GEMINI_API_KEY and run again.");
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;
    console.success("Configuration loaded");

    let pipeline = build_pipeline(&config)?;
    let language = args
        .language
        .clone()
        .unwrap_or_else(|| config.translation.target_language.clone());

    let results = if let Some(text) = &args.text {
        console.step("Translating text...");
        vec![pipeline.translate_text(text, &language).await]
    } else if let Some(message) = &args.message {
        console.step("Translating linked posts...");
        pipeline.translate_message(message, &language).await
    } else if !args.urls.is_empty() {
        console.step(&format!("Translating {} post(s)...", args.urls.len()));
        join_all(
            args.urls
                .iter()
                .map(|url| pipeline.translate_url(url, &language)),
        )
        .await
    } else {
        anyhow::bail!("Nothing to translate: pass post URLs, --message or --text");
    };

    if results.is_empty() {
        console.warning("No post links found in the message");
    }

    for result in &results {
        render_result(&console, result);
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        console.warning(&format!(
            "{} of {} translation(s) failed",
            failed,
            results.len()
        ));
    }

    if args.status {
        console.section("Rate limits");
        println!("{}", pipeline.limiter().get_status_summary());
    }

    console.section("Done!");
    Ok(())
}

/// Wires the mirror source, Gemini backend and rate limiter from config.
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let source =
        FxTwitterSource::new(&config.fetch).context("Failed to create the HTTP client")?;
    let service =
        GeminiClient::new(config.api.clone()).context("Failed to create the API client")?;
    let translator = Translator::new(Arc::new(service), &config.translation, &config.prompts);
    let limiter = RateLimiter::with_parts(
        config.rate_limit.backoff_minutes.clone(),
        Arc::new(SystemClock),
        Arc::new(KeywordClassifier::default()),
    );

    Ok(Pipeline::new(
        Arc::new(source),
        translator,
        Arc::new(limiter),
        config,
    ))
}

/// Prints one translation result.
fn render_result(console: &Console, result: &TranslationResult) {
    let author = result
        .username
        .as_deref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| "Text".to_string());
    console.section(&author);

    if !result.original_text.trim().is_empty() {
        console.field("Original", &result.original_text, true);
    }

    match (&result.parsed, &result.error) {
        (Some(parsed), _) => {
            console.field("Translation", parsed.translation(), false);
            if let Some(explanation) = parsed.explanation() {
                console.field("Notes", explanation, false);
            }
            console.success(&console.muted(&format!(
                "{} characters translated",
                result.cleaned_text.chars().count()
            )));
        }
        (None, Some(error)) => console.error(&error.to_string()),
        (None, None) => console.error("Translation produced no result"),
    }
}
