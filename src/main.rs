//! speakfm - 命令行入口
//!
//! 文本来源（优先级从高到低）：命令行参数、`--file`、标准输入

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use speakfm::config::{load_config_from_path, print_config, validate_config, LogConfig};
use speakfm::infrastructure::adapters::RequestMethod;
use speakfm::Voice;

#[derive(Parser, Debug)]
#[command(name = "speakfm", author, version)]
#[command(about = "Convert text to speech using the openai.fm endpoint")]
struct Cli {
    /// Text to speak (reads --file or stdin when omitted)
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Voice name (see --list-voices)
    #[arg(long)]
    voice: Option<Voice>,

    /// Output audio file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum concurrent requests (0 = number of CPUs)
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// HTTP method used for the endpoint: post or get
    #[arg(long)]
    method: Option<RequestMethod>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not report per-chunk progress
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Print the available voices and exit
    #[arg(long)]
    list_voices: bool,
}

fn init_tracing(log: &LogConfig, debug: bool) {
    let level = if debug { "debug" } else { log.level.as_str() };
    let log_filter = format!("{},speakfm={}", level, level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn read_input(cli: &Cli) -> anyhow::Result<String> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }

    if let Some(path) = &cli.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read stdin")?;
    Ok(text)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_voices {
        for voice in Voice::all() {
            println!("{}", voice);
        }
        return Ok(());
    }

    // 加载配置（优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    let mut config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    if let Some(voice) = cli.voice {
        config.tts.voice = voice;
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.tts.timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        config.worker.max_concurrent = concurrency;
    }
    if let Some(method) = cli.method {
        config.tts.method = method;
    }
    if cli.quiet {
        config.output.verbose = false;
    }
    validate_config(&config)?;

    init_tracing(&config.log, cli.verbose);
    print_config(&config);

    let text = read_input(&cli).await?;
    if text.trim().is_empty() {
        anyhow::bail!("No input text");
    }

    let dispatcher = speakfm::http_dispatcher(&config)?;
    let options = config.speak_options();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, cancelling");
            on_signal.cancel();
        }
    });

    let started = Instant::now();
    let path = dispatcher.speak_with_cancel(&text, &options, &cancel).await?;

    let elapsed = started.elapsed();
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        "Time taken: {:.2} seconds",
        elapsed.as_secs_f64()
    );
    println!("{}", path.display());

    Ok(())
}
