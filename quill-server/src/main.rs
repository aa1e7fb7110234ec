//! Standalone chat server binary.

use clap::Parser;
use quill_core::tools::TavilyClient;
use quill_core::{assets::CloudinaryHost, ChatHandler};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (0 for random)
    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env_file();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let settings = config::Settings::load();

    let search = TavilyClient::from_env().unwrap_or_else(|| {
        tracing::warn!("TAVILY_API_KEY not set; web searches will fail in-band");
        TavilyClient::new("")
    });
    let assets = CloudinaryHost::from_env().unwrap_or_else(|| {
        tracing::warn!("Cloudinary env not set; image uploads will fail in-band");
        CloudinaryHost::new("", "")
    });

    let handler = Arc::new(ChatHandler::new(
        Arc::new(settings),
        Arc::new(search),
        Arc::new(assets),
    ));

    let handle = quill_server::start_server_on(&args.host, args.port, handler).await?;

    println!("Chat server running at {}", handle.url());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    handle.stop();
    Ok(())
}
