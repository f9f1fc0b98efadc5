//! Infinity-Events-RS: natural-language search client for the Check Point
//! Infinity Events log API
//!
//! One-shot CLI: compile the query, run the search, print the structured
//! result as JSON.

use anyhow::Result;
use infinity_events_rs::{config::Settings, EventsClient};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr so stdout stays clean JSON
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") || args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let query = &args[0];
    let timeframe = &args[1];
    let mut accounts = None;
    let mut save_locally = false;

    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--accounts" => {
                if let Some(list) = rest.next() {
                    accounts = Some(list.split(',').map(|s| s.trim().to_string()).collect());
                }
            }
            "--save" => save_locally = true,
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return Ok(());
            }
        }
    }

    let settings = load_settings()?;
    info!("using gateway {}", settings.api.base_url);

    let client = EventsClient::new(&settings)?;
    let outcome = client
        .execute(query, timeframe, accounts, save_locally)
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Load settings from file or use defaults
fn load_settings() -> Result<Settings> {
    let paths = [
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        PathBuf::from("/etc/infinity-events/settings.yml"),
        dirs::config_dir()
            .map(|p| p.join("infinity-events-rs/settings.yml"))
            .unwrap_or_default(),
    ];

    // Check environment variable first
    if let Ok(path) = std::env::var("INFINITY_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Loading settings from: {}", path.display());
            let mut settings = Settings::from_file(&path)?;
            settings.merge_env();
            return Ok(settings);
        }
    }

    for path in paths.iter() {
        if path.exists() {
            info!("Loading settings from: {}", path.display());
            let mut settings = Settings::from_file(path)?;
            settings.merge_env();
            return Ok(settings);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}

fn print_usage() {
    println!(
        r#"
Infinity-Events-RS v{}
Natural-language search client for the Check Point Infinity Events log API

USAGE:
    infinity-events-rs <QUERY> <TIMEFRAME> [OPTIONS]

ARGS:
    <QUERY>       Natural language query (e.g. "critical events on Harmony SASE")
    <TIMEFRAME>   Time period (e.g. "last 24 hours", "7 days", "1 week")

OPTIONS:
    --accounts <IDS>   Comma-separated account ids to filter
    --save             Save results to a local JSON file
    -h, --help         Print help information

ENVIRONMENT VARIABLES:
    INFINITY_SETTINGS_PATH   Path to settings.yml
    INFINITY_BASE_URL        Regional gateway base URL
    INFINITY_CLIENT_ID       API client id
    INFINITY_ACCESS_KEY      API access key
"#,
        infinity_events_rs::VERSION
    );
}
