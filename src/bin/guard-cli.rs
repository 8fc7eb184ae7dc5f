use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use request_guard::config::load_config;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for request-guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081", env = "GUARD_ADMIN_URL")]
    url: String,

    #[arg(short, long, default_value = "", env = "GUARD_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway status
    Status,
    /// List blocked addresses
    Blocklist,
    /// Lift the block on an address
    Unblock { ip: String },
    /// Show recent security events
    Events,
    /// Evict cached tokens for a user
    Revoke { subject: String },
    /// Load and validate a config file without contacting the gateway
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::CheckConfig { path } = &cli.command {
        return match load_config(path) {
            Ok(config) => {
                println!(
                    "{} is valid (listening on {}, upstream {})",
                    path.display(),
                    config.listener.bind_address,
                    config.upstream.base_url
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        };
    }

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let base = cli.url.trim_end_matches('/');
    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Blocklist => client.get(format!("{base}/admin/blocklist")),
        Commands::Unblock { ip } => client.delete(format!("{base}/admin/blocklist/{ip}")),
        Commands::Events => client.get(format!("{base}/admin/events")),
        Commands::Revoke { subject } => client.delete(format!("{base}/admin/tokens/subject/{subject}")),
        Commands::CheckConfig { .. } => unreachable!("handled above"),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
