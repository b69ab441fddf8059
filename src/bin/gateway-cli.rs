use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the route gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List compiled routes
    Routes,
    /// Show one compiled route
    Route { id: String },
    /// Save a route definition (JSON file) under the given id
    Save { id: String, file: PathBuf },
    /// Delete a saved route definition
    Delete { id: String },
    /// Invalidate the route table
    Refresh,
    /// List global filters and their orders
    GlobalFilters,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/actuator/gateway", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Routes => client.get(format!("{base}/routes")),
        Commands::Route { id } => client.get(format!("{base}/routes/{id}")),
        Commands::Save { id, file } => {
            let definition: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            client.post(format!("{base}/routes/{id}")).json(&definition)
        }
        Commands::Delete { id } => client.delete(format!("{base}/routes/{id}")),
        Commands::Refresh => client.post(format!("{base}/refresh")),
        Commands::GlobalFilters => client.get(format!("{base}/globalfilters")),
    };

    print_response(request.headers(headers).send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", status),
    }
    Ok(())
}
