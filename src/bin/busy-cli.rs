use clap::{Parser, Subcommand};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "busy-cli")]
#[command(about = "Inspect and drive a busy-gate instance", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8787")]
    url: String,

    /// Bearer token for mutating commands.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show aggregate busy state, in-flight count and active keys
    Status,
    /// Show whether a named operation is active
    Get { name: String },
    /// Mark a named operation active
    Set { name: String },
    /// Mark a named operation finished
    Unset { name: String },
    /// Clear every named operation
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let request = match &cli.command {
        Commands::Status => client.get(endpoint(&base, &["status"])?),
        Commands::Get { name } => client.get(endpoint(&base, &["keys", name.as_str()])?),
        Commands::Set { name } => authorized(client.put(endpoint(&base, &["keys", name.as_str()])?), &cli.key),
        Commands::Unset { name } => {
            authorized(client.delete(endpoint(&base, &["keys", name.as_str()])?), &cli.key)
        }
        Commands::Clear => authorized(client.delete(endpoint(&base, &["keys"])?), &cli.key),
    };

    print_response(request.send().await?).await
}

/// Append path segments to `base`, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn authorized(request: RequestBuilder, key: &Option<String>) -> RequestBuilder {
    match key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: busy-gate returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    if status == StatusCode::NO_CONTENT {
        println!("ok");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
