use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "zipper-cli")]
#[command(about = "Query and inspect a running metric-zipper", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a glob query to metric paths
    Find {
        query: String,
        /// json or pickle
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Fetch series for a target
    Render {
        target: String,
        #[arg(long, allow_hyphen_values = true)]
        from: i32,
        #[arg(long, allow_hyphen_values = true)]
        until: i32,
        /// json or pickle
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Per-backend metadata for a metric
    Info { target: String },
    /// Check zipper status
    Status,
    /// List backends and limiter usage
    Backends,
    /// Inspect the path and search caches
    Cache,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::Find { query, format } => client
            .get(format!("{}/metrics/find/", base))
            .query(&[("query", query.as_str()), ("format", format.as_str())]),
        Commands::Render {
            target,
            from,
            until,
            format,
        } => client.get(format!("{}/render/", base)).query(&[
            ("target", target.clone()),
            ("from", from.to_string()),
            ("until", until.to_string()),
            ("format", format.clone()),
        ]),
        Commands::Info { target } => client
            .get(format!("{}/info/", base))
            .query(&[("target", target.as_str()), ("format", "json")]),
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Backends => client.get(format!("{}/admin/backends", base)),
        Commands::Cache => client.get(format!("{}/admin/cache", base)),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(id) = res.headers().get("x-request-id").and_then(|v| v.to_str().ok()) {
        eprintln!("request-id: {}", id);
    }
    if !status.is_success() {
        eprintln!("Error: zipper returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text.trim_end());
        }
        std::process::exit(1);
    }

    let is_pickle = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/pickle"));
    let body = res.bytes().await?;
    let json: Value = if is_pickle {
        serde_pickle::from_slice(&body, serde_pickle::DeOptions::new())?
    } else {
        serde_json::from_slice(&body)?
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
