use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Query the health and metrics endpoints of an instrumented service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Readiness report (exits non-zero when not ready)
    Ready,
    /// Liveness report (exits non-zero when not live)
    Live,
    /// Raw Prometheus exposition
    Metrics,
    /// Service identity
    Info,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let healthy = match cli.command {
        Commands::Ready => print_report(client.get(format!("{}/health/ready", base)).send().await?).await?,
        Commands::Live => print_report(client.get(format!("{}/health/live", base)).send().await?).await?,
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            let ok = res.status().is_success();
            if !ok {
                eprintln!("Error: metrics endpoint returned status {}", res.status());
            }
            println!("{}", res.text().await?);
            ok
        }
        Commands::Info => {
            let res = client.get(format!("{}/", base)).send().await?;
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
            true
        }
    };

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_report(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await?;

    println!(
        "status: {}",
        json.get("status").and_then(Value::as_str).unwrap_or("unknown")
    );
    if let Some(details) = json.get("details").and_then(Value::as_object) {
        for (name, state) in details {
            println!("  {:<20} {}", name, state.as_str().unwrap_or("?"));
        }
    }

    Ok(status.is_success())
}
