use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "brain-cli")]
#[command(about = "Management and smoke-test CLI for the AI Brain orchestrator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show circuit and queue state
    Health,
    /// Send one inference request through the orchestrator
    Infer {
        #[arg(short, long, value_enum, default_value_t = Mode::Chat)]
        mode: Mode,

        /// Caller deadline in milliseconds
        #[arg(short, long)]
        deadline_ms: Option<u64>,

        payload: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Parse,
    Chat,
    Analyze,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Parse => "parse",
            Mode::Chat => "chat",
            Mode::Analyze => "analyze",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Infer {
            mode,
            deadline_ms,
            payload,
        } => {
            let mut body = json!({ "mode": mode.as_str(), "payload": payload });
            if let Some(ms) = deadline_ms {
                body["caller_deadline_ms"] = json!(ms);
            }
            let res = client
                .post(format!("{}/v1/infer", cli.url))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: orchestrator returned status {}", status);
        if let Some(secs) = retry_after {
            eprintln!("Retry after: {}s", secs);
        }
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
