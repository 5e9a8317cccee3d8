use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "settings-cli")]
#[command(about = "Management CLI for the runtime configuration service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "RUNTIME_CONFIG_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List active settings
    List {
        /// Only settings of this module
        #[arg(short, long)]
        module: Option<String>,
    },
    /// Show the current value of a setting
    Get { id: String },
    /// Set a setting to a JSON value, e.g. `set auth/password.min 10`
    Set { id: String, value: String },
    /// Reconcile persisted settings with the declared schema
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::List { module } => {
            let mut req = client.get(format!("{}/admin/settings", cli.url));
            if let Some(module) = module {
                req = req.query(&[("module", module)]);
            }
            req
        }
        Commands::Get { id } => client.get(format!("{}/admin/settings/{}", cli.url, id)),
        Commands::Set { id, value } => {
            let value: Value = serde_json::from_str(&value)
                .unwrap_or_else(|_| Value::String(value.clone()));
            client
                .put(format!("{}/admin/settings/{}", cli.url, id))
                .json(&value)
        }
        Commands::Reconcile => client.post(format!("{}/admin/reconcile", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(status_error(status, &text).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn status_error(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        format!("admin API returned status {status}")
    } else {
        format!("admin API returned status {status}: {body}")
    }
}
