use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "plugin-cli")]
#[command(about = "Management CLI for the plugin router admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "PLUGIN_ROUTER_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check router status
    Status,
    /// Registry statistics
    Stats,
    /// List registered plugins
    Plugins,
    /// List the route table
    Routes,
    /// Show one plugin
    Plugin { name: String },
    /// Enable a plugin
    Enable { name: String },
    /// Disable a plugin (its routes answer 503)
    Disable { name: String },
    /// Remove a plugin with its routes and middleware
    Unregister { name: String },
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Status => (Method::GET, "/admin/status".into()),
            Commands::Stats => (Method::GET, "/admin/stats".into()),
            Commands::Plugins => (Method::GET, "/admin/plugins".into()),
            Commands::Routes => (Method::GET, "/admin/routes".into()),
            Commands::Plugin { name } => (Method::GET, format!("/admin/plugins/{}", encode(name))),
            Commands::Enable { name } => (Method::POST, format!("/admin/plugins/{}/enable", encode(name))),
            Commands::Disable { name } => (Method::POST, format!("/admin/plugins/{}/disable", encode(name))),
            Commands::Unregister { name } => (Method::DELETE, format!("/admin/plugins/{}", encode(name))),
        }
    }
}

fn encode(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> anyhow::Result<()> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if status == StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
