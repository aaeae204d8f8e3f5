mod aggregate;
mod commands;
mod config;
mod display;
mod error;
mod github;
mod model;
mod report;

use clap::{CommandFactory, Parser};
use config::{AuditConfig, DEFAULT_API_URL, DEFAULT_PAGE_SIZE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "org-perms-audit",
    version,
    about = "Report every member's permission on every repository of a GitHub organization",
    after_help = "The token is read from the GITHUB_ACCESS_TOKEN environment variable."
)]
pub struct Cli {
    /// GitHub organization login to audit
    organization: Option<String>,

    /// Items requested per GraphQL page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=100))]
    page_size: u32,

    /// GitHub API base URL; /graphql is appended (Enterprise: https://HOST/api)
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Directory the CSV report is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Show debug logging, including raw GraphQL responses
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, organization: String) -> error::Result<()> {
    let token = config::token_from_env()?;
    let config = AuditConfig {
        organization,
        token,
        api_url: cli.api_url,
        page_size: cli.page_size,
        output_dir: cli.output_dir,
        json: cli.json,
    };
    commands::audit::run(&config).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing organization is a no-op rather than a failure.
    let Some(organization) = cli.organization.clone() else {
        println!("{}", Cli::command().render_usage());
        println!("Please provide the GitHub organization as an argument, e.g. org-perms-audit my-org-name");
        return;
    };

    init_tracing(cli.verbose);

    let result = run(cli, organization).await;

    if let Err(e) = result {
        display::error(&e.to_string());
        std::process::exit(1);
    }
}
