use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use exposure_common::{Config, EntityType};
use exposure_scout::Pipeline;

#[derive(Parser)]
#[command(name = "exposure-scout", about = "Identity exposure analysis for usernames, emails and domains")]
#[command(group(ArgGroup::new("target").required(true).args(["username", "email", "domain"])))]
struct Cli {
    /// Username to look up across social platforms
    #[arg(short, long)]
    username: Option<String>,

    /// Email address to check against breach and service sources
    #[arg(short, long)]
    email: Option<String>,

    /// Domain to enumerate
    #[arg(short, long)]
    domain: Option<String>,

    /// Directory for the JSON report
    #[arg(long, default_value = "reports")]
    output: PathBuf,

    /// Fixed seed for recommendation selection
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn target(&self) -> Option<(EntityType, &str)> {
        if let Some(u) = &self.username {
            Some((EntityType::Username, u))
        } else if let Some(e) = &self.email {
            Some((EntityType::Email, e))
        } else {
            self.domain.as_deref().map(|d| (EntityType::Domain, d))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("exposure=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Exposure scout starting...");

    let mut config = Config::from_env()?;
    if let Some(seed) = cli.seed {
        config.tuning.recommendation_seed = Some(seed);
    }

    let (entity_type, entity_key) = cli
        .target()
        .context("one of --username, --email or --domain is required")?;

    let pipeline = Pipeline::from_config(&config)?;
    let report = pipeline.analyze(entity_type, entity_key).await?;

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let path = cli.output.join(format!("{}.json", report.entity_key));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Report written");

    println!("{report}");
    Ok(())
}
