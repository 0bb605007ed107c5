//! One-shot runner: open a browser on one form and fill it, no job server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use form_pilot::brain::{OpenAiOracle, Oracle};
use form_pilot::config::{self, AgentSettings};
use form_pilot::hands::{ChromeLauncher, LaunchSettings};
use form_pilot::jobs::sample_value_sets;
use form_pilot::page::SessionFactory;
use form_pilot::types::ValueMapping;
use form_pilot::FormFillingAgent;

#[derive(Debug, Parser)]
#[command(about = "Fill a single web form with the agent")]
struct Args {
    /// Form to fill. Defaults to the sample medical form.
    #[arg(long)]
    url: Option<String>,

    /// JSON file with a flat {"fieldName": "value"} object. Defaults to sample set 1.
    #[arg(long)]
    data: Option<PathBuf>,

    #[arg(long)]
    headless: bool,

    /// Perception cycles allowed (0 = unlimited).
    #[arg(long, default_value_t = 100)]
    max_cycles: usize,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    config::init_logging(&args.log_level);

    let sample = sample_value_sets()
        .into_iter()
        .next()
        .context("no sample value set available")?;
    let url = args.url.unwrap_or(sample.url);
    let values: ValueMapping = match &args.data {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            serde_json::from_reader(std::io::BufReader::new(file))
                .with_context(|| format!("{} is not a flat JSON object of strings", path.display()))?
        }
        None => sample.form_data,
    };

    let oracle: Arc<dyn Oracle> = Arc::new(OpenAiOracle::from_env()?);

    info!("launching Chrome");
    let launcher = ChromeLauncher::new(LaunchSettings {
        headless: args.headless,
        ..LaunchSettings::default()
    });
    let page = launcher.open().await?;

    let settings = AgentSettings {
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        ..AgentSettings::default()
    };
    page.navigate(&url, std::time::Duration::from_secs(30)).await?;

    let mut agent = FormFillingAgent::new(page, oracle, values, settings);
    let report = agent.run().await?;
    info!(
        cycles = report.cycles,
        fields = report.fields_filled,
        sections = report.completed_sections.len(),
        "form completed"
    );
    Ok(())
}
