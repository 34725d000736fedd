use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use locus_common::{Config, DiscoveryRequest, JobStatus};
use locus_scout::jobs::JobController;

#[derive(Parser)]
#[command(name = "locus", about = "Discover a company's physical locations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one discovery job and print its report as JSON
    Discover {
        /// Company name to search for
        #[arg(long)]
        company: String,

        /// Company website, scraped when present
        #[arg(long)]
        url: Option<String>,

        /// Seconds between status polls
        #[arg(long, default_value_t = 1)]
        poll_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("locus=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    let controller = JobController::from_config(&config)?;

    match cli.command {
        Command::Discover {
            company,
            url,
            poll_secs,
        } => {
            let mut request = DiscoveryRequest::new(company);
            if let Some(url) = url {
                request = request.with_url(url);
            }
            let job_id = controller.submit(request)?;
            info!(job_id = %job_id, "Discovery submitted");

            let interval = Duration::from_secs(poll_secs.max(1));
            let mut last_progress = 0;
            loop {
                let job = controller.get_status(job_id)?;
                if job.progress != last_progress {
                    info!(progress = job.progress, message = job.message.as_str(), "Progress");
                    last_progress = job.progress;
                }
                match job.status {
                    JobStatus::Completed => break,
                    JobStatus::Failed => bail!(
                        "discovery failed: {}",
                        job.error.unwrap_or_else(|| "unknown error".to_string())
                    ),
                    _ => tokio::time::sleep(interval).await,
                }
            }

            let report = controller.get_result(job_id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
