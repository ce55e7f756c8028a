//! 🚀 logvex-cli: the doorbell. Someone drops off a log file, we ring, logvex answers.
//!
//! 🎬 *[narrator voice]* "The access log was only 4 GB. How bad could it be?"
//! 📦 Thin wrapper: load config, set up logging, collect the object locations from
//! an event file and/or the command line, then hand everything to the library and
//! report back. Like a manager, but with a summary table. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use logvex::{ObjectLocation, load_config, locations_from_event, progress::summary_table};

/// 🪵 Stream Apache access logs out of S3 and into a search index, one signed POST per line.
#[derive(Debug, Parser)]
#[command(name = "logvex", version, about)]
struct Cli {
    /// 🔧 TOML config file, merged over the LOGVEX_* environment variables
    #[arg(short, long, env = "LOGVEX_CONFIG")]
    config: Option<PathBuf>,

    /// 🔔 a JSON S3 notification (or SNS envelope around one) naming the objects to ingest
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// 🪣 extra objects to ingest, as s3://bucket/key
    locations: Vec<String>,
}

impl Cli {
    /// 🎯 Event-file locations first, then the positional ones, in the order given.
    fn gather_locations(&self) -> Result<Vec<ObjectLocation>> {
        let mut the_locations = match &self.event {
            Some(event_path) => {
                let the_payload = std::fs::read_to_string(event_path).context(format!(
                    "💀 Could not read the event file '{}'. It was supposed to tell us which logs to eat.",
                    event_path.display()
                ))?;
                locations_from_event(&the_payload).context(format!(
                    "💀 The event file '{}' is not an S3 notification we can read",
                    event_path.display()
                ))?
            }
            None => Vec::new(),
        };
        for the_uri in &self.locations {
            the_locations.push(ObjectLocation::parse_uri(the_uri)?);
        }
        Ok(the_locations)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 logs go to stderr so the summary table on stdout stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let the_cli = Cli::parse();

    if let Err(err) = run(the_cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer of disappointment at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
                || cause_str.contains("dispatch failure")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like S3 or the search endpoint isn't reachable. \
                Check the endpoint in your config, your network path to it, and that \
                your AWS credentials point at the account you think they do. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

/// 🚀 Config → locations → pipeline → batch → table. Any job failure makes this `Err`.
async fn run(the_cli: Cli) -> Result<()> {
    let the_app_config = load_config(the_cli.config.as_deref()).context(
        "💀 In logvex-cli we couldn't load the configuration. Check the file and the LOGVEX_* \
         variables, and make sure a [publisher] section exists somewhere.",
    )?;

    let the_locations = the_cli.gather_locations()?;
    if the_locations.is_empty() {
        info!("💤 no objects named, nothing to ingest. Pass --event or s3://bucket/key arguments.");
        return Ok(());
    }

    let the_report = logvex::run(the_app_config, the_locations).await?;

    println!("{}", summary_table(&the_report.jobs));
    the_report.into_result()?;
    Ok(())
}
