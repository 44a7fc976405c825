//! Command-line interface for backfillr.
//!
//! Provides commands for running the backfill bot over Commons, planning
//! a single file, inspecting run logs and showing the configuration.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{CommonsClient, FlickrClient};
use crate::config::{self, ResolvedConfig};
use crate::core::{Backfiller, ClaimSynthesizer, RunLog, RunOptions};

/// backfillr - Backfill Commons structured data from Flickr
#[derive(Parser, Debug)]
#[command(name = "backfillr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile every candidate file from the Commons search
    Run {
        /// Skip candidates until this media id (e.g. M12345)
        #[arg(long)]
        skip_until: Option<String>,

        /// Pick up where an earlier run (UUID) left off
        #[arg(long, conflicts_with = "skip_until")]
        resume: Option<String>,

        /// Stop after this many candidates
        #[arg(short, long)]
        limit: Option<usize>,

        /// Plan edits without submitting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the edit plan for one file without writing
    Plan {
        /// Media id of the file (e.g. M12345)
        mid: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Replay the log of a run
    Log {
        /// Run ID (UUID)
        run_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                skip_until,
                resume,
                limit,
                dry_run,
            } => {
                let skip_until = match resume {
                    Some(run_id) => Some(resume_point(&run_id).await?),
                    None => skip_until,
                };
                run(skip_until, limit, dry_run).await
            }
            Commands::Plan { mid } => plan_file(&mid).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Log { run_id } => show_log(&run_id).await,
            Commands::Config => show_config(),
        }
    }
}

/// Wire the HTTP clients and configuration into a backfiller
fn build_backfiller(cfg: &ResolvedConfig) -> Result<Backfiller> {
    let Some(api_key) = cfg.flickr.api_key.clone() else {
        bail!("No Flickr API key; set FLICKR_API_KEY or flickr.api_key in the config file");
    };

    let flickr = FlickrClient::new(api_key, cfg.flickr.api_url.clone(), &cfg.user_agent)
        .context("Failed to create Flickr client")?;
    let commons = CommonsClient::new(
        cfg.commons.api_url.clone(),
        &cfg.user_agent,
        cfg.commons.access_token.clone(),
        cfg.commons.edit_tags.clone(),
    )?;

    Ok(Backfiller::new(
        Box::new(flickr),
        Box::new(commons),
        ClaimSynthesizer::new(cfg.vocabulary.clone()),
    )
    .with_retry(cfg.bot.retry.clone())
    .with_replace_policy(cfg.bot.replace_policy, cfg.commons.username.clone()))
}

/// Media id an earlier run stopped at
async fn resume_point(run_id_str: &str) -> Result<String> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let log = RunLog::open(run_id).await?;
    match log.last_mid().await? {
        Some(mid) => {
            println!("Resuming run {} from {}", run_id, mid);
            Ok(mid)
        }
        None => bail!("Run {} has no records to resume from", run_id),
    }
}

/// Run the bot over the candidate search
async fn run(skip_until: Option<String>, limit: Option<usize>, dry_run: bool) -> Result<()> {
    let cfg = config::config()?;

    if !dry_run && cfg.commons.access_token.is_none() {
        bail!("No Commons access token; set COMMONS_ACCESS_TOKEN or use --dry-run");
    }

    let backfiller = build_backfiller(cfg)?;
    let log = RunLog::open(Uuid::new_v4()).await?;

    let options = RunOptions {
        search_query: cfg.commons.search_query.clone(),
        skip_until,
        limit,
        dry_run,
        edit_summary: cfg.commons.edit_summary.clone(),
        category_prefixes: cfg.bot.category_prefixes.clone(),
        edits_leave_search: RunOptions::query_excludes_edited(&cfg.commons.search_query),
    };

    println!("Run ID: {}", log.run_id());
    let summary = backfiller.run(&options, &log).await?;

    println!(
        "Examined {}, skipped {}, planned {}, submitted {}",
        summary.examined, summary.skipped, summary.planned, summary.submitted
    );
    println!("Log: {}", log.events_path().display());

    if summary.aborted {
        bail!("Run {} aborted after a failed edit", log.run_id());
    }

    Ok(())
}

/// Plan one file and print the result as JSON
async fn plan_file(mid: &str) -> Result<()> {
    let cfg = config::config()?;
    let backfiller = build_backfiller(cfg)?;

    let update = backfiller.update_file(mid).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&update).context("Failed to serialize plan")?
    );

    Ok(())
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let runs_dir = config::runs_dir()?;
    let run_ids = RunLog::list_runs(&runs_dir).await?;

    if run_ids.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    let mut runs = Vec::new();
    for run_id in run_ids {
        let log = RunLog::open_in(&runs_dir, run_id).await?;
        let events = log.replay().await?;
        if let Some(first) = events.first() {
            let last = events.last().unwrap_or(first);
            runs.push((first.timestamp, run_id, events.len(), last.event_type));
        }
    }
    runs.sort_by(|a, b| b.0.cmp(&a.0));

    println!("{:<38} {:<22} {:>7} {:<15}", "RUN ID", "STARTED", "EVENTS", "LAST");
    println!("{}", "-".repeat(85));

    for (started, run_id, count, last) in runs.into_iter().take(limit) {
        println!(
            "{:<38} {:<22} {:>7} {:<15}",
            run_id,
            started.format("%Y-%m-%d %H:%M:%S").to_string(),
            count,
            format!("{:?}", last)
        );
    }

    Ok(())
}

/// Replay a run's events
async fn show_log(run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let log = RunLog::open(run_id).await?;
    let events = log.replay().await?;

    if events.is_empty() {
        println!("No events for run {}", run_id);
        return Ok(());
    }

    for event in events {
        let mid = event.mid.as_deref().unwrap_or("-");
        println!(
            "{} {:<16} {:<14} {}",
            event.timestamp.format("%H:%M:%S"),
            mid,
            format!("{:?}", event.event_type),
            event.summary
        );
        if let Some(error) = event.error {
            println!("    error: {}", error);
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Flickr API key: {}", if cfg.flickr.api_key.is_some() { "set" } else { "missing" });
    println!(
        "Commons access token: {}",
        if cfg.commons.access_token.is_some() { "set" } else { "missing" }
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(cfg).context("Failed to serialize configuration")?
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_resume_flag() {
        let cli = Cli::try_parse_from([
            "backfillr",
            "run",
            "--resume",
            "550e8400-e29b-41d4-a716-446655440000",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                resume, dry_run, ..
            } => {
                assert_eq!(resume.as_deref(), Some("550e8400-e29b-41d4-a716-446655440000"));
                assert!(dry_run);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_resume_conflicts_with_skip_until() {
        let parsed = Cli::try_parse_from([
            "backfillr",
            "run",
            "--resume",
            "550e8400-e29b-41d4-a716-446655440000",
            "--skip-until",
            "M1",
        ]);

        assert!(parsed.is_err());
    }
}
