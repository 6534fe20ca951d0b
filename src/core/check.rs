//! `check` and `update`: find stale includes across a batch of decks and,
//! for `update`, rewrite the decks under a persistence policy.
//!
//! Decks are planned in parallel against one shared registry; rewrites and
//! prompts then happen one deck at a time in command-line order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde_json::json;
use similar::TextDiff;
use tabled::{Table, Tabled};
use tracing::{error, info};

use crate::cli::{AppContext, CheckArgs, UpdateArgs, UpdatePolicy};
use crate::core::error::DeckError;
use crate::core::plan::{DeckReport, MissingRef, StaleRef, plan_deck};
use crate::core::registry::Registry;
use crate::infra::config::{Config, load_config_or_default};
use crate::infra::io::{DeckText, read_deck, write_atomic};
use crate::infra::prompt::confirm;

/// One planned deck with the text it was planned from
#[derive(Debug)]
pub struct DeckJob {
    pub deck: PathBuf,
    pub text: DeckText,
    pub report: DeckReport,
}

/// Planning outcome for a whole batch, in input order
#[derive(Debug, Default)]
pub struct Batch {
    pub jobs: Vec<DeckJob>,
    pub failed: Vec<PathBuf>,
}

impl Batch {
    pub fn stale(&self) -> impl Iterator<Item = &StaleRef> {
        self.jobs
            .iter()
            .flat_map(|j| j.report.stale.iter())
    }

    pub fn missing(&self) -> impl Iterator<Item = &MissingRef> {
        self.jobs
            .iter()
            .flat_map(|j| j.report.missing.iter())
    }
}

/// Read and plan every deck. A deck that cannot be read or planned is
/// logged and listed as failed; the rest of the batch still runs.
pub fn plan_batch(
    decks: &[PathBuf],
    registry: &Registry,
    progress: &ProgressBar,
) -> Batch {
    let results: Vec<(PathBuf, Result<DeckJob, DeckError>)> = decks
        .par_iter()
        .map(|deck| {
            let job = read_deck(deck).and_then(|text| {
                let report = plan_deck(registry, deck, &text)?;
                Ok(DeckJob { deck: deck.clone(), text, report })
            });

            progress.inc(1);
            progress.set_message(format!("{}", deck.display()));

            (deck.clone(), job)
        })
        .collect();

    let mut batch = Batch::default();
    for (deck, job) in results {
        match job {
            Ok(job) => batch.jobs.push(job),
            Err(e) => {
                error!(deck = %deck.display(), error = %e, "deck skipped");
                batch.failed.push(deck);
            }
        }
    }

    batch
}

pub fn run_check(
    args: CheckArgs,
    ctx: &AppContext,
) -> Result<()> {
    let config = load_config_or_default();
    let batch = plan_with_progress(&args.decks, &config, ctx)?;

    if args.json {
        print_json(&batch, None)?;
    } else if !ctx.quiet {
        print_human(&batch);
    }

    finish(&batch, args.decks.len())
}

pub fn run_update(
    args: UpdateArgs,
    ctx: &AppContext,
) -> Result<()> {
    let config = load_config_or_default();
    let policy = args.cli_policy().unwrap_or(config.update.policy);
    let mut batch = plan_with_progress(&args.decks, &config, ctx)?;

    let mut updated = Vec::new();
    let mut newly_failed = Vec::new();

    for job in batch.jobs.iter().filter(|j| !j.report.is_current()) {
        let new_text = match job.report.plan.apply(&job.text) {
            Ok(t) => t,
            Err(e) => {
                error!(deck = %job.deck.display(), error = %e, "rewrite failed");
                newly_failed.push(job.deck.clone());
                continue;
            }
        };

        if (args.diff || ctx.dry_run) && !args.json && !ctx.quiet {
            print_diff(&job.deck, &job.text, &new_text);
        }

        if ctx.dry_run {
            continue;
        }

        if !approve(policy, &job.deck)? {
            info!(deck = %job.deck.display(), "left unchanged");
            continue;
        }

        info!(deck = %job.deck.display(), changes = job.report.plan.len(), "updating");
        match write_atomic(&job.deck, new_text.as_bytes()) {
            Ok(()) => updated.push(job.deck.clone()),
            Err(e) => {
                error!(deck = %job.deck.display(), error = %format!("{e:#}"), "write failed");
                newly_failed.push(job.deck.clone());
            }
        }
    }

    batch.failed.extend(newly_failed);

    if args.json {
        print_json(&batch, Some(updated.as_slice()))?;
    } else if !ctx.quiet {
        print_human(&batch);
        for deck in &updated {
            println!("{} Updated {}", "✓".green(), deck.display());
        }
        if ctx.dry_run && batch.jobs.iter().any(|j| !j.report.is_current()) {
            println!("{}", "DRY RUN: no deck was written".yellow());
        }
    }

    finish(&batch, args.decks.len())
}

fn approve(
    policy: UpdatePolicy,
    deck: &Path,
) -> Result<bool> {
    match policy {
        UpdatePolicy::Always => Ok(true),
        UpdatePolicy::Never => Ok(false),
        UpdatePolicy::Ask => confirm(&format!("Update {}?", deck.display())),
    }
}

fn plan_with_progress(
    decks: &[PathBuf],
    config: &Config,
    ctx: &AppContext,
) -> Result<Batch> {
    let registry =
        Registry::with_scan_ignores(&config.scan.ignore).context("Invalid scan.ignore glob")?;

    // Set up progress bar (unless quiet mode)
    let progress = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(decks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("progress template")?
                .progress_chars("#>-"),
        );
        pb
    };

    let batch = plan_batch(decks, &registry, &progress);
    progress.finish_and_clear();

    Ok(batch)
}

fn finish(
    batch: &Batch,
    total: usize,
) -> Result<()> {
    if !batch.failed.is_empty() {
        anyhow::bail!("{} of {total} deck(s) failed", batch.failed.len());
    }
    Ok(())
}

#[derive(Tabled)]
struct StaleRow {
    #[tabled(rename = "deck")]
    deck: String,
    #[tabled(rename = "stale")]
    stale: String,
    #[tabled(rename = "latest")]
    latest: String,
}

fn print_human(batch: &Batch) {
    let rows: Vec<StaleRow> = batch
        .stale()
        .map(|s| StaleRow {
            deck: s.deck.display().to_string(),
            stale: s.stale_name.clone(),
            latest: s.latest_name.clone(),
        })
        .collect();

    if rows.is_empty() {
        println!(
            "{} {} deck(s) reference the latest versions",
            "✓".green(),
            batch.jobs.len()
        );
    } else {
        println!("{}", "Newer versions available:".yellow());
        println!("{}", Table::new(rows));
    }

    for m in batch.missing() {
        println!(
            "{} {}: {} not found",
            "!".red(),
            m.deck.display(),
            m.missing_name
        );
    }
}

fn print_json(
    batch: &Batch,
    updated: Option<&[PathBuf]>,
) -> Result<()> {
    let stale: Vec<&StaleRef> = batch.stale().collect();
    let missing: Vec<&MissingRef> = batch.missing().collect();

    let mut out = json!({
        "stale": stale,
        "missing": missing,
        "failed": batch.failed,
    });
    if let Some(updated) = updated {
        out["updated"] = json!(updated);
    }

    println!("{}", serde_json::to_string(&out).context("serialize report")?);
    Ok(())
}

fn print_diff(
    deck: &Path,
    old: &str,
    new: &str,
) {
    let name = deck.display().to_string();
    let diff = TextDiff::from_lines(old, new);
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(1)
            .header(&format!("a/{name}"), &format!("b/{name}"))
    );
}
