use std::time::Duration;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::InquireResult;

use crate::{
    app::{AppError, AppService, FetchOptions, SyncReport},
    bookmarks::{parse_keywords, Bookmark, BookmarkUpdate, Source},
    cli::{
        validation::{validate_limit, validate_update, validate_url},
        OutputFormat,
    },
    enrich::{ItemOutcome, PipelineReport, StageResult},
};

const SUMMARY_PREVIEW_CHARS: usize = 160;

pub fn handle_fetch(
    app: &AppService,
    force: bool,
    reprocess: bool,
    sources: Vec<Source>,
    limit: Option<usize>,
) -> Result<()> {
    let batch_limit = limit.unwrap_or(app.config().pipeline.batch_limit);
    validate_limit(batch_limit)?;

    let options = FetchOptions {
        force,
        reprocess,
        sources,
        batch_limit,
    };

    let progress = progress_bar();
    let report = app.fetch(&options, &progress);
    progress.finish_and_clear();

    match report {
        Ok(report) => {
            print_sync_report(&report);
            Ok(())
        }
        Err(AppError::NoSourcesAvailable) => {
            bail!("no sources available: install and log in to gh, bird or raindrop, or enable them in config.yaml")
        }
        Err(err) => Err(err.into()),
    }
}

pub fn handle_search(app: &AppService, query: &[String], limit: usize, format: OutputFormat, no_refresh: bool) -> Result<()> {
    validate_limit(limit)?;

    // Refresh failures are logged by the task and never reach the user.
    let refresh = if no_refresh {
        None
    } else {
        match app.spawn_background_refresh() {
            Ok(task) => task,
            Err(err) => {
                log::warn!("could not check refresh state: {err}");
                None
            }
        }
    };

    let bookmarks = app.search(&query.join(" "), limit)?;
    print_bookmarks(&bookmarks, format)?;

    if let Some(refresh) = refresh {
        if !refresh.is_finished() && format == OutputFormat::Pretty {
            eprintln!("refreshing bookmarks in the background...");
        }
        refresh.join();
    }
    Ok(())
}

pub fn handle_list(app: &AppService, sources: &[Source], limit: usize, format: OutputFormat) -> Result<()> {
    validate_limit(limit)?;
    let bookmarks = app.list(sources, limit)?;
    print_bookmarks(&bookmarks, format)?;
    if format == OutputFormat::Pretty && !bookmarks.is_empty() {
        println!("{} of {} bookmark(s)", bookmarks.len(), app.count()?);
    }
    Ok(())
}

pub fn handle_add(app: &AppService, url: &str, title: Option<String>, notes: Option<String>, json: bool) -> Result<()> {
    validate_url(url)?;

    let (bookmark, outcome) = match app.add_manual(url, title, notes) {
        Ok(added) => added,
        Err(AppError::AlreadyExists(id)) => bail!("{url} is already indexed as {id}"),
        Err(err) => return Err(err.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&bookmark)?);
    } else {
        print_outcome(&bookmark, &outcome);
    }
    Ok(())
}

pub fn handle_reprocess(app: &AppService, target: &str) -> Result<()> {
    match app.reprocess(target) {
        Ok((bookmark, outcome)) => {
            print_outcome(&bookmark, &outcome);
            Ok(())
        }
        Err(AppError::NotFound) => bail!("no bookmark matches {target}"),
        Err(err) => Err(err.into()),
    }
}

pub fn handle_resummarize(app: &AppService, limit: Option<usize>) -> Result<()> {
    if let Some(limit) = limit {
        validate_limit(limit)?;
    }

    let progress = progress_bar();
    let report = app.resummarize(limit, &progress);
    progress.finish_and_clear();

    let report = report?;
    if report.processed == 0 {
        println!("Every bookmark with content already has a summary");
    } else {
        print_pipeline_report(&report);
    }
    Ok(())
}

pub fn handle_delete(app: &AppService, target: &str, yes: bool) -> Result<()> {
    let Some(bookmark) = app.resolve(target)? else {
        println!("Nothing to delete");
        return Ok(());
    };

    if !yes {
        match inquire::prompt_confirmation(format!(
            "Are you sure you want to delete \"{}\" ({})?",
            display_title(&bookmark),
            bookmark.url
        )) {
            InquireResult::Ok(true) => {}
            InquireResult::Ok(false) => return Ok(()),
            InquireResult::Err(err) => bail!("An error occurred: {}", err),
        }
    }

    if app.delete(&bookmark.id)? {
        println!("Deleted {}", bookmark.id);
    } else {
        println!("Nothing to delete");
    }
    Ok(())
}

pub fn handle_edit(app: &AppService, target: &str, update: BookmarkUpdate) -> Result<()> {
    validate_update(&update)?;
    match app.edit(target, &update) {
        Ok(bookmark) => {
            println!("{}", serde_json::to_string_pretty(&bookmark)?);
            Ok(())
        }
        Err(AppError::NotFound) => bail!("no bookmark matches {target}"),
        Err(err) => Err(err.into()),
    }
}

fn progress_bar() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message("fetching sources");
    progress
}

fn print_bookmarks(bookmarks: &[Bookmark], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(bookmarks)?),
        OutputFormat::Plain => {
            for bookmark in bookmarks {
                println!("{}\t{}\t{}", bookmark.source, display_title(bookmark), bookmark.url);
            }
        }
        OutputFormat::Pretty => {
            if bookmarks.is_empty() {
                println!("No bookmarks found");
            }
            for (idx, bookmark) in bookmarks.iter().enumerate() {
                print_pretty(idx + 1, bookmark);
            }
        }
    }
    Ok(())
}

fn print_pretty(position: usize, bookmark: &Bookmark) {
    println!("{position}. {} {}", bookmark.source.icon(), display_title(bookmark));
    println!("   {}", bookmark.url);
    if !bookmark.summary.is_empty() {
        println!("   {}", preview(&bookmark.summary));
    }
    let keywords = parse_keywords(&bookmark.keywords);
    if !keywords.is_empty() {
        println!("   #{}", keywords.join(" #"));
    }
    println!();
}

fn display_title(bookmark: &Bookmark) -> &str {
    let title = bookmark.title.lines().next().unwrap_or_default().trim();
    if title.is_empty() {
        &bookmark.url
    } else {
        title
    }
}

fn preview(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > SUMMARY_PREVIEW_CHARS {
        let cut: String = line.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        line
    }
}

fn print_outcome(bookmark: &Bookmark, outcome: &ItemOutcome) {
    println!("{} {} ({})", bookmark.id, display_title(bookmark), bookmark.scrape_status);
    if outcome.fetch == StageResult::Failed {
        println!("  content could not be fetched, it will be retried on the next fetch");
        return;
    }
    if outcome.summary == StageResult::Failed {
        println!("  summary failed, try `xhub resummarize` later");
    }
    if outcome.embedding == StageResult::Failed {
        println!("  embedding failed, try `xhub reprocess {}` later", bookmark.id);
    }
    if !outcome.persisted {
        println!("  bookmark was deleted while it was being processed");
    }
}

fn print_sync_report(report: &SyncReport) {
    for source in &report.unavailable {
        println!("{source}: unavailable, skipped");
    }
    for source in &report.sources {
        match &source.error {
            Some(error) => println!("{}: failed: {error}", source.source),
            None if source.orphans_deleted > 0 => println!(
                "{}: {} found, {} new, {} removed",
                source.source, source.found, source.new, source.orphans_deleted
            ),
            None => println!("{}: {} found, {} new", source.source, source.found, source.new),
        }
    }
    if let Some(pipeline) = &report.pipeline {
        print_pipeline_report(pipeline);
    }
}

fn print_pipeline_report(report: &PipelineReport) {
    println!(
        "enriched {} of {} bookmark(s): {} summarized, {} embedded",
        report.succeeded, report.processed, report.summarized, report.embedded
    );
    if report.failed > 0 {
        println!("{} bookmark(s) failed and will be retried", report.failed);
    }
    if report.summary_errors > 0 || report.embedding_errors > 0 {
        println!(
            "{} summary and {} embedding error(s), see logs with --verbose",
            report.summary_errors, report.embedding_errors
        );
    }
}
