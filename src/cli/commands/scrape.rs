//! One-shot scrape command.

use console::style;

use crate::config::Settings;
use crate::error::ScrapeError;
use crate::models::{ExtractionReport, FieldValue, ScrapeTarget, ScrapedRecord, StageError};
use crate::scrapers::Scraper;

/// How the raw target argument is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Auto,
    Article,
    Page,
}

/// Scrape a single target and print the outcome.
pub async fn cmd_scrape(
    settings: &Settings,
    raw: &str,
    mode: TargetMode,
    json: bool,
) -> anyhow::Result<()> {
    let target = match mode {
        TargetMode::Auto => ScrapeTarget::parse(raw)?,
        TargetMode::Article => ScrapeTarget::article(raw)?,
        TargetMode::Page => ScrapeTarget::generic(raw)?,
    };

    let scraper = Scraper::from_settings(settings)?;
    if !json {
        println!("{} Scraping {}", style("→").cyan(), target);
    }

    match scraper.scrape_target(&target).await {
        Ok(report) => {
            if json {
                let record = ScrapedRecord::from(&report);
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            if let ScrapeError::Stage(ref failure) = e {
                print_stage_error(&failure.error);
                if let Some(ref video) = failure.video_path {
                    eprintln!("  {} Recording: {}", style("→").dim(), video);
                }
            }
            Err(e.into())
        }
    }
}

fn print_report(report: &ExtractionReport) {
    let status = report.status.as_str();
    let marker = if report.result.errors().is_empty() {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!("{} Run {}", marker, status);

    for (name, value) in report.result.fields() {
        match value {
            FieldValue::Text(text) => println!("  {}: {}", style(name).bold(), text),
            FieldValue::List(items) => {
                println!("  {} ({})", style(name).bold(), items.len());
                for item in items {
                    println!("    - {}", item);
                }
            }
            FieldValue::Links(links) => {
                println!("  {} ({})", style(name).bold(), links.len());
                for link in links {
                    println!("    - {} {}", link.text, style(&link.href).dim());
                }
            }
        }
    }

    for error in report.result.errors() {
        eprintln!("{} {}", style("!").yellow(), error.message);
        print_stage_error(error);
    }

    if let Some(video) = report.result.video_path() {
        println!("  {} Recording: {}", style("→").dim(), video);
    }
}

fn print_stage_error(error: &StageError) {
    match error.step {
        Some(step) => eprintln!("  {} stage: {} (step {})", style("→").dim(), error.stage, step),
        None => eprintln!("  {} stage: {}", style("→").dim(), error.stage),
    }
    eprintln!("  {} tried: {}", style("→").dim(), error.attempted_action);
    if let Some(ref selectors) = error.attempted_selectors {
        eprintln!("  {} selectors: {}", style("→").dim(), selectors.join(" | "));
    }
    if let Some(ref causes) = error.possible_causes {
        for cause in causes {
            eprintln!("  {} possible cause: {}", style("→").dim(), cause);
        }
    }
}
