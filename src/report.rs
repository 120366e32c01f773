//! CLI command implementations.
//!
//! The engine keeps no state between processes, so every command ingests
//! the upload and runs one training cycle before printing its read model.
//! Tables go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

use helpdesk_insight_core::models::Outcome;
use helpdesk_insight_core::oracle::{ImageAttachment, SuggestionRequest};

use crate::engine::{CycleSummary, Engine, SuggestionSource};
use crate::ingest::load_upload;

/// Ingest `upload` and train `engine` on it.
pub async fn train_from_file(engine: &Engine, upload: &Path) -> Result<CycleSummary> {
    let rows = load_upload(upload)?;
    let summary = engine
        .train(&rows)
        .await
        .with_context(|| format!("Failed to ingest {}", upload.display()))?;
    Ok(summary)
}

pub async fn run_train(engine: &Engine, upload: &Path) -> Result<()> {
    let summary = train_from_file(engine, upload).await?;

    println!("Training cycle {}", summary.generation);
    println!("  Tickets:      {}", summary.accepted);
    println!("  Rejected:     {}", summary.rejected);
    println!("  Terms:        {}", summary.terms);
    println!("  Root causes:  {}", summary.root_causes);
    println!("  Fingerprint:  {}", &summary.fingerprint[..12.min(summary.fingerprint.len())]);

    print_accuracy(engine).await;
    Ok(())
}

pub async fn run_search(engine: &Engine, upload: &Path, query: &str, limit: usize) -> Result<()> {
    train_from_file(engine, upload).await?;

    let hits = match engine.search(query, limit).await {
        Outcome::Ready { value } => value,
        Outcome::Empty { reason } => {
            println!("No results ({}).", reason.message());
            return Ok(());
        }
    };
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({} / {})",
            i + 1,
            hit.score,
            hit.ticket_id,
            hit.category,
            hit.priority
        );
        println!("    {}", hit.description);
        if let Some(solution) = &hit.solution {
            println!("    solution: {}", solution);
        }
    }
    Ok(())
}

pub async fn run_report(engine: &Engine, upload: &Path) -> Result<()> {
    train_from_file(engine, upload).await?;

    println!("Root causes");
    println!("===========");
    match engine.root_causes().await {
        Outcome::Ready { value } => {
            for cause in &value {
                println!("  {:<24} {:>6}", cause.name, cause.count);
            }
            println!();
            println!("Keywords");
            println!("========");
            for cause in &value {
                if let Some(terms) = engine.keywords(&cause.name).await.into_value() {
                    let shown: Vec<String> = terms
                        .iter()
                        .take(10)
                        .map(|k| format!("{} ({})", k.term, k.count))
                        .collect();
                    println!("  {:<24} {}", cause.name, shown.join(", "));
                }
            }
        }
        Outcome::Empty { reason } => println!("  {}", reason.message()),
    }

    println!();
    println!("Heatmap");
    println!("=======");
    if let Some(heatmap) = engine.heatmap().await.into_value() {
        print!("  {:<24}", "");
        for p in &heatmap.priorities {
            print!(" {:>10}", p);
        }
        println!();
        for c in &heatmap.categories {
            print!("  {:<24}", c);
            for p in &heatmap.priorities {
                print!(" {:>10}", heatmap.count(c, p).unwrap_or(0));
            }
            println!();
        }
    }

    print_accuracy(engine).await;
    Ok(())
}

pub async fn run_sla(engine: &Engine, upload: &Path, now: Option<DateTime<Utc>>) -> Result<()> {
    train_from_file(engine, upload).await?;

    let now = now.unwrap_or_else(Utc::now);
    let entries = match engine.sla_risks(now).await {
        Outcome::Ready { value } => value,
        Outcome::Empty { reason } => {
            println!("No SLA risks ({}).", reason.message());
            return Ok(());
        }
    };

    println!(
        "  {:<16} {:>6} {:>10} {:>10}   {}",
        "TICKET", "RISK", "REMAINING", "COMPLEXITY", "CATEGORY"
    );
    println!("  {}", "-".repeat(64));
    for e in &entries {
        println!(
            "  {:<16} {:>6.2} {:>10} {:>10}   {}",
            e.ticket_id, e.risk_score, e.remaining, e.complexity, e.category
        );
    }
    Ok(())
}

pub async fn run_suggest(
    engine: &Engine,
    upload: &Path,
    description: &str,
    category: Option<&str>,
    priority: Option<&str>,
    image: Option<&Path>,
) -> Result<()> {
    train_from_file(engine, upload).await?;

    let attachment = image.map(load_image).transpose()?;
    let req = SuggestionRequest {
        description,
        category,
        priority,
        image: attachment.as_ref(),
    };
    let suggestion = engine.suggest(&req).await;

    match &suggestion.source {
        SuggestionSource::Oracle => println!("Suggested solution ({}):", engine.oracle_name()),
        SuggestionSource::SimilarTicket { ticket_id } => {
            println!("Suggested solution (from ticket {}):", ticket_id)
        }
        SuggestionSource::Static => println!("No suggestion available:"),
    }
    println!("{}", suggestion.text);
    Ok(())
}

async fn print_accuracy(engine: &Engine) {
    println!();
    match engine.accuracy().await {
        Outcome::Ready { value: report } => {
            println!(
                "Accuracy: overall {:.1}%  (category {:.1}%, priority {:.1}%, {} held out)",
                report.overall_score * 100.0,
                report.category_accuracy * 100.0,
                report.priority_accuracy * 100.0,
                report.test_size
            );
            for note in &report.notes {
                println!("  {}", note);
            }
        }
        Outcome::Empty { reason } => println!("Accuracy: n/a ({})", reason.message()),
    }
}

/// Read an image attachment, inferring its MIME type from the extension.
pub fn load_image(path: &Path) -> Result<ImageAttachment> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let mime_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        other => bail!("Unsupported image type '{}': {}", other, path.display()),
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(ImageAttachment {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_image_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.PNG");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x89, b'P', b'N', b'G'])
            .unwrap();
        let img = load_image(&path).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.bytes.len(), 4);
    }

    #[test]
    fn test_load_image_rejects_unknown_type() {
        let err = load_image(Path::new("notes.txt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported image type"));
    }
}
