use engine_core::event_bus::EventBus;
use engine_runtime::report::RunReport;
use model::events::{MigrationPhase, ObjectProgress};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Subscribes to the progress channel and renders one line per event.
pub async fn spawn_progress_printer(bus: &EventBus) {
    let (tx, mut rx) = mpsc::channel::<Arc<ObjectProgress>>(256);
    bus.subscribe::<ObjectProgress>(tx).await;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let marker = match event.phase {
                MigrationPhase::Done => "ok",
                MigrationPhase::Failed => "FAIL",
                MigrationPhase::Skipped => "skip",
                _ => "..",
            };
            if event.detail.is_empty() {
                println!("[{marker:>4}] {} {}", event.object, event.phase.as_str());
            } else {
                println!(
                    "[{marker:>4}] {} {} ({})",
                    event.object,
                    event.phase.as_str(),
                    event.detail
                );
            }
        }
    });
}

pub fn print_summary(report: &RunReport) {
    println!();
    println!("Migration {} finished", report.run_id);
    println!("-----------------------------------");
    println!("{:<14} {}", "Deployed", report.totals.deployed);
    println!("{:<14} {}", "Failed", report.totals.failed);
    println!("{:<14} {}", "Skipped", report.totals.skipped);

    let fk_applied = report.foreign_keys.iter().filter(|f| f.applied).count();
    if !report.foreign_keys.is_empty() {
        println!(
            "{:<14} {}/{}",
            "Foreign keys",
            fk_applied,
            report.foreign_keys.len()
        );
    }
    for copy in &report.copies {
        println!(
            "{:<14} {} rows -> {} ({} batches)",
            "Copied",
            copy.rows_written,
            copy.table,
            copy.batches
        );
    }
    for failure in &report.copy_failures {
        println!("{:<14} {}", "Copy failed", failure);
    }
    if !report.unresolved_dependencies.is_empty() {
        println!("Unresolved dependencies:");
        for entry in &report.unresolved_dependencies {
            println!("  - {entry}");
        }
    }
    for unresolved in report.unresolved() {
        println!("Unresolved: {} ({} attempts)", unresolved.id, unresolved.attempts);
        if let Some(recommendation) = &unresolved.recommendation {
            println!("  advice: {recommendation}");
        }
    }
    for (provider, totals) in &report.cost {
        println!(
            "{:<14} {} calls, {} prompt tokens, {} completion tokens",
            provider, totals.calls, totals.prompt_tokens, totals.completion_tokens
        );
    }
}
