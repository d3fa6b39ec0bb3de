use procura_core::domain::catalog::CatalogItem;
use procura_db::DemoCatalog;

use crate::commands::{run_with_database, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let result = run_with_database("seed", |pool| async move {
        DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(id, present)| (!present).then(|| id.to_string()))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_failure_message(&failed), 6u8));
        }

        Ok::<_, StepFailure>(DemoCatalog::items())
    });

    match result {
        Ok(items) => CommandResult::success("seed", seed_summary(&items)),
        Err(failure) => failure,
    }
}

fn seed_summary(items: &[CatalogItem]) -> String {
    let lines = items
        .iter()
        .map(|item| {
            format!("  - {}: {} ({}, {})", item.id, item.name, item.category, item.unit_price)
        })
        .collect::<Vec<_>>();
    format!("demo catalog seeded with {} items:\n{}", items.len(), lines.join("\n"))
}

fn verification_failure_message(failed_ids: &[String]) -> String {
    if failed_ids.is_empty() {
        "some demo catalog items failed to load".to_string()
    } else {
        format!("seed verification failed for items: {}", failed_ids.join(", "))
    }
}
