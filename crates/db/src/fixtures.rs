use procura_core::domain::catalog::{CatalogItem, CatalogItemId};
use rust_decimal::Decimal;

use crate::connection::DbPool;
use crate::repositories::{CatalogRepository, RepositoryError, SqlCatalogRepository};

struct SeedItemContract {
    id: i64,
    name: &'static str,
    description: &'static str,
    category: &'static str,
    unit_price_cents: i64,
}

/// Demo catalog shipped with the service.
const SEED_ITEMS: &[SeedItemContract] = &[
    SeedItemContract {
        id: 1,
        name: "Cloud Object Storage - Capacity Pack",
        description: "Annual subscription for 5 TB of cloud object storage with redundancy",
        category: "Storage",
        unit_price_cents: 129_900,
    },
    SeedItemContract {
        id: 2,
        name: "Analytics Workstation Instance",
        description: "Managed virtual machine with 8 vCPU and 32 GB RAM for data analysis",
        category: "Compute",
        unit_price_cents: 189_900,
    },
    SeedItemContract {
        id: 3,
        name: "API Gateway Throughput Bundle",
        description: "Monthly allocation for 5 million API calls including monitoring",
        category: "Integration",
        unit_price_cents: 45_000,
    },
    SeedItemContract {
        id: 4,
        name: "Developer Productivity Toolkit",
        description: "Bundle with CI/CD runner minutes, code quality scanning and support",
        category: "Tooling",
        unit_price_cents: 27_500,
    },
];

pub struct DemoCatalog;

impl DemoCatalog {
    pub fn items() -> Vec<CatalogItem> {
        SEED_ITEMS
            .iter()
            .map(|seed| CatalogItem {
                id: CatalogItemId(seed.id),
                name: seed.name.to_string(),
                description: seed.description.to_string(),
                category: seed.category.to_string(),
                unit_price: Decimal::new(seed.unit_price_cents, 2),
                active: true,
            })
            .collect()
    }

    /// Upserts every demo item. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repo = SqlCatalogRepository::new(pool.clone());
        let items = Self::items();
        for item in &items {
            repo.upsert(item).await?;
        }

        Ok(SeedResult { items_seeded: items.into_iter().map(|item| item.id).collect() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repo = SqlCatalogRepository::new(pool.clone());
        let mut checks = Vec::with_capacity(SEED_ITEMS.len());

        for expected in Self::items() {
            let present = repo.find_active_by_id(expected.id).await?.as_ref() == Some(&expected);
            checks.push((expected.id, present));
        }

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub items_seeded: Vec<CatalogItemId>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(CatalogItemId, bool)>,
}
