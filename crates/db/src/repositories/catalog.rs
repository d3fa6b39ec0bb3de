use std::collections::{BTreeSet, HashMap};

use procura_core::domain::catalog::{CatalogItem, CatalogItemId};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{parse_decimal, CatalogRepository, RepositoryError};
use crate::DbPool;

const CATALOG_COLUMNS: &str = "id, name, description, category, unit_price, active";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_active_by_ids(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_item WHERE active = 1 AND id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.0);
        }
        separated.push_unseparated(")");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| item_from_row(&row).map(|item| (item.id, item)))
            .collect()
    }

    async fn list_active(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_item WHERE active = 1 ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn find_active_by_id(
        &self,
        id: CatalogItemId,
    ) -> Result<Option<CatalogItem>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_item WHERE active = 1 AND id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn upsert(&self, item: &CatalogItem) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO catalog_item (id, name, description, category, unit_price, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                category = excluded.category,
                unit_price = excluded.unit_price,
                active = excluded.active",
        )
        .bind(item.id.0)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.unit_price.to_string())
        .bind(item.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn item_from_row(row: &SqliteRow) -> Result<CatalogItem, RepositoryError> {
    let unit_price: String = row.try_get("unit_price")?;

    Ok(CatalogItem {
        id: CatalogItemId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        unit_price: parse_decimal("unit_price", &unit_price)?,
        active: row.try_get("active")?,
    })
}
