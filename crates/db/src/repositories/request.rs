use std::collections::HashMap;

use procura_core::domain::catalog::CatalogItemId;
use procura_core::domain::request::{
    ExternalDecision, NewPurchaseRequest, PurchaseRequest, PurchaseRequestId,
    PurchaseRequestLine, RequestLineId, RequestStatus,
};
use procura_core::store::{StatusChange, StatusUpdate};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::{
    format_timestamp, parse_decimal, parse_timestamp, parse_u32, PurchaseRequestRepository,
    RepositoryError,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, requester_name, department, requested_at, status, total_value,
    external_decision, external_decision_notes, external_decision_at";

const LINE_SELECT: &str = "SELECT
        l.id,
        l.request_id,
        l.catalog_item_id,
        c.name AS item_name,
        c.description AS item_description,
        c.category,
        l.quantity,
        l.unit_price,
        l.line_total
     FROM purchase_request_line l
     JOIN catalog_item c ON c.id = l.catalog_item_id";

pub struct SqlPurchaseRequestRepository {
    pool: DbPool,
}

impl SqlPurchaseRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn current_status(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<RequestStatus>, RepositoryError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT status FROM purchase_request WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|value| parse_status(&value)).transpose()
    }
}

#[async_trait::async_trait]
impl PurchaseRequestRepository for SqlPurchaseRequestRepository {
    async fn create(
        &self,
        request: NewPurchaseRequest,
    ) -> Result<PurchaseRequest, RepositoryError> {
        let status = request.status();
        let request_id = request.id.to_string();

        // Dropping the transaction before commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO purchase_request (
                id,
                requester_name,
                department,
                requested_at,
                status,
                total_value
             ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&request_id)
        .bind(&request.requester_name)
        .bind(&request.department)
        .bind(format_timestamp(request.requested_at))
        .bind(status.as_str())
        .bind(request.total_value.to_string())
        .execute(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in request.lines {
            let inserted = sqlx::query(
                "INSERT INTO purchase_request_line (
                    request_id,
                    catalog_item_id,
                    quantity,
                    unit_price,
                    line_total
                 ) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&request_id)
            .bind(line.item_id.0)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(line.line_total.to_string())
            .execute(&mut *tx)
            .await?;

            lines.push(PurchaseRequestLine {
                id: RequestLineId(inserted.last_insert_rowid()),
                request_id: request.id,
                item_id: line.item_id,
                item_name: line.item_name,
                item_description: line.item_description,
                category: line.category,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
            });
        }

        tx.commit().await?;

        Ok(PurchaseRequest {
            id: request.id,
            requester_name: request.requester_name,
            department: request.department,
            requested_at: request.requested_at,
            status,
            total_value: request.total_value,
            external_decision: None,
            lines,
        })
    }

    async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let request_rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM purchase_request ORDER BY requested_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let line_rows = sqlx::query(&format!("{LINE_SELECT} ORDER BY l.request_id, l.id ASC"))
            .fetch_all(&self.pool)
            .await?;

        let mut lines_by_request: HashMap<PurchaseRequestId, Vec<PurchaseRequestLine>> =
            HashMap::new();
        for row in &line_rows {
            let line = line_from_row(row)?;
            lines_by_request.entry(line.request_id).or_default().push(line);
        }

        request_rows
            .iter()
            .map(|row| -> Result<PurchaseRequest, RepositoryError> {
                let mut request = request_from_row(row)?;
                request.lines = lines_by_request.remove(&request.id).unwrap_or_default();
                Ok(request)
            })
            .collect()
    }

    async fn find_by_id(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM purchase_request WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut request = request_from_row(&row)?;

        let line_rows = sqlx::query(&format!("{LINE_SELECT} WHERE l.request_id = ? ORDER BY l.id ASC"))
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        request.lines = line_rows.iter().map(line_from_row).collect::<Result<_, _>>()?;

        Ok(Some(request))
    }

    async fn find_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<Option<PurchaseRequestLine>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{LINE_SELECT} WHERE l.request_id = ? AND l.catalog_item_id = ? ORDER BY l.id ASC LIMIT 1"
        ))
        .bind(request_id.to_string())
        .bind(item_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(line_from_row).transpose()
    }

    async fn update_status(&self, change: StatusChange) -> Result<StatusUpdate, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE purchase_request SET status = ");
        query.push_bind(change.status.as_str());
        if let Some(decision) = &change.decision {
            query
                .push(", external_decision = ")
                .push_bind(decision.label.clone())
                .push(", external_decision_notes = ")
                .push_bind(decision.notes.clone())
                .push(", external_decision_at = ")
                .push_bind(format_timestamp(decision.decided_at));
        }
        query.push(" WHERE id = ").push_bind(change.request_id.to_string());
        if let Some(expected) = change.expected {
            query.push(" AND status = ").push_bind(expected.as_str());
        }

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(StatusUpdate::Applied);
        }

        match self.current_status(change.request_id).await? {
            None => Ok(StatusUpdate::NotFound),
            Some(current) => Ok(StatusUpdate::Conflict { current }),
        }
    }
}

fn parse_status(value: &str) -> Result<RequestStatus, RepositoryError> {
    RequestStatus::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{value}`")))
}

fn parse_request_id(value: &str) -> Result<PurchaseRequestId, RepositoryError> {
    value
        .parse()
        .map_err(|error| RepositoryError::Decode(format!("invalid request id `{value}` ({error})")))
}

fn request_from_row(row: &SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let total_value: String = row.try_get("total_value")?;

    let label: Option<String> = row.try_get("external_decision")?;
    let decided_at: Option<String> = row.try_get("external_decision_at")?;
    let external_decision = match (label, decided_at) {
        (Some(label), Some(decided_at)) => Some(ExternalDecision {
            label,
            notes: row.try_get("external_decision_notes")?,
            decided_at: parse_timestamp("external_decision_at", decided_at)?,
        }),
        _ => None,
    };

    Ok(PurchaseRequest {
        id: parse_request_id(&id)?,
        requester_name: row.try_get("requester_name")?,
        department: row.try_get("department")?,
        requested_at: parse_timestamp("requested_at", row.try_get("requested_at")?)?,
        status: parse_status(&status)?,
        total_value: parse_decimal("total_value", &total_value)?,
        external_decision,
        lines: Vec::new(),
    })
}

fn line_from_row(row: &SqliteRow) -> Result<PurchaseRequestLine, RepositoryError> {
    let request_id: String = row.try_get("request_id")?;
    let unit_price: String = row.try_get("unit_price")?;
    let line_total: String = row.try_get("line_total")?;

    Ok(PurchaseRequestLine {
        id: RequestLineId(row.try_get("id")?),
        request_id: parse_request_id(&request_id)?,
        item_id: CatalogItemId(row.try_get("catalog_item_id")?),
        item_name: row.try_get("item_name")?,
        item_description: row.try_get("item_description")?,
        category: row.try_get("category")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", &unit_price)?,
        line_total: parse_decimal("line_total", &line_total)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use procura_core::domain::catalog::CatalogItemId;
    use procura_core::domain::request::{
        ExternalDecision, NewPurchaseRequest, NewRequestLine, PurchaseRequestId, RequestStatus,
    };
    use procura_core::store::{StatusChange, StatusUpdate};
    use rust_decimal::Decimal;

    use super::SqlPurchaseRequestRepository;
    use crate::repositories::test_support::{item, setup_pool};
    use crate::repositories::{CatalogRepository, PurchaseRequestRepository, SqlCatalogRepository};
    use crate::DbPool;

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    async fn seeded_pool() -> DbPool {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog.upsert(&item(1, "Cloud Object Storage", 129_900, true)).await.expect("seed");
        catalog.upsert(&item(3, "API Gateway Bundle", 45_000, true)).await.expect("seed");
        pool
    }

    fn line(item_id: i64, name: &str, quantity: u32, cents: i64) -> NewRequestLine {
        let unit_price = Decimal::new(cents, 2);
        NewRequestLine {
            item_id: CatalogItemId(item_id),
            item_name: name.to_string(),
            item_description: format!("{name} description"),
            category: "Storage".to_string(),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
        }
    }

    fn new_request(requested_at: &str) -> NewPurchaseRequest {
        NewPurchaseRequest {
            id: PurchaseRequestId::generate(),
            requester_name: "Ana".to_string(),
            department: "Finance".to_string(),
            requested_at: parse_ts(requested_at),
            total_value: Decimal::new(304_800, 2),
            lines: vec![
                line(1, "Cloud Object Storage", 2, 129_900),
                line(3, "API Gateway Bundle", 1, 45_000),
            ],
        }
    }

    #[tokio::test]
    async fn persisted_request_reloads_identically() {
        let pool = seeded_pool().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());

        let stored = repo.create(new_request("2025-03-04T10:00:00Z")).await.expect("create");
        let reloaded = repo.find_by_id(stored.id).await.expect("find").expect("present");

        assert_eq!(reloaded, stored);
        assert_eq!(reloaded.status, RequestStatus::Pending);
        assert_eq!(reloaded.total_value.to_string(), "3048.00");
        assert!(reloaded.lines[0].id < reloaded.lines[1].id);
        assert_eq!(reloaded.lines[1].unit_price, Decimal::new(45_000, 2));

        pool.close().await;
    }

    #[tokio::test]
    async fn failed_line_insert_rolls_back_the_request() {
        let pool = seeded_pool().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());

        let mut request = new_request("2025-03-04T10:00:00Z");
        request.lines.push(line(99, "Unknown", 1, 100));

        assert!(repo.create(request).await.is_err(), "unknown catalog id violates the fk");
        assert!(repo.list().await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let pool = seeded_pool().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());

        let older = repo.create(new_request("2025-03-01T08:00:00Z")).await.expect("create");
        let newer = repo.create(new_request("2025-03-02T08:00:00Z")).await.expect("create");

        let listed = repo.list().await.expect("list");

        assert_eq!(listed.iter().map(|request| request.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
        assert_eq!(listed[1].lines.len(), 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn status_updates_compare_and_set() {
        let pool = seeded_pool().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());
        let stored = repo.create(new_request("2025-03-04T10:00:00Z")).await.expect("create");

        let confirm = StatusChange {
            request_id: stored.id,
            expected: Some(RequestStatus::Pending),
            status: RequestStatus::Confirmed,
            decision: None,
        };
        assert_eq!(repo.update_status(confirm.clone()).await.expect("update"), StatusUpdate::Applied);
        assert_eq!(
            repo.update_status(confirm).await.expect("update"),
            StatusUpdate::Conflict { current: RequestStatus::Confirmed }
        );

        let missing = StatusChange {
            request_id: PurchaseRequestId::generate(),
            expected: None,
            status: RequestStatus::Rejected,
            decision: None,
        };
        assert_eq!(repo.update_status(missing).await.expect("update"), StatusUpdate::NotFound);

        pool.close().await;
    }

    #[tokio::test]
    async fn external_decision_is_written_with_status() {
        let pool = seeded_pool().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());
        let stored = repo.create(new_request("2025-03-04T10:00:00Z")).await.expect("create");

        let decision = ExternalDecision {
            label: "declined".to_string(),
            notes: Some("over budget".to_string()),
            decided_at: parse_ts("2025-03-05T09:30:00Z"),
        };
        let applied = repo
            .update_status(StatusChange {
                request_id: stored.id,
                expected: None,
                status: RequestStatus::Rejected,
                decision: Some(decision.clone()),
            })
            .await
            .expect("update");
        assert_eq!(applied, StatusUpdate::Applied);

        let reloaded = repo.find_by_id(stored.id).await.expect("find").expect("present");
        assert_eq!(reloaded.status, RequestStatus::Rejected);
        assert_eq!(reloaded.external_decision, Some(decision));

        let line = repo.find_line(stored.id, CatalogItemId(3)).await.expect("line").expect("present");
        assert_eq!(line.quantity, 1);
        assert_eq!(repo.find_line(stored.id, CatalogItemId(2)).await.expect("line"), None);

        pool.close().await;
    }
}
