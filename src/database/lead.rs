use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::lead::{Lead, LeadFilter, LeadRegionCount, LeadRequest, LeadStatusCount, LeadTotals, STATUS_NEW};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

const LEAD_COLUMNS: &str = "id, name, email, phone, party_size, dates, region, budget, source, notes, status, created_at";

#[async_trait::async_trait]
pub trait LeadRepository {
    async fn create_lead(&self, request: &LeadRequest) -> Result<Lead, AppError>;
    /// Newest first, at most `filter.limit` rows.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError>;
    async fn count_leads_by_status(&self) -> Result<Vec<LeadStatusCount>, AppError>;
    async fn count_leads_by_region(&self) -> Result<Vec<LeadRegionCount>, AppError>;
    async fn lead_totals(&self, since: DateTime<Utc>) -> Result<LeadTotals, AppError>;
}

#[async_trait::async_trait]
impl LeadRepository for PostgresRepository {
    async fn create_lead(&self, request: &LeadRequest) -> Result<Lead, AppError> {
        let query = format!(
            r#"
            INSERT INTO leads (name, email, phone, party_size, dates, region, budget, source, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {LEAD_COLUMNS}
            "#
        );

        let lead = sqlx::query_as::<_, Lead>(&query)
            .bind(&request.name)
            .bind(&request.email)
            .bind(&request.phone)
            .bind(request.party_size)
            .bind(&request.dates)
            .bind(&request.region)
            .bind(&request.budget)
            .bind(&request.source)
            .bind(&request.notes)
            .bind(request.status.as_deref().unwrap_or(STATUS_NEW))
            .fetch_one(&self.pool)
            .await?;

        Ok(lead)
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {LEAD_COLUMNS} FROM leads WHERE TRUE"));

        if let Some(status) = &filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(region) = &filter.region {
            builder.push(" AND region = ").push_bind(region);
        }
        builder.push(" ORDER BY created_at DESC LIMIT ").push_bind(filter.limit);

        let leads = builder.build_query_as::<Lead>().fetch_all(&self.pool).await?;

        Ok(leads)
    }

    async fn count_leads_by_status(&self) -> Result<Vec<LeadStatusCount>, AppError> {
        let rows = sqlx::query_as::<_, LeadStatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM leads
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_leads_by_region(&self) -> Result<Vec<LeadRegionCount>, AppError> {
        let rows = sqlx::query_as::<_, LeadRegionCount>(
            r#"
            SELECT region, COUNT(*) AS count
            FROM leads
            GROUP BY region
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn lead_totals(&self, since: DateTime<Utc>) -> Result<LeadTotals, AppError> {
        let totals = sqlx::query_as::<_, LeadTotals>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE created_at >= $1) AS since_count
            FROM leads
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}
