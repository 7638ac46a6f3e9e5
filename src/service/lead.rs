use crate::database::lead::LeadRepository;
use crate::error::app_error::AppError;
use crate::models::lead::{Lead, LeadFilter, LeadRegionCount, LeadRequest, LeadStatusCount, LeadTotals, STATUS_BOOKED, STATUS_LOST, StatsResponse, UNKNOWN_REGION};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::info;
use validator::Validate;

pub struct LeadService<'a, R> {
    repository: &'a R,
}

impl<'a, R: LeadRepository + Sync> LeadService<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        LeadService { repository }
    }

    /// Validates before touching the store; an invalid lead is never inserted.
    pub async fn create_lead(&self, request: &LeadRequest) -> Result<Lead, AppError> {
        request.validate()?;

        let lead = self.repository.create_lead(request).await?;
        info!(lead_id = %lead.id, region = ?lead.region, "lead created");
        Ok(lead)
    }

    pub async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        self.repository.list_leads(filter).await
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<StatsResponse, AppError> {
        let by_status = self.repository.count_leads_by_status().await?;
        let by_region = self.repository.count_leads_by_region().await?;
        let totals = self.repository.lead_totals(now - Duration::days(7)).await?;

        Ok(build_stats(&by_status, &by_region, &totals))
    }
}

fn build_stats(by_status: &[LeadStatusCount], by_region: &[LeadRegionCount], totals: &LeadTotals) -> StatsResponse {
    let status_counts: BTreeMap<String, i64> = by_status.iter().map(|row| (row.status.clone(), row.count)).collect();

    let mut region_counts: BTreeMap<String, i64> = BTreeMap::new();
    for row in by_region {
        let region = row.region.as_deref().map(str::trim).filter(|r| !r.is_empty()).unwrap_or(UNKNOWN_REGION);
        *region_counts.entry(region.to_string()).or_default() += row.count;
    }

    let booked = status_counts.get(STATUS_BOOKED).copied().unwrap_or(0);
    let lost = status_counts.get(STATUS_LOST).copied().unwrap_or(0);

    StatsResponse {
        total: totals.total,
        by_status: status_counts,
        by_region: region_counts,
        last7_days: totals.since_count,
        booked,
        active: totals.total - booked - lost,
    }
}
