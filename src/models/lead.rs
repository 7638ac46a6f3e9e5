use chrono::{DateTime, Utc};
use rocket::FromForm;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

pub const STATUS_NEW: &str = "new";
pub const STATUS_BOOKED: &str = "booked";
pub const STATUS_LOST: &str = "lost";

pub const DEFAULT_LEADS_LIMIT: i64 = 100;
pub const MAX_LEADS_LIMIT: i64 = 500;

/// Region bucket for leads that did not name one.
pub const UNKNOWN_REGION: &str = "unknown";

#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub party_size: Option<i32>,
    pub dates: Option<String>,
    pub region: Option<String>,
    pub budget: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Default, Validate, JsonSchema)]
pub struct LeadRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(range(min = 1, message = "Party size must be at least 1"))]
    pub party_size: Option<i32>,
    pub dates: Option<String>,
    pub region: Option<String>,
    pub budget: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LeadResponse {
    pub lead: Lead,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LeadsResponse {
    pub leads: Vec<Lead>,
}

#[derive(FromForm, Debug, Default, JsonSchema)]
pub struct LeadsQuery {
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadFilter {
    pub limit: i64,
    pub status: Option<String>,
    pub region: Option<String>,
}

impl From<LeadsQuery> for LeadFilter {
    fn from(query: LeadsQuery) -> Self {
        let non_empty = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            limit: query.limit.unwrap_or(DEFAULT_LEADS_LIMIT).clamp(1, MAX_LEADS_LIMIT),
            status: non_empty(query.status),
            region: non_empty(query.region),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadStatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRegionCount {
    pub region: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadTotals {
    pub total: i64,
    pub since_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_region: BTreeMap<String, i64>,
    pub last7_days: i64,
    pub booked: i64,
    pub active: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_and_clamps_limit() {
        assert_eq!(LeadFilter::from(LeadsQuery::default()).limit, DEFAULT_LEADS_LIMIT);

        let huge = LeadsQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(LeadFilter::from(huge).limit, MAX_LEADS_LIMIT);

        let negative = LeadsQuery {
            limit: Some(-4),
            ..Default::default()
        };
        assert_eq!(LeadFilter::from(negative).limit, 1);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let filter = LeadFilter::from(LeadsQuery {
            limit: None,
            status: Some("  ".to_string()),
            region: Some(" Algarve ".to_string()),
        });
        assert_eq!(filter.status, None);
        assert_eq!(filter.region.as_deref(), Some("Algarve"));
    }

    #[test]
    fn missing_email_fails_validation() {
        let request: LeadRequest = serde_json::from_str(r#"{"name":"Sam","party_size":4}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn stats_serialize_in_camel_case() {
        let stats = StatsResponse {
            total: 3,
            by_status: BTreeMap::from([("new".to_string(), 2), ("booked".to_string(), 1)]),
            by_region: BTreeMap::from([("Algarve".to_string(), 3)]),
            last7_days: 1,
            booked: 1,
            active: 2,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["byStatus"]["new"], 2);
        assert_eq!(value["last7Days"], 1);
        assert_eq!(value["active"], 2);
    }
}
