use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(VisitStatus::Scheduled),
            "completed" => Ok(VisitStatus::Completed),
            "cancelled" => Ok(VisitStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown visit status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: i64,
    pub parent_id: i64,
    pub staff_id: i64,
    pub visit_date: NaiveDate,
    pub scheduled_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub status: String,
    /// Paths relative to the upload root, stored as a JSON array.
    pub photos: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    pub fn status(&self) -> VisitStatus {
        self.status.parse().unwrap_or(VisitStatus::Scheduled)
    }
}

pub const VISIT_COLS: &str =
    "id, parent_id, staff_id, visit_date, scheduled_date, remarks, status, photos, created_at";

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    /// `users.id` of the parent to visit.
    pub parent_id: i64,
    pub visit_date: NaiveDate,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisitQuery {
    /// "scheduled" | "completed" | "cancelled" | "all" (default)
    pub status: Option<String>,
}
