use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    Health,
    Vaccination,
    School,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Health => "health",
            UploadType::Vaccination => "vaccination",
            UploadType::School => "school",
        }
    }
}

impl std::str::FromStr for UploadType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health" => Ok(UploadType::Health),
            "vaccination" => Ok(UploadType::Vaccination),
            "school" => Ok(UploadType::School),
            _ => Err(anyhow::anyhow!("Unknown upload_type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Verified,
    Rejected,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Verified => "verified",
            UploadStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "verified" => Ok(UploadStatus::Verified),
            "rejected" => Ok(UploadStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown upload status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Upload {
    pub id: i64,
    pub parent_id: i64,
    pub child_id: i64,
    pub upload_type: String,
    /// Relative to the upload root, e.g. `documents/<uuid>.pdf`.
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
    pub status: String,
    pub feedback: Option<String>,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Upload {
    pub fn status(&self) -> UploadStatus {
        self.status.parse().unwrap_or(UploadStatus::Pending)
    }
}

pub const UPLOAD_COLS: &str =
    "id, parent_id, child_id, upload_type, file_path, upload_date, status, feedback, verified_by, verified_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyAction {
    Approve,
    Reject,
}

impl VerifyAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(VerifyAction::Approve),
            "reject" => Some(VerifyAction::Reject),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> UploadStatus {
        match self {
            VerifyAction::Approve => UploadStatus::Verified,
            VerifyAction::Reject => UploadStatus::Rejected,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyUploadRequest {
    pub action: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// "pending" (default) | "verified" | "rejected" | "all"
    pub status: Option<String>,
}
