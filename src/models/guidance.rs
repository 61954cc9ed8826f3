use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceCategory {
    Guideline,
    Faq,
    Policy,
    Counseling,
}

impl std::str::FromStr for GuidanceCategory {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guideline" => Ok(GuidanceCategory::Guideline),
            "faq" => Ok(GuidanceCategory::Faq),
            "policy" => Ok(GuidanceCategory::Policy),
            "counseling" => Ok(GuidanceCategory::Counseling),
            _ => Err(anyhow::anyhow!("Unknown guidance category: {s}")),
        }
    }
}

impl GuidanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuidanceCategory::Guideline => "guideline",
            GuidanceCategory::Faq => "faq",
            GuidanceCategory::Policy => "policy",
            GuidanceCategory::Counseling => "counseling",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guidance {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
}
