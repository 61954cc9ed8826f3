use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub adoption_date: Option<NaiveDate>,
    pub background_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Child joined with the adoptive parent's display fields, for the admin list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChildWithParent {
    pub id: i64,
    pub parent_id: i64,
    pub parent_name: String,
    pub parent_code: Option<String>,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub adoption_date: Option<NaiveDate>,
    pub background_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChildRequest {
    /// `users.id` of the adoptive parent.
    pub parent_id: i64,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub adoption_date: Option<NaiveDate>,
    pub background_info: Option<String>,
}
