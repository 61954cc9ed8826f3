use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Staff {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// External staff code used at login.
    pub staff_id: String,
    pub phone: Option<String>,
    pub assigned_parent_count: i64,
    pub max_parents: i64,
    pub created_at: DateTime<Utc>,
}

impl Staff {
    pub fn has_capacity(&self) -> bool {
        self.assigned_parent_count < self.max_parents
    }
}

pub const STAFF_COLS: &str =
    "id, name, email, password_hash, staff_id, phone, assigned_parent_count, max_parents, created_at";

pub const DEFAULT_MAX_PARENTS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub staff_id: String,
    pub phone: Option<String>,
    pub max_parents: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(assigned: i64, max: i64) -> Staff {
        Staff {
            id: 1,
            name: "Case Worker".into(),
            email: "cw@example.org".into(),
            password_hash: String::new(),
            staff_id: "STF001".into(),
            phone: None,
            assigned_parent_count: assigned,
            max_parents: max,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn capacity_is_exclusive_of_max() {
        assert!(staff(0, 10).has_capacity());
        assert!(staff(9, 10).has_capacity());
        assert!(!staff(10, 10).has_capacity());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let v = serde_json::to_value(staff(0, 1)).unwrap();
        assert!(v.get("password_hash").is_none());
        assert_eq!(v["staff_id"], "STF001");
    }
}
