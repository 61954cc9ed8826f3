use serde::Serialize;

/// Flat counts shown on the admin dashboard and exported as CSV.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SummaryReport {
    pub total_staff: i64,
    pub total_parents: i64,
    pub pending_parents: i64,
    pub total_children: i64,
    pub total_uploads: i64,
    pub pending_uploads: i64,
    pub upcoming_visits: i64,
}

impl SummaryReport {
    /// Rows of the exported report, in export order.
    pub fn export_rows(&self) -> [(&'static str, i64); 5] {
        [
            ("Total Staff", self.total_staff),
            ("Total Parents", self.total_parents),
            ("Total Children", self.total_children),
            ("Total Uploads", self.total_uploads),
            ("Pending Uploads", self.pending_uploads),
        ]
    }
}
