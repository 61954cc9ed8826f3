use chrono::Utc;
use sqlx::SqlitePool;

use crate::{error::AppResult, models::report::SummaryReport};

pub struct ReportService;

impl ReportService {
    /// Counts behind the admin dashboard. Upcoming visits include every status.
    pub async fn summary(pool: &SqlitePool) -> AppResult<SummaryReport> {
        let report = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
            "SELECT
                (SELECT COUNT(*) FROM staff),
                (SELECT COUNT(*) FROM users WHERE role = 'parent' AND status = 'approved'),
                (SELECT COUNT(*) FROM users WHERE role = 'parent' AND status = 'pending'),
                (SELECT COUNT(*) FROM children),
                (SELECT COUNT(*) FROM uploads),
                (SELECT COUNT(*) FROM uploads WHERE status = 'pending'),
                (SELECT COUNT(*) FROM visits WHERE visit_date >= ?)",
        )
        .bind(Utc::now().date_naive())
        .fetch_one(pool)
        .await?;

        let (total_staff, total_parents, pending_parents, total_children, total_uploads, pending_uploads, upcoming_visits) =
            report;

        Ok(SummaryReport {
            total_staff,
            total_parents,
            pending_parents,
            total_children,
            total_uploads,
            pending_uploads,
            upcoming_visits,
        })
    }

    pub fn to_csv(report: &SummaryReport) -> anyhow::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Report Type", "Count"])?;
        for (label, count) in report.export_rows() {
            writer.write_record([label.to_string(), count.to_string()])?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush CSV report: {e}"))
    }
}
