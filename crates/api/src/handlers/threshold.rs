//! Handlers for the IRS threshold report (accountant hand-off).

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use glowcast_db::models::threshold::{ThresholdRecord, ThresholdReportQuery};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/threshold-report?year=YYYY&format=json|csv
///
/// Per-user year-to-date paid totals with the `requires_1099` flag,
/// highest totals first. CSV is the format the accountants ingest.
pub async fn threshold_report(
    State(state): State<AppState>,
    Query(query): Query<ThresholdReportQuery>,
) -> AppResult<impl IntoResponse> {
    let records = state
        .engine
        .thresholds
        .report_for_year(&state.pool, query.year)
        .await?;

    match query.format.as_deref().unwrap_or("json") {
        "json" => Ok(Json(DataResponse { data: records }).into_response()),
        "csv" => {
            let body = to_csv(&records)
                .map_err(|e| AppError::InternalError(format!("CSV encoding failed: {e}")))?;
            let headers = [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"threshold-report-{}.csv\"", query.year),
                ),
            ];
            Ok((headers, body).into_response())
        }
        other => Err(AppError::BadRequest(format!(
            "Unknown format '{other}'. Must be 'json' or 'csv'"
        ))),
    }
}

/// Render records as CSV with dollar-formatted totals.
fn to_csv(records: &[ThresholdRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "user_id",
        "year",
        "total_paid_usd",
        "payout_count",
        "requires_1099",
        "last_payout_at",
    ])?;
    for record in records {
        writer.write_record([
            record.user_id.to_string(),
            record.year.to_string(),
            format_usd(record.total_paid_usd_cents),
            record.payout_count.to_string(),
            record.requires_1099.to_string(),
            record
                .last_payout_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ])?;
    }
    let bytes = writer.into_inner().expect("Vec<u8> writer cannot fail");
    Ok(String::from_utf8(bytes).expect("CSV output is valid UTF-8"))
}

/// Integer cents to a `12.34` dollar string; no floats involved.
fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_format_as_dollars() {
        assert_eq!(format_usd(2_100), "21.00");
        assert_eq!(format_usd(60_000), "600.00");
        assert_eq!(format_usd(5), "0.05");
        assert_eq!(format_usd(-2_100), "-21.00");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let records = vec![ThresholdRecord {
            user_id: 7,
            year: 2026,
            total_paid_usd_cents: 61_250,
            payout_count: 3,
            requires_1099: true,
            last_payout_at: None,
        }];
        let csv = to_csv(&records).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("user_id,year"));
        assert_eq!(lines.next().unwrap(), "7,2026,612.50,3,true,");
    }
}
