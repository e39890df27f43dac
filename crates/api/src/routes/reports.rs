//! Admin sales report and analytics.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use document_store::DocumentStore;
use reporting::{Analytics, ReportInterval, SalesBucket};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::QueryParams;
use crate::response::ApiResponse;
use crate::routes::{Bound, parse_date};
use crate::session::AdminSession;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub interval: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

struct ReportParams {
    interval: ReportInterval,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl ReportQuery {
    fn resolve(self) -> Result<ReportParams, ApiError> {
        let interval = match self.interval.as_deref().map(str::trim) {
            None | Some("") => ReportInterval::default(),
            Some(raw) => raw.parse::<ReportInterval>()?,
        };
        Ok(ReportParams {
            interval,
            from: parse_date("from", self.from.as_deref(), Bound::Start)?,
            to: parse_date("to", self.to.as_deref(), Bound::End)?,
        })
    }
}

/// GET /admin/reports/sales
pub async fn sales<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<ApiResponse<Vec<SalesBucket>>, ApiError> {
    let params = query.resolve()?;
    let buckets = state
        .reports
        .sales_report(params.from, params.to, params.interval)
        .await?;
    Ok(ApiResponse::ok(buckets))
}

/// GET /admin/analytics
pub async fn analytics<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<ApiResponse<Analytics>, ApiError> {
    let params = query.resolve()?;
    let analytics = state
        .reports
        .analytics(params.from, params.to, params.interval)
        .await?;
    Ok(ApiResponse::ok(analytics))
}
