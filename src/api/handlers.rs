//! REST API endpoint handlers

use crate::api::types::*;
use crate::error::{AppError, Result};
use crate::services::company_monitor::{CompanyMonitorReport, CompanyMonitorService};
use crate::services::contacts_monitor::{ContactRow, ContactsMonitorService};
use crate::services::day_bucket::Window;
use crate::services::news_monitor::{ModelUsageRow, NewsMonitorService};
use crate::services::point_data::{PointDataReport, PointDataService};
use crate::services::report_service::{GraphReport, ReportService};
use crate::state::AppState;
use axum::{
    extract::{Json, Path, Query, State as AxumState},
    response::IntoResponse,
};
use tracing::{error, info};

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, AppError>;

fn respond<T: serde::Serialize>(route: &str, result: Result<T>) -> ApiResult<T> {
    match result {
        Ok(data) => Ok(Json(ApiResponse::success_with_data(data))),
        Err(e) => {
            error!("{} failed: {} ({})", route, e, e.code());
            Err(e)
        }
    }
}

/// Requested period, or the configured default, capped at `max`
pub fn resolve_period(raw: Option<&str>, default: i64, max: i64) -> Result<i64> {
    let period = match raw.map(str::trim) {
        None | Some("") => default,
        Some(value) => value.parse::<i64>().map_err(|_| {
            AppError::InvalidParameter(format!("period must be an integer, got '{}'", value))
        })?,
    };
    if period > max {
        return Err(AppError::InvalidParameter(format!(
            "period must be at most {} days, got {}",
            max, period
        )));
    }
    Ok(period)
}

fn window_for(state: &AppState, query: &PeriodQuery) -> Result<Window> {
    let period = resolve_period(
        query.period.as_deref(),
        state.config.default_view_range,
        state.config.max_view_range,
    )?;
    Window::ending_today(period)
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Empty>::success_with_message("Ingest Monitor API is running"))
}

// ============================================================================
// Reports
// ============================================================================

/// Catalog listing - GET /reports
pub async fn list_reports(AxumState(state): AxumState<AppState>) -> ApiResult<Vec<ReportSummary>> {
    info!("Listing reports");

    let graphs = state.catalog.metric_sets.iter().map(|set| ReportSummary {
        slug: set.slug.clone(),
        title: set.title.clone(),
        kind: ReportKind::Graph,
        path: format!("/graph/{}", set.slug),
    });
    let point_data = state.catalog.reconcile_profiles.iter().map(|p| ReportSummary {
        slug: p.slug.clone(),
        title: p.title.clone(),
        kind: ReportKind::PointData,
        path: format!("/point-data/{}", p.slug),
    });

    Ok(Json(ApiResponse::success_with_data(graphs.chain(point_data).collect())))
}

/// Metric-set graph - GET /graph/{slug}?period=N
pub async fn get_graph(
    AxumState(state): AxumState<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<GraphReport> {
    info!("Graph request: slug={} period={:?}", slug, query.period);

    let result = async {
        let set = state
            .catalog
            .metric_set(&slug)
            .ok_or_else(|| AppError::NotFound(format!("unknown report '{}'", slug)))?;
        let window = window_for(&state, &query)?;
        ReportService::build(state.store.as_ref(), set, &window).await
    }
    .await;

    respond("get_graph", result)
}

/// Daily reconciliation - GET /point-data/{slug}?date=D
pub async fn get_point_data(
    AxumState(state): AxumState<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<PointDataReport> {
    info!("Point data request: slug={} date={:?}", slug, query.date);

    let result = async {
        let profile = state
            .catalog
            .reconcile_profile(&slug)
            .ok_or_else(|| AppError::NotFound(format!("unknown profile '{}'", slug)))?;
        let day = query
            .date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| AppError::InvalidParameter("date is required".to_string()))?;
        PointDataService::report(state.store.as_ref(), profile, day).await
    }
    .await;

    respond("get_point_data", result)
}

// ============================================================================
// Monitors
// ============================================================================

/// Incomplete company profiles - GET /monitor/companies
pub async fn get_company_monitor(
    AxumState(state): AxumState<AppState>,
) -> ApiResult<CompanyMonitorReport> {
    info!("Company monitor request");

    let result =
        CompanyMonitorService::incomplete_profiles(state.store.as_ref(), &state.catalog.company_monitor)
            .await;

    respond("get_company_monitor", result)
}

/// Model usage of flagged news companies - GET /monitor/news-models?period=N
pub async fn get_news_models(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Vec<ModelUsageRow>> {
    info!("News model request: period={:?}", query.period);

    let result = async {
        let window = window_for(&state, &query)?;
        NewsMonitorService::model_usage(state.store.as_ref(), &state.catalog.news_monitor, &window)
            .await
    }
    .await;

    respond("get_news_models", result)
}

/// Contacts of recent value triggers - GET /monitor/contacts?period=N
pub async fn get_contacts_monitor(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Vec<ContactRow>> {
    info!("Contacts monitor request: period={:?}", query.period);

    let result = async {
        let window = window_for(&state, &query)?;
        ContactsMonitorService::contact_stats(
            state.store.as_ref(),
            &state.catalog.contacts_monitor,
            &window,
        )
        .await
    }
    .await;

    respond("get_contacts_monitor", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_period() {
        assert_eq!(resolve_period(None, 30, 365).unwrap(), 30);
        assert_eq!(resolve_period(Some(""), 30, 365).unwrap(), 30);
        assert_eq!(resolve_period(Some(" 7 "), 30, 365).unwrap(), 7);
        assert_eq!(resolve_period(Some("365"), 30, 365).unwrap(), 365);
        assert_eq!(resolve_period(Some("-2"), 30, 365).unwrap(), -2);
        assert!(matches!(
            resolve_period(Some("week"), 30, 365),
            Err(AppError::InvalidParameter(_))
        ));
        assert!(matches!(
            resolve_period(Some("366"), 30, 365),
            Err(AppError::InvalidParameter(_))
        ));
    }
}
