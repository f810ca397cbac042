// REST API - axum router over the expense store and the forecast
// Built as a library module so the router can be exercised without binding a socket.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::breakdown::CategoryTotal;
use crate::clock::Clock;
use crate::error::ExpenseError;
use crate::export::{to_csv_bytes, to_xlsx_bytes, CSV_EXPORT_FILENAME, EXPORT_FILENAME, XLSX_CONTENT_TYPE};
use crate::forecast::ForecastSummary;
use crate::models::{Event, Expense, NewExpense};
use crate::report::{forecast_for_user, month_report, MonthReport};
use crate::series::ChartPoint;
use crate::store::SqliteStore;
use crate::subscription::{due_this_month, NewSubscription, Subscription, UpcomingCharges};
use crate::VERSION;

/// Header carrying the authenticated user's id
pub const USER_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl AppState {
    pub fn new(store: SqliteStore, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { store, clock }
    }
}

// ============================================================================
// Errors & identity
// ============================================================================

/// Maps typed expense errors to 4xx and everything else to a bare 500
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ExpenseError>() {
            Some(ExpenseError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(ExpenseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(ExpenseError::Unauthorized) => StatusCode::UNAUTHORIZED,
            None => {
                error!("request failed: {:#}", self.0);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Server Error" })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

/// JSON bodies that fail to decode are client errors with the usual `{message}` shape
fn decode_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ExpenseError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ExpenseError::Validation(format!("Invalid request body: {}", rejection.body_text())))
}

/// Authenticated user id, taken from the `x-user-id` header
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or_else(|| ExpenseError::Unauthorized.into())
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK", "version": VERSION }))
}

/// GET /api/expenses - All expenses for the user, newest first
async fn list_expenses(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<Expense>>, ApiError> {
    Ok(Json(state.store.list_expenses(&user)?))
}

/// POST /api/expenses - Add an expense
async fn add_expense(
    State(state): State<AppState>,
    UserId(user): UserId,
    body: Result<Json<NewExpense>, JsonRejection>,
) -> Result<Json<Expense>, ApiError> {
    let offset = *state.clock.now().offset();
    let expense = decode_body(body)?.into_expense(&user, &offset)?;
    state.store.add_expense(&expense)?;
    Ok(Json(expense))
}

/// DELETE /api/expenses/:id - Delete one expense
async fn delete_expense(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_expense(&user, &id)?;
    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}

/// GET /api/expenses/:id/events - Audit trail of one expense
async fn expense_events(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.store.expense_history(&user, &id)?))
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

/// GET /api/expenses/download - Workbook export of all expenses
async fn download_expenses(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<impl IntoResponse, ApiError> {
    let expenses = state.store.list_expenses(&user)?;
    Ok(attachment(XLSX_CONTENT_TYPE, EXPORT_FILENAME, to_xlsx_bytes(&expenses)?))
}

/// GET /api/expenses/download/csv - Same rows as CSV
async fn download_expenses_csv(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<impl IntoResponse, ApiError> {
    let expenses = state.store.list_expenses(&user)?;
    Ok(attachment("text/csv", CSV_EXPORT_FILENAME, to_csv_bytes(&expenses)?))
}

/// GET /api/expenses/forecast - Month-to-date forecast summary
async fn get_forecast(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<ForecastSummary>, ApiError> {
    let now = state.clock.now();
    Ok(Json(forecast_for_user(&state.store, &user, &now)?))
}

/// GET /api/expenses/forecast/series - Cumulative actual vs projected chart points
async fn get_forecast_series(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<ChartPoint>>, ApiError> {
    let now = state.clock.now();
    Ok(Json(month_report(&state.store, &user, &now)?.series))
}

/// GET /api/expenses/categories - Month-to-date totals per category
async fn get_categories(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<CategoryTotal>>, ApiError> {
    let now = state.clock.now();
    Ok(Json(month_report(&state.store, &user, &now)?.categories))
}

/// GET /api/expenses/report - Summary, series and categories together
async fn get_report(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<MonthReport>, ApiError> {
    let now = state.clock.now();
    Ok(Json(month_report(&state.store, &user, &now)?))
}

/// GET /api/subscriptions - All subscriptions, soonest billing first
async fn list_subscriptions(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(state.store.list_subscriptions(&user)?))
}

/// POST /api/subscriptions - Add a subscription
async fn add_subscription(
    State(state): State<AppState>,
    UserId(user): UserId,
    body: Result<Json<NewSubscription>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let offset = *state.clock.now().offset();
    let subscription = decode_body(body)?.into_subscription(&user, &offset)?;
    state.store.add_subscription(&subscription)?;
    Ok(Json(subscription))
}

/// GET /api/subscriptions/upcoming - Charges still to bill this month
async fn upcoming_subscriptions(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<UpcomingCharges>, ApiError> {
    let now = state.clock.now();
    let subscriptions = state.store.list_subscriptions(&user)?;
    Ok(Json(due_this_month(&subscriptions, &now)))
}

/// DELETE /api/subscriptions/:id - Delete one subscription
async fn delete_subscription(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_subscription(&user, &id)?;
    Ok(Json(json!({ "message": "Subscription deleted successfully" })))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/expenses", get(list_expenses).post(add_expense))
        .route("/expenses/download", get(download_expenses))
        .route("/expenses/download/csv", get(download_expenses_csv))
        .route("/expenses/forecast", get(get_forecast))
        .route("/expenses/forecast/series", get(get_forecast_series))
        .route("/expenses/categories", get(get_categories))
        .route("/expenses/report", get(get_report))
        .route("/expenses/:id", delete(delete_expense))
        .route("/expenses/:id/events", get(expense_events))
        .route("/subscriptions", get(list_subscriptions).post(add_subscription))
        .route("/subscriptions/upcoming", get(upcoming_subscriptions))
        .route("/subscriptions/:id", delete(delete_subscription))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process stops
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
