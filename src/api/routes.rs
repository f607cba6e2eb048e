use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::header,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::export;
use crate::ledger::{PresetDecision, PriceLedger};
use crate::marketplace::{ListingOwner, ListingRegistry};
use crate::profile::ProfileStore;
use crate::session::{SessionState, SessionTracker};
use crate::store::LocalStore;
use crate::sync::SyncState;
use crate::types::{
    Actor, Listing, ListingDraft, ListingKind, ListingPatch, MarketPrice, PriceAudit, Profile,
    SessionUser, Trend,
};

use super::health::health;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<LocalStore>,
    pub ledger: Arc<PriceLedger>,
    pub registry: Arc<ListingRegistry>,
    pub profiles: Arc<ProfileStore>,
    pub sync: Arc<SyncState>,
    pub session: Arc<SessionTracker>,
    pub started: Instant,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/prices", get(list_prices))
        .route("/prices/:id", get(get_price))
        .route("/prices/:id/update", post(update_price))
        .route("/prices/:id/history", get(price_history))
        .route("/history/recent", get(recent_history))
        .route("/listings", get(list_listings).post(create_listing))
        .route(
            "/listings/:id",
            patch(update_listing).delete(delete_listing),
        )
        .route("/profiles/:id", get(get_profile).put(put_profile))
        .route("/export/snapshot", get(export_snapshot))
        .route("/export/prices.csv", get(export_prices_csv))
        .route("/session", get(get_session))
        .route("/session/logout", post(logout))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query/request param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PricesQuery {
    pub commodity: Option<String>,
    pub location: Option<String>,
    pub trend: Option<Trend>,
}

#[derive(Deserialize)]
pub struct UpdatePriceRequest {
    pub new_price: f64,
    pub actor: Actor,
    /// Acknowledges a move beyond the volatility threshold. Without it, such
    /// a change comes back 409 and nothing is mutated.
    #[serde(default)]
    pub confirm_volatile: bool,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ListingsQuery {
    #[serde(rename = "type")]
    pub kind: Option<ListingKind>,
    pub category: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateListingRequest {
    #[serde(flatten)]
    pub draft: ListingDraft,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct UpdateListingRequest {
    #[serde(flatten)]
    pub patch: ListingPatch,
    pub caller_id: String,
}

#[derive(Deserialize)]
pub struct CallerQuery {
    pub caller_id: String,
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct SnapshotQuery {
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Price handlers
// ---------------------------------------------------------------------------

async fn list_prices(
    State(state): State<ApiState>,
    Query(params): Query<PricesQuery>,
) -> Json<Vec<MarketPrice>> {
    let prices = state.store.query_prices(|p| {
        params
            .commodity
            .as_ref()
            .map_or(true, |c| p.commodity.eq_ignore_ascii_case(c))
            && params
                .location
                .as_ref()
                .map_or(true, |l| p.location.to_lowercase().contains(&l.to_lowercase()))
            && params.trend.map_or(true, |t| p.trend == t)
    });
    Json(prices)
}

async fn get_price(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<MarketPrice>, AppError> {
    state
        .store
        .price(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("price {id}")))
}

async fn update_price(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePriceRequest>,
) -> Result<Json<MarketPrice>, AppError> {
    let confirmer = PresetDecision(req.confirm_volatile);
    let updated = state
        .ledger
        .update_price(&id, req.new_price, &req.actor, &confirmer)
        .await?;
    Ok(Json(updated))
}

async fn price_history(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Json<Vec<PriceAudit>> {
    Json(state.ledger.history(&id))
}

async fn recent_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<PriceAudit>> {
    Json(state.ledger.recent_history(params.limit.unwrap_or(50)))
}

// ---------------------------------------------------------------------------
// Listing handlers
// ---------------------------------------------------------------------------

async fn list_listings(
    State(state): State<ApiState>,
    Query(params): Query<ListingsQuery>,
) -> Json<Vec<Listing>> {
    let listings = state.store.query_listings(|l| {
        params.kind.map_or(true, |k| l.kind == k)
            && params
                .category
                .as_ref()
                .map_or(true, |c| l.category.eq_ignore_ascii_case(c))
            && params.user_id.as_ref().map_or(true, |u| &l.user_id == u)
    });
    Json(listings)
}

async fn create_listing(
    State(state): State<ApiState>,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<Listing>, AppError> {
    // Owner display fields come from the caller's current effective profile,
    // never from the draft.
    let identity = SessionUser {
        user_id: req.user_id.clone(),
        email: None,
        is_logged_in: true,
    };
    let effective = state.profiles.effective(&identity);
    let owner = ListingOwner {
        user_id: req.user_id,
        name: effective.name,
        profile_image: effective.profile_image,
    };
    let created = state.registry.create(req.draft, &owner).await?;
    Ok(Json(created))
}

async fn update_listing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, AppError> {
    let updated = state.registry.update(&id, req.patch, &req.caller_id).await?;
    Ok(Json(updated))
}

async fn delete_listing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(params): Query<CallerQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.registry.delete(&id, &params.caller_id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ---------------------------------------------------------------------------
// Profile handlers
// ---------------------------------------------------------------------------

async fn get_profile(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(params): Query<ProfileQuery>,
) -> Json<Profile> {
    let identity = SessionUser {
        user_id: id,
        email: params.email,
        is_logged_in: true,
    };
    Json(state.profiles.effective(&identity))
}

async fn put_profile(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(profile): Json<Profile>,
) -> Result<Json<Profile>, AppError> {
    if profile.id != id {
        return Err(AppError::Validation(format!(
            "profile id {} does not match path {id}",
            profile.id
        )));
    }
    let saved = state.profiles.save(profile).await?;
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Session handlers
// ---------------------------------------------------------------------------

async fn get_session(State(state): State<ApiState>) -> Json<SessionState> {
    Json(state.session.current())
}

/// Ends the session under the configured logout policy. With a full-wipe
/// policy this clears every local collection.
async fn logout(State(state): State<ApiState>) -> Result<Json<SessionState>, AppError> {
    state.session.logout().await?;
    Ok(Json(state.session.current()))
}

// ---------------------------------------------------------------------------
// Export handlers
// ---------------------------------------------------------------------------

async fn export_snapshot(
    State(state): State<ApiState>,
    Query(params): Query<SnapshotQuery>,
) -> Json<export::Snapshot> {
    Json(export::snapshot(&state.store, &params.user_id))
}

async fn export_prices_csv(State(state): State<ApiState>) -> ([(header::HeaderName, &'static str); 1], String) {
    let csv = export::prices_csv(&state.store.prices());
    ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv)
}
