use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, AppJson, AppQuery},
    listings::{
        dto::{
            CreateListingRequest, ListQuery, ListingMessage, ListingViewResponse,
            ListingsResponse, MessageResponse, UpdateListingRequest,
        },
        services::{self, parse_id},
    },
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings))
        .route("/listings/:id", get(get_listing))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", post(create_listing))
        .route(
            "/listings/:id",
            axum::routing::put(update_listing).delete(delete_listing),
        )
        .route("/listings/:id/claim", post(claim_listing))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_listings(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<ListQuery>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let listings = services::list_available(&state, q).await?;
    Ok(Json(ListingsResponse { listings }))
}

#[instrument(skip(state))]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListingViewResponse>, ApiError> {
    let listing = services::get(&state, parse_id(&id)?).await?;
    Ok(Json(ListingViewResponse { listing }))
}

#[instrument(skip(state, who, payload), fields(user_id = %who.user_id))]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    AppJson(payload): AppJson<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingMessage>), ApiError> {
    let listing = services::create(&state, &who, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ListingMessage {
            message: "Listing created successfully",
            listing,
        }),
    ))
}

#[instrument(skip(state, who, payload), fields(user_id = %who.user_id))]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateListingRequest>,
) -> Result<Json<ListingMessage>, ApiError> {
    let listing = services::update(&state, &who, parse_id(&id)?, payload).await?;
    Ok(Json(ListingMessage {
        message: "Listing updated successfully",
        listing,
    }))
}

#[instrument(skip(state, who), fields(user_id = %who.user_id))]
pub async fn claim_listing(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListingMessage>, ApiError> {
    let listing = services::claim(&state, &who, parse_id(&id)?).await?;
    Ok(Json(ListingMessage {
        message: "Listing claimed successfully",
        listing,
    }))
}

#[instrument(skip(state, who), fields(user_id = %who.user_id))]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::delete(&state, &who, parse_id(&id)?).await?;
    Ok(Json(MessageResponse {
        message: "Listing deleted successfully",
    }))
}
