use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::claims::Identity,
    error::{ApiError, FieldError},
    listings::{
        dto::{CreateListingRequest, ListQuery, UpdateListingRequest},
        repo_types::{Listing, ListingFilter, ListingPatch, ListingView, NewListing},
    },
    state::AppState,
};

pub const DEFAULT_UNIT: &str = "kg";
pub const UNKNOWN_DONOR: &str = "Unknown Donor";
const MAX_PAGE: i64 = 100;

fn not_found() -> ApiError {
    ApiError::NotFound("Listing not found".into())
}

/// Malformed ids are indistinguishable from unknown ones.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_expiry(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn required(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate_create(req: CreateListingRequest, who: &Identity) -> Result<NewListing, ApiError> {
    let mut errors = Vec::new();

    let title = required(req.title.as_deref());
    if title.is_none() {
        errors.push(FieldError::body("title", "Title is required"));
    }
    let quantity = required(req.quantity.as_deref());
    if quantity.is_none() {
        errors.push(FieldError::body("quantity", "Quantity is required"));
    }
    let location = required(req.location.as_deref());
    if location.is_none() {
        errors.push(FieldError::body("location", "Location is required"));
    }
    let expiry_date = req.expiry_date.as_deref().and_then(parse_expiry);
    if expiry_date.is_none() {
        errors.push(FieldError::body("expiryDate", "Valid expiry date is required"));
    }

    match (title, quantity, location, expiry_date) {
        (Some(title), Some(quantity), Some(location), Some(expiry_date)) => Ok(NewListing {
            title,
            description: req.description.map(|d| d.trim().to_string()),
            quantity,
            unit: required(req.unit.as_deref()).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            expiry_date,
            location,
            donor_id: who.user_id,
            donor_name: who
                .name
                .as_deref()
                .and_then(|n| required(Some(n)))
                .unwrap_or_else(|| UNKNOWN_DONOR.to_string()),
        }),
        _ => Err(ApiError::validation(errors)),
    }
}

fn validate_patch(req: UpdateListingRequest) -> Result<ListingPatch, ApiError> {
    let mut errors = Vec::new();
    let mut required_field = |value: Option<Option<String>>, path: &str, msg: &str| {
        match value {
            None => None,
            Some(v) => {
                let v = required(v.as_deref());
                if v.is_none() {
                    errors.push(FieldError::body(path, msg));
                }
                v
            }
        }
    };

    let title = required_field(req.title, "title", "Title cannot be empty");
    let quantity = required_field(req.quantity, "quantity", "Quantity cannot be empty");
    let location = required_field(req.location, "location", "Location cannot be empty");

    let expiry_date = match req.expiry_date {
        None => None,
        Some(v) => {
            let parsed = v.as_deref().and_then(parse_expiry);
            if parsed.is_none() {
                errors.push(FieldError::body("expiryDate", "Valid expiry date is required"));
            }
            parsed
        }
    };

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    Ok(ListingPatch {
        title,
        description: req.description.map(|d| d.map(|s| s.trim().to_string())),
        quantity,
        unit: req
            .unit
            .map(|u| u.unwrap_or_else(|| DEFAULT_UNIT.to_string())),
        expiry_date,
        location,
    })
}

pub async fn list_available(st: &AppState, q: ListQuery) -> Result<Vec<ListingView>, ApiError> {
    let filter = ListingFilter {
        search: q.q.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        limit: q.limit.map(|n| n.clamp(0, MAX_PAGE)),
        offset: q.offset.unwrap_or(0).max(0),
    };
    Ok(st.listings.list_available(&filter).await?)
}

pub async fn get(st: &AppState, id: Uuid) -> Result<ListingView, ApiError> {
    st.listings.find_view(id).await?.ok_or_else(not_found)
}

pub async fn create(
    st: &AppState,
    who: &Identity,
    req: CreateListingRequest,
) -> Result<Listing, ApiError> {
    let new = validate_create(req, who)?;
    let listing = st.listings.insert(new).await?;
    info!(listing_id = %listing.id, donor_id = %who.user_id, "listing created");
    Ok(listing)
}

pub async fn update(
    st: &AppState,
    who: &Identity,
    id: Uuid,
    req: UpdateListingRequest,
) -> Result<Listing, ApiError> {
    let listing = st.listings.find(id).await?.ok_or_else(not_found)?;
    if listing.donor_id != who.user_id {
        warn!(listing_id = %id, user_id = %who.user_id, "update by non-owner");
        return Err(ApiError::Forbidden(
            "Not authorized to update this listing".into(),
        ));
    }
    let patch = validate_patch(req)?;

    // The read above only decides ownership; the patch is applied by the
    // store so concurrent edits of other fields survive. `None` here means
    // the listing was deleted in between.
    let saved = st
        .listings
        .update_owned(id, who.user_id, &patch, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(not_found)?;
    info!(listing_id = %id, "listing updated");
    Ok(saved)
}

pub async fn claim(st: &AppState, who: &Identity, id: Uuid) -> Result<Listing, ApiError> {
    let now = OffsetDateTime::now_utc();
    if let Some(listing) = st.listings.claim(id, who.user_id, now).await? {
        info!(listing_id = %id, claimant = %who.user_id, "listing claimed");
        return Ok(listing);
    }
    // The conditional update matched nothing: either gone or already taken.
    match st.listings.find(id).await? {
        None => Err(not_found()),
        Some(l) => {
            warn!(listing_id = %id, status = ?l.status, user_id = %who.user_id, "claim rejected");
            Err(ApiError::InvalidState("Listing is not available".into()))
        }
    }
}

pub async fn delete(st: &AppState, who: &Identity, id: Uuid) -> Result<(), ApiError> {
    let listing = st.listings.find(id).await?.ok_or_else(not_found)?;
    if listing.donor_id != who.user_id {
        warn!(listing_id = %id, user_id = %who.user_id, "delete by non-owner");
        return Err(ApiError::Forbidden(
            "Not authorized to delete this listing".into(),
        ));
    }
    if !st.listings.delete_owned(id, who.user_id).await? {
        return Err(not_found());
    }
    info!(listing_id = %id, "listing deleted");
    Ok(())
}
