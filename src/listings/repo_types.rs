use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a listing. `Delivered` is terminal and not reachable
/// through the API yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Claimed,
    Delivered,
}

/// Listing record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub quantity: String,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    pub location: String,
    #[serde(rename = "donor")]
    pub donor_id: Uuid,
    /// Snapshot of the donor's name at creation; not refreshed afterwards.
    pub donor_name: String,
    pub status: ListingStatus,
    pub claimed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub claimed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user reference resolved to something displayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// Listing with donor and claimant resolved, as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub quantity: String,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    pub location: String,
    pub donor: UserRef,
    pub donor_name: String,
    pub status: ListingStatus,
    pub claimed_by: Option<UserRef>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub claimed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ListingView {
    /// `donor_display` falls back to the snapshot when the account is gone.
    pub fn resolve(
        l: Listing,
        donor_display: Option<String>,
        claimant_name: Option<String>,
    ) -> Self {
        let claimed_by = l.claimed_by.map(|id| UserRef {
            id,
            name: claimant_name.unwrap_or_default(),
        });
        Self {
            id: l.id,
            donor: UserRef {
                id: l.donor_id,
                name: donor_display.unwrap_or_else(|| l.donor_name.clone()),
            },
            title: l.title,
            description: l.description,
            quantity: l.quantity,
            unit: l.unit,
            expiry_date: l.expiry_date,
            location: l.location,
            donor_name: l.donor_name,
            status: l.status,
            claimed_by,
            claimed_at: l.claimed_at,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

/// Joined row backing `ListingView` reads.
#[derive(Debug, FromRow)]
pub struct ListingViewRow {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub donor_display: Option<String>,
    pub claimant_name: Option<String>,
}

impl From<ListingViewRow> for ListingView {
    fn from(r: ListingViewRow) -> Self {
        ListingView::resolve(r.listing, r.donor_display, r.claimant_name)
    }
}

/// Validated data for a new listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: Option<String>,
    pub quantity: String,
    pub unit: String,
    pub expiry_date: OffsetDateTime,
    pub location: String,
    pub donor_id: Uuid,
    pub donor_name: String,
}

/// Validated partial edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub expiry_date: Option<OffsetDateTime>,
    pub location: Option<String>,
}

impl ListingPatch {
    pub fn apply(&self, l: &mut Listing) {
        if let Some(v) = &self.title {
            l.title = v.clone();
        }
        if let Some(v) = &self.description {
            l.description = v.clone();
        }
        if let Some(v) = &self.quantity {
            l.quantity = v.clone();
        }
        if let Some(v) = &self.unit {
            l.unit = v.clone();
        }
        if let Some(v) = self.expiry_date {
            l.expiry_date = v;
        }
        if let Some(v) = &self.location {
            l.location = v.clone();
        }
    }
}

/// Filters for the public browse query.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl ListingFilter {
    /// Case-insensitive match on title, donor name or location.
    pub fn matches(&self, l: &Listing) -> bool {
        let Some(q) = self.search.as_deref() else {
            return true;
        };
        let q = q.to_lowercase();
        [&l.title, &l.donor_name, &l.location]
            .iter()
            .any(|field| field.to_lowercase().contains(&q))
    }
}

#[cfg(test)]
mod tests {
    use sqlx::{Postgres, Type, TypeInfo};

    use super::*;

    fn listing() -> Listing {
        let now = OffsetDateTime::now_utc();
        Listing {
            id: Uuid::new_v4(),
            title: "Bread".into(),
            description: None,
            quantity: "5 loaves".into(),
            unit: "kg".into(),
            expiry_date: now,
            location: "Main St".into(),
            donor_id: Uuid::new_v4(),
            donor_name: "Alice".into(),
            status: ListingStatus::Available,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_is_stored_as_lowercase_text() {
        let info = <ListingStatus as Type<Postgres>>::type_info();
        assert!(info.name().eq_ignore_ascii_case("text"));
        assert_eq!(serde_json::to_value(ListingStatus::Claimed).unwrap(), "claimed");
    }

    #[test]
    fn ids_serialize_as_underscore_id() {
        let l = listing();
        let json = serde_json::to_value(&l).unwrap();
        assert_eq!(json["_id"], l.id.to_string());
        assert_eq!(json["donor"], l.donor_id.to_string());
        assert!(json.get("id").is_none());

        let claimant = Uuid::new_v4();
        let mut claimed = l.clone();
        claimed.claimed_by = Some(claimant);
        let view = ListingView::resolve(claimed, None, Some("Bob".into()));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["_id"], l.id.to_string());
        assert_eq!(json["donor"]["_id"], l.donor_id.to_string());
        assert_eq!(json["donor"]["name"], "Alice");
        assert_eq!(json["claimedBy"]["_id"], claimant.to_string());
        assert!(json["donor"].get("id").is_none());
    }
}
