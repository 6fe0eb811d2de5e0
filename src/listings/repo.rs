use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::listings::repo_types::{
    Listing, ListingFilter, ListingPatch, ListingView, ListingViewRow, NewListing,
};

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Available listings, newest first.
    async fn list_available(&self, filter: &ListingFilter) -> anyhow::Result<Vec<ListingView>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Listing>>;
    async fn find_view(&self, id: Uuid) -> anyhow::Result<Option<ListingView>>;
    async fn insert(&self, listing: NewListing) -> anyhow::Result<Listing>;
    /// Applies `patch` to a listing owned by `donor_id` in one write and
    /// stamps `updated_at`. Fields absent from the patch keep their stored
    /// value; status and claim fields are never touched.
    async fn update_owned(
        &self,
        id: Uuid,
        donor_id: Uuid,
        patch: &ListingPatch,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>>;
    /// Atomically moves an available listing to claimed. `None` when the
    /// listing is missing or no longer available.
    async fn claim(
        &self,
        id: Uuid,
        claimant: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>>;
    /// Removes the listing if `donor_id` owns it.
    async fn delete_owned(&self, id: Uuid, donor_id: Uuid) -> anyhow::Result<bool>;
}

const LISTING_COLUMNS: &str = "id, title, description, quantity, unit, expiry_date, location, \
     donor_id, donor_name, status, claimed_by, claimed_at, created_at, updated_at";

const VIEW_SELECT: &str = r#"
    SELECT l.id, l.title, l.description, l.quantity, l.unit, l.expiry_date, l.location,
           l.donor_id, l.donor_name, l.status, l.claimed_by, l.claimed_at,
           l.created_at, l.updated_at,
           d.name AS donor_display,
           c.name AS claimant_name
      FROM listings l
      LEFT JOIN users d ON d.id = l.donor_id
      LEFT JOIN users c ON c.id = l.claimed_by
"#;

#[derive(Clone)]
pub struct PgListingStore {
    db: PgPool,
}

impl PgListingStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `%q%` for ILIKE with the wildcard characters of `q` escaped.
pub(crate) fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn list_available(&self, filter: &ListingFilter) -> anyhow::Result<Vec<ListingView>> {
        let sql = format!(
            r#"{VIEW_SELECT}
             WHERE l.status = 'available'
               AND ($1::text IS NULL
                    OR l.title ILIKE $1 OR l.donor_name ILIKE $1 OR l.location ILIKE $1)
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT $2 OFFSET $3"#
        );
        let rows = sqlx::query_as::<_, ListingViewRow>(&sql)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.db)
            .await
            .context("list available listings")?;
        Ok(rows.into_iter().map(ListingView::from).collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1");
        let row = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find listing")?;
        Ok(row)
    }

    async fn find_view(&self, id: Uuid) -> anyhow::Result<Option<ListingView>> {
        let sql = format!("{VIEW_SELECT} WHERE l.id = $1");
        let row = sqlx::query_as::<_, ListingViewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find listing view")?;
        Ok(row.map(ListingView::from))
    }

    async fn insert(&self, l: NewListing) -> anyhow::Result<Listing> {
        let sql = format!(
            r#"INSERT INTO listings
                   (id, title, description, quantity, unit, expiry_date, location,
                    donor_id, donor_name, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'available')
               RETURNING {LISTING_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Listing>(&sql)
            .bind(Uuid::new_v4())
            .bind(&l.title)
            .bind(&l.description)
            .bind(&l.quantity)
            .bind(&l.unit)
            .bind(l.expiry_date)
            .bind(&l.location)
            .bind(l.donor_id)
            .bind(&l.donor_name)
            .fetch_one(&self.db)
            .await
            .context("insert listing")?;
        Ok(row)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        donor_id: Uuid,
        patch: &ListingPatch,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>> {
        // NULL keeps the stored value; description carries a presence flag
        // so an explicit null can still clear it.
        let sql = format!(
            r#"UPDATE listings
                  SET title       = COALESCE($3, title),
                      description = CASE WHEN $4 THEN $5 ELSE description END,
                      quantity    = COALESCE($6, quantity),
                      unit        = COALESCE($7, unit),
                      expiry_date = COALESCE($8, expiry_date),
                      location    = COALESCE($9, location),
                      updated_at  = $10
                WHERE id = $1 AND donor_id = $2
            RETURNING {LISTING_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .bind(donor_id)
            .bind(&patch.title)
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(&patch.quantity)
            .bind(&patch.unit)
            .bind(patch.expiry_date)
            .bind(&patch.location)
            .bind(at)
            .fetch_optional(&self.db)
            .await
            .context("update listing")?;
        Ok(row)
    }

    async fn claim(
        &self,
        id: Uuid,
        claimant: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>> {
        // Single conditional statement: concurrent claims serialize on the row
        // lock and only the first one still sees status = 'available'.
        let sql = format!(
            r#"UPDATE listings
                  SET status = 'claimed', claimed_by = $2, claimed_at = $3, updated_at = $3
                WHERE id = $1 AND status = 'available'
            RETURNING {LISTING_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .bind(claimant)
            .bind(at)
            .fetch_optional(&self.db)
            .await
            .context("claim listing")?;
        Ok(row)
    }

    async fn delete_owned(&self, id: Uuid, donor_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM listings WHERE id = $1 AND donor_id = $2")
            .bind(id)
            .bind(donor_id)
            .execute(&self.db)
            .await
            .context("delete listing")?;
        Ok(res.rows_affected() > 0)
    }
}
