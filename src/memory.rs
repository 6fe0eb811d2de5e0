//! In-process store backing `STORE_BACKEND=memory` and the test suite.
//! Every check-and-write happens under a single write lock, which gives the
//! same single-record atomicity the Postgres statements rely on.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    listings::{
        repo::ListingStore,
        repo_types::{
            Listing, ListingFilter, ListingPatch, ListingStatus, ListingView, NewListing,
        },
    },
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    listings: RwLock<HashMap<Uuid, Listing>>,
}

impl MemoryStore {
    async fn view(&self, l: Listing) -> ListingView {
        let users = self.users.read().await;
        let donor = users.get(&l.donor_id).map(|u| u.name.clone());
        let claimant = l
            .claimed_by
            .and_then(|id| users.get(&id))
            .map(|u| u.name.clone());
        ListingView::resolve(l, donor, claimant)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Ok(None);
        }
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn list_available(&self, filter: &ListingFilter) -> anyhow::Result<Vec<ListingView>> {
        let mut rows: Vec<Listing> = {
            let listings = self.listings.read().await;
            listings
                .values()
                .filter(|l| l.status == ListingStatus::Available && filter.matches(l))
                .cloned()
                .collect()
        };
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let skip = usize::try_from(filter.offset).unwrap_or(0);
        let take = filter
            .limit
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);

        let mut out = Vec::new();
        for l in rows.into_iter().skip(skip).take(take) {
            out.push(self.view(l).await);
        }
        Ok(out)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Listing>> {
        Ok(self.listings.read().await.get(&id).cloned())
    }

    async fn find_view(&self, id: Uuid) -> anyhow::Result<Option<ListingView>> {
        let found = self.listings.read().await.get(&id).cloned();
        match found {
            Some(l) => Ok(Some(self.view(l).await)),
            None => Ok(None),
        }
    }

    async fn insert(&self, l: NewListing) -> anyhow::Result<Listing> {
        let now = OffsetDateTime::now_utc();
        let record = Listing {
            id: Uuid::new_v4(),
            title: l.title,
            description: l.description,
            quantity: l.quantity,
            unit: l.unit,
            expiry_date: l.expiry_date,
            location: l.location,
            donor_id: l.donor_id,
            donor_name: l.donor_name,
            status: ListingStatus::Available,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.listings
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        donor_id: Uuid,
        patch: &ListingPatch,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>> {
        let mut listings = self.listings.write().await;
        match listings.get_mut(&id) {
            Some(l) if l.donor_id == donor_id => {
                patch.apply(l);
                l.updated_at = at;
                Ok(Some(l.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn claim(
        &self,
        id: Uuid,
        claimant: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Listing>> {
        let mut listings = self.listings.write().await;
        match listings.get_mut(&id) {
            Some(l) if l.status == ListingStatus::Available => {
                l.status = ListingStatus::Claimed;
                l.claimed_by = Some(claimant);
                l.claimed_at = Some(at);
                l.updated_at = at;
                Ok(Some(l.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_owned(&self, id: Uuid, donor_id: Uuid) -> anyhow::Result<bool> {
        let mut listings = self.listings.write().await;
        match listings.get(&id) {
            Some(l) if l.donor_id == donor_id => {
                listings.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
