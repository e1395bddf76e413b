//! Client-side view of the redeemed list with optimistic updates.
//!
//! Each row is in one of three states. A local change moves a row to
//! `Pending` until the store confirms it; a failed change marks it
//! `Reverting` and the list is re-fetched, which is the only revert path.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminIdentity;
use crate::db::models::RedeemedCode;
use crate::db::RestoredCode;
use crate::error::AppError;
use crate::services::redemptions::{RedeemedFilter, RedemptionService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    Pending,
    Reverting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    pub item: T,
    pub state: SyncState,
}

impl<T> Tracked<T> {
    fn synced(item: T) -> Self {
        Self {
            item,
            state: SyncState::Synced,
        }
    }
}

pub struct RedeemedListModel {
    service: Arc<RedemptionService>,
    actor: AdminIdentity,
    filter: RedeemedFilter,
    items: Vec<Tracked<RedeemedCode>>,
}

impl RedeemedListModel {
    pub fn new(service: Arc<RedemptionService>, actor: AdminIdentity, filter: RedeemedFilter) -> Self {
        Self {
            service,
            actor,
            filter,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[Tracked<RedeemedCode>] {
        &self.items
    }

    fn position(&self, id: Uuid) -> Result<usize, AppError> {
        self.items
            .iter()
            .position(|t| t.item.id == id)
            .ok_or(AppError::NotFound)
    }

    /// Replace the local list with the store's; every row becomes `Synced`.
    pub async fn refresh(&mut self) -> Result<(), AppError> {
        let rows = self
            .service
            .get_redeemed_codes(&self.actor, &self.filter)
            .await?;
        self.items = rows.into_iter().map(Tracked::synced).collect();
        Ok(())
    }

    async fn revert(&mut self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "re-fetch after failed update also failed");
        }
    }

    /// Flip the verified flag locally, then persist it.
    pub async fn toggle_verified(&mut self, id: Uuid) -> Result<(), AppError> {
        let idx = self.position(id)?;
        let verified = !self.items[idx].item.verified;
        self.items[idx].item.verified = verified;
        self.items[idx].state = SyncState::Pending;

        match self
            .service
            .toggle_verified_status(&self.actor, id, verified)
            .await
        {
            Ok(()) => {
                if let Ok(idx) = self.position(id) {
                    self.items[idx].state = SyncState::Synced;
                }
                Ok(())
            }
            Err(e) => {
                self.items[idx].state = SyncState::Reverting;
                self.revert().await;
                Err(e)
            }
        }
    }

    /// Restore the code behind a row; the row leaves the list on success.
    pub async fn restore(&mut self, id: Uuid) -> Result<RestoredCode, AppError> {
        let idx = self.position(id)?;
        self.items[idx].state = SyncState::Pending;

        match self.service.restore_redeemed_code(&self.actor, id).await {
            Ok(restored) => {
                self.items.retain(|t| t.item.id != id);
                Ok(restored)
            }
            Err(e) => {
                self.items[idx].state = SyncState::Reverting;
                self.revert().await;
                Err(e)
            }
        }
    }
}
