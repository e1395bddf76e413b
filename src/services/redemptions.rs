//! Redemption lifecycle: list, verify, restore back to the pool, delete.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminIdentity;
use crate::db::models::{CodeType, RedeemedCode, Region};
use crate::db::{CascadeOutcome, RestoredCode, Store};
use crate::error::AppError;
use crate::events::{DashboardEvent, EventBus};

/// List filters; all provided criteria must match
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedFilter {
    /// Case-insensitive substring of the code string
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub code_type: Option<CodeType>,
    pub region: Option<Region>,
}

impl RedeemedFilter {
    pub fn matches(&self, row: &RedeemedCode) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => row
                .code
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        };

        search_ok
            && self.code_type.map_or(true, |t| t == row.code_type)
            && self.region.map_or(true, |r| r == row.region)
    }
}

pub struct RedemptionService {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl RedemptionService {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Requests joined to their codes, newest first. Requests whose code no
    /// longer exists are not listed.
    pub async fn get_redeemed_codes(
        &self,
        _actor: &AdminIdentity,
        filter: &RedeemedFilter,
    ) -> Result<Vec<RedeemedCode>, AppError> {
        let rows = self.store.list_redeemed().await?;
        Ok(rows.into_iter().filter(|r| filter.matches(r)).collect())
    }

    pub async fn toggle_verified_status(
        &self,
        actor: &AdminIdentity,
        id: Uuid,
        verified: bool,
    ) -> Result<(), AppError> {
        if !self.store.set_request_verified(id, verified).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(actor = %actor.email, request_id = %id, verified, "redemption verification changed");
        self.events.publish(DashboardEvent::RedemptionsChanged);
        Ok(())
    }

    /// Put the code behind a redemption back into the available pool and
    /// drop the redemption record.
    pub async fn restore_redeemed_code(
        &self,
        actor: &AdminIdentity,
        id: Uuid,
    ) -> Result<RestoredCode, AppError> {
        let restored = self
            .store
            .restore_request(id, Utc::now())
            .await?
            .ok_or(AppError::NotFound)?;

        if restored.promo_code.is_none() {
            tracing::warn!(
                actor = %actor.email,
                request_id = %id,
                promo_code_id = %restored.promo_code_id,
                "restored redemption referenced a missing code"
            );
        } else {
            tracing::info!(
                actor = %actor.email,
                request_id = %id,
                promo_code_id = %restored.promo_code_id,
                "redeemed code restored"
            );
        }

        self.events.publish(DashboardEvent::RedemptionsChanged);
        self.events.publish(DashboardEvent::CodesChanged);
        Ok(restored)
    }

    /// Delete redemptions together with the codes they claimed.
    ///
    /// Request deletion is the primary effect. Codes that could not be
    /// removed are reported in `orphaned_code_ids` and can be retried with a
    /// plain code delete.
    pub async fn delete_redeemed_codes(
        &self,
        actor: &AdminIdentity,
        ids: &[Uuid],
    ) -> Result<CascadeOutcome, AppError> {
        if ids.is_empty() {
            return Ok(CascadeOutcome::default());
        }

        let outcome = self.store.delete_requests_cascade(ids).await?;

        if !outcome.orphaned_code_ids.is_empty() {
            tracing::warn!(
                actor = %actor.email,
                orphaned = ?outcome.orphaned_code_ids,
                "redemptions deleted but their codes were left behind"
            );
        }
        tracing::info!(
            actor = %actor.email,
            deleted_requests = outcome.deleted_requests,
            deleted_codes = outcome.deleted_codes,
            "redeemed codes deleted"
        );

        self.events.publish(DashboardEvent::RedemptionsChanged);
        self.events.publish(DashboardEvent::CodesChanged);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{NewPromoCode, PromoCode};
    use crate::db::CodeFilter;
    use crate::services::test_actor;

    async fn seeded() -> (RedemptionService, Arc<MemoryStore>, Vec<PromoCode>) {
        let store = Arc::new(MemoryStore::new());
        let codes = store
            .insert_codes(&[
                NewPromoCode {
                    code: "ALPHA-1".to_string(),
                    code_type: CodeType::Starter,
                    region: Region::Americas,
                },
                NewPromoCode {
                    code: "BETA-2".to_string(),
                    code_type: CodeType::Standard,
                    region: Region::Emea,
                },
            ])
            .await
            .unwrap();
        for code in &codes {
            store
                .record_redemption(code.id, "user", "buyer@corp.test", Utc::now())
                .await
                .unwrap();
        }
        let service = RedemptionService::new(store.clone(), EventBus::new());
        (service, store, codes)
    }

    #[tokio::test]
    async fn filter_narrows_by_search_and_region() {
        let (service, _, _) = seeded().await;
        let actor = test_actor();

        let all = service
            .get_redeemed_codes(&actor, &RedeemedFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let searched = service
            .get_redeemed_codes(
                &actor,
                &RedeemedFilter {
                    search: Some("alpha".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].code, "ALPHA-1");

        let none = service
            .get_redeemed_codes(
                &actor,
                &RedeemedFilter {
                    search: Some("alpha".to_string()),
                    region: Some(Region::Emea),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn toggle_verified_round_trips() {
        let (service, store, _) = seeded().await;
        let actor = test_actor();
        let id = store.list_redeemed().await.unwrap()[0].id;

        service.toggle_verified_status(&actor, id, true).await.unwrap();
        let row = store.list_redeemed().await.unwrap().into_iter().find(|r| r.id == id).unwrap();
        assert!(row.verified);

        service.toggle_verified_status(&actor, id, false).await.unwrap();
        let row = store.list_redeemed().await.unwrap().into_iter().find(|r| r.id == id).unwrap();
        assert!(!row.verified);
    }

    #[tokio::test]
    async fn toggle_unknown_request_is_not_found() {
        let (service, _, _) = seeded().await;
        let err = service
            .toggle_verified_status(&test_actor(), Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn restore_returns_code_to_available_pool() {
        let (service, store, codes) = seeded().await;
        let actor = test_actor();
        let request = store
            .list_redeemed()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.promo_code_id == codes[0].id)
            .unwrap();

        let restored = service.restore_redeemed_code(&actor, request.id).await.unwrap();
        assert_eq!(restored.promo_code_id, codes[0].id);

        let available = store
            .list_codes(&CodeFilter {
                is_used: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(available.iter().any(|c| c.id == codes[0].id));

        let redeemed = service
            .get_redeemed_codes(&actor, &RedeemedFilter::default())
            .await
            .unwrap();
        assert!(redeemed.iter().all(|r| r.id != request.id));
    }

    #[tokio::test]
    async fn restore_unknown_request_is_not_found() {
        let (service, _, _) = seeded().await;
        let err = service
            .restore_redeemed_code(&test_actor(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn delete_cascades_to_codes() {
        let (service, store, codes) = seeded().await;
        let request = store
            .list_redeemed()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.promo_code_id == codes[1].id)
            .unwrap();

        let outcome = service
            .delete_redeemed_codes(&test_actor(), &[request.id])
            .await
            .unwrap();

        assert_eq!(outcome.deleted_requests, 1);
        assert_eq!(outcome.deleted_codes, 1);
        assert!(outcome.orphaned_code_ids.is_empty());
        let remaining = store.list_codes(&CodeFilter::default()).await.unwrap();
        assert!(remaining.iter().all(|c| c.id != codes[1].id));
        assert_eq!(remaining.len(), 1);
    }
}
