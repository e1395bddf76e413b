//! Promo code management: bulk add with duplicate screening, listing,
//! deletion and statistics.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::stats::{self, PromoCodeStats};
use crate::auth::AdminIdentity;
use crate::db::models::{CodeType, NewPromoCode, PromoCode, Region};
use crate::db::{CodeFilter, Store};
use crate::error::AppError;
use crate::events::{DashboardEvent, EventBus};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AddCodesResult {
    pub success: Vec<PromoCode>,
    pub errors: Vec<String>,
}

/// Per-entry result of screening a submitted batch
enum Screened {
    Empty,
    Duplicate(String),
    Candidate(String),
}

fn screen(codes: &[String]) -> Vec<Screened> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .map(|raw| {
            let code = raw.trim();
            if code.is_empty() {
                Screened::Empty
            } else if !seen.insert(code.to_string()) {
                Screened::Duplicate(code.to_string())
            } else {
                Screened::Candidate(code.to_string())
            }
        })
        .collect()
}

pub struct PromoCodeService {
    store: Arc<dyn Store>,
    events: EventBus,
    unit_price: u64,
}

impl PromoCodeService {
    pub fn new(store: Arc<dyn Store>, events: EventBus, unit_price: u64) -> Self {
        Self {
            store,
            events,
            unit_price,
        }
    }

    /// Insert every new code of the batch with the given tier and region.
    ///
    /// Each submitted entry ends up either in `success` or as a message in
    /// `errors`. A store failure fails the whole call.
    pub async fn add_promo_codes(
        &self,
        actor: &AdminIdentity,
        codes: &[String],
        code_type: CodeType,
        region: Region,
    ) -> Result<AddCodesResult, AppError> {
        let screened = screen(codes);

        let candidates: Vec<String> = screened
            .iter()
            .filter_map(|s| match s {
                Screened::Candidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect();

        let existing = if candidates.is_empty() {
            HashSet::new()
        } else {
            self.store.find_existing_codes(&candidates).await?
        };

        let mut result = AddCodesResult::default();
        let mut to_insert = Vec::new();
        for entry in screened {
            match entry {
                Screened::Empty => result.errors.push("Empty code found".to_string()),
                Screened::Duplicate(code) => result
                    .errors
                    .push(format!("Code {} is duplicated in this batch", code)),
                Screened::Candidate(code) if existing.contains(&code) => {
                    result.errors.push(format!("Code {} already exists", code))
                }
                Screened::Candidate(code) => to_insert.push(NewPromoCode {
                    code,
                    code_type,
                    region,
                }),
            }
        }

        if !to_insert.is_empty() {
            result.success = self.store.insert_codes(&to_insert).await?;
            self.events.publish(DashboardEvent::CodesChanged);
        }

        tracing::info!(
            actor = %actor.email,
            code_type = %code_type,
            region = %region,
            inserted = result.success.len(),
            rejected = result.errors.len(),
            "promo codes added"
        );

        Ok(result)
    }

    pub async fn get_promo_codes(
        &self,
        _actor: &AdminIdentity,
        filter: &CodeFilter,
    ) -> Result<Vec<PromoCode>, AppError> {
        self.store.list_codes(filter).await
    }

    /// Delete by id; unknown ids are ignored.
    pub async fn delete_promo_codes(
        &self,
        actor: &AdminIdentity,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.store.delete_codes(ids).await?;
        tracing::info!(actor = %actor.email, requested = ids.len(), deleted, "promo codes deleted");
        self.events.publish(DashboardEvent::CodesChanged);
        Ok(deleted)
    }

    /// Both scans must succeed; partial statistics are never returned.
    pub async fn get_promo_code_stats(
        &self,
        _actor: &AdminIdentity,
    ) -> Result<PromoCodeStats, AppError> {
        let (codes, requests) = tokio::try_join!(
            self.store.code_stat_rows(),
            self.store.request_stat_rows()
        )?;

        Ok(stats::aggregate(&codes, &requests, Utc::now(), self.unit_price))
    }
}
