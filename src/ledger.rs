use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::VOLATILITY_THRESHOLD;
use crate::error::{AppError, Result};
use crate::store::LocalStore;
use crate::types::{Actor, MarketPrice, PriceAudit, Role, Trend};

// ---------------------------------------------------------------------------
// Volatility confirmation
// ---------------------------------------------------------------------------

/// Capability the caller supplies for the volatility guard. When a change
/// deviates more than [`VOLATILITY_THRESHOLD`] from the current price, the
/// ledger asks before committing; the answer usually comes from a human.
#[async_trait]
pub trait VolatilityConfirmer: Send + Sync {
    async fn confirm(&self, current: &MarketPrice, new_price: f64, deviation: f64) -> bool;
}

/// A decision made ahead of time — e.g. an acknowledgement flag carried on
/// the request that triggered the update.
pub struct PresetDecision(pub bool);

#[async_trait]
impl VolatilityConfirmer for PresetDecision {
    async fn confirm(&self, _current: &MarketPrice, _new_price: f64, _deviation: f64) -> bool {
        self.0
    }
}

// ---------------------------------------------------------------------------
// PriceLedger
// ---------------------------------------------------------------------------

/// Sole writer of market prices and their audit trail. Everything else reads.
pub struct PriceLedger {
    store: Arc<LocalStore>,
}

impl PriceLedger {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Commits a guarded price change and its audit entry atomically.
    ///
    /// Only an extension officer may reprice a commodity. A change deviating
    /// more than 50% from the current price goes through `confirmer`; a
    /// declined confirmation cancels the whole call with zero mutation.
    pub async fn update_price(
        &self,
        price_id: &str,
        new_price: f64,
        actor: &Actor,
        confirmer: &dyn VolatilityConfirmer,
    ) -> Result<MarketPrice> {
        if actor.role != Role::ExtensionOfficer {
            return Err(AppError::Authorization(format!(
                "only extension officers may update prices, {} is a {}",
                actor.display_name, actor.role
            )));
        }
        if !new_price.is_finite() || new_price <= 0.0 {
            return Err(AppError::Validation(format!(
                "price must be positive, got {new_price}"
            )));
        }

        let current = self
            .store
            .price(price_id)
            .ok_or_else(|| AppError::NotFound(format!("price {price_id}")))?;
        let old_price = current.price;

        let deviation = (new_price - old_price).abs() / old_price;
        if deviation > VOLATILITY_THRESHOLD {
            if !confirmer.confirm(&current, new_price, deviation).await {
                info!(
                    price_id,
                    old_price,
                    new_price,
                    deviation,
                    "price change declined at the volatility guard"
                );
                return Err(AppError::Cancelled);
            }
            warn!(
                price_id,
                old_price, new_price, deviation, "volatile price change confirmed"
            );
        }

        let now = Utc::now().to_rfc3339();
        let audit = PriceAudit {
            id: Uuid::new_v4().to_string(),
            price_id: current.id.clone(),
            commodity: current.commodity.clone(),
            old_price,
            new_price,
            base_old_price: old_price,
            changed_by: actor.display_name.clone(),
            timestamp: now.clone(),
        };
        let updated = MarketPrice {
            price: new_price,
            trend: Trend::from_change(old_price, new_price),
            updated_at: now,
            ..current
        };

        self.store
            .commit_price_change(updated.clone(), audit)
            .await?;
        info!(
            price_id,
            commodity = %updated.commodity,
            old_price,
            new_price,
            trend = %updated.trend,
            changed_by = %actor.display_name,
            "price updated"
        );
        Ok(updated)
    }

    /// Audit entries for one price, most recent first.
    pub fn history(&self, price_id: &str) -> Vec<PriceAudit> {
        self.store.audit_for_price(price_id)
    }

    /// Cross-commodity trail for display, most recent first.
    pub fn recent_history(&self, limit: usize) -> Vec<PriceAudit> {
        self.store.recent_audit(limit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
