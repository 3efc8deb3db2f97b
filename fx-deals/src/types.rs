//! Deal entities: treasury rate commitments with a utilisation balance

use chrono::{DateTime, Utc};
use fx_core::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Draft,
    PendingApproval,
    Active,
    Expired,
    FullyUtilized,
    Cancelled,
    Rejected,
}

/// One audit record per state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub from: DealStatus,
    pub to: DealStatus,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One record per utilisation against the deal balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilisationEntry {
    pub ts: DateTime<Utc>,
    pub amount: Decimal,
    pub remaining_after: Decimal,
    pub by: String,
}

/// Pre-negotiated treasury rate commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: String,
    /// Pair key (`USDINR`)
    pub pair: String,
    pub side: Side,
    pub buy_rate: Decimal,
    pub sell_rate: Decimal,
    pub amount: Decimal,
    pub min_amount: Decimal,
    pub remaining_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: DealStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub audit: Vec<AuditEntry>,
    pub utilisations: Vec<UtilisationEntry>,
}

impl Deal {
    /// Status with lazy expiry applied: an ACTIVE deal past `valid_until`
    /// reads as EXPIRED. `now == valid_until` is still ACTIVE.
    pub fn effective_status(&self, now: DateTime<Utc>) -> DealStatus {
        if self.status == DealStatus::Active && now > self.valid_until {
            DealStatus::Expired
        } else {
            self.status
        }
    }

    /// The committed customer rate for the deal's side
    pub fn committed_rate(&self) -> Decimal {
        match self.side {
            Side::Buy => self.buy_rate,
            Side::Sell => self.sell_rate,
        }
    }

    /// Usable for a request of `amount` at `now`
    pub fn covers(&self, amount: Decimal, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == DealStatus::Active
            && self.remaining_amount >= amount
            && amount >= self.min_amount
            && now >= self.valid_from
            && now <= self.valid_until
    }
}

/// Parameters for creating a DRAFT deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeal {
    pub pair: String,
    pub side: Side,
    pub buy_rate: Decimal,
    pub sell_rate: Decimal,
    pub amount: Decimal,
    pub min_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn active_deal(valid_until: DateTime<Utc>) -> Deal {
        Deal {
            deal_id: "DEAL-1".to_string(),
            pair: "USDINR".to_string(),
            side: Side::Sell,
            buy_rate: dec!(84.40),
            sell_rate: dec!(84.65),
            amount: dec!(200_000),
            min_amount: dec!(10_000),
            remaining_amount: dec!(200_000),
            valid_from: valid_until - chrono::Duration::hours(24),
            valid_until,
            status: DealStatus::Active,
            created_by: "trader-1".to_string(),
            created_at: valid_until - chrono::Duration::hours(25),
            audit: vec![],
            utilisations: vec![],
        }
    }

    #[test]
    fn test_deal_still_active_at_exact_expiry() {
        let now = Utc::now();
        let deal = active_deal(now);
        // The expiry instant itself is inside the window
        assert_eq!(deal.effective_status(now), DealStatus::Active);
        assert!(deal.covers(dec!(50_000), now));
        assert_eq!(
            deal.effective_status(now + chrono::Duration::milliseconds(1)),
            DealStatus::Expired
        );
    }

    #[test]
    fn test_covers_respects_minimum_and_balance() {
        let now = Utc::now();
        let deal = active_deal(now + chrono::Duration::hours(1));
        assert!(!deal.covers(dec!(5_000), now)); // below min_amount
        assert!(!deal.covers(dec!(250_000), now)); // above remaining
        assert!(deal.covers(dec!(200_000), now));
    }
}
