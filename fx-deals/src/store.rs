//! Durable deals store
//!
//! Deals live in memory behind per-deal mutexes and persist to an
//! append-oriented JSON-lines journal. Every transition is written ahead:
//! the journal line is flushed before the in-memory state changes, so a
//! crash mid-transition leaves the deal in its prior state. Opening the
//! store replays the journal, last record per deal winning.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{AuditEntry, Deal, DealStatus, NewDeal, UtilisationEntry};

#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    ts: DateTime<Utc>,
    deal: Deal,
}

/// Append-and-mutate store of treasury deals
pub struct DealsStore {
    deals: DashMap<String, Arc<Mutex<Deal>>>,
    journal: Mutex<File>,
    path: PathBuf,
}

impl DealsStore {
    /// Open the store, replaying any existing journal
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deals = DashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut replayed = 0usize;
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalRecord>(&line) {
                    Ok(record) => {
                        deals.insert(
                            record.deal.deal_id.clone(),
                            Arc::new(Mutex::new(record.deal)),
                        );
                        replayed += 1;
                    }
                    Err(e) => {
                        // A torn final line from a crash is recoverable;
                        // everything before it is durable
                        warn!("Skipping journal line {}: {}", line_no + 1, e);
                    }
                }
            }
            info!("Replayed {} journal records, {} deals", replayed, deals.len());
        }

        let journal = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            deals,
            journal: Mutex::new(journal),
            path,
        })
    }

    /// Journal location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a DRAFT deal
    pub fn create(&self, new_deal: NewDeal) -> Result<Deal> {
        if new_deal.amount <= Decimal::ZERO {
            return Err(Error::Validation("amount must be positive".to_string()));
        }
        if new_deal.min_amount < Decimal::ZERO || new_deal.min_amount > new_deal.amount {
            return Err(Error::Validation(format!(
                "min_amount {} must be within [0, {}]",
                new_deal.min_amount, new_deal.amount
            )));
        }
        if new_deal.valid_from >= new_deal.valid_until {
            return Err(Error::Validation(
                "valid_from must precede valid_until".to_string(),
            ));
        }
        if new_deal.buy_rate > new_deal.sell_rate {
            return Err(Error::Validation(format!(
                "buy_rate {} must not exceed sell_rate {}",
                new_deal.buy_rate, new_deal.sell_rate
            )));
        }

        let now = Utc::now();
        let deal = Deal {
            deal_id: format!("DEAL-{}", Uuid::now_v7().simple()),
            pair: new_deal.pair,
            side: new_deal.side,
            buy_rate: new_deal.buy_rate,
            sell_rate: new_deal.sell_rate,
            amount: new_deal.amount,
            min_amount: new_deal.min_amount,
            remaining_amount: new_deal.amount,
            valid_from: new_deal.valid_from,
            valid_until: new_deal.valid_until,
            status: DealStatus::Draft,
            created_by: new_deal.created_by.clone(),
            created_at: now,
            audit: vec![AuditEntry {
                ts: now,
                from: DealStatus::Draft,
                to: DealStatus::Draft,
                actor: new_deal.created_by,
                reason: Some("created".to_string()),
            }],
            utilisations: vec![],
        };

        self.persist(&deal)?;
        self.deals
            .insert(deal.deal_id.clone(), Arc::new(Mutex::new(deal.clone())));
        info!("Created deal {} {} {:?}", deal.deal_id, deal.pair, deal.side);
        Ok(deal)
    }

    /// Read one deal, lazily materialising expiry
    pub fn get(&self, deal_id: &str) -> Result<Deal> {
        let slot = self.slot(deal_id)?;
        let mut guard = slot.lock();
        self.refresh_expiry(&mut guard)?;
        Ok(guard.clone())
    }

    /// Point-in-time snapshot of all deals, expiry lazily tagged
    pub fn list(&self) -> Vec<Deal> {
        let slots: Vec<Arc<Mutex<Deal>>> =
            self.deals.iter().map(|entry| entry.value().clone()).collect();

        let mut deals: Vec<Deal> = slots
            .into_iter()
            .map(|slot| {
                let mut guard = slot.lock();
                if let Err(e) = self.refresh_expiry(&mut guard) {
                    warn!("Expiry persist failed for {}: {}", guard.deal_id, e);
                }
                guard.clone()
            })
            .collect();

        deals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        deals
    }

    /// `DRAFT -> PENDING_APPROVAL`
    pub fn submit(&self, deal_id: &str, submitted_by: &str) -> Result<Deal> {
        self.transition(
            deal_id,
            "submit",
            &[DealStatus::Draft],
            DealStatus::PendingApproval,
            submitted_by,
            None,
            |_deal, _now| Ok(()),
        )
    }

    /// `PENDING_APPROVAL -> ACTIVE`, only once the validity window has opened
    pub fn approve(&self, deal_id: &str, approved_by: &str) -> Result<Deal> {
        self.transition(
            deal_id,
            "approve",
            &[DealStatus::PendingApproval],
            DealStatus::Active,
            approved_by,
            None,
            |deal, now| {
                if now < deal.valid_from {
                    return Err(Error::StateConflict {
                        deal_id: deal.deal_id.clone(),
                        current: deal.status,
                        attempted: format!("approve before valid_from {}", deal.valid_from),
                    });
                }
                Ok(())
            },
        )
    }

    /// `PENDING_APPROVAL -> REJECTED`
    pub fn reject(&self, deal_id: &str, rejected_by: &str, reason: &str) -> Result<Deal> {
        self.transition(
            deal_id,
            "reject",
            &[DealStatus::PendingApproval],
            DealStatus::Rejected,
            rejected_by,
            Some(reason.to_string()),
            |_deal, _now| Ok(()),
        )
    }

    /// `{DRAFT, PENDING_APPROVAL, ACTIVE} -> CANCELLED`
    pub fn cancel(&self, deal_id: &str, cancelled_by: &str, reason: &str) -> Result<Deal> {
        self.transition(
            deal_id,
            "cancel",
            &[
                DealStatus::Draft,
                DealStatus::PendingApproval,
                DealStatus::Active,
            ],
            DealStatus::Cancelled,
            cancelled_by,
            Some(reason.to_string()),
            |_deal, _now| Ok(()),
        )
    }

    /// Consume part of an ACTIVE deal's balance.
    ///
    /// Utilisations on the same deal serialise on the per-deal lock; two
    /// concurrent utilisations both succeed only if their sum fits.
    pub fn utilize(&self, deal_id: &str, amount: Decimal, by: &str) -> Result<Deal> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "utilisation amount must be positive, got {}",
                amount
            )));
        }

        let slot = self.slot(deal_id)?;
        let mut guard = slot.lock();
        self.refresh_expiry(&mut guard)?;

        if guard.status != DealStatus::Active {
            return Err(Error::StateConflict {
                deal_id: guard.deal_id.clone(),
                current: guard.status,
                attempted: "utilize".to_string(),
            });
        }
        if amount > guard.remaining_amount {
            return Err(Error::InsufficientBalance {
                deal_id: guard.deal_id.clone(),
                requested: amount,
                remaining: guard.remaining_amount,
            });
        }

        let now = Utc::now();
        let mut updated = guard.clone();
        updated.remaining_amount -= amount;
        updated.utilisations.push(UtilisationEntry {
            ts: now,
            amount,
            remaining_after: updated.remaining_amount,
            by: by.to_string(),
        });

        // Below min_amount the tail can never be consumed
        if updated.remaining_amount < updated.min_amount {
            updated.audit.push(AuditEntry {
                ts: now,
                from: DealStatus::Active,
                to: DealStatus::FullyUtilized,
                actor: by.to_string(),
                reason: Some(format!("remaining {} below minimum", updated.remaining_amount)),
            });
            updated.status = DealStatus::FullyUtilized;
        }

        self.persist(&updated)?;
        *guard = updated.clone();
        info!(
            "Deal {} utilised {} by {}, remaining {}",
            updated.deal_id, amount, by, updated.remaining_amount
        );
        Ok(updated)
    }

    /// ACTIVE deals usable for `(pair, side, amount)` at `now`
    pub fn active_candidates(
        &self,
        pair: &str,
        side: fx_core::Side,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Vec<Deal> {
        self.deals
            .iter()
            .filter_map(|entry| {
                let guard = entry.value().lock();
                (guard.pair == pair && guard.side == side && guard.covers(amount, now))
                    .then(|| guard.clone())
            })
            .collect()
    }

    // ==================== internals ====================

    fn slot(&self, deal_id: &str) -> Result<Arc<Mutex<Deal>>> {
        self.deals
            .get(deal_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(deal_id.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn transition(
        &self,
        deal_id: &str,
        verb: &str,
        allowed_from: &[DealStatus],
        to: DealStatus,
        actor: &str,
        reason: Option<String>,
        precondition: impl FnOnce(&Deal, DateTime<Utc>) -> Result<()>,
    ) -> Result<Deal> {
        let slot = self.slot(deal_id)?;
        let mut guard = slot.lock();
        self.refresh_expiry(&mut guard)?;

        if !allowed_from.contains(&guard.status) {
            return Err(Error::StateConflict {
                deal_id: guard.deal_id.clone(),
                current: guard.status,
                attempted: verb.to_string(),
            });
        }

        let now = Utc::now();
        precondition(&guard, now)?;

        let mut updated = guard.clone();
        updated.audit.push(AuditEntry {
            ts: now,
            from: guard.status,
            to,
            actor: actor.to_string(),
            reason,
        });
        updated.status = to;

        self.persist(&updated)?;
        *guard = updated.clone();
        info!("Deal {} {} -> {:?}", updated.deal_id, verb, to);
        Ok(updated)
    }

    /// Materialise lazy expiry under the per-deal lock
    fn refresh_expiry(&self, deal: &mut Deal) -> Result<()> {
        let now = Utc::now();
        if deal.status == DealStatus::Active && deal.effective_status(now) == DealStatus::Expired {
            let mut updated = deal.clone();
            updated.audit.push(AuditEntry {
                ts: now,
                from: DealStatus::Active,
                to: DealStatus::Expired,
                actor: "system".to_string(),
                reason: Some("validity window elapsed".to_string()),
            });
            updated.status = DealStatus::Expired;
            self.persist(&updated)?;
            *deal = updated;
        }
        Ok(())
    }

    /// Write-ahead append; flushed before the caller commits in memory
    fn persist(&self, deal: &Deal) -> Result<()> {
        let record = JournalRecord {
            ts: Utc::now(),
            deal: deal.clone(),
        };
        let line = serde_json::to_string(&record)?;

        let mut journal = self.journal.lock();
        writeln!(journal, "{}", line).map_err(|e| Error::Persistence(e.to_string()))?;
        journal
            .flush()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        journal
            .sync_data()
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_core::Side;
    use rust_decimal_macros::dec;

    fn new_deal(amount: Decimal, min_amount: Decimal) -> NewDeal {
        NewDeal {
            pair: "USDINR".to_string(),
            side: Side::Sell,
            buy_rate: dec!(84.40),
            sell_rate: dec!(84.65),
            amount,
            min_amount,
            valid_from: Utc::now() - chrono::Duration::hours(1),
            valid_until: Utc::now() + chrono::Duration::hours(24),
            created_by: "trader-1".to_string(),
        }
    }

    fn open_store() -> (DealsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DealsStore::open(dir.path().join("deals.journal")).unwrap();
        (store, dir)
    }

    fn activated(store: &DealsStore, deal: NewDeal) -> Deal {
        let deal = store.create(deal).unwrap();
        store.submit(&deal.deal_id, "trader-1").unwrap();
        store.approve(&deal.deal_id, "head-of-desk").unwrap()
    }

    #[test]
    fn test_lifecycle_draft_to_active() {
        let (store, _dir) = open_store();
        let deal = activated(&store, new_deal(dec!(200_000), dec!(10_000)));

        assert_eq!(deal.status, DealStatus::Active);
        assert_eq!(deal.audit.len(), 3);
        assert_eq!(deal.audit.last().unwrap().to, DealStatus::Active);
    }

    #[test]
    fn test_approve_on_draft_conflicts() {
        let (store, _dir) = open_store();
        let deal = store.create(new_deal(dec!(100_000), dec!(1_000))).unwrap();

        let err = store.approve(&deal.deal_id, "head-of-desk").unwrap_err();
        assert!(matches!(
            err,
            Error::StateConflict {
                current: DealStatus::Draft,
                ..
            }
        ));
    }

    #[test]
    fn test_approve_before_window_conflicts() {
        let (store, _dir) = open_store();
        let mut nd = new_deal(dec!(100_000), dec!(1_000));
        nd.valid_from = Utc::now() + chrono::Duration::hours(2);
        nd.valid_until = Utc::now() + chrono::Duration::hours(26);
        let deal = store.create(nd).unwrap();
        store.submit(&deal.deal_id, "trader-1").unwrap();

        assert!(store.approve(&deal.deal_id, "head-of-desk").is_err());
    }

    #[test]
    fn test_reject_and_cancel_paths() {
        let (store, _dir) = open_store();

        let deal = store.create(new_deal(dec!(100_000), dec!(1_000))).unwrap();
        store.submit(&deal.deal_id, "trader-1").unwrap();
        let rejected = store
            .reject(&deal.deal_id, "head-of-desk", "rate too aggressive")
            .unwrap();
        assert_eq!(rejected.status, DealStatus::Rejected);

        let other = activated(&store, new_deal(dec!(100_000), dec!(1_000)));
        let cancelled = store
            .cancel(&other.deal_id, "trader-1", "client withdrew")
            .unwrap();
        assert_eq!(cancelled.status, DealStatus::Cancelled);
        assert_eq!(
            cancelled.audit.last().unwrap().reason.as_deref(),
            Some("client withdrew")
        );

        // Terminal states cannot be cancelled again
        assert!(store.cancel(&other.deal_id, "trader-1", "again").is_err());
    }

    #[test]
    fn test_utilize_reduces_and_fully_utilizes() {
        let (store, _dir) = open_store();
        let deal = activated(&store, new_deal(dec!(200_000), dec!(10_000)));

        let after = store.utilize(&deal.deal_id, dec!(100_000), "ops").unwrap();
        assert_eq!(after.remaining_amount, dec!(100_000));
        assert_eq!(after.status, DealStatus::Active);
        assert_eq!(after.utilisations.len(), 1);

        // Exact-remaining utilisation leaves zero, below min -> FULLY_UTILIZED
        let done = store.utilize(&deal.deal_id, dec!(100_000), "ops").unwrap();
        assert_eq!(done.remaining_amount, dec!(0));
        assert_eq!(done.status, DealStatus::FullyUtilized);

        // No further utilisation, zero included
        assert!(store.utilize(&deal.deal_id, dec!(0), "ops").is_err());
        assert!(store.utilize(&deal.deal_id, dec!(1), "ops").is_err());
    }

    #[test]
    fn test_overdraw_is_insufficient_balance() {
        let (store, _dir) = open_store();
        let deal = activated(&store, new_deal(dec!(50_000), dec!(1_000)));

        let err = store.utilize(&deal.deal_id, dec!(60_000), "ops").unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        // Balance untouched after the failure
        assert_eq!(store.get(&deal.deal_id).unwrap().remaining_amount, dec!(50_000));
    }

    #[test]
    fn test_lazy_expiry_tagged_on_read() {
        let (store, _dir) = open_store();
        let mut nd = new_deal(dec!(100_000), dec!(1_000));
        nd.valid_from = Utc::now() - chrono::Duration::hours(3);
        nd.valid_until = Utc::now() - chrono::Duration::seconds(1);
        let deal = store.create(nd).unwrap();
        store.submit(&deal.deal_id, "trader-1").unwrap();
        // approve succeeds (now >= valid_from) and immediately reads expired
        store.approve(&deal.deal_id, "head-of-desk").unwrap();

        let read = store.get(&deal.deal_id).unwrap();
        assert_eq!(read.status, DealStatus::Expired);
        assert_eq!(read.audit.last().unwrap().actor, "system");
    }

    #[test]
    fn test_journal_replay_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deals.journal");
        let deal_id;
        {
            let store = DealsStore::open(&path).unwrap();
            let deal = activated(&store, new_deal(dec!(200_000), dec!(10_000)));
            store.utilize(&deal.deal_id, dec!(50_000), "ops").unwrap();
            deal_id = deal.deal_id;
        }

        let reopened = DealsStore::open(&path).unwrap();
        let deal = reopened.get(&deal_id).unwrap();
        assert_eq!(deal.status, DealStatus::Active);
        assert_eq!(deal.remaining_amount, dec!(150_000));
        assert_eq!(deal.utilisations.len(), 1);
    }

    #[test]
    fn test_invalid_creates_rejected() {
        let (store, _dir) = open_store();

        let mut nd = new_deal(dec!(0), dec!(0));
        assert!(store.create(nd.clone()).is_err());

        nd = new_deal(dec!(100), dec!(200));
        assert!(store.create(nd.clone()).is_err());

        nd = new_deal(dec!(100_000), dec!(1_000));
        nd.buy_rate = dec!(90);
        nd.sell_rate = dec!(80);
        assert!(store.create(nd).is_err());
    }
}
