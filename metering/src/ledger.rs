//! The credit ledger seam and an in-memory implementation.
//!
//! The ledger is owned by an external collaborator. This crate issues a
//! check, a consumption, and at most one compensating refund per guarded
//! extraction, as three independent calls with no shared transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::LedgerError;

/// Entry kind recorded for an AI import consumption.
pub const CONSUMPTION_KIND: &str = "ai_import";

/// Entry kind recorded for a compensating refund.
pub const REFUND_KIND: &str = "refund";

/// A request to debit credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditConsumption {
    /// User being charged.
    pub user_id: String,
    /// Credits to debit.
    pub amount: u32,
    /// Entry kind.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Free-form context (feature, file type, model).
    pub metadata: Value,
}

/// A request to credit credits back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditGrant {
    /// User being credited.
    pub user_id: String,
    /// Credits to add.
    pub amount: u32,
    /// Entry kind.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
}

/// External credit ledger.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Returns whether `user_id` holds at least `amount` credits.
    async fn check_credits(&self, user_id: &str, amount: u32) -> Result<bool, LedgerError>;

    /// Debits credits.
    async fn consume_credits(&self, consumption: CreditConsumption) -> Result<(), LedgerError>;

    /// Adds credits; used here only as a compensating refund.
    async fn add_credits(&self, grant: CreditGrant) -> Result<(), LedgerError>;
}

/// One row in the [`InMemoryLedger`] log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Affected user.
    pub user_id: String,
    /// Signed balance change.
    pub delta: i64,
    /// Entry kind.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Context recorded with consumptions.
    pub metadata: Option<Value>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, i64>,
    entries: Vec<LedgerEntry>,
}

/// A process-local [`CreditLedger`] with per-user balances and an append-only log.
///
/// Consumption is not blocked by a low balance; like the external ledger it
/// stands in for, it trusts the caller's earlier check.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Returns an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a ledger where `user_id` starts with `balance` credits.
    #[must_use]
    pub fn with_balance(user_id: impl Into<String>, balance: i64) -> Self {
        let mut state = LedgerState::default();
        state.balances.insert(user_id.into(), balance);
        Self {
            state: Mutex::new(state),
        }
    }

    /// Sets the balance for `user_id` without writing a log entry.
    pub async fn set_balance(&self, user_id: &str, balance: i64) {
        self.state
            .lock()
            .await
            .balances
            .insert(user_id.to_string(), balance);
    }

    /// Returns the current balance of `user_id`.
    pub async fn balance(&self, user_id: &str) -> i64 {
        self.state
            .lock()
            .await
            .balances
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Returns a copy of the log.
    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Returns the log entries of the given kind.
    pub async fn entries_of_kind(&self, kind: &str) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect()
    }

    async fn append(&self, user_id: &str, delta: i64, kind: String, description: String, metadata: Option<Value>) {
        let mut state = self.state.lock().await;
        *state.balances.entry(user_id.to_string()).or_default() += delta;
        state.entries.push(LedgerEntry {
            user_id: user_id.to_string(),
            delta,
            kind,
            description,
            metadata,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn check_credits(&self, user_id: &str, amount: u32) -> Result<bool, LedgerError> {
        Ok(self.balance(user_id).await >= i64::from(amount))
    }

    async fn consume_credits(&self, consumption: CreditConsumption) -> Result<(), LedgerError> {
        self.append(
            &consumption.user_id,
            -i64::from(consumption.amount),
            consumption.kind,
            consumption.description,
            Some(consumption.metadata),
        )
        .await;
        Ok(())
    }

    async fn add_credits(&self, grant: CreditGrant) -> Result<(), LedgerError> {
        self.append(
            &grant.user_id,
            i64::from(grant.amount),
            grant.kind,
            grant.description,
            None,
        )
        .await;
        Ok(())
    }
}
