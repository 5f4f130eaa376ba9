use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::events::{CacheNotifier, Invalidation, NullNotifier};
use crate::store::{LedgerEntry, MemoryStore, Tables, Wallet};
use crate::types::{EntryKind, User, UserId};

/// outcome of a single-wallet ledger operation
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    pub balance: Money,
    pub entry: LedgerEntry,
}

/// outcome of a wallet-to-wallet transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub from_balance: Money,
    pub to_balance: Money,
    pub from_entry: LedgerEntry,
    pub to_entry: LedgerEntry,
}

/// atomic balance mutation with an immutable transaction log
///
/// Every mutation runs in a store transaction, so concurrent operations on
/// one wallet serialize and a failed operation leaves no trace.
pub struct WalletLedger {
    store: MemoryStore,
    notifier: Arc<dyn CacheNotifier>,
}

impl WalletLedger {
    pub fn new(store: MemoryStore) -> Self {
        Self::with_notifier(store, Arc::new(NullNotifier))
    }

    pub fn with_notifier(store: MemoryStore, notifier: Arc<dyn CacheNotifier>) -> Self {
        Self { store, notifier }
    }

    /// existing wallet for the user, or a fresh zero-balance one
    pub fn get_or_create(&self, user: &User, time: &SafeTimeProvider) -> Result<Wallet> {
        let now = time.now();
        let user_id = user.id;
        self.store.transaction(|tables| {
            get_or_create_wallet(tables, user_id, now);
            match tables.wallet_by_user(user_id) {
                Some(wallet) => Ok(wallet.clone()),
                None => Err(LendingError::WalletNotFound { user_id }),
            }
        })
    }

    /// current balance; zero when no wallet exists yet
    pub fn balance(&self, user: &User) -> Money {
        self.store.read(|tables| {
            tables
                .wallet_by_user(user.id)
                .map(|w| w.balance)
                .unwrap_or(Money::ZERO)
        })
    }

    pub fn deposit(&self, user: &User, amount: Money, time: &SafeTimeProvider) -> Result<LedgerReceipt> {
        check_positive(amount)?;
        let now = time.now();
        let user_id = user.id;
        let receipt = self.store.transaction(|tables| {
            get_or_create_wallet(tables, user_id, now);
            credit(
                tables,
                user_id,
                amount,
                EntryKind::Deposit,
                None,
                format!("Deposit of {}", amount),
                now,
            )
        })?;

        info!(user = %user.username, %amount, balance = %receipt.balance, "deposit applied");
        self.notifier.invalidate(Invalidation::User(user_id));
        Ok(receipt)
    }

    pub fn withdraw(&self, user: &User, amount: Money, time: &SafeTimeProvider) -> Result<LedgerReceipt> {
        check_positive(amount)?;
        let now = time.now();
        let user_id = user.id;
        let receipt = self.store.transaction(|tables| {
            debit(
                tables,
                user_id,
                amount,
                EntryKind::Withdrawal,
                None,
                format!("Withdrawal of {}", amount),
                now,
            )
        })?;

        info!(user = %user.username, %amount, balance = %receipt.balance, "withdrawal applied");
        self.notifier.invalidate(Invalidation::User(user_id));
        Ok(receipt)
    }

    /// move funds between two users as one atomic unit
    pub fn transfer(
        &self,
        from: &User,
        to: &User,
        amount: Money,
        kind: EntryKind,
        reference: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<TransferReceipt> {
        check_positive(amount)?;
        let now = time.now();
        let reference = reference.into();
        let receipt = self.store.transaction(|tables| {
            transfer(
                tables,
                from.id,
                to.id,
                amount,
                kind,
                &reference,
                format!("Transfer to {}", to.username),
                format!("Transfer from {}", from.username),
                now,
            )
        })?;

        info!(
            from = %from.username,
            to = %to.username,
            %amount,
            %kind,
            %reference,
            "transfer applied"
        );
        self.notifier.invalidate(Invalidation::User(from.id));
        self.notifier.invalidate(Invalidation::User(to.id));
        Ok(receipt)
    }

    /// withdraw tagged as a platform fee
    pub fn deduct_fee(
        &self,
        user: &User,
        amount: Money,
        reference: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<LedgerReceipt> {
        check_positive(amount)?;
        let now = time.now();
        let user_id = user.id;
        let reference = reference.into();
        let receipt = self
            .store
            .transaction(|tables| deduct_fee(tables, user_id, amount, &reference, now))?;

        info!(user = %user.username, %amount, %reference, "platform fee deducted");
        self.notifier.invalidate(Invalidation::User(user_id));
        Ok(receipt)
    }

    /// ledger history for a user, newest first
    pub fn history(&self, user: &User, limit: Option<usize>) -> Vec<LedgerEntry> {
        self.store.read(|tables| {
            let Some(wallet) = tables.wallet_by_user(user.id) else {
                return Vec::new();
            };
            let mut entries = tables.entries_for_wallet(wallet.id);
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            entries
        })
    }
}

fn check_positive(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(LendingError::Validation {
            message: format!("amount must be positive, got {}", amount),
        });
    }
    Ok(())
}

// table-level operations, composed into larger transactions by the
// funding and payment orchestrators

pub(crate) fn get_or_create_wallet(tables: &mut Tables, user_id: UserId, now: DateTime<Utc>) {
    if tables.wallet_by_user(user_id).is_none() {
        tables.insert_wallet(Wallet::new(user_id, now));
    }
}

pub(crate) fn credit(
    tables: &mut Tables,
    user_id: UserId,
    amount: Money,
    kind: EntryKind,
    reference: Option<String>,
    description: String,
    now: DateTime<Utc>,
) -> Result<LedgerReceipt> {
    let wallet = tables
        .wallet_by_user_mut(user_id)
        .ok_or(LendingError::WalletNotFound { user_id })?;
    wallet.balance += amount;
    wallet.updated_at = now;
    let wallet_id = wallet.id;
    let balance = wallet.balance;

    let entry = LedgerEntry::new(wallet_id, kind, amount, reference, description, now);
    tables.push_entry(entry.clone());
    Ok(LedgerReceipt { balance, entry })
}

pub(crate) fn debit(
    tables: &mut Tables,
    user_id: UserId,
    amount: Money,
    kind: EntryKind,
    reference: Option<String>,
    description: String,
    now: DateTime<Utc>,
) -> Result<LedgerReceipt> {
    let wallet = tables
        .wallet_by_user_mut(user_id)
        .ok_or(LendingError::WalletNotFound { user_id })?;
    if wallet.balance < amount {
        return Err(LendingError::InsufficientFunds {
            available: wallet.balance,
            requested: amount,
        });
    }
    wallet.balance -= amount;
    wallet.updated_at = now;
    let wallet_id = wallet.id;
    let balance = wallet.balance;

    let entry = LedgerEntry::new(wallet_id, kind, -amount, reference, description, now);
    tables.push_entry(entry.clone());
    Ok(LedgerReceipt { balance, entry })
}

/// debit the sender, credit the receiver (creating their wallet if absent),
/// and append the paired entries sharing one reference id
pub(crate) fn transfer(
    tables: &mut Tables,
    from_id: UserId,
    to_id: UserId,
    amount: Money,
    kind: EntryKind,
    reference: &str,
    from_description: String,
    to_description: String,
    now: DateTime<Utc>,
) -> Result<TransferReceipt> {
    get_or_create_wallet(tables, to_id, now);

    let from_receipt = debit(
        tables,
        from_id,
        amount,
        kind,
        Some(reference.to_string()),
        from_description,
        now,
    )?;
    let to_receipt = credit(
        tables,
        to_id,
        amount,
        kind,
        Some(reference.to_string()),
        to_description,
        now,
    )?;

    Ok(TransferReceipt {
        from_balance: from_receipt.balance,
        to_balance: to_receipt.balance,
        from_entry: from_receipt.entry,
        to_entry: to_receipt.entry,
    })
}

pub(crate) fn deduct_fee(
    tables: &mut Tables,
    user_id: UserId,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<LedgerReceipt> {
    debit(
        tables,
        user_id,
        amount,
        EntryKind::PlatformFee,
        Some(reference.to_string()),
        format!("Platform fee of {}", amount),
        now,
    )
}
