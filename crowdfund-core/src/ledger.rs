//! Value transfer capability
//!
//! The engine never holds balances itself. Contributions move into the
//! escrow account, claims and refunds move out of it, all through a
//! [`Ledger`]. A batch of transfers is all-or-nothing: either every leg
//! settles or no balance changes.

use crate::error::TransferError;
use crate::types::{AccountId, Amount};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Single value movement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Debited account
    pub from: AccountId,
    /// Credited account
    pub to: AccountId,
    /// Amount moved
    pub amount: Amount,
}

impl Transfer {
    /// Create new transfer
    pub fn new(from: AccountId, to: AccountId, amount: Amount) -> Self {
        Self { from, to, amount }
    }

    /// Same amount in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount,
        }
    }
}

/// Moves value between accounts
pub trait Ledger: Send + Sync {
    /// Apply every transfer or none of them
    fn transfer_all(&self, transfers: &[Transfer]) -> Result<(), TransferError>;

    /// Apply a single transfer
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.transfer_all(&[Transfer::new(from.clone(), to.clone(), amount)])
    }
}

/// In-process balance book
///
/// Used for tests and single-node deployments. Frozen accounts reject
/// every transfer touching them, which is how callers simulate a failing
/// settlement rail.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: Mutex<Book>,
}

#[derive(Debug, Default)]
struct Book {
    balances: HashMap<AccountId, Amount>,
    frozen: HashSet<AccountId>,
}

impl InMemoryLedger {
    /// Create empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` out of thin air (funding test wallets)
    pub fn mint(&self, account: &AccountId, amount: Amount) {
        let mut book = self.inner.lock();
        let balance = book.balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Current balance
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.inner.lock().balances.get(account).copied().unwrap_or(0)
    }

    /// Freeze or unfreeze an account
    pub fn set_frozen(&self, account: &AccountId, frozen: bool) {
        let mut book = self.inner.lock();
        if frozen {
            book.frozen.insert(account.clone());
        } else {
            book.frozen.remove(account);
        }
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Amount {
        self.inner
            .lock()
            .balances
            .values()
            .fold(0, |acc, b| acc.saturating_add(*b))
    }
}

impl Ledger for InMemoryLedger {
    fn transfer_all(&self, transfers: &[Transfer]) -> Result<(), TransferError> {
        let mut book = self.inner.lock();

        // Stage on a copy of the touched balances; commit only if every leg fits
        let mut staged: HashMap<AccountId, Amount> = HashMap::new();
        for t in transfers {
            for account in [&t.from, &t.to] {
                if book.frozen.contains(account) {
                    return Err(TransferError::AccountFrozen(account.clone()));
                }
            }

            let from_balance = *staged
                .entry(t.from.clone())
                .or_insert_with(|| book.balances.get(&t.from).copied().unwrap_or(0));
            if from_balance < t.amount {
                return Err(TransferError::InsufficientFunds {
                    account: t.from.clone(),
                    needed: t.amount,
                    available: from_balance,
                });
            }
            staged.insert(t.from.clone(), from_balance - t.amount);

            let to_balance = *staged
                .entry(t.to.clone())
                .or_insert_with(|| book.balances.get(&t.to).copied().unwrap_or(0));
            let credited = to_balance
                .checked_add(t.amount)
                .ok_or_else(|| TransferError::Overflow(t.to.clone()))?;
            staged.insert(t.to.clone(), credited);
        }

        book.balances.extend(staged);

        for t in transfers {
            tracing::debug!(from = %t.from, to = %t.to, amount = %t.amount, "Transfer settled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountId {
        AccountId::new(id)
    }

    #[test]
    fn test_transfer_moves_value() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&acct("alice"), 500);

        ledger.transfer(&acct("alice"), &acct("escrow"), 200).unwrap();

        assert_eq!(ledger.balance(&acct("alice")), 300);
        assert_eq!(ledger.balance(&acct("escrow")), 200);
        assert_eq!(ledger.total_supply(), 500);
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&acct("alice"), 50);

        let err = ledger.transfer(&acct("alice"), &acct("escrow"), 51).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { needed: 51, available: 50, .. }));
        assert_eq!(ledger.balance(&acct("alice")), 50);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&acct("escrow"), 1000);
        ledger.set_frozen(&acct("platform"), true);

        let result = ledger.transfer_all(&[
            Transfer::new(acct("escrow"), acct("owner"), 990),
            Transfer::new(acct("escrow"), acct("platform"), 10),
        ]);

        assert_eq!(result, Err(TransferError::AccountFrozen(acct("platform"))));
        assert_eq!(ledger.balance(&acct("escrow")), 1000);
        assert_eq!(ledger.balance(&acct("owner")), 0);
    }

    #[test]
    fn test_batch_legs_see_earlier_legs() {
        let ledger = InMemoryLedger::new();
        ledger.mint(&acct("escrow"), 100);

        // Second leg can only be covered by the first
        ledger
            .transfer_all(&[
                Transfer::new(acct("escrow"), acct("owner"), 100),
                Transfer::new(acct("owner"), acct("platform"), 40),
            ])
            .unwrap();

        assert_eq!(ledger.balance(&acct("owner")), 60);
        assert_eq!(ledger.balance(&acct("platform")), 40);

        let overdrawn = ledger.transfer_all(&[
            Transfer::new(acct("owner"), acct("platform"), 60),
            Transfer::new(acct("owner"), acct("platform"), 1),
        ]);
        assert!(overdrawn.is_err());
        assert_eq!(ledger.balance(&acct("owner")), 60);
    }

    #[test]
    fn test_reversed_transfer() {
        let t = Transfer::new(acct("a"), acct("b"), 7);
        assert_eq!(t.reversed(), Transfer::new(acct("b"), acct("a"), 7));
    }
}
