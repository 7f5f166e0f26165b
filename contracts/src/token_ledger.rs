//! # Token Ledger Contract
//!
//! A fungible-balance store for the hub's reward token. One identity, the
//! owner, may mint. Everybody else can hold, move, approve and burn.
//!
//! ## Security Model
//!
//! - **Mint gating**: `mint()` compares the caller against the recorded
//!   owner and fails with [`LedgerError::Unauthorized`] otherwise. The caller
//!   identity is supplied by the execution environment and trusted as-is.
//! - **Burn authorization**: a holder burns from their own balance, or a
//!   spender burns from an owner's balance within a prior allowance.
//! - **Supply tracking**: `total_supply` always equals the sum of all
//!   balances. Every operation computes all of its new values with checked
//!   arithmetic first and writes them only when every check has passed, so a
//!   failing call changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use knowhub_protocol::config::{TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL};
use knowhub_protocol::Address;

use crate::events::LedgerEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A privileged operation was called by someone other than the owner.
    #[error("unauthorized: {caller} is not the ledger owner")]
    Unauthorized {
        /// The identity that attempted the operation.
        caller: Address,
    },

    /// The source account does not hold enough tokens.
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        balance: u128,
        /// The amount requested.
        amount: u128,
    },

    /// The spender's allowance from the owner is too small.
    #[error(
        "insufficient allowance: {spender} may spend {allowance} of {owner}'s tokens, needs {amount}"
    )]
    InsufficientAllowance {
        /// The account whose tokens would be spent.
        owner: Address,
        /// The identity spending them.
        spender: Address,
        /// Remaining allowance.
        allowance: u128,
        /// The amount requested.
        amount: u128,
    },

    /// Total supply or a balance would exceed `u128::MAX`.
    #[error("overflow: adding {amount} would exceed u128::MAX")]
    Overflow {
        /// The amount that was attempted.
        amount: u128,
    },
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// The reward token ledger.
///
/// Balances and allowances are kept in ordered maps so the serialized
/// snapshot of a ledger is byte-for-byte deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    /// The ledger's own identity. Hubs bind to it at construction.
    address: Address,
    /// Human-readable token name.
    name: String,
    /// Ticker symbol.
    symbol: String,
    /// Fractional digits; amounts are always in the smallest unit.
    decimals: u8,
    /// The only identity allowed to mint.
    owner: Address,
    /// Sum of all balances.
    total_supply: u128,
    /// Per-account balances. Zero balances are not stored.
    balances: BTreeMap<Address, u128>,
    /// `owner -> (spender -> remaining allowance)`. Zero allowances are not stored.
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// Notifications waiting to be drained by the host.
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl TokenLedger {
    /// Creates an empty ledger with the default token metadata.
    pub fn new(address: Address, owner: Address) -> Self {
        Self::with_metadata(address, owner, TOKEN_NAME, TOKEN_SYMBOL, TOKEN_DECIMALS)
    }

    /// Creates an empty ledger with explicit metadata.
    pub fn with_metadata(
        address: Address,
        owner: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            owner,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    // -- Privileged operations ----------------------------------------------

    /// Mints `amount` new tokens to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] if `caller` is not the owner.
    /// Returns [`LedgerError::Overflow`] if the supply would overflow.
    pub fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.require_owner(caller)?;

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;

        self.total_supply = new_supply;
        self.set_balance(to, new_balance);
        self.events.push(LedgerEvent::Transfer {
            from: None,
            to: Some(to.clone()),
            amount,
        });

        info!(to = %to, amount, total_supply = new_supply, "tokens minted");
        Ok(())
    }

    /// Hands minting rights to `new_owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] if `caller` is not the owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
    ) -> Result<(), LedgerError> {
        self.require_owner(caller)?;

        let previous_owner = std::mem::replace(&mut self.owner, new_owner.clone());
        info!(from = %previous_owner, to = %new_owner, "ledger ownership transferred");
        self.events.push(LedgerEvent::OwnershipTransferred {
            previous_owner,
            new_owner: new_owner.clone(),
        });
        Ok(())
    }

    // -- Holder operations --------------------------------------------------

    /// Burns `amount` of the caller's own tokens.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the caller holds less
    /// than `amount`.
    pub fn burn(&mut self, caller: &Address, amount: u128) -> Result<(), LedgerError> {
        let remaining = self.checked_debit(caller, amount)?;

        self.set_balance(caller, remaining);
        self.total_supply -= amount;
        self.events.push(LedgerEvent::Transfer {
            from: Some(caller.clone()),
            to: None,
            amount,
        });

        info!(from = %caller, amount, total_supply = self.total_supply, "tokens burned");
        Ok(())
    }

    /// Burns `amount` of `owner`'s tokens, spending the caller's allowance.
    ///
    /// The allowance is checked before the balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientAllowance`] if the caller may not
    /// spend `amount` from `owner`.
    /// Returns [`LedgerError::InsufficientBalance`] if `owner` holds less
    /// than `amount`.
    pub fn burn_from(
        &mut self,
        caller: &Address,
        owner: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let remaining_allowance = self.checked_spend_allowance(owner, caller, amount)?;
        let remaining = self.checked_debit(owner, amount)?;

        self.set_allowance(owner, caller, remaining_allowance);
        self.set_balance(owner, remaining);
        self.total_supply -= amount;
        self.events.push(LedgerEvent::Transfer {
            from: Some(owner.clone()),
            to: None,
            amount,
        });

        info!(owner = %owner, spender = %caller, amount, "tokens burned from allowance");
        Ok(())
    }

    /// Moves `amount` from the caller to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the caller holds less
    /// than `amount`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.move_balance(caller, to, amount)?;
        debug!(from = %caller, to = %to, amount, "transfer");
        Ok(())
    }

    /// Sets the amount `spender` may move out of the caller's balance.
    /// Replaces any previous allowance.
    pub fn approve(&mut self, caller: &Address, spender: &Address, amount: u128) {
        self.set_allowance(caller, spender, amount);
        self.events.push(LedgerEvent::Approval {
            owner: caller.clone(),
            spender: spender.clone(),
            amount,
        });
        debug!(owner = %caller, spender = %spender, amount, "allowance set");
    }

    /// Moves `amount` from `from` to `to` on behalf of `from`, spending the
    /// caller's allowance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientAllowance`] if the caller may not
    /// spend `amount` from `from`.
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds less
    /// than `amount`.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let remaining_allowance = self.checked_spend_allowance(from, caller, amount)?;
        self.move_balance(from, to, amount)?;
        self.set_allowance(from, caller, remaining_allowance);

        debug!(spender = %caller, from = %from, to = %to, amount, "transfer from allowance");
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// The ledger's own identity.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Fractional digits.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// The identity allowed to mint.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of `account`, 0 if it never held tokens.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Returns `true` when `total_supply` equals the sum of all balances.
    pub fn is_consistent(&self) -> bool {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            == Some(self.total_supply)
    }

    /// Notifications emitted since the last drain.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Takes all pending notifications.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // -- Internals ----------------------------------------------------------

    fn require_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if caller != &self.owner {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Balance of `account` after removing `amount`, without writing it.
    fn checked_debit(&self, account: &Address, amount: u128) -> Result<u128, LedgerError> {
        let balance = self.balance_of(account);
        balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                account: account.clone(),
                balance,
                amount,
            })
    }

    /// Allowance of `spender` over `owner` after spending `amount`, without writing it.
    fn checked_spend_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        let allowance = self.allowance(owner, spender);
        allowance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowance,
                amount,
            })
    }

    fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let from_remaining = self.checked_debit(from, amount)?;

        if from != to {
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow { amount })?;
            self.set_balance(from, from_remaining);
            self.set_balance(to, to_balance);
        }

        self.events.push(LedgerEvent::Transfer {
            from: Some(from.clone()),
            to: Some(to.clone()),
            amount,
        });
        Ok(())
    }

    fn set_balance(&mut self, account: &Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), balance);
        }
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, amount: u128) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(owner) {
                spenders.remove(spender);
                if spenders.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), amount);
        }
    }
}
