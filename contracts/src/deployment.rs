//! # Deployment Bootstrap
//!
//! Wires a fresh [`TokenLedger`] and [`KnowledgeHub`] together and funds the
//! reward pool. A deployment is the unit the node persists: both state
//! containers travel together so the pool and the hub can never drift
//! apart across a restart.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use knowhub_protocol::config::{
    DEFAULT_DEPLOYER_LABEL, DEFAULT_HUB_LABEL, DEFAULT_LEDGER_LABEL, DEFAULT_REWARD_POOL_TOKENS,
    ONE_TOKEN,
};
use knowhub_protocol::units::format_units;
use knowhub_protocol::Address;

use crate::events::Event;
use crate::knowledge_hub::{EntryId, HubError, KnowledgeHub};
use crate::token_ledger::{LedgerError, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error("ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid bootstrap config: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Bootstrap parameters
// ---------------------------------------------------------------------------

/// Everything needed to stand up a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Ledger owner. The only identity allowed to mint.
    pub deployer: Address,
    /// The hub's own identity; its ledger balance is the reward pool.
    pub hub: Address,
    /// The ledger's identity.
    pub ledger: Address,
    /// Units minted into the hub at bootstrap.
    pub initial_pool: u128,
    /// Extra balances minted for test accounts, in smallest units.
    pub test_balances: Vec<(Address, u128)>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            deployer: Address::derive(DEFAULT_DEPLOYER_LABEL),
            hub: Address::derive(DEFAULT_HUB_LABEL),
            ledger: Address::derive(DEFAULT_LEDGER_LABEL),
            initial_pool: DEFAULT_REWARD_POOL_TOKENS * ONE_TOKEN,
            test_balances: Vec::new(),
        }
    }
}

impl BootstrapConfig {
    fn validate(&self) -> Result<(), DeploymentError> {
        if self.hub == self.deployer {
            return Err(DeploymentError::InvalidConfig(
                "hub identity must differ from the deployer".into(),
            ));
        }
        if self.hub == self.ledger {
            return Err(DeploymentError::InvalidConfig(
                "hub identity must differ from the ledger identity".into(),
            ));
        }
        if self.test_balances.iter().any(|(addr, _)| addr == &self.hub) {
            return Err(DeploymentError::InvalidConfig(
                "test balances must not target the hub; use initial_pool".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// A ledger and the hub bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub ledger: TokenLedger,
    pub hub: KnowledgeHub,
}

impl Deployment {
    /// Creates the ledger, binds a hub to it, mints the reward pool into the
    /// hub and mints any test balances.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::InvalidConfig`] for conflicting identities
    /// and [`DeploymentError::Ledger`] if a mint overflows.
    pub fn bootstrap(config: &BootstrapConfig) -> Result<Self, DeploymentError> {
        config.validate()?;

        let mut ledger = TokenLedger::new(config.ledger.clone(), config.deployer.clone());
        let hub = KnowledgeHub::new(config.hub.clone(), &ledger);

        if config.initial_pool > 0 {
            ledger.mint(&config.deployer, hub.address(), config.initial_pool)?;
        }
        for (account, amount) in &config.test_balances {
            ledger.mint(&config.deployer, account, *amount)?;
        }

        info!(
            hub = %hub.address(),
            ledger = %ledger.address(),
            owner = %config.deployer,
            pool = %format_units(config.initial_pool),
            test_accounts = config.test_balances.len(),
            "deployment bootstrapped"
        );

        Ok(Self { ledger, hub })
    }

    /// Submits an entry on behalf of `caller`.
    pub fn submit_entry(
        &mut self,
        caller: &Address,
        title: &str,
        content_ref: &str,
    ) -> Result<EntryId, HubError> {
        self.hub.submit_entry(caller, title, content_ref)
    }

    /// Casts `caller`'s vote, paying the reward from the bound ledger.
    pub fn vote_on_entry(
        &mut self,
        caller: &Address,
        entry_id: EntryId,
        is_upvote: bool,
    ) -> Result<(), HubError> {
        self.hub
            .vote_on_entry(&mut self.ledger, caller, entry_id, is_upvote)
    }

    /// The hub's remaining reward pool.
    pub fn pool_balance(&self) -> u128 {
        self.hub.get_contract_token_balance(&self.ledger)
    }

    /// Takes all pending notifications, hub events first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .hub
            .drain_events()
            .into_iter()
            .map(Event::from)
            .collect();
        events.extend(self.ledger.drain_events().into_iter().map(Event::from));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LedgerEvent;

    #[test]
    fn default_bootstrap_funds_the_pool() {
        let deployment = Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
        assert_eq!(deployment.pool_balance(), 10_000 * ONE_TOKEN);
        assert_eq!(deployment.ledger.total_supply(), 10_000 * ONE_TOKEN);
        assert_eq!(deployment.hub.ledger_address(), deployment.ledger.address());
        assert_eq!(
            deployment.ledger.owner(),
            &Address::derive(DEFAULT_DEPLOYER_LABEL)
        );
    }

    #[test]
    fn rejects_hub_equal_to_deployer() {
        let config = BootstrapConfig {
            hub: Address::derive(DEFAULT_DEPLOYER_LABEL),
            ..BootstrapConfig::default()
        };
        assert!(matches!(
            Deployment::bootstrap(&config),
            Err(DeploymentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_balances_are_minted() {
        let alice = Address::derive("alice");
        let config = BootstrapConfig {
            test_balances: vec![(alice.clone(), 5 * ONE_TOKEN)],
            ..BootstrapConfig::default()
        };
        let deployment = Deployment::bootstrap(&config).unwrap();
        assert_eq!(deployment.ledger.balance_of(&alice), 5 * ONE_TOKEN);
        assert!(deployment.ledger.is_consistent());
    }

    #[test]
    fn overflowing_mint_is_reported() {
        let config = BootstrapConfig {
            initial_pool: u128::MAX,
            test_balances: vec![(Address::derive("alice"), 1)],
            ..BootstrapConfig::default()
        };
        assert!(matches!(
            Deployment::bootstrap(&config),
            Err(DeploymentError::Ledger(LedgerError::Overflow { .. }))
        ));
    }

    #[test]
    fn drain_puts_hub_events_first() {
        let mut deployment = Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
        deployment.drain_events();

        let (alice, bob) = (Address::derive("alice"), Address::derive("bob"));
        let id = deployment.submit_entry(&alice, "t", "r").unwrap();
        deployment.vote_on_entry(&bob, id, true).unwrap();

        let events = deployment.drain_events();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Event::Hub(_)));
        assert!(matches!(events[2], Event::Hub(_)));
        assert_eq!(
            events[3],
            Event::Ledger(LedgerEvent::Transfer {
                from: Some(deployment.hub.address().clone()),
                to: Some(alice),
                amount: knowhub_protocol::config::UPVOTE_REWARD,
            })
        );
        assert!(deployment.drain_events().is_empty());
    }
}
