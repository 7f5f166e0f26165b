//! # Protocol Configuration & Constants
//!
//! Every magic number in the Knowledge Hub lives here. The engine, the
//! bootstrap routine and the node all read from this module, so a value
//! changed here changes everywhere at once.
//!
//! Changing the token precision or the upvote reward after a deployment has
//! been funded rewrites the economics of every entry already on the ledger.
//! Don't.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version of the ledger and hub semantics. Bumped when the meaning of a
/// persisted snapshot changes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Snapshot format version written next to every persisted deployment.
/// A node refuses to load a snapshot carrying a different value.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Token Parameters
// ---------------------------------------------------------------------------

/// Human-readable name of the reward token.
pub const TOKEN_NAME: &str = "Knowledge Hub Token";

/// Ticker symbol of the reward token.
pub const TOKEN_SYMBOL: &str = "KHT";

/// Fractional digits of the token. Balances are always stored in the
/// smallest unit, so one whole token is `10^18` units.
pub const TOKEN_DECIMALS: u8 = 18;

/// One whole token expressed in the smallest unit.
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Upvote reward in whole tokens.
pub const UPVOTE_REWARD_TOKENS: u128 = 10;

/// Amount paid from the reward pool to an entry's creator per upvote,
/// in the smallest unit.
pub const UPVOTE_REWARD: u128 = UPVOTE_REWARD_TOKENS * ONE_TOKEN;

/// Reward pool minted into the hub by a default bootstrap, in whole tokens.
/// Enough for a thousand upvotes.
pub const DEFAULT_REWARD_POOL_TOKENS: u128 = 10_000;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Prefix of addresses produced by [`Address::derive`](crate::identity::Address::derive).
pub const DERIVED_ADDRESS_PREFIX: &str = "kh1";

/// Number of hex characters of the BLAKE3 digest kept in a derived address.
/// 40 hex chars = 160 bits, plenty for development identities.
pub const DERIVED_ADDRESS_HEX_LEN: usize = 40;

/// Upper bound on the byte length of any caller identity.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Label the default bootstrap derives the ledger owner from.
pub const DEFAULT_DEPLOYER_LABEL: &str = "deployer";

/// Label the default bootstrap derives the hub's own identity from.
pub const DEFAULT_HUB_LABEL: &str = "knowledge-hub";

/// Label the default bootstrap derives the token ledger's identity from.
pub const DEFAULT_LEDGER_LABEL: &str = "knowhub-token";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default port for the REST + WebSocket API.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Capacity of the broadcast channel feeding WebSocket subscribers.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default page size for entry listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Hard cap on the page size a client may request.
pub const MAX_PAGE_SIZE: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_token_matches_decimals() {
        assert_eq!(ONE_TOKEN, 10u128.pow(TOKEN_DECIMALS as u32));
    }

    #[test]
    fn upvote_reward_is_ten_tokens() {
        assert_eq!(UPVOTE_REWARD, 10_000_000_000_000_000_000);
    }

    #[test]
    fn page_defaults_are_consistent() {
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
    }
}
