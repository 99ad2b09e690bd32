//! CareCoop Core - collaborator seams the governance engine depends on.
//!
//! The engine does not own time, balances or authentication. It consumes:
//! - a [`Clock`] supplying the current block height
//! - a [`BalanceOracle`] exposing `balance_of(account)`
//! - a [`CallContext`] naming the already-authenticated caller

pub mod balances;
pub mod clock;
pub mod context;

pub use balances::{BalanceOracle, TokenBalances};
pub use clock::{Clock, ManualClock};
pub use context::CallContext;
