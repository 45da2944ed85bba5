//! Binary Outcome Market Program
//!
//! A two-outcome prediction market on Solana, resolved from a Pyth price feed.
//!
//! ## Lifecycle
//!
//! - A creator opens a market on a price feed with a reference price and a
//!   resolution window, seeding both outcomes with a collateral subsidy
//! - Anyone buys shares of either outcome at 1 collateral unit per share;
//!   prices follow the share ratio and always sum to 1.0
//! - After the window opens, anyone resolves the market from a single fresh
//!   oracle reading: outcome 0 if the value is at or above the reference,
//!   outcome 1 otherwise
//! - Winning holders redeem pro rata from the pool; the creator reclaims the
//!   subsidy's winning share
//!
//! Collateral sits in a per-market SPL token vault owned by the market PDA.

pub mod cpi;
pub mod custody;
pub mod error;
pub mod instruction;
pub mod lifecycle;
pub mod oracle;
pub mod processor;
pub mod state;
pub mod utils;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

// Re-export commonly used items
pub use error::MarketError;
pub use instruction::MarketInstruction;
pub use state::*;

solana_program::declare_id!("BMkt1111111111111111111111111111111111111111");
