//! Error types for the Binary Outcome Market Program

use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

/// Errors that may be returned by the Binary Outcome Market Program
#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum MarketError {
    // === General Errors (0-99) ===

    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Invalid account data")]
    InvalidAccountData = 1,

    #[error("Account not initialized")]
    AccountNotInitialized = 2,

    #[error("Already initialized")]
    AlreadyInitialized = 3,

    #[error("Invalid signer")]
    InvalidSigner = 5,

    #[error("Unauthorized")]
    Unauthorized = 6,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 7,

    #[error("Insufficient funds")]
    InsufficientFunds = 8,

    #[error("Invalid PDA")]
    InvalidPDA = 10,

    #[error("Invalid amount")]
    InvalidAmount = 11,

    #[error("Invalid collateral mint")]
    InvalidCollateralMint = 13,

    // === Market Errors (100-199) ===

    #[error("Invalid resolution window")]
    InvalidWindow = 100,

    #[error("Invalid subsidy")]
    InvalidSubsidy = 101,

    #[error("Market already resolved")]
    MarketResolved = 102,

    #[error("Trading closed")]
    TradingClosed = 103,

    #[error("Resolution window not open yet")]
    TooEarly = 104,

    #[error("Market already resolved, outcome is final")]
    AlreadyResolved = 105,

    #[error("Market not resolved")]
    MarketNotResolved = 106,

    #[error("Invalid market vault")]
    InvalidMarketVault = 116,

    #[error("Invalid outcome")]
    InvalidOutcome = 120,

    // === Position Errors (300-399) ===

    #[error("Nothing to redeem")]
    NothingToRedeem = 300,

    #[error("Subsidy already reclaimed")]
    SubsidyAlreadyReclaimed = 301,

    // === Oracle Errors (500-599) ===

    #[error("Stale oracle data")]
    StaleOracleData = 500,

    #[error("Unknown price feed")]
    UnknownFeed = 501,

    #[error("Invalid oracle account")]
    InvalidOracleAccount = 502,

    #[error("Invalid oracle price")]
    InvalidOraclePrice = 503,

    // === Custody Errors (600-699) ===

    #[error("Invalid token account")]
    InvalidTokenAccount = 601,

    #[error("Insufficient custody balance")]
    InsufficientCustodyBalance = 606,
}

impl From<MarketError> for ProgramError {
    fn from(e: MarketError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for MarketError {
    fn type_of() -> &'static str {
        "MarketError"
    }
}

impl PrintProgramError for MarketError {
    fn print<E>(&self)
    where
        E: 'static
            + std::error::Error
            + DecodeError<E>
            + PrintProgramError
            + num_traits::FromPrimitive,
    {
        msg!("Error: {}", self);
    }
}

impl MarketError {
    /// Map a raw `ProgramError` back to a market error, if it is one of ours
    pub fn from_program_error(err: &ProgramError) -> Option<Self> {
        match err {
            ProgramError::Custom(code) => num_traits::FromPrimitive::from_u32(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ProgramError::from(MarketError::InvalidWindow), ProgramError::Custom(100));
        assert_eq!(ProgramError::from(MarketError::AlreadyResolved), ProgramError::Custom(105));
        assert_eq!(ProgramError::from(MarketError::StaleOracleData), ProgramError::Custom(500));
        assert_eq!(
            ProgramError::from(MarketError::InsufficientCustodyBalance),
            ProgramError::Custom(606)
        );
    }

    #[test]
    fn test_round_trip_through_program_error() {
        let err: ProgramError = MarketError::NothingToRedeem.into();
        assert_eq!(
            MarketError::from_program_error(&err),
            Some(MarketError::NothingToRedeem)
        );
        assert_eq!(MarketError::from_program_error(&ProgramError::InvalidArgument), None);
        assert_eq!(MarketError::from_program_error(&ProgramError::Custom(9999)), None);
    }
}
