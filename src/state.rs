//! State definitions for the Binary Outcome Market Program
//!
//! All account structures used by the program, plus the accounting rules
//! that keep them consistent. Nothing in here touches an `AccountInfo`;
//! the processor loads, mutates and stores these records.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::MarketError;

// ============================================================================
// Discriminators
// ============================================================================

pub const REGISTRY_DISCRIMINATOR: u64 = 0x5245474953545259; // "REGISTRY"
pub const MARKET_DISCRIMINATOR: u64 = 0x4D41524B45545F5F; // "MARKET__"
pub const OUTCOME_ACCOUNT_DISCRIMINATOR: u64 = 0x4F5554434F4D455F; // "OUTCOME_"

// ============================================================================
// PDA Seeds
// ============================================================================

pub const REGISTRY_SEED: &[u8] = b"registry";
pub const MARKET_SEED: &[u8] = b"market";
pub const MARKET_VAULT_SEED: &[u8] = b"market_vault";
pub const OUTCOME_SEED: &[u8] = b"outcome";

// ============================================================================
// Constants
// ============================================================================

/// Fixed-point precision for prices (1.0 = 1_000_000)
pub const PRICE_PRECISION: u64 = 1_000_000;

/// Default oracle freshness tolerance (seconds)
pub const DEFAULT_MAX_STALENESS_SECS: u64 = 60;

// ============================================================================
// Enums
// ============================================================================

/// The two mutually exclusive outcomes of a market.
///
/// Outcome 0 wins when the oracle value is at or above the reference price,
/// outcome 1 wins when it is strictly below.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Outcome 0: oracle value >= reference price
    AtOrAbove = 0,
    /// Outcome 1: oracle value < reference price
    Below = 1,
}

impl Outcome {
    pub fn from_index(index: u8) -> Result<Self, MarketError> {
        match index {
            0 => Ok(Outcome::AtOrAbove),
            1 => Ok(Outcome::Below),
            _ => Err(MarketError::InvalidOutcome),
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Decision rule: ties go to outcome 0
    pub fn from_observation(value: u64, reference_price: u64) -> Self {
        if value >= reference_price {
            Outcome::AtOrAbove
        } else {
            Outcome::Below
        }
    }
}

// ============================================================================
// Account Structures
// ============================================================================

/// Program-wide registry and configuration
///
/// PDA Seeds: ["registry"]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Registry {
    /// Account discriminator
    pub discriminator: u64,

    /// Account that initialized the registry
    pub authority: Pubkey,

    /// Mint every market is denominated in
    pub collateral_mint: Pubkey,

    /// Program that must own oracle price accounts
    pub oracle_program: Pubkey,

    /// Maximum accepted age of an oracle reading (seconds)
    pub max_staleness_secs: u64,

    /// Sequence number handed to the next market
    pub market_counter: u64,

    /// PDA bump
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl Registry {
    pub const SIZE: usize = 8   // discriminator
        + 32  // authority
        + 32  // collateral_mint
        + 32  // oracle_program
        + 8   // max_staleness_secs
        + 8   // market_counter
        + 1   // bump
        + 32; // reserved

    pub fn new(
        authority: Pubkey,
        collateral_mint: Pubkey,
        oracle_program: Pubkey,
        max_staleness_secs: u64,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: REGISTRY_DISCRIMINATOR,
            authority,
            collateral_mint,
            oracle_program,
            max_staleness_secs,
            market_counter: 0,
            bump,
            reserved: [0u8; 32],
        }
    }

    /// Hand out the current sequence number and advance the counter.
    pub fn next_sequence(&mut self) -> Result<u64, MarketError> {
        let id = self.market_counter;
        self.market_counter = id.checked_add(1).ok_or(MarketError::ArithmeticOverflow)?;
        Ok(id)
    }
}

/// Creation parameters for a market
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarketParams {
    /// Strike value (e6)
    pub reference_price: u64,
    /// Oracle series identifier
    pub price_feed_id: [u8; 32],
    /// Resolution window start (unix seconds)
    pub resolve_from: i64,
    /// Resolution window end (unix seconds)
    pub resolve_to: i64,
    /// Creator's liquidity subsidy (collateral base units)
    pub subsidy_amount: u64,
}

impl MarketParams {
    /// Checks that do not depend on the creator's balance
    pub fn validate(&self, now: i64) -> Result<(), MarketError> {
        if self.resolve_from >= self.resolve_to {
            return Err(MarketError::InvalidWindow);
        }
        if self.resolve_from <= now {
            return Err(MarketError::InvalidWindow);
        }
        if self.subsidy_amount == 0 {
            return Err(MarketError::InvalidSubsidy);
        }
        Ok(())
    }
}

/// A single binary market
///
/// PDA Seeds: ["market", market_id.to_le_bytes()]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Market {
    /// Account discriminator
    pub discriminator: u64,

    /// Sequence number from the registry
    pub market_id: u64,

    /// Market creator
    pub creator: Pubkey,

    /// Strike value (e6)
    pub reference_price: u64,

    /// Oracle series identifier
    pub price_feed_id: [u8; 32],

    /// Resolution window (unix seconds)
    pub resolve_from: i64,
    pub resolve_to: i64,

    /// Creator's liquidity subsidy
    pub subsidy_amount: u64,

    /// Collateral currently held in custody for this market
    pub current_balance: u64,

    /// Outstanding shares per outcome (subsidy included)
    pub num_outcome0: u64,
    pub num_outcome1: u64,

    /// Winning-side shares already paid out
    pub winning_shares_redeemed: u64,

    pub is_resolved: bool,

    /// Committed outcome, set exactly once
    pub outcome: Option<Outcome>,

    /// Oracle value used for resolution (e6)
    pub resolved_price: u64,

    /// Resolution timestamp
    pub resolved_at: i64,

    /// Has the creator redeemed the subsidy's winning shares?
    pub subsidy_reclaimed: bool,

    /// Creation timestamp
    pub created_at: i64,

    /// Collateral vault (SPL token account owned by the market PDA)
    pub market_vault: Pubkey,

    /// PDA bumps
    pub bump: u8,
    pub vault_bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl Market {
    pub const SIZE: usize = 8   // discriminator
        + 8   // market_id
        + 32  // creator
        + 8   // reference_price
        + 32  // price_feed_id
        + 8   // resolve_from
        + 8   // resolve_to
        + 8   // subsidy_amount
        + 8   // current_balance
        + 8   // num_outcome0
        + 8   // num_outcome1
        + 8   // winning_shares_redeemed
        + 1   // is_resolved
        + 1 + 1 // outcome (Option<Outcome>)
        + 8   // resolved_price
        + 8   // resolved_at
        + 1   // subsidy_reclaimed
        + 8   // created_at
        + 32  // market_vault
        + 1   // bump
        + 1   // vault_bump
        + 32; // reserved

    /// Fresh market: both sides seeded with the subsidy, prices at 0.5
    pub fn new(market_id: u64, creator: Pubkey, params: &MarketParams, created_at: i64) -> Self {
        Self {
            discriminator: MARKET_DISCRIMINATOR,
            market_id,
            creator,
            reference_price: params.reference_price,
            price_feed_id: params.price_feed_id,
            resolve_from: params.resolve_from,
            resolve_to: params.resolve_to,
            subsidy_amount: params.subsidy_amount,
            current_balance: params.subsidy_amount,
            num_outcome0: params.subsidy_amount,
            num_outcome1: params.subsidy_amount,
            winning_shares_redeemed: 0,
            is_resolved: false,
            outcome: None,
            resolved_price: 0,
            resolved_at: 0,
            subsidy_reclaimed: false,
            created_at,
            market_vault: Pubkey::default(),
            bump: 0,
            vault_bump: 0,
            reserved: [0u8; 32],
        }
    }

    pub fn shares(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::AtOrAbove => self.num_outcome0,
            Outcome::Below => self.num_outcome1,
        }
    }

    /// Derived price of an outcome (e6).
    ///
    /// Outcome 1 is the complement of outcome 0 so the pair always sums to
    /// exactly `PRICE_PRECISION`.
    pub fn price_outcome(&self, outcome: Outcome) -> u64 {
        let total = self.num_outcome0 as u128 + self.num_outcome1 as u128;
        let price0 = if total == 0 {
            PRICE_PRECISION / 2
        } else {
            (self.num_outcome0 as u128 * PRICE_PRECISION as u128 / total) as u64
        };
        match outcome {
            Outcome::AtOrAbove => price0,
            Outcome::Below => PRICE_PRECISION - price0,
        }
    }

    pub fn price_outcome0(&self) -> u64 {
        self.price_outcome(Outcome::AtOrAbove)
    }

    pub fn price_outcome1(&self) -> u64 {
        self.price_outcome(Outcome::Below)
    }

    /// Check if purchases are accepted at `current_time`
    pub fn is_tradeable(&self, current_time: i64) -> bool {
        !self.is_resolved && current_time < self.resolve_to
    }

    pub fn check_tradeable(&self, current_time: i64) -> Result<(), MarketError> {
        if self.is_resolved {
            return Err(MarketError::MarketResolved);
        }
        if current_time >= self.resolve_to {
            return Err(MarketError::TradingClosed);
        }
        Ok(())
    }

    pub fn check_resolvable(&self, current_time: i64) -> Result<(), MarketError> {
        if self.is_resolved {
            return Err(MarketError::AlreadyResolved);
        }
        if current_time < self.resolve_from {
            return Err(MarketError::TooEarly);
        }
        Ok(())
    }

    /// Book `amount` of collateral as `amount` new shares of `outcome`.
    pub fn record_purchase(&mut self, outcome: Outcome, amount: u64) -> Result<(), MarketError> {
        if amount == 0 {
            return Err(MarketError::InvalidAmount);
        }
        let balance = self
            .current_balance
            .checked_add(amount)
            .ok_or(MarketError::ArithmeticOverflow)?;
        let shares = self
            .shares(outcome)
            .checked_add(amount)
            .ok_or(MarketError::ArithmeticOverflow)?;

        self.current_balance = balance;
        match outcome {
            Outcome::AtOrAbove => self.num_outcome0 = shares,
            Outcome::Below => self.num_outcome1 = shares,
        }
        Ok(())
    }

    /// Commit the outcome implied by an oracle value. Terminal.
    pub fn commit_resolution(
        &mut self,
        oracle_value: u64,
        current_time: i64,
    ) -> Result<Outcome, MarketError> {
        self.check_resolvable(current_time)?;
        let outcome = Outcome::from_observation(oracle_value, self.reference_price);
        self.outcome = Some(outcome);
        self.is_resolved = true;
        self.resolved_price = oracle_value;
        self.resolved_at = current_time;
        Ok(outcome)
    }

    pub fn winning_outcome(&self) -> Result<Outcome, MarketError> {
        match (self.is_resolved, self.outcome) {
            (true, Some(outcome)) => Ok(outcome),
            _ => Err(MarketError::MarketNotResolved),
        }
    }

    /// Winning shares not yet paid out (holders plus unreclaimed subsidy)
    pub fn winning_shares_outstanding(&self) -> Result<u64, MarketError> {
        let outcome = self.winning_outcome()?;
        self.shares(outcome)
            .checked_sub(self.winning_shares_redeemed)
            .ok_or(MarketError::ArithmeticOverflow)
    }

    /// Pro-rata payout for `shares` winning shares: floor(shares * balance / outstanding)
    pub fn compute_payout(&self, shares: u64) -> Result<u64, MarketError> {
        let outstanding = self.winning_shares_outstanding()?;
        if shares == 0 {
            return Err(MarketError::NothingToRedeem);
        }
        if shares > outstanding {
            return Err(MarketError::ArithmeticOverflow);
        }
        let payout = (shares as u128)
            .checked_mul(self.current_balance as u128)
            .ok_or(MarketError::ArithmeticOverflow)?
            / outstanding as u128;
        u64::try_from(payout).map_err(|_| MarketError::ArithmeticOverflow)
    }

    /// Book a payout of `payout` collateral for `shares` winning shares.
    pub fn record_payout(&mut self, shares: u64, payout: u64) -> Result<(), MarketError> {
        let balance = self
            .current_balance
            .checked_sub(payout)
            .ok_or(MarketError::InsufficientCustodyBalance)?;
        let redeemed = self
            .winning_shares_redeemed
            .checked_add(shares)
            .ok_or(MarketError::ArithmeticOverflow)?;
        if redeemed > self.shares(self.winning_outcome()?) {
            return Err(MarketError::ArithmeticOverflow);
        }
        self.current_balance = balance;
        self.winning_shares_redeemed = redeemed;
        Ok(())
    }
}

/// A holder's shares in one market
///
/// PDA Seeds: ["outcome", market_id.to_le_bytes(), holder]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct OutcomeAccount {
    /// Account discriminator
    pub discriminator: u64,

    /// Market ID
    pub market_id: u64,

    /// Share holder
    pub holder: Pubkey,

    /// Shares of outcome 0
    pub amount0: u64,

    /// Shares of outcome 1
    pub amount1: u64,

    /// Collateral paid out to this holder so far
    pub total_redeemed: u64,

    /// Creation timestamp
    pub created_at: i64,

    /// Last update timestamp
    pub updated_at: i64,

    /// PDA bump
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 16],
}

impl OutcomeAccount {
    pub const SIZE: usize = 8   // discriminator
        + 8   // market_id
        + 32  // holder
        + 8   // amount0
        + 8   // amount1
        + 8   // total_redeemed
        + 8   // created_at
        + 8   // updated_at
        + 1   // bump
        + 16; // reserved

    pub fn new(market_id: u64, holder: Pubkey, bump: u8, created_at: i64) -> Self {
        Self {
            discriminator: OUTCOME_ACCOUNT_DISCRIMINATOR,
            market_id,
            holder,
            amount0: 0,
            amount1: 0,
            total_redeemed: 0,
            created_at,
            updated_at: created_at,
            bump,
            reserved: [0u8; 16],
        }
    }

    pub fn amount(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::AtOrAbove => self.amount0,
            Outcome::Below => self.amount1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount0 == 0 && self.amount1 == 0
    }

    /// Credit freshly bought shares
    pub fn credit(&mut self, outcome: Outcome, amount: u64, current_time: i64) -> Result<(), MarketError> {
        let updated = self
            .amount(outcome)
            .checked_add(amount)
            .ok_or(MarketError::ArithmeticOverflow)?;
        match outcome {
            Outcome::AtOrAbove => self.amount0 = updated,
            Outcome::Below => self.amount1 = updated,
        }
        self.updated_at = current_time;
        Ok(())
    }

    /// Zero the winning side after it has been paid out. The losing side is left as is.
    pub fn settle_winning(&mut self, outcome: Outcome, payout: u64, current_time: i64) -> Result<(), MarketError> {
        if self.amount(outcome) == 0 {
            return Err(MarketError::NothingToRedeem);
        }
        match outcome {
            Outcome::AtOrAbove => self.amount0 = 0,
            Outcome::Below => self.amount1 = 0,
        }
        self.total_redeemed = self
            .total_redeemed
            .checked_add(payout)
            .ok_or(MarketError::ArithmeticOverflow)?;
        self.updated_at = current_time;
        Ok(())
    }
}

// ============================================================================
// PDA helpers
// ============================================================================

pub fn find_registry_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REGISTRY_SEED], program_id)
}

pub fn find_market_address(program_id: &Pubkey, market_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MARKET_SEED, &market_id.to_le_bytes()], program_id)
}

pub fn find_market_vault_address(program_id: &Pubkey, market_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MARKET_VAULT_SEED, &market_id.to_le_bytes()], program_id)
}

pub fn find_outcome_account_address(
    program_id: &Pubkey,
    market_id: u64,
    holder: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[OUTCOME_SEED, &market_id.to_le_bytes(), holder.as_ref()],
        program_id,
    )
}

// ============================================================================
// Tests
// ============================================================================
