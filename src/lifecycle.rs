//! Market lifecycle
//!
//! `Created -> (purchases) -> Resolved -> (redemptions)`
//!
//! Each transition validates against a staged copy of the records, performs
//! the custody transfer, and only then writes the staged copy back. A failed
//! precondition or transfer leaves the caller's records untouched.

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::custody::CollateralCustody;
use crate::error::MarketError;
use crate::oracle::OracleFeed;
use crate::state::{Market, MarketParams, Outcome, OutcomeAccount, Registry};

/// Allocate a market at the next registry sequence number and escrow the subsidy.
pub fn create_market<C: CollateralCustody + ?Sized>(
    registry: &mut Registry,
    custody: &mut C,
    creator: &Pubkey,
    params: &MarketParams,
    now: i64,
) -> Result<Market, ProgramError> {
    params.validate(now)?;

    let mut next_registry = registry.clone();
    let market_id = next_registry.next_sequence()?;
    let market = Market::new(market_id, *creator, params, now);

    custody
        .deposit(market_id, creator, params.subsidy_amount)
        .map_err(|err| match MarketError::from_program_error(&err) {
            Some(MarketError::InsufficientFunds) => MarketError::InvalidSubsidy.into(),
            _ => err,
        })?;

    *registry = next_registry;
    Ok(market)
}

/// Buy `amount` shares of `outcome` for `amount` collateral.
pub fn buy_outcome<C: CollateralCustody + ?Sized>(
    market: &mut Market,
    position: &mut OutcomeAccount,
    custody: &mut C,
    outcome: Outcome,
    amount: u64,
    now: i64,
) -> Result<(), ProgramError> {
    market.check_tradeable(now)?;
    if position.market_id != market.market_id {
        return Err(MarketError::InvalidAccountData.into());
    }

    let mut next_market = market.clone();
    let mut next_position = position.clone();
    next_market.record_purchase(outcome, amount)?;
    next_position.credit(outcome, amount, now)?;

    custody.deposit(market.market_id, &position.holder, amount)?;

    *market = next_market;
    *position = next_position;
    Ok(())
}

/// Commit the outcome from a single oracle reading.
pub fn resolve_market<O: OracleFeed + ?Sized>(
    market: &mut Market,
    oracle: &O,
    max_staleness_secs: u64,
    now: i64,
) -> Result<Outcome, ProgramError> {
    market.check_resolvable(now)?;

    // Freshness is measured at the window close once it has passed
    let observed_at = now.min(market.resolve_to);
    let reading = oracle.read(&market.price_feed_id, max_staleness_secs, observed_at)?;
    if reading.publish_time < market.resolve_from || reading.publish_time > market.resolve_to {
        msg!(
            "Error: reading published at {} outside the window {} - {}",
            reading.publish_time,
            market.resolve_from,
            market.resolve_to
        );
        return Err(MarketError::StaleOracleData.into());
    }

    let outcome = market.commit_resolution(reading.price, now)?;
    msg!(
        "Market {} resolved: value {} vs reference {} -> outcome {}",
        market.market_id,
        reading.price,
        market.reference_price,
        outcome.index()
    );
    Ok(outcome)
}

/// Pay a holder's winning shares out of the pool. Returns the payout.
pub fn redeem_outcome<C: CollateralCustody + ?Sized>(
    market: &mut Market,
    position: &mut OutcomeAccount,
    custody: &mut C,
    now: i64,
) -> Result<u64, ProgramError> {
    let outcome = market.winning_outcome()?;
    if position.market_id != market.market_id {
        return Err(MarketError::InvalidAccountData.into());
    }

    let shares = position.amount(outcome);
    if shares == 0 {
        return Err(MarketError::NothingToRedeem.into());
    }
    let payout = market.compute_payout(shares)?;

    let mut next_market = market.clone();
    let mut next_position = position.clone();
    next_market.record_payout(shares, payout)?;
    next_position.settle_winning(outcome, payout, now)?;

    if payout > 0 {
        custody.withdraw(market.market_id, &position.holder, payout)?;
    }
    msg!("Redeemed {} shares of outcome {} for {}", shares, outcome.index(), payout);

    *market = next_market;
    *position = next_position;
    Ok(payout)
}

/// Pay the creator for the winning side of the subsidy. Once per market.
pub fn reclaim_subsidy<C: CollateralCustody + ?Sized>(
    market: &mut Market,
    custody: &mut C,
    caller: &Pubkey,
) -> Result<u64, ProgramError> {
    if *caller != market.creator {
        return Err(MarketError::Unauthorized.into());
    }
    market.winning_outcome()?;
    if market.subsidy_reclaimed {
        return Err(MarketError::SubsidyAlreadyReclaimed.into());
    }

    let shares = market.subsidy_amount;
    let payout = market.compute_payout(shares)?;

    let mut next_market = market.clone();
    next_market.record_payout(shares, payout)?;
    next_market.subsidy_reclaimed = true;

    if payout > 0 {
        custody.withdraw(market.market_id, caller, payout)?;
    }

    *market = next_market;
    Ok(payout)
}
