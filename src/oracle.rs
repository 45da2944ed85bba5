//! Oracle feed adapter
//!
//! Resolution asks an [`OracleFeed`] for one point-in-time reading of the
//! market's price series. On chain the feed is a Pyth pull-oracle
//! `PriceUpdateV2` account, decoded by raw layout so the program does not
//! depend on the receiver SDK.
//!
//! PriceUpdateV2 layout (Borsh):
//!   [0..8]   discriminator
//!   [8..40]  write_authority
//!   [40]     verification_level: 0x00 Partial { num_signatures: u8 } | 0x01 Full
//!   [base..] PriceFeedMessage: feed_id(32) price(i64) conf(u64) exponent(i32)
//!            publish_time(i64) prev_publish_time(i64) ema_price(i64) ema_conf(u64)
//!   [...]    posted_slot(u64)

use solana_program::{
    account_info::AccountInfo,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::error::MarketError;
use crate::state::PRICE_PRECISION;

pub const PRICE_UPDATE_V2_LEN: usize = 134;
const DISCRIMINATOR_LEN: usize = 8;
const WRITE_AUTHORITY_LEN: usize = 32;
const VERIFICATION_LEVEL_OFF: usize = DISCRIMINATOR_LEN + WRITE_AUTHORITY_LEN; // 40
const MAX_EXPO_ABS: i32 = 18;

/// One oracle observation, normalised to the program's fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleReading {
    /// Observed value (e6)
    pub price: u64,
    /// When the value was published (unix seconds)
    pub publish_time: i64,
}

/// Point-in-time price source
pub trait OracleFeed {
    /// Read the current value of `feed_id`.
    ///
    /// Fails with `UnknownFeed` if this source does not carry `feed_id` and
    /// with `StaleOracleData` if the value is older than `max_staleness_secs`.
    fn read(
        &self,
        feed_id: &[u8; 32],
        max_staleness_secs: u64,
        now: i64,
    ) -> Result<OracleReading, ProgramError>;
}

/// Decoded price message of a PriceUpdateV2 account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFeedMessage {
    pub feed_id: [u8; 32],
    pub price: i64,
    pub conf: u64,
    pub exponent: i32,
    pub publish_time: i64,
}

fn read_bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], MarketError> {
    data.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(MarketError::InvalidOracleAccount)
}

impl PriceFeedMessage {
    /// Decode from raw PriceUpdateV2 account data
    pub fn parse(data: &[u8]) -> Result<Self, MarketError> {
        if data.len() < PRICE_UPDATE_V2_LEN {
            return Err(MarketError::InvalidOracleAccount);
        }

        let base = match data[VERIFICATION_LEVEL_OFF] {
            0 => VERIFICATION_LEVEL_OFF + 2, // Partial: variant + num_signatures
            1 => VERIFICATION_LEVEL_OFF + 1, // Full: variant only
            _ => return Err(MarketError::InvalidOracleAccount),
        };

        let off_price = base + 32;
        let off_conf = off_price + 8;
        let off_expo = off_conf + 8;
        let off_publish_time = off_expo + 4;

        Ok(Self {
            feed_id: read_bytes::<32>(data, base)?,
            price: i64::from_le_bytes(read_bytes::<8>(data, off_price)?),
            conf: u64::from_le_bytes(read_bytes::<8>(data, off_conf)?),
            exponent: i32::from_le_bytes(read_bytes::<4>(data, off_expo)?),
            publish_time: i64::from_le_bytes(read_bytes::<8>(data, off_publish_time)?),
        })
    }

    /// Encode as a fully verified PriceUpdateV2 account body (EMA fields mirror the spot price)
    pub fn to_price_update_v2(&self, write_authority: &Pubkey, posted_slot: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(PRICE_UPDATE_V2_LEN);
        data.extend_from_slice(&[0u8; DISCRIMINATOR_LEN]);
        data.extend_from_slice(write_authority.as_ref());
        data.push(1); // Full
        data.extend_from_slice(&self.feed_id);
        data.extend_from_slice(&self.price.to_le_bytes());
        data.extend_from_slice(&self.conf.to_le_bytes());
        data.extend_from_slice(&self.exponent.to_le_bytes());
        data.extend_from_slice(&self.publish_time.to_le_bytes());
        data.extend_from_slice(&self.publish_time.to_le_bytes()); // prev_publish_time
        data.extend_from_slice(&self.price.to_le_bytes()); // ema_price
        data.extend_from_slice(&self.conf.to_le_bytes()); // ema_conf
        data.extend_from_slice(&posted_slot.to_le_bytes());
        data.resize(PRICE_UPDATE_V2_LEN, 0);
        data
    }

    /// Price in e6 fixed point
    pub fn price_e6(&self) -> Result<u64, MarketError> {
        normalize_to_e6(self.price, self.exponent)
    }
}

/// Convert `price * 10^exponent` to e6 fixed point (floor)
pub fn normalize_to_e6(price: i64, exponent: i32) -> Result<u64, MarketError> {
    if price <= 0 || exponent.unsigned_abs() > MAX_EXPO_ABS as u32 {
        return Err(MarketError::InvalidOraclePrice);
    }
    let decimals = PRICE_PRECISION.trailing_zeros() as i32; // 6
    let scale = exponent + decimals;
    let price = price as u128;
    let scaled = if scale >= 0 {
        price
            .checked_mul(10u128.pow(scale as u32))
            .ok_or(MarketError::ArithmeticOverflow)?
    } else {
        price / 10u128.pow((-scale) as u32)
    };
    u64::try_from(scaled).map_err(|_| MarketError::ArithmeticOverflow)
}

/// Freshness predicate. Readings from the future are never fresh.
pub fn is_fresh(publish_time: i64, now: i64, max_staleness_secs: u64) -> bool {
    let age = now.saturating_sub(publish_time);
    !(age < 0 || age as u64 > max_staleness_secs)
}

/// A PriceUpdateV2 account owned by the configured oracle program
pub struct PythPriceUpdate<'a, 'info> {
    pub account: &'a AccountInfo<'info>,
    pub oracle_program: &'a Pubkey,
}

impl<'a, 'info> OracleFeed for PythPriceUpdate<'a, 'info> {
    fn read(
        &self,
        feed_id: &[u8; 32],
        max_staleness_secs: u64,
        now: i64,
    ) -> Result<OracleReading, ProgramError> {
        if self.account.owner != self.oracle_program {
            msg!(
                "Error: price account {} owned by {}, expected {}",
                self.account.key,
                self.account.owner,
                self.oracle_program
            );
            return Err(MarketError::InvalidOracleAccount.into());
        }

        let message = PriceFeedMessage::parse(&self.account.try_borrow_data()?)?;
        if &message.feed_id != feed_id {
            msg!("Error: price account {} carries a different feed", self.account.key);
            return Err(MarketError::UnknownFeed.into());
        }
        if !is_fresh(message.publish_time, now, max_staleness_secs) {
            msg!(
                "Error: oracle reading published at {} is stale at {} (max {}s)",
                message.publish_time,
                now,
                max_staleness_secs
            );
            return Err(MarketError::StaleOracleData.into());
        }

        Ok(OracleReading {
            price: message.price_e6()?,
            publish_time: message.publish_time,
        })
    }
}

/// Oracle returning preset readings, applying the same staleness rule
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FixedOracle {
    pub readings: std::collections::HashMap<[u8; 32], OracleReading>,
}

#[cfg(test)]
impl FixedOracle {
    pub fn with(feed_id: [u8; 32], price: u64, publish_time: i64) -> Self {
        let mut oracle = Self::default();
        oracle.readings.insert(feed_id, OracleReading { price, publish_time });
        oracle
    }
}

#[cfg(test)]
impl OracleFeed for FixedOracle {
    fn read(
        &self,
        feed_id: &[u8; 32],
        max_staleness_secs: u64,
        now: i64,
    ) -> Result<OracleReading, ProgramError> {
        let reading = self.readings.get(feed_id).ok_or(MarketError::UnknownFeed)?;
        if !is_fresh(reading.publish_time, now, max_staleness_secs) {
            return Err(MarketError::StaleOracleData.into());
        }
        Ok(*reading)
    }
}
