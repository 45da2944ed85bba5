//! Collateral custody
//!
//! The market never moves tokens itself; it asks a [`CollateralCustody`] to
//! pull collateral into a market's escrow or release it back out. On chain
//! the escrow is the market's vault token account, see [`TokenVaultCustody`].

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program_pack::Pack,
    pubkey::Pubkey,
};
use spl_token::state::Account as TokenAccount;

use crate::cpi::{cpi_token_transfer, cpi_token_transfer_user};
use crate::error::MarketError;
use crate::utils::check_owner;

/// Escrow holding the collateral of each market
pub trait CollateralCustody {
    /// Move `amount` from `from` into the escrow of `market_id`.
    ///
    /// Fails with `InsufficientFunds` when `from` cannot cover `amount`.
    fn deposit(&mut self, market_id: u64, from: &Pubkey, amount: u64) -> ProgramResult;

    /// Release `amount` from the escrow of `market_id` to `to`.
    ///
    /// Fails with `InsufficientCustodyBalance` when the escrow holds less.
    fn withdraw(&mut self, market_id: u64, to: &Pubkey, amount: u64) -> ProgramResult;
}

/// SPL token vault owned by the market PDA.
///
/// `user_token` is the counterparty's token account: the source of a deposit
/// (authorized by `user`, who must sign the transaction) or the destination
/// of a withdrawal.
pub struct TokenVaultCustody<'a, 'info> {
    pub market_id: u64,
    pub token_program: &'a AccountInfo<'info>,
    pub vault: &'a AccountInfo<'info>,
    pub market: &'a AccountInfo<'info>,
    pub user: &'a AccountInfo<'info>,
    pub user_token: &'a AccountInfo<'info>,
    pub market_seeds: &'a [&'a [u8]],
}

impl<'a, 'info> TokenVaultCustody<'a, 'info> {
    fn check_market(&self, market_id: u64) -> ProgramResult {
        if market_id != self.market_id {
            msg!("Error: custody bound to market {}, asked for {}", self.market_id, market_id);
            return Err(MarketError::InvalidMarketVault.into());
        }
        Ok(())
    }

    fn load_vault(&self) -> Result<TokenAccount, solana_program::program_error::ProgramError> {
        check_owner(self.vault, self.token_program.key)?;
        let vault = TokenAccount::unpack(&self.vault.data.borrow())?;
        if vault.owner != *self.market.key {
            msg!("Error: vault {} is not owned by market {}", self.vault.key, self.market.key);
            return Err(MarketError::InvalidMarketVault.into());
        }
        Ok(vault)
    }

    /// Load the counterparty token account and check it matches the vault mint and `wallet`
    fn load_user_token(
        &self,
        vault: &TokenAccount,
        wallet: &Pubkey,
    ) -> Result<TokenAccount, solana_program::program_error::ProgramError> {
        check_owner(self.user_token, self.token_program.key)?;
        let account = TokenAccount::unpack(&self.user_token.data.borrow())?;
        if account.mint != vault.mint {
            msg!("Error: token account mint {} does not match collateral {}", account.mint, vault.mint);
            return Err(MarketError::InvalidCollateralMint.into());
        }
        if account.owner != *wallet {
            msg!("Error: token account {} is not owned by {}", self.user_token.key, wallet);
            return Err(MarketError::InvalidTokenAccount.into());
        }
        Ok(account)
    }
}

impl<'a, 'info> CollateralCustody for TokenVaultCustody<'a, 'info> {
    fn deposit(&mut self, market_id: u64, from: &Pubkey, amount: u64) -> ProgramResult {
        self.check_market(market_id)?;
        if from != self.user.key || !self.user.is_signer {
            return Err(MarketError::InvalidSigner.into());
        }
        let vault = self.load_vault()?;
        let source = self.load_user_token(&vault, from)?;
        if source.amount < amount {
            msg!("Error: insufficient funds: have {}, need {}", source.amount, amount);
            return Err(MarketError::InsufficientFunds.into());
        }

        cpi_token_transfer_user(self.token_program, self.user_token, self.vault, self.user, amount)
    }

    fn withdraw(&mut self, market_id: u64, to: &Pubkey, amount: u64) -> ProgramResult {
        self.check_market(market_id)?;
        let vault = self.load_vault()?;
        self.load_user_token(&vault, to)?;
        if vault.amount < amount {
            msg!("Error: vault holds {}, payout {}", vault.amount, amount);
            return Err(MarketError::InsufficientCustodyBalance.into());
        }

        cpi_token_transfer(
            self.token_program,
            self.vault,
            self.user_token,
            self.market,
            amount,
            self.market_seeds,
        )
    }
}

/// In-memory custody: wallet balances plus one escrow per market.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct InMemoryCustody {
    pub wallets: std::collections::HashMap<Pubkey, u64>,
    pub escrows: std::collections::HashMap<u64, u64>,
}

#[cfg(test)]
impl InMemoryCustody {
    pub fn fund(&mut self, wallet: Pubkey, amount: u64) {
        *self.wallets.entry(wallet).or_default() += amount;
    }

    pub fn wallet(&self, wallet: &Pubkey) -> u64 {
        self.wallets.get(wallet).copied().unwrap_or_default()
    }

    pub fn escrow(&self, market_id: u64) -> u64 {
        self.escrows.get(&market_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
impl CollateralCustody for InMemoryCustody {
    fn deposit(&mut self, market_id: u64, from: &Pubkey, amount: u64) -> ProgramResult {
        let balance = self.wallet(from);
        if balance < amount {
            return Err(MarketError::InsufficientFunds.into());
        }
        self.wallets.insert(*from, balance - amount);
        *self.escrows.entry(market_id).or_default() += amount;
        Ok(())
    }

    fn withdraw(&mut self, market_id: u64, to: &Pubkey, amount: u64) -> ProgramResult {
        let escrow = self.escrow(market_id);
        if escrow < amount {
            return Err(MarketError::InsufficientCustodyBalance.into());
        }
        self.escrows.insert(market_id, escrow - amount);
        self.fund(*to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::program_error::ProgramError;

    #[test]
    fn test_in_memory_custody_moves_collateral() {
        let alice = Pubkey::new_unique();
        let mut custody = InMemoryCustody::default();
        custody.fund(alice, 50);

        custody.deposit(7, &alice, 30).unwrap();
        assert_eq!(custody.wallet(&alice), 20);
        assert_eq!(custody.escrow(7), 30);

        assert_eq!(
            custody.deposit(7, &alice, 21),
            Err(ProgramError::from(MarketError::InsufficientFunds))
        );
        assert_eq!(
            custody.withdraw(7, &alice, 31),
            Err(ProgramError::from(MarketError::InsufficientCustodyBalance))
        );

        custody.withdraw(7, &alice, 30).unwrap();
        assert_eq!(custody.wallet(&alice), 50);
        assert_eq!(custody.escrow(7), 0);
    }
}
