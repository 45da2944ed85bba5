//! Utility functions for the Binary Outcome Market Program

use borsh::BorshDeserialize;
use solana_program::{
    account_info::AccountInfo,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::error::MarketError;

/// Safely deserialize account data using BorshDeserialize::deserialize
/// This does NOT require the slice to be fully consumed, which is important
/// when the account has padding bytes at the end.
pub fn deserialize_account<T: BorshDeserialize>(data: &[u8]) -> Result<T, ProgramError> {
    T::deserialize(&mut &data[..])
        .map_err(|_| ProgramError::InvalidAccountData)
}

/// Check if a signer is authorized
pub fn check_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        return Err(MarketError::InvalidSigner.into());
    }
    Ok(())
}

/// Check that an account is owned by the expected program
pub fn check_owner(account: &AccountInfo, owner: &Pubkey) -> ProgramResult {
    if account.owner != owner {
        msg!("Owner mismatch for {}: expected {}, got {}", account.key, owner, account.owner);
        return Err(ProgramError::IllegalOwner);
    }
    Ok(())
}

/// Verify PDA derivation
pub fn verify_pda(
    expected: &Pubkey,
    program_id: &Pubkey,
    seeds: &[&[u8]],
) -> Result<u8, ProgramError> {
    let (pda, bump) = Pubkey::find_program_address(seeds, program_id);
    if pda != *expected {
        msg!("PDA mismatch: expected {}, got {}", expected, pda);
        return Err(MarketError::InvalidPDA.into());
    }
    Ok(bump)
}

/// Verify a PDA against its stored bump
pub fn verify_pda_with_bump(
    expected: &Pubkey,
    program_id: &Pubkey,
    seeds: &[&[u8]],
) -> ProgramResult {
    let pda = Pubkey::create_program_address(seeds, program_id)
        .map_err(|_| ProgramError::from(MarketError::InvalidPDA))?;
    if pda != *expected {
        msg!("PDA mismatch: expected {}, got {}", expected, pda);
        return Err(MarketError::InvalidPDA.into());
    }
    Ok(())
}

/// Verify the System Program account
pub fn verify_system_program(account: &AccountInfo) -> ProgramResult {
    if *account.key != solana_program::system_program::ID {
        msg!("Error: Invalid System Program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Get current timestamp from Clock sysvar
pub fn get_current_timestamp() -> Result<i64, ProgramError> {
    let clock = Clock::get()?;
    Ok(clock.unix_timestamp)
}

/// Create a PDA account.
///
/// A PDA that already holds lamports cannot go through `create_account`, so it
/// is topped up to rent exemption, then allocated and assigned in place.
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    pda: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program: &AccountInfo<'a>,
    seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let lamports = rent.minimum_balance(space);

    if pda.lamports() == 0 {
        invoke_signed(
            &system_instruction::create_account(
                payer.key,
                pda.key,
                lamports,
                space as u64,
                owner,
            ),
            &[payer.clone(), pda.clone(), system_program.clone()],
            &[seeds],
        )?;
        return Ok(());
    }

    msg!("PDA {} is pre-funded with {} lamports", pda.key, pda.lamports());
    let shortfall = lamports.saturating_sub(pda.lamports());
    if shortfall > 0 {
        invoke(
            &system_instruction::transfer(payer.key, pda.key, shortfall),
            &[payer.clone(), pda.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(pda.key, space as u64),
        &[pda.clone(), system_program.clone()],
        &[seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(pda.key, owner),
        &[pda.clone(), system_program.clone()],
        &[seeds],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_account_ignores_padding() {
        let mut data = 42u64.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let value: u64 = deserialize_account(&data).unwrap();
        assert_eq!(value, 42);
        assert!(deserialize_account::<u64>(&[1u8, 2]).is_err());
    }
}
