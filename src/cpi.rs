//! CPI (Cross-Program Invocation) helpers for the Binary Outcome Market Program
//!
//! All calls go to the SPL Token Program: market vault initialization and
//! collateral transfers in and out of the vault.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
};

// ============================================================================
// SPL Token Program CPI
// ============================================================================

/// Initialize a freshly allocated token account as a market vault
pub fn cpi_initialize_vault<'a>(
    token_program: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    owner: &AccountInfo<'a>,
    rent_sysvar: &AccountInfo<'a>,
) -> ProgramResult {
    let ix = spl_token::instruction::initialize_account(
        token_program.key,
        vault.key,
        mint.key,
        owner.key,
    )?;

    invoke(
        &ix,
        &[vault.clone(), mint.clone(), owner.clone(), rent_sysvar.clone(), token_program.clone()],
    )?;

    Ok(())
}

/// Transfer tokens out of a PDA-owned account
pub fn cpi_token_transfer<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    msg!("CPI: Transfer {} tokens", amount);

    let ix = spl_token::instruction::transfer(
        token_program.key,
        source.key,
        destination.key,
        authority.key,
        &[],
        amount,
    )?;

    invoke_signed(
        &ix,
        &[source.clone(), destination.clone(), authority.clone(), token_program.clone()],
        &[signer_seeds],
    )?;

    Ok(())
}

/// Transfer tokens (user-signed, no PDA)
pub fn cpi_token_transfer_user<'a>(
    token_program: &AccountInfo<'a>,
    source: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    msg!("CPI: Transfer {} tokens (user signed)", amount);

    let ix = spl_token::instruction::transfer(
        token_program.key,
        source.key,
        destination.key,
        authority.key,
        &[],
        amount,
    )?;

    invoke(
        &ix,
        &[source.clone(), destination.clone(), authority.clone(), token_program.clone()],
    )?;

    Ok(())
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Verify SPL Token Program
pub fn verify_token_program(provided: &Pubkey) -> ProgramResult {
    if provided != &spl_token::id() {
        msg!("Token program mismatch: expected {}, got {}", spl_token::id(), provided);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_token_program() {
        assert!(verify_token_program(&spl_token::id()).is_ok());
        assert!(verify_token_program(&Pubkey::new_unique()).is_err());
    }
}
