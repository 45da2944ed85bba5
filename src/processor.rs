//! Instruction processor for the Binary Outcome Market Program
//!
//! Loads and validates accounts, binds the on-chain custody and oracle
//! adapters, runs the lifecycle transition and stores the result.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
};

use crate::cpi::{cpi_initialize_vault, verify_token_program};
use crate::custody::TokenVaultCustody;
use crate::error::MarketError;
use crate::instruction::{
    BuyOutcomeArgs, CreateMarketArgs, InitializeRegistryArgs, MarketInstruction,
    ReclaimSubsidyArgs, RedeemOutcomeArgs, ResolveMarketArgs,
};
use crate::lifecycle;
use crate::oracle::PythPriceUpdate;
use crate::state::{
    Market, Outcome, OutcomeAccount, Registry, DEFAULT_MAX_STALENESS_SECS, MARKET_DISCRIMINATOR,
    MARKET_SEED, MARKET_VAULT_SEED, OUTCOME_ACCOUNT_DISCRIMINATOR, OUTCOME_SEED,
    REGISTRY_DISCRIMINATOR, REGISTRY_SEED,
};
use crate::utils::{
    check_owner, check_signer, create_pda_account, deserialize_account, get_current_timestamp,
    verify_pda, verify_pda_with_bump, verify_system_program,
};

/// Process an instruction
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = MarketInstruction::try_from_slice(instruction_data)
        .map_err(|_| MarketError::InvalidInstruction)?;

    match instruction {
        MarketInstruction::InitializeRegistry(args) => {
            msg!("Instruction: InitializeRegistry");
            process_initialize_registry(program_id, accounts, args)
        }
        MarketInstruction::CreateMarket(args) => {
            msg!("Instruction: CreateMarket");
            process_create_market(program_id, accounts, args)
        }
        MarketInstruction::BuyOutcome(args) => {
            msg!("Instruction: BuyOutcome");
            process_buy_outcome(program_id, accounts, args)
        }
        MarketInstruction::ResolveMarket(args) => {
            msg!("Instruction: ResolveMarket");
            process_resolve_market(program_id, accounts, args)
        }
        MarketInstruction::RedeemOutcome(args) => {
            msg!("Instruction: RedeemOutcome");
            process_redeem_outcome(program_id, accounts, args)
        }
        MarketInstruction::ReclaimSubsidy(args) => {
            msg!("Instruction: ReclaimSubsidy");
            process_reclaim_subsidy(program_id, accounts, args)
        }
    }
}

// ============================================================================
// Account loading
// ============================================================================

fn load_registry(program_id: &Pubkey, registry_info: &AccountInfo) -> Result<Registry, ProgramError> {
    if registry_info.data_is_empty() {
        msg!("Error: Registry not initialized");
        return Err(MarketError::AccountNotInitialized.into());
    }
    check_owner(registry_info, program_id)?;

    let registry = deserialize_account::<Registry>(&registry_info.data.borrow())?;
    if registry.discriminator != REGISTRY_DISCRIMINATOR {
        msg!("Error: Invalid Registry discriminator");
        return Err(MarketError::InvalidAccountData.into());
    }
    verify_pda_with_bump(registry_info.key, program_id, &[REGISTRY_SEED, &[registry.bump]])?;
    Ok(registry)
}

fn load_market(
    program_id: &Pubkey,
    market_info: &AccountInfo,
    market_id: u64,
) -> Result<Market, ProgramError> {
    if market_info.data_is_empty() {
        msg!("Error: Market {} not initialized", market_id);
        return Err(MarketError::AccountNotInitialized.into());
    }
    check_owner(market_info, program_id)?;

    let market = deserialize_account::<Market>(&market_info.data.borrow())?;
    if market.discriminator != MARKET_DISCRIMINATOR {
        msg!("Error: Invalid Market discriminator");
        return Err(MarketError::InvalidAccountData.into());
    }
    if market.market_id != market_id {
        msg!("Error: Market account holds market {}, expected {}", market.market_id, market_id);
        return Err(MarketError::InvalidAccountData.into());
    }
    verify_pda_with_bump(
        market_info.key,
        program_id,
        &[MARKET_SEED, &market_id.to_le_bytes(), &[market.bump]],
    )?;
    Ok(market)
}

fn check_market_vault(market: &Market, vault_info: &AccountInfo) -> ProgramResult {
    if *vault_info.key != market.market_vault {
        msg!("Error: Vault {} does not belong to market {}", vault_info.key, market.market_id);
        return Err(MarketError::InvalidMarketVault.into());
    }
    Ok(())
}

fn load_outcome_account(
    program_id: &Pubkey,
    position_info: &AccountInfo,
    market_id: u64,
    holder: &Pubkey,
) -> Result<OutcomeAccount, ProgramError> {
    if position_info.data_is_empty() {
        msg!("Error: {} holds no shares of market {}", holder, market_id);
        return Err(MarketError::NothingToRedeem.into());
    }
    check_owner(position_info, program_id)?;

    let position = deserialize_account::<OutcomeAccount>(&position_info.data.borrow())?;
    if position.discriminator != OUTCOME_ACCOUNT_DISCRIMINATOR {
        msg!("Error: Invalid OutcomeAccount discriminator");
        return Err(MarketError::InvalidAccountData.into());
    }
    if position.holder != *holder {
        msg!("Error: Outcome account belongs to {}", position.holder);
        return Err(MarketError::Unauthorized.into());
    }
    if position.market_id != market_id {
        msg!("Error: Outcome account is for market {}", position.market_id);
        return Err(MarketError::InvalidAccountData.into());
    }
    verify_pda_with_bump(
        position_info.key,
        program_id,
        &[OUTCOME_SEED, &market_id.to_le_bytes(), holder.as_ref(), &[position.bump]],
    )?;
    Ok(position)
}

// ============================================================================
// Initialization
// ============================================================================

fn process_initialize_registry(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: InitializeRegistryArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Authority (signer, payer)
    let authority_info = next_account_info(account_info_iter)?;
    check_signer(authority_info)?;

    // Account 1: Registry PDA (writable)
    let registry_info = next_account_info(account_info_iter)?;

    // Account 2: Collateral Mint
    let collateral_mint_info = next_account_info(account_info_iter)?;

    // Account 3: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    verify_system_program(system_program_info)?;

    let registry_bump = verify_pda(registry_info.key, program_id, &[REGISTRY_SEED])?;

    if !registry_info.data_is_empty() {
        msg!("Error: Registry already initialized");
        return Err(MarketError::AlreadyInitialized.into());
    }

    check_owner(collateral_mint_info, &spl_token::id())?;
    spl_token::state::Mint::unpack(&collateral_mint_info.data.borrow())
        .map_err(|_| MarketError::InvalidCollateralMint)?;

    create_pda_account(
        authority_info,
        registry_info,
        Registry::SIZE,
        program_id,
        system_program_info,
        &[REGISTRY_SEED, &[registry_bump]],
    )?;

    let max_staleness_secs = if args.max_staleness_secs == 0 {
        DEFAULT_MAX_STALENESS_SECS
    } else {
        args.max_staleness_secs
    };

    let registry = Registry::new(
        *authority_info.key,
        *collateral_mint_info.key,
        args.oracle_program,
        max_staleness_secs,
        registry_bump,
    );
    registry.serialize(&mut *registry_info.data.borrow_mut())?;

    msg!("Registry initialized");
    msg!("Authority: {}", authority_info.key);
    msg!("Collateral Mint: {}", collateral_mint_info.key);
    msg!("Oracle Program: {}", args.oracle_program);
    msg!("Max Staleness: {} seconds", max_staleness_secs);

    Ok(())
}

// ============================================================================
// Market Lifecycle
// ============================================================================

fn process_create_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: CreateMarketArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Creator (signer, payer)
    let creator_info = next_account_info(account_info_iter)?;
    check_signer(creator_info)?;

    // Account 1: Registry PDA (writable)
    let registry_info = next_account_info(account_info_iter)?;

    // Account 2: Market PDA (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 3: Market Vault PDA (writable)
    let vault_info = next_account_info(account_info_iter)?;

    // Account 4: Collateral Mint
    let collateral_mint_info = next_account_info(account_info_iter)?;

    // Account 5: Creator's Collateral Token Account (writable)
    let creator_token_info = next_account_info(account_info_iter)?;

    // Account 6: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    // Account 7: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    verify_system_program(system_program_info)?;

    // Account 8: Rent Sysvar
    let rent_info = next_account_info(account_info_iter)?;

    let mut registry = load_registry(program_id, registry_info)?;
    if *collateral_mint_info.key != registry.collateral_mint {
        msg!("Error: Collateral mint mismatch");
        return Err(MarketError::InvalidCollateralMint.into());
    }

    let params = args.params();
    let current_time = get_current_timestamp()?;
    params.validate(current_time)?;

    // The market takes the registry's current sequence number
    let market_id = registry.market_counter;
    let market_id_bytes = market_id.to_le_bytes();

    let market_bump = verify_pda(market_info.key, program_id, &[MARKET_SEED, &market_id_bytes])?;
    let vault_bump = verify_pda(vault_info.key, program_id, &[MARKET_VAULT_SEED, &market_id_bytes])?;

    if !market_info.data_is_empty() {
        msg!("Error: Market {} already exists", market_id);
        return Err(MarketError::AlreadyInitialized.into());
    }

    let market_seeds: &[&[u8]] = &[MARKET_SEED, &market_id_bytes, &[market_bump]];
    create_pda_account(
        creator_info,
        market_info,
        Market::SIZE,
        program_id,
        system_program_info,
        market_seeds,
    )?;

    // Vault: token account owned by the market PDA
    create_pda_account(
        creator_info,
        vault_info,
        spl_token::state::Account::LEN,
        token_program_info.key,
        system_program_info,
        &[MARKET_VAULT_SEED, &market_id_bytes, &[vault_bump]],
    )?;
    cpi_initialize_vault(token_program_info, vault_info, collateral_mint_info, market_info, rent_info)?;

    let mut custody = TokenVaultCustody {
        market_id,
        token_program: token_program_info,
        vault: vault_info,
        market: market_info,
        user: creator_info,
        user_token: creator_token_info,
        market_seeds,
    };
    let mut market = lifecycle::create_market(
        &mut registry,
        &mut custody,
        creator_info.key,
        &params,
        current_time,
    )?;

    market.market_vault = *vault_info.key;
    market.bump = market_bump;
    market.vault_bump = vault_bump;

    market.serialize(&mut *market_info.data.borrow_mut())?;
    registry.serialize(&mut *registry_info.data.borrow_mut())?;

    msg!("Market {} created", market_id);
    msg!("Creator: {}", creator_info.key);
    msg!("Reference Price: {} (e6)", market.reference_price);
    msg!("Resolution Window: {} - {}", market.resolve_from, market.resolve_to);
    msg!("Subsidy: {}", market.subsidy_amount);

    Ok(())
}

fn process_buy_outcome(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: BuyOutcomeArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Buyer (signer, payer)
    let buyer_info = next_account_info(account_info_iter)?;
    check_signer(buyer_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;

    // Account 3: Buyer's Collateral Token Account (writable)
    let buyer_token_info = next_account_info(account_info_iter)?;

    // Account 4: Outcome Account PDA (writable)
    let position_info = next_account_info(account_info_iter)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    // Account 6: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    verify_system_program(system_program_info)?;

    let outcome = Outcome::from_index(args.outcome)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;
    check_market_vault(&market, vault_info)?;

    let current_time = get_current_timestamp()?;
    let market_id_bytes = args.market_id.to_le_bytes();

    let mut position = if position_info.data_is_empty() {
        let seeds: &[&[u8]] = &[OUTCOME_SEED, &market_id_bytes, buyer_info.key.as_ref()];
        let bump = verify_pda(position_info.key, program_id, seeds)?;
        create_pda_account(
            buyer_info,
            position_info,
            OutcomeAccount::SIZE,
            program_id,
            system_program_info,
            &[OUTCOME_SEED, &market_id_bytes, buyer_info.key.as_ref(), &[bump]],
        )?;
        OutcomeAccount::new(args.market_id, *buyer_info.key, bump, current_time)
    } else {
        load_outcome_account(program_id, position_info, args.market_id, buyer_info.key)?
    };

    let market_bump = [market.bump];
    let market_seeds: &[&[u8]] = &[MARKET_SEED, &market_id_bytes, &market_bump];
    let mut custody = TokenVaultCustody {
        market_id: args.market_id,
        token_program: token_program_info,
        vault: vault_info,
        market: market_info,
        user: buyer_info,
        user_token: buyer_token_info,
        market_seeds,
    };
    lifecycle::buy_outcome(
        &mut market,
        &mut position,
        &mut custody,
        outcome,
        args.amount,
        current_time,
    )?;

    market.serialize(&mut *market_info.data.borrow_mut())?;
    position.serialize(&mut *position_info.data.borrow_mut())?;

    msg!(
        "Bought {} shares of outcome {} in market {}",
        args.amount,
        outcome.index(),
        args.market_id
    );
    msg!(
        "Prices: outcome0 {} / outcome1 {} (e6)",
        market.price_outcome0(),
        market.price_outcome1()
    );

    Ok(())
}

fn process_resolve_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: ResolveMarketArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Caller (signer)
    let caller_info = next_account_info(account_info_iter)?;
    check_signer(caller_info)?;

    // Account 1: Registry PDA
    let registry_info = next_account_info(account_info_iter)?;

    // Account 2: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 3: Price Update Account
    let price_update_info = next_account_info(account_info_iter)?;

    let registry = load_registry(program_id, registry_info)?;
    let mut market = load_market(program_id, market_info, args.market_id)?;

    let oracle = PythPriceUpdate {
        account: price_update_info,
        oracle_program: &registry.oracle_program,
    };
    let current_time = get_current_timestamp()?;
    lifecycle::resolve_market(&mut market, &oracle, registry.max_staleness_secs, current_time)?;

    market.serialize(&mut *market_info.data.borrow_mut())?;

    msg!("Resolved by: {}", caller_info.key);

    Ok(())
}

fn process_redeem_outcome(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: RedeemOutcomeArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Holder (signer)
    let holder_info = next_account_info(account_info_iter)?;
    check_signer(holder_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;

    // Account 3: Holder's Collateral Token Account (writable)
    let holder_token_info = next_account_info(account_info_iter)?;

    // Account 4: Outcome Account PDA (writable)
    let position_info = next_account_info(account_info_iter)?;

    // Account 5: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let mut market = load_market(program_id, market_info, args.market_id)?;
    check_market_vault(&market, vault_info)?;
    let mut position = load_outcome_account(program_id, position_info, args.market_id, holder_info.key)?;

    let market_id_bytes = args.market_id.to_le_bytes();
    let market_bump = [market.bump];
    let market_seeds: &[&[u8]] = &[MARKET_SEED, &market_id_bytes, &market_bump];
    let mut custody = TokenVaultCustody {
        market_id: args.market_id,
        token_program: token_program_info,
        vault: vault_info,
        market: market_info,
        user: holder_info,
        user_token: holder_token_info,
        market_seeds,
    };

    let current_time = get_current_timestamp()?;
    let payout = lifecycle::redeem_outcome(&mut market, &mut position, &mut custody, current_time)?;

    market.serialize(&mut *market_info.data.borrow_mut())?;
    position.serialize(&mut *position_info.data.borrow_mut())?;

    msg!("Paid {} to {} from market {}", payout, holder_info.key, args.market_id);
    msg!("Remaining Balance: {}", market.current_balance);

    Ok(())
}

fn process_reclaim_subsidy(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: ReclaimSubsidyArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Creator (signer)
    let creator_info = next_account_info(account_info_iter)?;
    check_signer(creator_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2: Market Vault (writable)
    let vault_info = next_account_info(account_info_iter)?;

    // Account 3: Creator's Collateral Token Account (writable)
    let creator_token_info = next_account_info(account_info_iter)?;

    // Account 4: Token Program
    let token_program_info = next_account_info(account_info_iter)?;
    verify_token_program(token_program_info.key)?;

    let mut market = load_market(program_id, market_info, args.market_id)?;
    check_market_vault(&market, vault_info)?;

    let market_id_bytes = args.market_id.to_le_bytes();
    let market_bump = [market.bump];
    let market_seeds: &[&[u8]] = &[MARKET_SEED, &market_id_bytes, &market_bump];
    let mut custody = TokenVaultCustody {
        market_id: args.market_id,
        token_program: token_program_info,
        vault: vault_info,
        market: market_info,
        user: creator_info,
        user_token: creator_token_info,
        market_seeds,
    };

    let payout = lifecycle::reclaim_subsidy(&mut market, &mut custody, creator_info.key)?;

    market.serialize(&mut *market_info.data.borrow_mut())?;

    msg!("Subsidy of market {} reclaimed: {}", args.market_id, payout);

    Ok(())
}
