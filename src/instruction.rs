//! Instruction definitions for the Binary Outcome Market Program

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::state::{
    find_market_address, find_market_vault_address, find_outcome_account_address,
    find_registry_address, MarketParams,
};

/// All instructions supported by the Binary Outcome Market Program
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum MarketInstruction {
    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize the registry (collateral mint, oracle program, counter)
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Authority (pays for the registry)
    /// 1. `[writable]` Registry PDA
    /// 2. `[]` Collateral Mint
    /// 3. `[]` System Program
    InitializeRegistry(InitializeRegistryArgs),

    // =========================================================================
    // Market Lifecycle
    // =========================================================================

    /// Create a market at the next sequence number and escrow the subsidy
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Creator
    /// 1. `[writable]` Registry PDA
    /// 2. `[writable]` Market PDA
    /// 3. `[writable]` Market Vault PDA
    /// 4. `[]` Collateral Mint
    /// 5. `[writable]` Creator's Collateral Token Account
    /// 6. `[]` Token Program
    /// 7. `[]` System Program
    /// 8. `[]` Rent Sysvar
    CreateMarket(CreateMarketArgs),

    /// Buy shares of one outcome, 1 share per unit of collateral
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Buyer
    /// 1. `[writable]` Market
    /// 2. `[writable]` Market Vault
    /// 3. `[writable]` Buyer's Collateral Token Account
    /// 4. `[writable]` Outcome Account PDA (created on first purchase)
    /// 5. `[]` Token Program
    /// 6. `[]` System Program
    BuyOutcome(BuyOutcomeArgs),

    /// Resolve a market from the oracle. Permissionless.
    ///
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[]` Registry PDA
    /// 2. `[writable]` Market
    /// 3. `[]` Price Update Account (owned by the registry's oracle program)
    ResolveMarket(ResolveMarketArgs),

    /// Redeem the holder's winning shares for collateral
    ///
    /// Accounts:
    /// 0. `[signer]` Holder
    /// 1. `[writable]` Market
    /// 2. `[writable]` Market Vault
    /// 3. `[writable]` Holder's Collateral Token Account
    /// 4. `[writable]` Outcome Account PDA
    /// 5. `[]` Token Program
    RedeemOutcome(RedeemOutcomeArgs),

    /// Pay the creator for the winning side of the subsidy (creator only, once)
    ///
    /// Accounts:
    /// 0. `[signer]` Creator
    /// 1. `[writable]` Market
    /// 2. `[writable]` Market Vault
    /// 3. `[writable]` Creator's Collateral Token Account
    /// 4. `[]` Token Program
    ReclaimSubsidy(ReclaimSubsidyArgs),
}

// ============================================================================
// Instruction Arguments
// ============================================================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct InitializeRegistryArgs {
    /// Program that owns oracle price update accounts
    pub oracle_program: Pubkey,
    /// Maximum accepted oracle age in seconds (0 = default)
    pub max_staleness_secs: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CreateMarketArgs {
    /// Strike value (e6)
    pub reference_price: u64,
    /// Oracle series identifier
    pub price_feed_id: [u8; 32],
    /// Resolution window start (Unix timestamp)
    pub resolve_from: i64,
    /// Resolution window end (Unix timestamp)
    pub resolve_to: i64,
    /// Liquidity subsidy in collateral base units
    pub subsidy_amount: u64,
}

impl CreateMarketArgs {
    pub fn params(&self) -> MarketParams {
        MarketParams {
            reference_price: self.reference_price,
            price_feed_id: self.price_feed_id,
            resolve_from: self.resolve_from,
            resolve_to: self.resolve_to,
            subsidy_amount: self.subsidy_amount,
        }
    }
}

impl From<MarketParams> for CreateMarketArgs {
    fn from(params: MarketParams) -> Self {
        Self {
            reference_price: params.reference_price,
            price_feed_id: params.price_feed_id,
            resolve_from: params.resolve_from,
            resolve_to: params.resolve_to,
            subsidy_amount: params.subsidy_amount,
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct BuyOutcomeArgs {
    /// Market ID
    pub market_id: u64,
    /// 0 = at or above reference, 1 = below
    pub outcome: u8,
    /// Collateral to spend (= shares received)
    pub amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ResolveMarketArgs {
    /// Market ID
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct RedeemOutcomeArgs {
    /// Market ID
    pub market_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct ReclaimSubsidyArgs {
    /// Market ID
    pub market_id: u64,
}

// ============================================================================
// Instruction Builders
// ============================================================================

fn build(
    program_id: &Pubkey,
    accounts: Vec<AccountMeta>,
    instruction: MarketInstruction,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: instruction.try_to_vec()?,
    })
}

pub fn initialize_registry(
    program_id: &Pubkey,
    authority: &Pubkey,
    collateral_mint: &Pubkey,
    oracle_program: &Pubkey,
    max_staleness_secs: u64,
) -> Result<Instruction, ProgramError> {
    let (registry, _) = find_registry_address(program_id);
    build(
        program_id,
        vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(registry, false),
            AccountMeta::new_readonly(*collateral_mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        MarketInstruction::InitializeRegistry(InitializeRegistryArgs {
            oracle_program: *oracle_program,
            max_staleness_secs,
        }),
    )
}

/// `market_id` must be the registry's current `market_counter`
pub fn create_market(
    program_id: &Pubkey,
    creator: &Pubkey,
    market_id: u64,
    collateral_mint: &Pubkey,
    creator_token_account: &Pubkey,
    params: MarketParams,
) -> Result<Instruction, ProgramError> {
    let (registry, _) = find_registry_address(program_id);
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    build(
        program_id,
        vec![
            AccountMeta::new(*creator, true),
            AccountMeta::new(registry, false),
            AccountMeta::new(market, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(*collateral_mint, false),
            AccountMeta::new(*creator_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        MarketInstruction::CreateMarket(params.into()),
    )
}

pub fn buy_outcome(
    program_id: &Pubkey,
    buyer: &Pubkey,
    buyer_token_account: &Pubkey,
    market_id: u64,
    outcome: u8,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    let (position, _) = find_outcome_account_address(program_id, market_id, buyer);
    build(
        program_id,
        vec![
            AccountMeta::new(*buyer, true),
            AccountMeta::new(market, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*buyer_token_account, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        MarketInstruction::BuyOutcome(BuyOutcomeArgs { market_id, outcome, amount }),
    )
}

pub fn resolve_market(
    program_id: &Pubkey,
    caller: &Pubkey,
    market_id: u64,
    price_update: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (registry, _) = find_registry_address(program_id);
    let (market, _) = find_market_address(program_id, market_id);
    build(
        program_id,
        vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new_readonly(registry, false),
            AccountMeta::new(market, false),
            AccountMeta::new_readonly(*price_update, false),
        ],
        MarketInstruction::ResolveMarket(ResolveMarketArgs { market_id }),
    )
}

pub fn redeem_outcome(
    program_id: &Pubkey,
    holder: &Pubkey,
    holder_token_account: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    let (position, _) = find_outcome_account_address(program_id, market_id, holder);
    build(
        program_id,
        vec![
            AccountMeta::new_readonly(*holder, true),
            AccountMeta::new(market, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*holder_token_account, false),
            AccountMeta::new(position, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        MarketInstruction::RedeemOutcome(RedeemOutcomeArgs { market_id }),
    )
}

pub fn reclaim_subsidy(
    program_id: &Pubkey,
    creator: &Pubkey,
    creator_token_account: &Pubkey,
    market_id: u64,
) -> Result<Instruction, ProgramError> {
    let (market, _) = find_market_address(program_id, market_id);
    let (vault, _) = find_market_vault_address(program_id, market_id);
    build(
        program_id,
        vec![
            AccountMeta::new_readonly(*creator, true),
            AccountMeta::new(market, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*creator_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        MarketInstruction::ReclaimSubsidy(ReclaimSubsidyArgs { market_id }),
    )
}
