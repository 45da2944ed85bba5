use binary_outcome_market::{
    error::MarketError,
    instruction,
    oracle::PriceFeedMessage,
    state::{
        find_market_address, find_market_vault_address, find_outcome_account_address, Market,
        MarketParams, OutcomeAccount, Registry,
    },
};
use borsh::BorshDeserialize;
use solana_program::{program_pack::Pack, pubkey::Pubkey, system_instruction};
use solana_program_test::{processor, ProgramTest, ProgramTestContext};
use solana_sdk::{
    account::{Account, AccountSharedData},
    clock::Clock,
    instruction::{Instruction, InstructionError},
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

const FEED: [u8; 32] = [0xe6; 32];
const REFERENCE: u64 = 150_000_000;

struct Env {
    context: ProgramTestContext,
    oracle_program: Pubkey,
    mint: Keypair,
    creator_token: Pubkey,
    buyer: Keypair,
    buyer_token: Pubkey,
    resolve_from: i64,
    resolve_to: i64,
}

fn program_test() -> ProgramTest {
    ProgramTest::new(
        "binary_outcome_market",
        binary_outcome_market::id(),
        processor!(binary_outcome_market::processor::process_instruction),
    )
}

async fn send(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    let blockhash = context.get_new_latest_blockhash().await.unwrap();
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);
    let tx = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &all_signers[..],
        blockhash,
    );
    context
        .banks_client
        .process_transaction(tx)
        .await
        .map_err(|err| err.unwrap())
}

fn custom(error: MarketError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

async fn create_token_account(
    context: &mut ProgramTestContext,
    mint: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    mint_authority: &Keypair,
) -> Pubkey {
    let account = Keypair::new();
    let rent = context.banks_client.get_rent().await.unwrap();
    let mut instructions = vec![
        system_instruction::create_account(
            &context.payer.pubkey(),
            &account.pubkey(),
            rent.minimum_balance(spl_token::state::Account::LEN),
            spl_token::state::Account::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account(&spl_token::id(), &account.pubkey(), mint, owner)
            .unwrap(),
    ];
    if amount > 0 {
        instructions.push(
            spl_token::instruction::mint_to(
                &spl_token::id(),
                mint,
                &account.pubkey(),
                &mint_authority.pubkey(),
                &[],
                amount,
            )
            .unwrap(),
        );
    }
    send(context, &instructions, &[&account, mint_authority]).await.unwrap();
    account.pubkey()
}

async fn token_balance(context: &mut ProgramTestContext, account: &Pubkey) -> u64 {
    let account = context.banks_client.get_account(*account).await.unwrap().unwrap();
    spl_token::state::Account::unpack(&account.data).unwrap().amount
}

async fn load_market(context: &mut ProgramTestContext, market_id: u64) -> Market {
    let (address, _) = find_market_address(&binary_outcome_market::id(), market_id);
    let account = context.banks_client.get_account(address).await.unwrap().unwrap();
    Market::deserialize(&mut &account.data[..]).unwrap()
}

async fn warp_to(context: &mut ProgramTestContext, unix_timestamp: i64) {
    let mut clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp = unix_timestamp;
    context.set_sysvar(&clock);
}

fn post_price(context: &mut ProgramTestContext, owner: &Pubkey, price: i64, publish_time: i64) -> Pubkey {
    let message = PriceFeedMessage {
        feed_id: FEED,
        price,
        conf: 0,
        exponent: -6,
        publish_time,
    };
    let address = Pubkey::new_unique();
    let account = Account {
        lamports: 1_000_000_000,
        data: message.to_price_update_v2(&Pubkey::new_unique(), 1),
        owner: *owner,
        executable: false,
        rent_epoch: 0,
    };
    context.set_account(&address, &AccountSharedData::from(account));
    address
}

/// Registry plus market 0 (subsidy 100) and a funded buyer
async fn setup() -> Env {
    let mut context = program_test().start_with_context().await;
    let program_id = binary_outcome_market::id();
    let oracle_program = Pubkey::new_unique();

    let mint = Keypair::new();
    let rent = context.banks_client.get_rent().await.unwrap();
    let payer = context.payer.pubkey();
    send(
        &mut context,
        &[
            system_instruction::create_account(
                &payer,
                &mint.pubkey(),
                rent.minimum_balance(spl_token::state::Mint::LEN),
                spl_token::state::Mint::LEN as u64,
                &spl_token::id(),
            ),
            spl_token::instruction::initialize_mint(&spl_token::id(), &mint.pubkey(), &mint.pubkey(), None, 6)
                .unwrap(),
        ],
        &[&mint],
    )
    .await
    .unwrap();

    let buyer = Keypair::new();
    send(
        &mut context,
        &[system_instruction::transfer(&payer, &buyer.pubkey(), 1_000_000_000)],
        &[],
    )
    .await
    .unwrap();

    let creator_token = create_token_account(&mut context, &mint.pubkey(), &payer, 1_000, &mint).await;
    let buyer_token = create_token_account(&mut context, &mint.pubkey(), &buyer.pubkey(), 500, &mint).await;

    send(
        &mut context,
        &[instruction::initialize_registry(&program_id, &payer, &mint.pubkey(), &oracle_program, 60).unwrap()],
        &[],
    )
    .await
    .unwrap();

    let clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    let resolve_from = clock.unix_timestamp + 1_000;
    let resolve_to = clock.unix_timestamp + 5_000;
    let params = MarketParams {
        reference_price: REFERENCE,
        price_feed_id: FEED,
        resolve_from,
        resolve_to,
        subsidy_amount: 100,
    };
    send(
        &mut context,
        &[instruction::create_market(&program_id, &payer, 0, &mint.pubkey(), &creator_token, params).unwrap()],
        &[],
    )
    .await
    .unwrap();

    Env {
        context,
        oracle_program,
        mint,
        creator_token,
        buyer,
        buyer_token,
        resolve_from,
        resolve_to,
    }
}

#[tokio::test]
async fn test_initialize_registry_once() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let payer = env.context.payer.pubkey();

    let (registry_address, _) = binary_outcome_market::find_registry_address(&program_id);
    let account = env.context.banks_client.get_account(registry_address).await.unwrap().unwrap();
    let registry = Registry::deserialize(&mut &account.data[..]).unwrap();
    assert_eq!(registry.collateral_mint, env.mint.pubkey());
    assert_eq!(registry.oracle_program, env.oracle_program);
    assert_eq!(registry.max_staleness_secs, 60);
    assert_eq!(registry.market_counter, 1);

    let result = send(
        &mut env.context,
        &[instruction::initialize_registry(&program_id, &payer, &env.mint.pubkey(), &env.oracle_program, 60)
            .unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::AlreadyInitialized)));
}

#[tokio::test]
async fn test_create_market_escrows_subsidy() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();

    let market = load_market(&mut env.context, 0).await;
    assert_eq!(market.market_id, 0);
    assert_eq!(market.num_outcome0, 100);
    assert_eq!(market.num_outcome1, 100);
    assert_eq!(market.current_balance, 100);
    assert_eq!(market.price_outcome0(), 500_000);
    assert_eq!(market.market_vault, find_market_vault_address(&program_id, 0).0);

    assert_eq!(token_balance(&mut env.context, &market.market_vault).await, 100);
    assert_eq!(token_balance(&mut env.context, &env.creator_token).await, 900);

    // Window must open in the future
    let payer = env.context.payer.pubkey();
    let params = MarketParams {
        reference_price: REFERENCE,
        price_feed_id: FEED,
        resolve_from: env.resolve_to,
        resolve_to: env.resolve_from,
        subsidy_amount: 100,
    };
    let result = send(
        &mut env.context,
        &[instruction::create_market(&program_id, &payer, 1, &env.mint.pubkey(), &env.creator_token, params)
            .unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::InvalidWindow)));
}

#[tokio::test]
async fn test_full_market_lifecycle() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let buyer = env.buyer.insecure_clone();
    let payer = env.context.payer.pubkey();

    send(
        &mut env.context,
        &[instruction::buy_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0, 0, 10).unwrap()],
        &[&buyer],
    )
    .await
    .unwrap();

    let market = load_market(&mut env.context, 0).await;
    assert_eq!(market.num_outcome0, 110);
    assert_eq!(market.num_outcome1, 100);
    assert_eq!(market.current_balance, 110);
    assert!(market.price_outcome0() > 500_000);
    assert_eq!(token_balance(&mut env.context, &market.market_vault).await, 110);
    assert_eq!(token_balance(&mut env.context, &env.buyer_token).await, 490);

    // Too early to resolve
    let early_price = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64 + 1_000_000, env.resolve_from - 1_000);
    let result = send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &early_price).unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::TooEarly)));

    let now = env.resolve_from + 10;
    warp_to(&mut env.context, now).await;
    let price = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64 + 1_000_000, now);
    send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &price).unwrap()],
        &[],
    )
    .await
    .unwrap();

    let market = load_market(&mut env.context, 0).await;
    assert!(market.is_resolved);
    assert_eq!(market.outcome.map(|o| o.index()), Some(0));
    assert_eq!(market.resolved_price, REFERENCE + 1_000_000);

    let result = send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &price).unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::AlreadyResolved)));

    // Purchases are closed after resolution
    let result = send(
        &mut env.context,
        &[instruction::buy_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0, 1, 5).unwrap()],
        &[&buyer],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::MarketResolved)));

    // floor(10 * 110 / 110)
    send(
        &mut env.context,
        &[instruction::redeem_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0).unwrap()],
        &[&buyer],
    )
    .await
    .unwrap();
    assert_eq!(token_balance(&mut env.context, &env.buyer_token).await, 500);

    let result = send(
        &mut env.context,
        &[instruction::redeem_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0).unwrap()],
        &[&buyer],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::NothingToRedeem)));

    send(
        &mut env.context,
        &[instruction::reclaim_subsidy(&program_id, &payer, &env.creator_token, 0).unwrap()],
        &[],
    )
    .await
    .unwrap();
    assert_eq!(token_balance(&mut env.context, &env.creator_token).await, 1_000);

    let market = load_market(&mut env.context, 0).await;
    assert_eq!(market.current_balance, 0);
    assert!(market.subsidy_reclaimed);
    assert_eq!(token_balance(&mut env.context, &market.market_vault).await, 0);
}

#[tokio::test]
async fn test_resolution_rejects_bad_oracle_readings() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let payer = env.context.payer.pubkey();

    let now = env.resolve_from + 500;
    warp_to(&mut env.context, now).await;

    let stale = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64, now - 61);
    let result = send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &stale).unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::StaleOracleData)));

    let foreign = post_price(&mut env.context, &Pubkey::new_unique(), REFERENCE as i64, now);
    let result = send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &foreign).unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::InvalidOracleAccount)));

    // Tie resolves to outcome 0
    let tie = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64, now);
    send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &tie).unwrap()],
        &[],
    )
    .await
    .unwrap();
    let market = load_market(&mut env.context, 0).await;
    assert_eq!(market.outcome.map(|o| o.index()), Some(0));
}

#[tokio::test]
async fn test_trading_closes_at_window_end() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let buyer = env.buyer.insecure_clone();

    warp_to(&mut env.context, env.resolve_to).await;
    let result = send(
        &mut env.context,
        &[instruction::buy_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0, 1, 5).unwrap()],
        &[&buyer],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::TradingClosed)));

    let result = send(
        &mut env.context,
        &[instruction::buy_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0, 2, 5).unwrap()],
        &[&buyer],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::InvalidOutcome)));
}

#[tokio::test]
async fn test_late_resolution_needs_a_reading_from_the_window() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let payer = env.context.payer.pubkey();

    let now = env.resolve_to + 86_400;
    warp_to(&mut env.context, now).await;

    let after_window = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64 - 1, now);
    let result = send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &after_window).unwrap()],
        &[],
    )
    .await;
    assert_eq!(result, Err(custom(MarketError::StaleOracleData)));

    let at_close = post_price(&mut env.context, &env.oracle_program, REFERENCE as i64 + 1, env.resolve_to - 10);
    send(
        &mut env.context,
        &[instruction::resolve_market(&program_id, &payer, 0, &at_close).unwrap()],
        &[],
    )
    .await
    .unwrap();

    let market = load_market(&mut env.context, 0).await;
    assert_eq!(market.outcome.map(|o| o.index()), Some(0));
    assert_eq!(market.resolved_price, REFERENCE + 1);
}

#[tokio::test]
async fn test_buy_into_prefunded_outcome_account() {
    let mut env = setup().await;
    let program_id = binary_outcome_market::id();
    let buyer = env.buyer.insecure_clone();
    let payer = env.context.payer.pubkey();

    let (position_address, _) = find_outcome_account_address(&program_id, 0, &buyer.pubkey());
    send(
        &mut env.context,
        &[system_instruction::transfer(&payer, &position_address, 1_000_000)],
        &[],
    )
    .await
    .unwrap();

    send(
        &mut env.context,
        &[instruction::buy_outcome(&program_id, &buyer.pubkey(), &env.buyer_token, 0, 0, 10).unwrap()],
        &[&buyer],
    )
    .await
    .unwrap();

    let account = env.context.banks_client.get_account(position_address).await.unwrap().unwrap();
    assert_eq!(account.owner, program_id);
    assert_eq!(account.data.len(), OutcomeAccount::SIZE);
    let position = OutcomeAccount::deserialize(&mut &account.data[..]).unwrap();
    assert_eq!(position.holder, buyer.pubkey());
    assert_eq!(position.amount0, 10);
    assert_eq!(position.amount1, 0);
}
