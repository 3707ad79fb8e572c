//! Private Subscription Demo
//!
//! Runs the full mint → validity → membership flow in-process against the
//! in-memory ledger and note store. No proofs are generated; the membership
//! inputs are printed (or written) as the prover's TOML file.
//!
//! Run with: `cargo run --bin demo -- [--config subscription.toml] [--out inputs.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use tracing::info;

use private_subscription::adapters::local_wallet::LocalWallet;
use private_subscription::adapters::memory_ledger::InMemoryLedger;
use private_subscription::adapters::memory_store::InMemoryNoteStore;
use private_subscription::config::{ConfigError, SubscriptionConfig};
use private_subscription::crypto::poseidon::EncodingError;
use private_subscription::delegate::{AuthorizationDelegate, DelegateError};
use private_subscription::domain::keys::OwnerKeys;
use private_subscription::issuer::{IssuerError, MintRequest, SubscriptionIssuer};
use private_subscription::membership::{MembershipError, MembershipProver, ProverInputs};
use private_subscription::oracle::ValidityOracle;
use private_subscription::ports::store::StoreError;
use private_subscription::ports::wallet::SignerPort;

#[derive(Parser, Debug)]
#[command(name = "demo", about = "Private subscription mint and membership demo")]
struct Args {
    /// Path to TOML config file. Defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Payer private key (hex). A random key is used when absent.
    #[arg(long)]
    payer_key: Option<String>,

    /// Write the membership prover inputs here instead of printing them.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid payer key: {0}")]
    Key(String),

    #[error("authorization error: {0}")]
    Delegate(#[from] DelegateError),

    #[error("mint failed: {0}")]
    Issuer(#[from] IssuerError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("note store error: {0}")]
    Store(#[from] StoreError),

    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    #[error("failed to render prover inputs: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("failed to write prover inputs: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected outcome: {0}")]
    Unexpected(String),
}

const PROJECT: u64 = 1;
const TIER: u64 = 20;
const EXPIRY: u64 = 123;
const PRICE: u128 = 100;
const BENEFICIARY: Address = Address::repeat_byte(0xBE);

/// Print a step header at the start of each named phase.
fn step(n: u8, total: u8, msg: &str) {
    info!("");
    info!("┌─[{n}/{total}] {msg}");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DemoError> {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // ── Step 1: Config ──
    let config = match &args.config {
        Some(path) => {
            step(1, 6, &format!("Loading config from {}", path.display()));
            SubscriptionConfig::load(path)?
        }
        None => {
            step(1, 6, "Using default config");
            SubscriptionConfig::default()
        }
    };
    info!("  subscription contract: {}", config.contract.subscription_address);
    info!("  token:                 {}", config.contract.token_address);
    info!("  nonce mode:            {}", config.authorization.nonce_mode);

    // ── Step 2: Parties and ledger ──
    step(2, 6, "Setting up payer, owner and in-memory ledger...");
    let payer = match &args.payer_key {
        Some(key) => LocalWallet::new(
            key.parse::<PrivateKeySigner>()
                .map_err(|e| DemoError::Key(e.to_string()))?,
        ),
        None => LocalWallet::random(),
    };
    let owner = OwnerKeys::random();
    let ledger = Arc::new(InMemoryLedger::new());
    let store = Arc::new(InMemoryNoteStore::new());

    let token = config.contract.token_address;
    ledger.mint_tokens(token, payer.address(), 1_000).await;
    ledger.set_time(100).await;
    info!("  payer:   {}", payer.address());
    info!("  owner:   0x{}...", &hex::encode(owner.pubkey.as_bytes())[..16]);
    info!("  balance: {}", ledger.balance_of(token, payer.address()).await);

    // ── Step 3: Authorize and mint ──
    step(3, 6, "Authorizing payment and minting subscription...");
    let delegate = AuthorizationDelegate::new(ledger.clone(), &config.authorization);
    let nonce = Some(U256::from(1));
    let witness = delegate
        .authorize_transfer(
            &payer,
            config.contract.subscription_address,
            token,
            BENEFICIARY,
            PRICE,
            nonce,
        )
        .await?;
    info!("  witness over {}", witness.message_hash.0);

    let issuer = SubscriptionIssuer::new(
        ledger.clone(),
        store.clone(),
        AuthorizationDelegate::new(ledger.clone(), &config.authorization),
        owner.pubkey,
        config.contract.clone(),
        config.issuer.clone(),
    );
    let request = MintRequest {
        project: PROJECT,
        tier: TIER,
        expiry: EXPIRY,
        cooldown_code: 0,
        token_contract: token,
        payer: payer.address(),
        beneficiary: BENEFICIARY,
        amount: PRICE,
        nonce,
    };
    let minted = issuer.mint_and_authorize(request.clone(), &witness).await?;
    let computed = minted.hashes_and_nullifier(&owner.secret)?;
    info!("  leaf index:        {}", minted.leaf_index);
    info!("  note hash:         {}", computed.hashes.note_hash);
    info!("  commitment:        {}", computed.hashes.unique.0);
    info!("  nullifier:         {}", computed.nullifier.0);
    info!("  beneficiary paid:  {}", ledger.balance_of(token, BENEFICIARY).await);

    // ── Step 4: Replay is refused ──
    step(4, 6, "Replaying the same witness...");
    match issuer.mint_and_authorize(request, &witness).await {
        Err(IssuerError::WitnessAlreadyConsumed(hash)) => {
            info!("  refused: witness {hash} already consumed");
        }
        other => {
            return Err(DemoError::Unexpected(format!("replay returned {other:?}")));
        }
    }

    // ── Step 5: Validity ──
    step(5, 6, "Checking subscription validity...");
    let oracle = ValidityOracle::new(store.clone(), owner.pubkey, &config.contract);
    for now in [100, EXPIRY, 200] {
        let valid = oracle.is_subscriber(PROJECT, TIER, now).await?;
        info!("  is_subscriber(project={PROJECT}, tier={TIER}, now={now}) = {valid}");
    }
    let first = oracle
        .fetch_first_valid_note(PROJECT, TIER, 100)
        .await?
        .ok_or_else(|| DemoError::Unexpected("minted note is not valid".into()))?;

    // ── Step 6: Membership inputs ──
    step(6, 6, "Assembling membership proof inputs...");
    let prover = MembershipProver::new(ledger.clone(), ledger.clone(), &config.membership);
    let (public_input, private_input) = prover.prove_possession(&first).await?;
    let rendered = ProverInputs {
        public_input,
        private_input,
    }
    .to_toml()?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            info!("  wrote {}", path.display());
        }
        None => println!("\n{rendered}"),
    }

    info!("");
    info!("Demo completed.");
    Ok(())
}
