//! Money Transfer - demo runner
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌─────────────┐    ┌──────────┐
//! │  Config  │───▶│   Seed   │───▶│ Coordinator │───▶│ Summary  │
//! │  (YAML)  │    │(ccy/fee/ │    │ (N parallel │    │ (Σ bal + │
//! │          │    │ fx/acct) │    │  transfers) │    │  Σ fees) │
//! └──────────┘    └──────────┘    └─────────────┘    └──────────┘
//! ```
//!
//! Flags:
//! - `--env <name>` / `-e <name>`: load `config/<name>.yaml` (default `dev`)
//! - `--transfers <n>`: number of concurrent random transfers (default 100)
//! - `--postgres`: run against PostgreSQL instead of the in-memory ledger

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use futures::future::join_all;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

use money_transfer::config::{AppConfig, ConfigError};
use money_transfer::core_types::{AccountId, CurrencyCode};
use money_transfer::logging::init_logging;
use money_transfer::seed::{seed_accounts, seed_reference_data};
use money_transfer::store::schema::init_schema;
use money_transfer::store::{FeePolicyStore, InMemoryLedger, LedgerAdmin, LedgerStore, PgLedgerStore};
use money_transfer::transfer::{
    FeePolicyCache, InMemoryRateOracle, TransferCoordinator, TransferRequest,
};

const DEMO_ACCOUNTS: usize = 10;
const DEMO_BALANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_transfers() -> usize {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--transfers" && i + 1 < args.len() {
            if let Ok(n) = args[i + 1].parse() {
                return n;
            }
        }
    }
    100
}

fn use_postgres() -> bool {
    std::env::args().any(|a| a == "--postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = match AppConfig::load(&env) {
        Ok(config) => config,
        Err(ConfigError::Read { path, .. }) => {
            eprintln!("Config file {} not found, using defaults", path);
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    let _log_guard = init_logging(&app_config);

    info!("Starting money transfer demo in {} mode", env);

    let transfers = get_transfers();

    if use_postgres() {
        let url = app_config
            .postgres_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .context("--postgres needs postgres_url in config or DATABASE_URL")?;
        let store = PgLedgerStore::connect(&url).await?;
        init_schema(store.pool()).await?;
        println!("[Store] PostgreSQL");
        run_demo(Arc::new(store), &app_config, transfers).await
    } else {
        println!("[Store] In-memory");
        run_demo(Arc::new(InMemoryLedger::new()), &app_config, transfers).await
    }
}

async fn run_demo<S>(store: Arc<S>, config: &AppConfig, transfers: usize) -> anyhow::Result<()>
where
    S: LedgerStore + LedgerAdmin + FeePolicyStore + 'static,
{
    let rates = Arc::new(InMemoryRateOracle::new());
    seed_reference_data(store.as_ref(), &rates, &config.ledger.fee_policy_key).await?;

    let fees = Arc::new(FeePolicyCache::new(
        store.clone(),
        config.ledger.fee_policy_key.clone(),
    ));
    fees.refresh().await.context("fee policy must be loaded before transfers")?;

    let coordinator = Arc::new(TransferCoordinator::with_max_balance(
        store.clone(),
        fees,
        rates,
        config.ledger.max_balance,
    ));

    let usd = CurrencyCode::new("USD")?;
    let ids: Vec<AccountId> = seed_accounts(store.as_ref(), DEMO_ACCOUNTS, usd, DEMO_BALANCE)
        .await?
        .iter()
        .map(|a| a.id())
        .collect();
    let before = total_balance(store.as_ref(), &ids).await?;

    let requests: Vec<TransferRequest> = {
        let mut rng = rand::thread_rng();
        (0..transfers)
            .map(|_| {
                let from = ids[rng.gen_range(0..ids.len())];
                let mut to = ids[rng.gen_range(0..ids.len())];
                while to == from {
                    to = ids[rng.gen_range(0..ids.len())];
                }
                let cents: i64 = rng.gen_range(1..=20_000);
                TransferRequest::new(from.get(), to.get(), Decimal::new(cents, 2), "USD")
            })
            .collect()
    };

    println!("\n=== Running {} concurrent transfers ===", transfers);
    let start = std::time::Instant::now();
    let handles = requests.into_iter().map(|req| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.transfer_money(&req).await })
    });
    let results = join_all(handles).await;
    let elapsed = start.elapsed();

    let mut completed = 0usize;
    let mut rejected: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut collected_fees = Decimal::ZERO;
    for result in results {
        match result? {
            Ok(id) => {
                completed += 1;
                if let Some(record) = store.get_transfer(id).await? {
                    collected_fees += record.fee_applied.unwrap_or_default();
                }
            }
            Err(e) => *rejected.entry(e.code()).or_default() += 1,
        }
    }

    let after = total_balance(store.as_ref(), &ids).await?;

    println!("Completed:        {}", completed);
    for (code, count) in &rejected {
        println!("Rejected {:<20} {}", code, count);
    }
    println!("Elapsed:          {:?}", elapsed);
    println!("Σ balances before: {}", before);
    println!("Σ balances after:  {}", after);
    println!("Σ fees collected:  {}", collected_fees);

    if after + collected_fees != before {
        warn!(%before, %after, fees = %collected_fees, "Conservation check failed");
        bail!(
            "conservation violated: {} + {} != {}",
            after,
            collected_fees,
            before
        );
    }
    println!("✅ Σ balances + Σ fees == Σ initial balances");
    info!(completed, "Demo finished");
    Ok(())
}

async fn total_balance<A>(admin: &A, ids: &[AccountId]) -> anyhow::Result<Decimal>
where
    A: LedgerAdmin + ?Sized,
{
    let mut total = Decimal::ZERO;
    for id in ids {
        let account = admin
            .get_account(*id)
            .await?
            .with_context(|| format!("account {} vanished", id))?;
        if account.balance() < Decimal::ZERO {
            bail!("account {} went negative: {}", id, account.balance());
        }
        total += account.balance();
    }
    Ok(total)
}
