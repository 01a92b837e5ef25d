//! Coupon Signer
//!
//! Issues one signed withdrawal coupon per invocation. The primary artifact
//! (by default the comma-separated transport line) is the first line on stdout;
//! everything human-oriented goes to stderr so the output can be piped.
//!
//! ```text
//! coupon-signer --amount 1.5 --recipient 0xAbC...
//! ```

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use tracing::info;

use coupon_protocol::amount::{format_amount, parse_amount};
use coupon_protocol::config::Config;
use coupon_protocol::hash::{parse_address, DigestScheme};
use coupon_protocol::signer::{unix_now, Issuer, LocalKeySigner, RetryConfig};
use coupon_protocol::types::CouponParams;
use coupon_protocol::OutputFormat;

/// Issue a signed withdrawal coupon.
///
/// The issuer key is read from SIGNER_PRIVATE_KEY. Order binding values fall
/// back to ORDER_HASH, ORDER_OWNER, ORDERBOOK_ADDRESS, TOKEN_ADDRESS and
/// VAULT_ID when the matching flag is absent.
#[derive(Parser, Debug)]
#[command(name = "coupon-signer", version, about, long_about = None)]
struct Args {
    /// Amount in base units, or token units when it contains a decimal point
    #[arg(short, long)]
    amount: String,

    /// Recipient address
    #[arg(short, long)]
    recipient: String,

    /// Expiry in seconds from now [env: EXPIRY_SECONDS, default: 604800]
    #[arg(short, long)]
    expiry_seconds: Option<u64>,

    /// Order hash
    #[arg(long)]
    order_hash: Option<String>,

    /// Order owner address
    #[arg(long)]
    order_owner: Option<String>,

    /// Orderbook address
    #[arg(long)]
    orderbook: Option<String>,

    /// Claim token address
    #[arg(long)]
    token: Option<String>,

    /// Output vault ID
    #[arg(long)]
    vault_id: Option<String>,

    /// raw | eth-signed-message [env: DIGEST_SCHEME]
    #[arg(long)]
    digest_scheme: Option<DigestScheme>,

    /// Token decimals for decimal amounts [env: TOKEN_DECIMALS, default: 18]
    #[arg(long)]
    decimals: Option<u8>,

    /// ui | compact | hex | json [env: OUTPUT, default: ui]
    #[arg(short, long)]
    output: Option<OutputFormat>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        let overrides = [
            (&self.order_hash, &mut config.order_hash),
            (&self.order_owner, &mut config.order_owner),
            (&self.orderbook, &mut config.orderbook_address),
            (&self.token, &mut config.token_address),
            (&self.vault_id, &mut config.vault_id),
        ];
        for (flag, value) in overrides {
            if let Some(flag) = flag {
                *value = flag.clone();
            }
        }

        if let Some(v) = self.expiry_seconds {
            config.expiry_seconds = v;
        }
        if let Some(v) = self.digest_scheme {
            config.digest_scheme = v;
        }
        if let Some(v) = self.decimals {
            config.token_decimals = v;
        }
        if let Some(v) = self.output {
            config.output = v;
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    init_logging();

    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate()?;

    let binding = config.to_binding()?;
    info!(
        order_hash = %binding.order_hash,
        orderbook = %binding.orderbook_address,
        token = %binding.claim_token_address,
        scheme = %config.digest_scheme,
        "Configuration loaded"
    );

    let recipient = parse_address("recipient", &args.recipient).wrap_err("Invalid recipient")?;
    let withdraw_amount =
        parse_amount(&args.amount, config.token_decimals).wrap_err("Invalid amount")?;

    let now = unix_now();
    let expiry = now
        .checked_add(config.expiry_seconds)
        .ok_or_else(|| eyre!("EXPIRY_SECONDS overflows the clock"))?;

    let signer = LocalKeySigner::from_private_key(&config.signer_private_key)?;
    let issuer = Issuer::new(signer)
        .with_scheme(config.digest_scheme)
        .with_retry(RetryConfig::default());

    let params = CouponParams {
        recipient,
        withdraw_amount,
        expiry_timestamp: U256::from(expiry),
    };
    let issued = issuer.issue_at(&params, &binding, now).await?;

    println!("{}", config.output.render(&issued.coupon, &issued.signed)?);

    let expiry_time = i64::try_from(expiry)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| expiry.to_string());

    eprintln!();
    eprintln!("Coupon created successfully!");
    eprintln!("Signer: {}", issued.signed.signer);
    eprintln!("Recipient: {}", issued.coupon.recipient);
    eprintln!(
        "Amount: {} ({} base units)",
        format_amount(issued.coupon.withdraw_amount, config.token_decimals),
        issued.coupon.withdraw_amount
    );
    eprintln!("Expiry: {} ({}s from now)", expiry_time, config.expiry_seconds);
    eprintln!("Nonce: {}", issued.coupon.nonce);

    if config.output == OutputFormat::Ui {
        eprintln!();
        eprintln!("Copy the line above and paste it into the claim page.");
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,coupon_protocol=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
