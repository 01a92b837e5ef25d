//! Coupon signer configuration
//!
//! Values come from the process environment (after loading `.env` if present).
//! The issuing CLI overrides individual values with its flags before calling
//! [`Config::validate`].

use eyre::{eyre, Result, WrapErr};
use std::env;

use crate::amount::{DEFAULT_TOKEN_DECIMALS, MAX_DECIMALS};
use crate::codec::OutputFormat;
use crate::hash::{parse_address, parse_b256, parse_word, DigestScheme};
use crate::redact::Redacted;
use crate::types::OrderBinding;

/// One week
pub const DEFAULT_EXPIRY_SECONDS: u64 = 604_800;

/// Coupon signer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Issuer private key (hex, with or without 0x)
    pub signer_private_key: Redacted<String>,

    /// Hash of the order the coupons are redeemed against
    pub order_hash: String,
    /// Owner of that order
    pub order_owner: String,
    /// Orderbook contract address
    pub orderbook_address: String,
    /// Claim token (the order's output token)
    pub token_address: String,
    /// Output vault ID
    pub vault_id: String,

    /// Seconds from issuance until a coupon expires
    pub expiry_seconds: u64,
    /// Hash signed by the issuer key
    pub digest_scheme: DigestScheme,
    /// Decimals used when the amount is given in token units
    pub token_decimals: u8,
    /// How the issued coupon is printed
    pub output: OutputFormat,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        Self::from_env()
    }

    /// Load from the process environment only, without reading `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Required values that are
    /// missing are left empty for [`Config::validate`] to report, since the CLI
    /// may still supply them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();

        Ok(Self {
            signer_private_key: Redacted(var("SIGNER_PRIVATE_KEY")),

            order_hash: var("ORDER_HASH"),
            order_owner: var("ORDER_OWNER"),
            orderbook_address: var("ORDERBOOK_ADDRESS"),
            token_address: var("TOKEN_ADDRESS"),
            vault_id: var("VAULT_ID"),

            expiry_seconds: match lookup("EXPIRY_SECONDS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| eyre!("Invalid EXPIRY_SECONDS: {}", v))?,
                None => DEFAULT_EXPIRY_SECONDS,
            },
            digest_scheme: match lookup("DIGEST_SCHEME") {
                Some(v) => v.parse().map_err(|e: String| eyre!("Invalid DIGEST_SCHEME: {}", e))?,
                None => DigestScheme::default(),
            },
            token_decimals: match lookup("TOKEN_DECIMALS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| eyre!("Invalid TOKEN_DECIMALS: {}", v))?,
                None => DEFAULT_TOKEN_DECIMALS,
            },
            output: match lookup("OUTPUT") {
                Some(v) => v.parse().map_err(|e: String| eyre!("Invalid OUTPUT: {}", e))?,
                None => OutputFormat::default(),
            },
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let key = self.signer_private_key.expose().trim();
        if key.is_empty() {
            return Err(eyre!("SIGNER_PRIVATE_KEY is required"));
        }
        let key_hex = key.strip_prefix("0x").unwrap_or(key);
        if key_hex.len() != 64 || !key_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(eyre!("SIGNER_PRIVATE_KEY must be 64 hex chars (optionally 0x-prefixed)"));
        }

        for (name, value) in [
            ("ORDER_HASH", &self.order_hash),
            ("ORDER_OWNER", &self.order_owner),
            ("ORDERBOOK_ADDRESS", &self.orderbook_address),
            ("TOKEN_ADDRESS", &self.token_address),
            ("VAULT_ID", &self.vault_id),
        ] {
            if value.trim().is_empty() {
                return Err(eyre!(
                    "{} is required (set it in the environment or pass the matching flag)",
                    name
                ));
            }
        }
        self.to_binding()?;

        if self.expiry_seconds == 0 {
            return Err(eyre!("EXPIRY_SECONDS must be greater than zero"));
        }

        if self.token_decimals > MAX_DECIMALS {
            return Err(eyre!("TOKEN_DECIMALS cannot exceed {}", MAX_DECIMALS));
        }

        Ok(())
    }

    /// Parse the order binding every issued coupon is tied to.
    pub fn to_binding(&self) -> Result<OrderBinding> {
        Ok(OrderBinding {
            order_hash: parse_b256("order_hash", &self.order_hash).wrap_err("Invalid ORDER_HASH")?,
            order_owner: parse_address("order_owner", &self.order_owner)
                .wrap_err("Invalid ORDER_OWNER")?,
            orderbook_address: parse_address("orderbook_address", &self.orderbook_address)
                .wrap_err("Invalid ORDERBOOK_ADDRESS")?,
            claim_token_address: parse_address("claim_token_address", &self.token_address)
                .wrap_err("Invalid TOKEN_ADDRESS")?,
            output_vault_id: parse_word("output_vault_id", &self.vault_id)
                .wrap_err("Invalid VAULT_ID")?,
        })
    }
}
