//! Error types for coupon encoding, issuance, transport and verification

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Errors raised while building, signing or decoding a coupon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// A logical field does not fit in a 256-bit word.
    #[error("field `{field}` does not fit in 256 bits")]
    FieldOverflow { field: &'static str },

    /// An address-typed field has non-zero bits above the 160-bit address space.
    #[error("field `{field}` is not a valid 160-bit address")]
    InvalidAddress { field: &'static str },

    /// A textual field could not be parsed at all.
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The key source could not produce a signature. Transient; the caller may retry.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),

    /// A serialized coupon or raw context could not be decoded.
    #[error("malformed coupon: {0}")]
    MalformedCoupon(String),

    /// Issuance was asked for a coupon that is already expired.
    #[error("expiry {expiry} is not in the future (now {now})")]
    ExpiryNotInFuture { expiry: U256, now: u64 },

    /// Issuance was asked for an expiry beyond any representable unix time.
    #[error("expiry {expiry} is beyond the largest unix timestamp ({max})")]
    ExpiryOutOfRange { expiry: U256, max: u64 },

    /// A human-entered amount could not be converted to base units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl CouponError {
    /// Only key-source failures are worth retrying; everything else is a caller bug.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CouponError::SigningUnavailable(_))
    }
}

/// Reasons a verifier rejects a signed coupon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("signature is malformed: {0}")]
    MalformedSignature(String),

    #[error("signature recovers to {recovered}, expected trusted issuer {expected}")]
    UntrustedSigner { expected: Address, recovered: Address },

    #[error("coupon expired at {expiry} (now {now})")]
    Expired { expiry: U256, now: u64 },

    #[error("coupon `{field}` does not match the withdrawal call site")]
    BindingMismatch { field: &'static str },

    #[error("nonce {nonce} has already been consumed")]
    NonceReplayed { nonce: U256 },

    #[error("nonce ledger is full ({capacity} unexpired entries)")]
    LedgerFull { capacity: usize },

    #[error(transparent)]
    Coupon(#[from] CouponError),
}
