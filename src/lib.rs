//! Coupon Protocol: signed withdrawal coupons for orderbook vaults
//!
//! An off-chain issuer authorizes a one-time withdrawal of a fixed amount from
//! a specific order's output vault by signing a nine-word context. The
//! settlement contract later re-hashes that context, recovers the signer and
//! pays out if the signer is the one it trusts.
//!
//! - **Types** - `Coupon`, `OrderBinding`, `SignedCoupon` and the JSON claim view
//! - **Hash** - Context encoding, `abi.encodePacked` packing, keccak256 digest
//! - **Signer** - The `CouponSigner` key seam and the `Issuer`
//! - **Codec** - Comma-separated transport format and CLI output formats
//! - **Verification** - Reference verifier with a bounded nonce ledger
//! - **Config** - Environment-driven configuration for the issuing tool
//!
//! ## Context layout
//!
//! | Index | Field               |
//! |-------|---------------------|
//! | 0     | recipient           |
//! | 1     | withdraw_amount     |
//! | 2     | expiry_timestamp    |
//! | 3     | order_hash          |
//! | 4     | order_owner         |
//! | 5     | orderbook_address   |
//! | 6     | claim_token_address |
//! | 7     | output_vault_id     |
//! | 8     | nonce               |

pub mod amount;
pub mod bounded_cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod redact;
pub mod signer;
pub mod types;
pub mod verification;

// Re-export commonly used items at the crate root
pub use bounded_cache::{BoundedNonceCache, NonceLedger};
pub use codec::{decode_context, deserialize, serialize, OutputFormat};
pub use error::{CouponError, VerificationError};
pub use hash::{context_digest, coupon_digest, digest, encode, pack, DigestScheme};
pub use signer::{CouponSigner, IssuedCoupon, Issuer, LocalKeySigner, RetryConfig};
pub use types::{
    ClaimCoupon, Coupon, CouponContext, CouponParams, CouponSignature, OrderBinding, SignedCoupon,
};
pub use verification::Verifier;
