//! Coupon encoding and digest computation
//!
//! This module maps a [`Coupon`] to its canonical nine-word context and hashes
//! it exactly the way the settlement contract does:
//!
//! ```solidity
//! keccak256(abi.encodePacked(uint256[9] context))
//! ```
//!
//! Every word is packed as a 32-byte big-endian integer, so the digest input is
//! always 288 bytes with no delimiters or length prefixes.

use alloy::primitives::{Address, B256, U256};
use std::fmt;
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

use crate::error::CouponError;
use crate::types::{
    Coupon, CouponContext, CLAIM_TOKEN_ADDRESS, CONTEXT_LEN, EXPIRY_TIMESTAMP, FIELD_NAMES, NONCE,
    ORDERBOOK_ADDRESS, ORDER_HASH, ORDER_OWNER, OUTPUT_VAULT_ID, RECIPIENT, WITHDRAW_AMOUNT,
};

/// Size of the packed digest input: nine 32-byte words.
pub const PACKED_LEN: usize = CONTEXT_LEN * 32;

/// Prefix applied by `toEthSignedMessageHash` to a 32-byte payload.
const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Widen a 20-byte address to a 256-bit word (left-padded with zeros).
pub fn address_to_word(addr: Address) -> U256 {
    let mut padded = [0u8; 32];
    padded[12..].copy_from_slice(addr.as_slice());
    U256::from_be_bytes(padded)
}

/// Narrow a 256-bit word back to an address.
///
/// Fails with [`CouponError::InvalidAddress`] when any of the upper 96 bits is set.
pub fn word_to_address(field: &'static str, word: U256) -> Result<Address, CouponError> {
    if word.bit_len() > 160 {
        return Err(CouponError::InvalidAddress { field });
    }
    let bytes = word.to_be_bytes::<32>();
    Ok(Address::from_slice(&bytes[12..]))
}

/// Map a coupon to its canonical context in the fixed field order.
pub fn encode(coupon: &Coupon) -> CouponContext {
    let mut context = [U256::ZERO; CONTEXT_LEN];
    context[RECIPIENT] = address_to_word(coupon.recipient);
    context[WITHDRAW_AMOUNT] = coupon.withdraw_amount;
    context[EXPIRY_TIMESTAMP] = coupon.expiry_timestamp;
    context[ORDER_HASH] = U256::from_be_bytes(coupon.order_hash.0);
    context[ORDER_OWNER] = address_to_word(coupon.order_owner);
    context[ORDERBOOK_ADDRESS] = address_to_word(coupon.orderbook_address);
    context[CLAIM_TOKEN_ADDRESS] = address_to_word(coupon.claim_token_address);
    context[OUTPUT_VAULT_ID] = coupon.output_vault_id;
    context[NONCE] = coupon.nonce;
    context
}

/// Pack a context as `abi.encodePacked(uint256[9])`.
pub fn pack(context: &CouponContext) -> [u8; PACKED_LEN] {
    let mut data = [0u8; PACKED_LEN];
    for (i, word) in context.iter().enumerate() {
        data[i * 32..(i + 1) * 32].copy_from_slice(&word.to_be_bytes::<32>());
    }
    data
}

/// Single keccak256 pass over packed bytes.
pub fn digest(packed: &[u8]) -> B256 {
    B256::from(keccak256(packed))
}

/// Digest of a raw context, as a verifier recomputes it.
pub fn context_digest(context: &CouponContext) -> B256 {
    digest(&pack(context))
}

/// Digest of a semantic coupon.
pub fn coupon_digest(coupon: &Coupon) -> B256 {
    context_digest(&encode(coupon))
}

/// What exactly gets handed to ECDSA.
///
/// Issuer and verifier must agree on this. The settlement contract recovers
/// against the EIP-191 prefixed hash, so that is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestScheme {
    /// Sign the coupon digest directly.
    Raw,
    /// Sign `keccak256("\x19Ethereum Signed Message:\n32" || digest)`.
    #[default]
    EthSignedMessage,
}

impl DigestScheme {
    /// The 32-byte hash the signature is produced over.
    pub fn signing_hash(&self, digest: &B256) -> B256 {
        match self {
            DigestScheme::Raw => *digest,
            DigestScheme::EthSignedMessage => {
                let mut data = [0u8; ETH_SIGNED_MESSAGE_PREFIX.len() + 32];
                data[..ETH_SIGNED_MESSAGE_PREFIX.len()].copy_from_slice(ETH_SIGNED_MESSAGE_PREFIX);
                data[ETH_SIGNED_MESSAGE_PREFIX.len()..].copy_from_slice(digest.as_slice());
                B256::from(keccak256(&data))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestScheme::Raw => "raw",
            DigestScheme::EthSignedMessage => "eth-signed-message",
        }
    }
}

impl fmt::Display for DigestScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(DigestScheme::Raw),
            "eth-signed-message" | "eip191" => Ok(DigestScheme::EthSignedMessage),
            other => Err(format!(
                "unknown digest scheme '{}', expected 'raw' or 'eth-signed-message'",
                other
            )),
        }
    }
}

// ============================================================================
// Textual field parsing
// ============================================================================

/// Parse a 256-bit word from decimal or `0x`-prefixed hex.
///
/// Well-formed numbers wider than 256 bits fail with [`CouponError::FieldOverflow`].
pub fn parse_word(field: &'static str, s: &str) -> Result<U256, CouponError> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    if digits.is_empty() {
        return Err(CouponError::InvalidField {
            field,
            reason: "empty value".to_string(),
        });
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_digit(radix)) {
        return Err(CouponError::InvalidField {
            field,
            reason: format!("unexpected character '{}'", bad),
        });
    }

    // Digits are already validated, so the only remaining failure is width.
    U256::from_str_radix(digits, radix as u64).map_err(|_| CouponError::FieldOverflow { field })
}

/// The hex digits of `s` if it is exactly `len` of them, `0x` optional.
fn hex_digits(s: &str, len: usize) -> Option<&str> {
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    (hex.len() == len && hex.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hex)
}

/// Parse an address from 20-byte hex or from a 256-bit word holding one.
///
/// Forty hex characters are always an address, with or without `0x`.
/// Anything else is read as a word by [`parse_word`] and must fit in 160 bits.
pub fn parse_address(field: &'static str, s: &str) -> Result<Address, CouponError> {
    let s = s.trim();
    if let Some(hex) = hex_digits(s, 40) {
        return Address::from_str(hex).map_err(|e| CouponError::InvalidField {
            field,
            reason: e.to_string(),
        });
    }
    word_to_address(field, parse_word(field, s)?)
}

/// Parse a 32-byte value (order hash) from hex or a word.
///
/// Sixty-four hex characters are always raw bytes, with or without `0x`.
pub fn parse_b256(field: &'static str, s: &str) -> Result<B256, CouponError> {
    let s = s.trim();
    if let Some(hex) = hex_digits(s, 64) {
        return B256::from_str(hex).map_err(|e| CouponError::InvalidField {
            field,
            reason: e.to_string(),
        });
    }
    Ok(B256::from(parse_word(field, s)?.to_be_bytes::<32>()))
}

/// Name of the field at a context position.
pub fn field_name(index: usize) -> &'static str {
    FIELD_NAMES.get(index).copied().unwrap_or("unknown")
}
