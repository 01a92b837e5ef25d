//! Coupon value types
//!
//! A [`Coupon`] is the unsigned authorization: nine fields in a fixed order that
//! is part of the wire format. A [`SignedCoupon`] is the signed-context tuple
//! `{signer, signature, context}` handed to the settlement contract.

use alloy::primitives::{Address, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of words in a coupon context.
pub const CONTEXT_LEN: usize = 9;

/// Canonical context, one 256-bit word per field.
pub type CouponContext = [U256; CONTEXT_LEN];

/// 65-byte ECDSA signature laid out as `r || s || v`.
pub type CouponSignature = FixedBytes<65>;

// Context positions. Changing any of these invalidates every issued coupon.
pub const RECIPIENT: usize = 0;
pub const WITHDRAW_AMOUNT: usize = 1;
pub const EXPIRY_TIMESTAMP: usize = 2;
pub const ORDER_HASH: usize = 3;
pub const ORDER_OWNER: usize = 4;
pub const ORDERBOOK_ADDRESS: usize = 5;
pub const CLAIM_TOKEN_ADDRESS: usize = 6;
pub const OUTPUT_VAULT_ID: usize = 7;
pub const NONCE: usize = 8;

/// Field names by context position, used in error messages and logs.
pub const FIELD_NAMES: [&str; CONTEXT_LEN] = [
    "recipient",
    "withdraw_amount",
    "expiry_timestamp",
    "order_hash",
    "order_owner",
    "orderbook_address",
    "claim_token_address",
    "output_vault_id",
    "nonce",
];

/// Unsigned withdrawal authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coupon {
    /// Who may withdraw
    pub recipient: Address,
    /// Amount authorized, in token base units
    pub withdraw_amount: U256,
    /// Unix seconds after which the coupon is invalid
    pub expiry_timestamp: U256,
    /// Binds the coupon to one order
    pub order_hash: B256,
    /// Binds the coupon to the order's owner
    pub order_owner: Address,
    /// Binds the coupon to one settlement contract instance
    pub orderbook_address: Address,
    /// Binds the coupon to one token
    pub claim_token_address: Address,
    /// Binds the coupon to one vault
    pub output_vault_id: U256,
    /// Unpredictable replay-protection salt
    pub nonce: U256,
}

impl Coupon {
    /// Assemble a coupon from caller parameters, an order binding and a nonce.
    pub fn new(params: &CouponParams, binding: &OrderBinding, nonce: U256) -> Self {
        Self {
            recipient: params.recipient,
            withdraw_amount: params.withdraw_amount,
            expiry_timestamp: params.expiry_timestamp,
            order_hash: binding.order_hash,
            order_owner: binding.order_owner,
            orderbook_address: binding.orderbook_address,
            claim_token_address: binding.claim_token_address,
            output_vault_id: binding.output_vault_id,
            nonce,
        }
    }

    /// The order/vault/token fields this coupon is bound to.
    pub fn binding(&self) -> OrderBinding {
        OrderBinding {
            order_hash: self.order_hash,
            order_owner: self.order_owner,
            orderbook_address: self.orderbook_address,
            claim_token_address: self.claim_token_address,
            output_vault_id: self.output_vault_id,
        }
    }
}

/// The order a coupon withdraws from. Issuers take it from configuration;
/// verifiers take it from the call site requesting the withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderBinding {
    pub order_hash: B256,
    pub order_owner: Address,
    pub orderbook_address: Address,
    pub claim_token_address: Address,
    pub output_vault_id: U256,
}

/// Caller-supplied part of an issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponParams {
    pub recipient: Address,
    pub withdraw_amount: U256,
    pub expiry_timestamp: U256,
}

/// Signed context consumed by the settlement contract.
///
/// `signer` is informational only: verifiers must compare the recovered
/// address against their own trusted issuer, never against this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignedCoupon {
    pub signer: Address,
    pub signature: CouponSignature,
    pub context: CouponContext,
}

impl fmt::Display for SignedCoupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::codec::serialize(self))
    }
}

/// JSON view of the signed context, words rendered as 0x-prefixed 64-hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedContextJson {
    pub signer: String,
    pub signature: String,
    pub context: Vec<String>,
}

/// Coupon with human-readable metadata, emitted by the `json` output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCoupon {
    pub recipient: String,
    /// Amount in base units
    pub amount: String,
    /// Expiry in unix seconds
    pub expiry: String,
    pub nonce: String,
    pub signed_context: SignedContextJson,
}

impl ClaimCoupon {
    pub fn from_signed(coupon: &Coupon, signed: &SignedCoupon) -> Self {
        Self {
            recipient: coupon.recipient.to_string(),
            amount: coupon.withdraw_amount.to_string(),
            expiry: coupon.expiry_timestamp.to_string(),
            nonce: coupon.nonce.to_string(),
            signed_context: SignedContextJson {
                signer: signed.signer.to_string(),
                signature: signed.signature.to_string(),
                context: signed
                    .context
                    .iter()
                    .map(|word| B256::from(word.to_be_bytes::<32>()).to_string())
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn binding() -> OrderBinding {
        OrderBinding {
            order_hash: B256::repeat_byte(0x5e),
            order_owner: address!("E3E064e3C2EEf66cb93dA8D8114F5084E92F48D6"),
            orderbook_address: address!("2f209e5b67A33B8fE96E28f24628dF6Da301c8eB"),
            claim_token_address: address!("eaC8eEEE9f84F3E3F592e9D8604100eA1b788749"),
            output_vault_id: U256::from(7u64),
        }
    }

    #[test]
    fn test_coupon_new_copies_binding() {
        let params = CouponParams {
            recipient: Address::repeat_byte(0xaa),
            withdraw_amount: U256::from(1000u64),
            expiry_timestamp: U256::from(2687375409u64),
        };
        let coupon = Coupon::new(&params, &binding(), U256::from(42u64));

        assert_eq!(coupon.recipient, params.recipient);
        assert_eq!(coupon.nonce, U256::from(42u64));
        assert_eq!(coupon.binding(), binding());
    }

    #[test]
    fn test_field_names_match_positions() {
        assert_eq!(FIELD_NAMES[RECIPIENT], "recipient");
        assert_eq!(FIELD_NAMES[ORDER_OWNER], "order_owner");
        assert_eq!(FIELD_NAMES[NONCE], "nonce");
        assert_eq!(FIELD_NAMES.len(), CONTEXT_LEN);
    }

    #[test]
    fn test_claim_coupon_context_is_padded_hex() {
        let params = CouponParams {
            recipient: Address::repeat_byte(0xaa),
            withdraw_amount: U256::from(1u64),
            expiry_timestamp: U256::from(2u64),
        };
        let coupon = Coupon::new(&params, &binding(), U256::from(3u64));
        let signed = SignedCoupon {
            signer: Address::ZERO,
            signature: CouponSignature::ZERO,
            context: crate::hash::encode(&coupon),
        };

        let view = ClaimCoupon::from_signed(&coupon, &signed);
        assert_eq!(view.amount, "1");
        assert_eq!(view.signed_context.context.len(), CONTEXT_LEN);
        assert_eq!(
            view.signed_context.context[WITHDRAW_AMOUNT],
            format!("0x{}1", "0".repeat(63))
        );

        let json = serde_json::to_string(&view).unwrap();
        let back: ClaimCoupon = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }
}
