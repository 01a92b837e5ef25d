//! Transport codec for signed coupons
//!
//! ## Wire format
//!
//! ```text
//! signer,signature,c0,c1,c2,c3,c4,c5,c6,c7,c8
//! ```
//!
//! - `signer`: checksummed 0x address
//! - `signature`: 0x-prefixed hex of the 65-byte `r || s || v`
//! - `c0..c8`: context words as base-10 integers
//!
//! No field can contain a comma, so there is no escaping.

use alloy::primitives::{Address, B256, U256};
use std::str::FromStr;

use crate::error::CouponError;
use crate::hash::{field_name, word_to_address};
use crate::types::{
    ClaimCoupon, Coupon, CouponContext, CouponSignature, SignedCoupon, CLAIM_TOKEN_ADDRESS,
    CONTEXT_LEN, EXPIRY_TIMESTAMP, NONCE, ORDERBOOK_ADDRESS, ORDER_HASH, ORDER_OWNER,
    OUTPUT_VAULT_ID, RECIPIENT, WITHDRAW_AMOUNT,
};

/// Number of comma-separated fields in a serialized coupon.
pub const SERIALIZED_FIELDS: usize = 2 + CONTEXT_LEN;

/// Render a signed coupon in the transport format.
pub fn serialize(signed: &SignedCoupon) -> String {
    let mut out = format!("{},{}", signed.signer, signed.signature);
    for word in &signed.context {
        out.push(',');
        out.push_str(&word.to_string());
    }
    out
}

/// Parse the transport format back into a signed coupon.
///
/// Surrounding whitespace (a trailing newline from a paste, say) is ignored;
/// whitespace inside a field is not.
pub fn deserialize(s: &str) -> Result<SignedCoupon, CouponError> {
    let fields: Vec<&str> = s.trim().split(',').collect();
    if fields.len() != SERIALIZED_FIELDS {
        return Err(CouponError::MalformedCoupon(format!(
            "expected {} comma-separated fields, got {}",
            SERIALIZED_FIELDS,
            fields.len()
        )));
    }

    let signer = Address::from_str(fields[0])
        .map_err(|e| CouponError::MalformedCoupon(format!("invalid signer: {}", e)))?;
    let signature = CouponSignature::from_str(fields[1])
        .map_err(|e| CouponError::MalformedCoupon(format!("invalid signature: {}", e)))?;

    let mut context = [U256::ZERO; CONTEXT_LEN];
    for (i, raw) in fields[2..].iter().enumerate() {
        context[i] = parse_decimal_word(raw).ok_or_else(|| {
            CouponError::MalformedCoupon(format!(
                "context[{}] ({}) is not a 256-bit decimal integer",
                i,
                field_name(i)
            ))
        })?;
    }

    Ok(SignedCoupon {
        signer,
        signature,
        context,
    })
}

fn parse_decimal_word(raw: &str) -> Option<U256> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

/// Reconstruct the semantic coupon from a raw context.
///
/// Address positions must fit in 160 bits; anything wider is rejected rather
/// than truncated.
pub fn decode_context(context: &CouponContext) -> Result<Coupon, CouponError> {
    let address_at = |index: usize| {
        word_to_address(field_name(index), context[index]).map_err(|_| {
            CouponError::MalformedCoupon(format!(
                "context[{}] ({}) is wider than an address",
                index,
                field_name(index)
            ))
        })
    };

    Ok(Coupon {
        recipient: address_at(RECIPIENT)?,
        withdraw_amount: context[WITHDRAW_AMOUNT],
        expiry_timestamp: context[EXPIRY_TIMESTAMP],
        order_hash: context[ORDER_HASH].to_be_bytes::<32>().into(),
        order_owner: address_at(ORDER_OWNER)?,
        orderbook_address: address_at(ORDERBOOK_ADDRESS)?,
        claim_token_address: address_at(CLAIM_TOKEN_ADDRESS)?,
        output_vault_id: context[OUTPUT_VAULT_ID],
        nonce: context[NONCE],
    })
}

// ============================================================================
// Output formats for the issuing tool
// ============================================================================

/// How an issued coupon is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The transport line, ready to paste into the claim page
    #[default]
    Ui,
    /// `key=value` lines
    Compact,
    /// Signature only
    Hex,
    /// Pretty-printed [`ClaimCoupon`]
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "ui" => Ok(OutputFormat::Ui),
            "compact" => Ok(OutputFormat::Compact),
            "hex" => Ok(OutputFormat::Hex),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}', expected ui, compact, hex or json",
                other
            )),
        }
    }
}

impl OutputFormat {
    /// Render an issued coupon. The first line is always the primary artifact.
    pub fn render(
        &self,
        coupon: &Coupon,
        signed: &SignedCoupon,
    ) -> Result<String, serde_json::Error> {
        let out = match self {
            OutputFormat::Ui => serialize(signed),
            OutputFormat::Hex => signed.signature.to_string(),
            OutputFormat::Compact => {
                let mut lines = vec![
                    format!("signer={}", signed.signer),
                    format!("signature={}", signed.signature),
                ];
                lines.extend(signed.context.iter().enumerate().map(|(i, word)| {
                    format!("context[{}]={}", i, B256::from(word.to_be_bytes::<32>()))
                }));
                lines.join("\n")
            }
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ClaimCoupon::from_signed(coupon, signed))?
            }
        };
        Ok(out)
    }
}
