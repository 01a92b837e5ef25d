//! Reference coupon verification
//!
//! This mirrors what the settlement contract does with a signed context, so
//! issued coupons can be checked off-chain before they are handed out and so
//! tests can exercise the full issue → transmit → verify path.
//!
//! # Verification Flow
//!
//! 1. Recompute the digest from the raw context
//! 2. Recover the signing address and compare it with the configured trusted
//!    issuer. The coupon's own `signer` field is ignored.
//! 3. Reject if the expiry has passed
//! 4. Reject if order hash, order owner, orderbook, token or vault differ from
//!    the call site
//! 5. Optionally record the nonce in a [`NonceLedger`] and reject replays

use alloy::primitives::{uint, Address, PrimitiveSignature, B256, U256};
use tracing::{debug, info, warn};

use crate::bounded_cache::NonceLedger;
use crate::codec::decode_context;
use crate::error::VerificationError;
use crate::hash::{context_digest, DigestScheme};
use crate::types::{Coupon, CouponSignature, OrderBinding, SignedCoupon};

/// Half the secp256k1 group order. Signatures with a larger `s` are the
/// malleated twin of a low-`s` signature and are rejected, as `ECDSA.tryRecover`
/// does on chain.
pub const SECP256K1N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Recover the address that produced `signature` over `hash`.
///
/// Accepts `v` in {0, 1, 27, 28} and low `s` only.
pub fn recover_signer(
    signature: &CouponSignature,
    hash: &B256,
) -> Result<Address, VerificationError> {
    let y_parity = match signature[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => {
            return Err(VerificationError::MalformedSignature(format!(
                "unsupported recovery id {}",
                v
            )))
        }
    };

    let s = U256::from_be_slice(&signature[32..64]);
    if s > SECP256K1N_HALF {
        return Err(VerificationError::MalformedSignature(
            "s is in the upper half of the curve order".to_string(),
        ));
    }

    let parsed = PrimitiveSignature::new(U256::from_be_slice(&signature[0..32]), s, y_parity);
    parsed
        .recover_address_from_prehash(hash)
        .map_err(|e| VerificationError::MalformedSignature(e.to_string()))
}

/// Compare each bound field against the call site.
pub fn check_binding(coupon: &Coupon, call_site: &OrderBinding) -> Result<(), VerificationError> {
    let bound = coupon.binding();
    let checks: [(&'static str, bool); 5] = [
        ("order_hash", bound.order_hash == call_site.order_hash),
        ("order_owner", bound.order_owner == call_site.order_owner),
        ("orderbook_address", bound.orderbook_address == call_site.orderbook_address),
        (
            "claim_token_address",
            bound.claim_token_address == call_site.claim_token_address,
        ),
        ("output_vault_id", bound.output_vault_id == call_site.output_vault_id),
    ];

    match checks.iter().find(|(_, ok)| !ok) {
        Some(&(field, _)) => Err(VerificationError::BindingMismatch { field }),
        None => Ok(()),
    }
}

/// Verifier configured with the one issuer address it trusts.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    trusted_signer: Address,
    scheme: DigestScheme,
}

impl Verifier {
    pub fn new(trusted_signer: Address, scheme: DigestScheme) -> Self {
        Self {
            trusted_signer,
            scheme,
        }
    }

    pub fn trusted_signer(&self) -> Address {
        self.trusted_signer
    }

    /// Check signature, expiry and binding. Returns the decoded coupon.
    ///
    /// Does not track nonce consumption; see [`Verifier::verify_and_consume`].
    pub fn verify(
        &self,
        signed: &SignedCoupon,
        call_site: &OrderBinding,
        now: u64,
    ) -> Result<Coupon, VerificationError> {
        let digest = context_digest(&signed.context);
        let recovered = recover_signer(&signed.signature, &self.scheme.signing_hash(&digest))?;

        if recovered != self.trusted_signer {
            warn!(
                digest = %digest,
                recovered = %recovered,
                claimed = %signed.signer,
                trusted = %self.trusted_signer,
                "Coupon not signed by trusted issuer"
            );
            return Err(VerificationError::UntrustedSigner {
                expected: self.trusted_signer,
                recovered,
            });
        }

        let coupon = decode_context(&signed.context)?;

        if coupon.expiry_timestamp <= U256::from(now) {
            debug!(
                digest = %digest,
                expiry = %coupon.expiry_timestamp,
                now,
                "Coupon expired"
            );
            return Err(VerificationError::Expired {
                expiry: coupon.expiry_timestamp,
                now,
            });
        }

        check_binding(&coupon, call_site).inspect_err(|e| {
            warn!(digest = %digest, error = %e, "Coupon bound to a different order");
        })?;

        info!(
            digest = %digest,
            recipient = %coupon.recipient,
            amount = %coupon.withdraw_amount,
            "Coupon verified"
        );
        Ok(coupon)
    }

    /// [`Verifier::verify`], then spend the nonce in `ledger`.
    ///
    /// The nonce is only recorded once every other check has passed.
    pub fn verify_and_consume<L>(
        &self,
        signed: &SignedCoupon,
        call_site: &OrderBinding,
        now: u64,
        ledger: &mut L,
    ) -> Result<Coupon, VerificationError>
    where
        L: NonceLedger + ?Sized,
    {
        let coupon = self.verify(signed, call_site, now)?;
        ledger.consume(coupon.nonce, coupon.expiry_timestamp, now)?;
        Ok(coupon)
    }
}
