//! Coupon signing and issuance
//!
//! Signing goes through the [`CouponSigner`] seam so the issuer key can live
//! anywhere: an in-process key loaded from the environment ([`LocalKeySigner`]),
//! a KMS, or a hardware device. The key is only borrowed for the duration of a
//! single signature and is never stored by the [`Issuer`] in shared state.
//!
//! ## Flow
//!
//! 1. Build the [`Coupon`] from caller parameters, the order binding and a fresh nonce
//! 2. Encode and hash it (see [`crate::hash`])
//! 3. Apply the [`DigestScheme`] and sign
//! 4. Return `{signer, signature, context}`; nothing is returned if signing fails

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::CouponError;
use crate::hash::{context_digest, encode, DigestScheme};
use crate::redact::Redacted;
use crate::types::{Coupon, CouponParams, CouponSignature, OrderBinding, SignedCoupon};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Full-width random nonce from the OS RNG.
pub fn generate_nonce() -> U256 {
    U256::from_be_bytes(alloy_primitives::B256::random().0)
}

/// Lay out an `(r, s, y_parity)` triple as `r || s || v` with `v` in {27, 28}.
pub fn signature_bytes(r: U256, s: U256, y_parity: bool) -> CouponSignature {
    let mut bytes = [0u8; 65];
    bytes[0..32].copy_from_slice(&r.to_be_bytes::<32>());
    bytes[32..64].copy_from_slice(&s.to_be_bytes::<32>());
    bytes[64] = if y_parity { 28 } else { 27 };
    CouponSignature::from(bytes)
}

/// Source of issuer signatures.
#[async_trait]
pub trait CouponSigner: Send + Sync {
    /// Address the verifier is expected to trust for this key.
    fn address(&self) -> Address;

    /// Sign a 32-byte hash as-is (no further hashing or prefixing).
    ///
    /// Implementations report an unreachable or refusing key source as
    /// [`CouponError::SigningUnavailable`].
    async fn sign_hash(&self, hash: &B256) -> Result<CouponSignature, CouponError>;
}

/// In-process secp256k1 key.
pub struct LocalKeySigner {
    signer: PrivateKeySigner,
}

impl LocalKeySigner {
    /// Load from a hex private key (with or without 0x prefix).
    pub fn from_private_key(private_key: &Redacted<String>) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .expose()
            .trim()
            .parse()
            .map_err(|e| eyre!("Invalid signer private key: {}", e))?;

        info!(address = %signer.address(), "Issuer key loaded");
        Ok(Self { signer })
    }

    /// Throwaway key, for tests and local tooling.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }
}

#[async_trait]
impl CouponSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<CouponSignature, CouponError> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|e| CouponError::SigningUnavailable(e.to_string()))?;
        Ok(signature_bytes(signature.r(), signature.s(), signature.v()))
    }
}

/// Sign a coupon digest under the given scheme.
pub async fn sign<S>(
    digest: &B256,
    scheme: DigestScheme,
    signer: &S,
) -> Result<CouponSignature, CouponError>
where
    S: CouponSigner + ?Sized,
{
    signer.sign_hash(&scheme.signing_hash(digest)).await
}

/// Retry policy for transient key-source failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given attempt
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff = self
            .initial_backoff
            .as_millis()
            .saturating_mul(2u128.saturating_pow(attempt));
        Duration::from_millis(backoff.min(self.max_backoff.as_millis()) as u64)
    }
}

/// Sign with backoff on [`CouponError::SigningUnavailable`]. Any other error
/// is returned immediately.
pub async fn sign_with_retry<S>(
    digest: &B256,
    scheme: DigestScheme,
    signer: &S,
    config: &RetryConfig,
) -> Result<CouponSignature, CouponError>
where
    S: CouponSigner + ?Sized,
{
    let attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match sign(digest, scheme, signer).await {
            Ok(signature) => return Ok(signature),
            Err(e) if e.is_retryable() => {
                warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %e,
                    "Signing unavailable"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }

        if attempt + 1 < attempts {
            let backoff = config.backoff_for_attempt(attempt);
            debug!(
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Backing off before signing retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CouponError::SigningUnavailable(format!("gave up after {} attempts", attempts))
    }))
}

/// Result of a successful issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedCoupon {
    pub coupon: Coupon,
    pub signed: SignedCoupon,
    /// Unprefixed keccak256 of the packed context
    pub digest: B256,
}

/// Builds and signs coupons for one issuer key.
pub struct Issuer<S> {
    signer: S,
    scheme: DigestScheme,
    retry: RetryConfig,
}

impl<S: CouponSigner> Issuer<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            scheme: DigestScheme::default(),
            retry: RetryConfig::none(),
        }
    }

    pub fn with_scheme(mut self, scheme: DigestScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Address of the issuer key; this is what verifiers must trust.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn scheme(&self) -> DigestScheme {
        self.scheme
    }

    /// Issue a coupon with a fresh nonce.
    pub async fn issue(
        &self,
        params: &CouponParams,
        binding: &OrderBinding,
    ) -> Result<IssuedCoupon, CouponError> {
        self.issue_at(params, binding, unix_now()).await
    }

    /// Issue a coupon, checking expiry against `now` instead of the wall clock.
    ///
    /// The expiry must be after `now` and fit in a `u64` of unix seconds.
    pub async fn issue_at(
        &self,
        params: &CouponParams,
        binding: &OrderBinding,
        now: u64,
    ) -> Result<IssuedCoupon, CouponError> {
        if params.expiry_timestamp <= U256::from(now) {
            return Err(CouponError::ExpiryNotInFuture {
                expiry: params.expiry_timestamp,
                now,
            });
        }
        if params.expiry_timestamp > U256::from(u64::MAX) {
            return Err(CouponError::ExpiryOutOfRange {
                expiry: params.expiry_timestamp,
                max: u64::MAX,
            });
        }

        let coupon = Coupon::new(params, binding, generate_nonce());
        let issued = self.sign_coupon(&coupon).await?;

        info!(
            signer = %issued.signed.signer,
            recipient = %coupon.recipient,
            amount = %coupon.withdraw_amount,
            expiry = %coupon.expiry_timestamp,
            digest = %issued.digest,
            "Coupon issued"
        );
        Ok(issued)
    }

    /// Sign an already assembled coupon, nonce included.
    pub async fn sign_coupon(&self, coupon: &Coupon) -> Result<IssuedCoupon, CouponError> {
        let context = encode(coupon);
        let digest = context_digest(&context);
        let signature = sign_with_retry(&digest, self.scheme, &self.signer, &self.retry).await?;

        debug!(
            nonce = %coupon.nonce,
            scheme = %self.scheme,
            signature = %signature,
            "Coupon signed"
        );

        Ok(IssuedCoupon {
            coupon: *coupon,
            signed: SignedCoupon {
                signer: self.signer.address(),
                signature,
                context,
            },
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Anvil account #0
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    /// Fails with `SigningUnavailable` a fixed number of times, then signs.
    struct FlakySigner {
        inner: LocalKeySigner,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakySigner {
        fn new(failures: u32) -> Self {
            Self {
                inner: LocalKeySigner::random(),
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CouponSigner for FlakySigner {
        fn address(&self) -> Address {
            self.inner.address()
        }

        async fn sign_hash(&self, hash: &B256) -> Result<CouponSignature, CouponError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(CouponError::SigningUnavailable("device busy".into()));
            }
            self.inner.sign_hash(hash).await
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn params(expiry: u64) -> CouponParams {
        CouponParams {
            recipient: Address::repeat_byte(0xaa),
            withdraw_amount: U256::from(1_000_000_000_000_000_000u128),
            expiry_timestamp: U256::from(expiry),
        }
    }

    fn binding() -> OrderBinding {
        OrderBinding {
            order_hash: B256::repeat_byte(0x11),
            order_owner: Address::repeat_byte(0x22),
            orderbook_address: Address::repeat_byte(0x33),
            claim_token_address: Address::repeat_byte(0x44),
            output_vault_id: U256::from(0x55u64),
        }
    }

    #[test]
    fn test_local_signer_address() {
        let signer = LocalKeySigner::from_private_key(&Redacted(TEST_KEY.to_string())).unwrap();
        assert_eq!(signer.address().to_string(), TEST_ADDRESS);

        let unprefixed = Redacted(TEST_KEY.trim_start_matches("0x").to_string());
        let signer = LocalKeySigner::from_private_key(&unprefixed).unwrap();
        assert_eq!(signer.address().to_string(), TEST_ADDRESS);
    }

    #[test]
    fn test_invalid_private_key_does_not_leak() {
        let err = LocalKeySigner::from_private_key(&Redacted("0xnot-a-key".to_string()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Invalid signer private key"));
        assert!(!err.to_string().contains("not-a-key"));
    }

    #[test]
    fn test_signature_bytes_layout() {
        let sig = signature_bytes(U256::from(1u64), U256::from(2u64), true);
        assert_eq!(sig[31], 1);
        assert_eq!(sig[63], 2);
        assert_eq!(sig[64], 28);
        assert_eq!(signature_bytes(U256::ZERO, U256::ZERO, false)[64], 27);
    }

    #[test]
    fn test_nonces_are_unpredictable() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert_ne!(a, U256::ZERO);
    }

    #[test]
    fn test_retry_config_backoff() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3),
        };

        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.backoff_for_attempt(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_signature_recovers_to_issuer() {
        let signer = LocalKeySigner::from_private_key(&Redacted(TEST_KEY.to_string())).unwrap();
        let digest = B256::repeat_byte(0x42);

        for scheme in [DigestScheme::Raw, DigestScheme::EthSignedMessage] {
            let sig = sign(&digest, scheme, &signer).await.unwrap();
            let parsed = alloy::primitives::PrimitiveSignature::new(
                U256::from_be_slice(&sig[0..32]),
                U256::from_be_slice(&sig[32..64]),
                sig[64] == 28,
            );
            let recovered = parsed
                .recover_address_from_prehash(&scheme.signing_hash(&digest))
                .unwrap();
            assert_eq!(recovered, signer.address());
        }
    }

    #[tokio::test]
    async fn test_issue_rejects_past_expiry() {
        let issuer = Issuer::new(LocalKeySigner::random());
        let err = issuer
            .issue_at(&params(1_000), &binding(), 1_000)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CouponError::ExpiryNotInFuture {
                expiry: U256::from(1_000u64),
                now: 1_000
            }
        );
    }

    #[tokio::test]
    async fn test_issue_rejects_implausible_expiry() {
        let issuer = Issuer::new(LocalKeySigner::random());

        let mut far = params(0);
        far.expiry_timestamp = U256::MAX;
        assert!(matches!(
            issuer.issue_at(&far, &binding(), 1_000).await,
            Err(CouponError::ExpiryOutOfRange { .. })
        ));

        far.expiry_timestamp = U256::from(u64::MAX) + U256::from(1u64);
        assert!(matches!(
            issuer.issue_at(&far, &binding(), 1_000).await,
            Err(CouponError::ExpiryOutOfRange { .. })
        ));

        far.expiry_timestamp = U256::from(u64::MAX);
        assert!(issuer.issue_at(&far, &binding(), 1_000).await.is_ok());
    }

    #[tokio::test]
    async fn test_issue_fills_context_and_signer() {
        let issuer = Issuer::new(LocalKeySigner::random());
        let issued = issuer
            .issue_at(&params(2_000), &binding(), 1_000)
            .await
            .unwrap();

        assert_eq!(issued.signed.signer, issuer.signer_address());
        assert_eq!(issued.signed.context, encode(&issued.coupon));
        assert_eq!(issued.digest, context_digest(&issued.signed.context));
        assert_eq!(issued.coupon.binding(), binding());
    }

    #[tokio::test]
    async fn test_identical_requests_get_distinct_nonces() {
        let issuer = Issuer::new(LocalKeySigner::random());
        let a = issuer.issue_at(&params(2_000), &binding(), 1_000).await.unwrap();
        let b = issuer.issue_at(&params(2_000), &binding(), 1_000).await.unwrap();

        assert_ne!(a.coupon.nonce, b.coupon.nonce);
        assert_ne!(a.digest, b.digest);
        assert_ne!(a.signed.signature, b.signed.signature);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let issuer = Issuer::new(FlakySigner::new(2)).with_retry(fast_retry(3));
        let issued = issuer.issue_at(&params(2_000), &binding(), 1_000).await;

        assert!(issued.is_ok());
        assert_eq!(issuer.signer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_signing_failure_aborts_issuance() {
        let issuer = Issuer::new(FlakySigner::new(10)).with_retry(fast_retry(2));
        let err = issuer
            .issue_at(&params(2_000), &binding(), 1_000)
            .await
            .unwrap_err();

        assert!(matches!(err, CouponError::SigningUnavailable(_)));
        assert_eq!(issuer.signer.calls.load(Ordering::SeqCst), 2);
    }
}
