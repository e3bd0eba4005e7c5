//! Authenticity checks for inbound webhook deliveries.
//!
//! Verification is pluggable. [`AcceptAll`] is the default and performs no
//! check; [`HmacSha256Verifier`] implements the storefront's signature scheme
//! (base64 HMAC-SHA256 of the raw body under a shared secret).

use axum::http::{HeaderMap, HeaderName};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use thiserror::Error;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-wc-webhook-signature");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
  #[error("signature header missing")]
  MissingSignature,
  #[error("signature header is not valid base64")]
  MalformedSignature,
  #[error("signature does not match payload")]
  Mismatch,
}

/// Decides whether a delivery really comes from the storefront.
pub trait EventVerifier: Send + Sync {
  fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), VerifyError>;
}

/// Accepts every delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EventVerifier for AcceptAll {
  fn verify(&self, _: &HeaderMap, _: &[u8]) -> Result<(), VerifyError> { Ok(()) }
}

/// Checks `X-WC-Webhook-Signature` against an HMAC-SHA256 of the body.
#[derive(Clone)]
pub struct HmacSha256Verifier {
  keyed: Hmac<Sha256>,
}

impl HmacSha256Verifier {
  pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
    let keyed = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_ref())?;
    Ok(Self { keyed })
  }

  fn mac(&self) -> Hmac<Sha256> { self.keyed.clone() }

  /// Signature value for `body`, as the storefront would send it.
  pub fn sign(&self, body: &[u8]) -> String {
    let mut mac = self.mac();
    mac.update(body);
    B64.encode(mac.finalize().into_bytes())
  }
}

impl EventVerifier for HmacSha256Verifier {
  fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), VerifyError> {
    let provided = headers
      .get(SIGNATURE_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .ok_or(VerifyError::MissingSignature)?;

    let provided = B64
      .decode(provided)
      .map_err(|_| VerifyError::MalformedSignature)?;

    let mut mac = self.mac();
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| VerifyError::Mismatch)
  }
}
