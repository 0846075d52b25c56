use hmac::{Hmac, Mac};
use lgtm_core::{LgtmError, ServerConfig};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying GitHub's HMAC-SHA256 signature of the delivery body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

fn mac_for(secret: &str, body: &[u8]) -> Result<HmacSha256, LgtmError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LgtmError::Webhook(format!("invalid webhook secret: {e}")))?;
    mac.update(body);
    Ok(mac)
}

/// `sha256=<hex>` signature of `body`, as GitHub sends it.
///
/// # Errors
///
/// Returns [`LgtmError::Webhook`] if the MAC cannot be keyed.
///
/// # Examples
///
/// ```
/// use lgtm_server::signature::compute_signature;
///
/// let sig = compute_signature("It's a Secret to Everybody", b"Hello, World!").unwrap();
/// assert_eq!(
///     sig,
///     "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
/// );
/// ```
pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String, LgtmError> {
    let digest = mac_for(secret, body)?.finalize().into_bytes();
    Ok(format!("{SIGNATURE_PREFIX}{digest:x}"))
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Check `header` against the HMAC-SHA256 of the raw `body`.
///
/// The comparison runs in constant time.
///
/// # Errors
///
/// Returns [`LgtmError::Webhook`] if the header is missing, malformed or does
/// not match.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<(), LgtmError> {
    let header =
        header.ok_or_else(|| LgtmError::Webhook(format!("missing {SIGNATURE_HEADER} header")))?;
    let expected = header
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(decode_hex)
        .ok_or_else(|| LgtmError::Webhook("malformed webhook signature".into()))?;

    mac_for(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| LgtmError::Webhook("Invalid webhook signature".into()))
}

/// Apply the configured signature policy to one delivery.
///
/// Verification is skipped when disabled. When enabled without a secret the
/// delivery is accepted with a warning.
///
/// # Errors
///
/// Returns [`LgtmError::Webhook`] when verification is enabled and fails.
pub fn check_delivery(
    config: &ServerConfig,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), LgtmError> {
    if !config.verify_signatures {
        return Ok(());
    }
    match config.signing_secret() {
        Some(secret) => verify_signature(secret, body, header),
        None => {
            warn!("webhook secret not configured, skipping signature verification");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret";
    const BODY: &[u8] = br#"{"action":"opened"}"#;

    fn enforcing(secret: Option<&str>) -> ServerConfig {
        ServerConfig {
            webhook_secret: secret.map(str::to_string),
            verify_signatures: true,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn signature_is_prefixed_lowercase_hex() {
        let sig = compute_signature("It's a Secret to Everybody", b"Hello, World!").unwrap();
        assert_eq!(
            sig,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );

        let hex = compute_signature(SECRET, BODY).unwrap();
        let hex = hex.strip_prefix("sha256=").unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn valid_signature_passes() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        assert!(verify_signature(SECRET, BODY, Some(&sig)).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        let err = verify_signature(SECRET, br#"{"action":"closed"}"#, Some(&sig)).unwrap_err();
        assert!(matches!(err, LgtmError::Webhook(_)));
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = compute_signature("other", BODY).unwrap();
        assert!(verify_signature(SECRET, BODY, Some(&sig)).is_err());
    }

    #[test]
    fn missing_or_malformed_header_fails() {
        assert!(verify_signature(SECRET, BODY, None).is_err());
        assert!(verify_signature(SECRET, BODY, Some("sha1=abcd")).is_err());
        assert!(verify_signature(SECRET, BODY, Some("sha256=zz")).is_err());
        assert!(verify_signature(SECRET, BODY, Some("sha256=abc")).is_err());
    }

    #[test]
    fn policy_disabled_accepts_anything() {
        let config = ServerConfig {
            webhook_secret: Some(SECRET.into()),
            ..ServerConfig::default()
        };
        assert!(check_delivery(&config, BODY, None).is_ok());
    }

    #[test]
    fn policy_without_secret_accepts() {
        assert!(check_delivery(&enforcing(None), BODY, None).is_ok());
        assert!(check_delivery(&enforcing(Some("")), BODY, None).is_ok());
    }

    #[test]
    fn policy_with_secret_enforces() {
        let config = enforcing(Some(SECRET));
        let sig = compute_signature(SECRET, BODY).unwrap();
        assert!(check_delivery(&config, BODY, Some(&sig)).is_ok());
        assert!(check_delivery(&config, BODY, Some("sha256=00")).is_err());
    }
}
