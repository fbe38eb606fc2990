use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Generates a cryptographically random anti-forgery nonce for the `state`
/// parameter.
///
/// Returns a 22-character URL-safe string (16 random bytes, base64url encoded).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Normalizes a caller-supplied return path to a same-site absolute path.
///
/// Anything that is not a single-slash-rooted path (protocol-relative `//`,
/// absolute URLs, relative fragments) falls back to the site root, so a
/// tampered return slot can never redirect off-origin.
#[must_use]
pub fn sanitize_return_path(path: Option<&str>) -> String {
    match path {
        Some(p) if p.starts_with('/') && !p.starts_with("//") => p.to_string(),
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_length() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 22);
    }

    #[test]
    fn test_nonce_url_safe() {
        let nonce = generate_nonce();
        assert!(
            nonce
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "nonce should be URL-safe: {}",
            nonce
        );
    }

    #[test]
    fn test_nonce_uniqueness() {
        let n1 = generate_nonce();
        let n2 = generate_nonce();
        assert_ne!(n1, n2, "nonces should be unique");
    }

    #[test]
    fn test_return_path_passthrough() {
        assert_eq!(sanitize_return_path(Some("/topic/42")), "/topic/42");
        assert_eq!(sanitize_return_path(Some("/")), "/");
    }

    #[test]
    fn test_return_path_defaults_to_root() {
        assert_eq!(sanitize_return_path(None), "/");
        assert_eq!(sanitize_return_path(Some("")), "/");
    }

    #[test]
    fn test_return_path_rejects_offsite() {
        assert_eq!(sanitize_return_path(Some("https://evil.example")), "/");
        assert_eq!(sanitize_return_path(Some("//evil.example")), "/");
        assert_eq!(sanitize_return_path(Some("topic/42")), "/");
    }
}
