use crate::error::AuthError;
use crate::hashing::sha256_hex;

/// Fixed identifier mixed into every access key so that keys from one
/// deployment never authorize against another.
pub const NETWORK_ID: &str = "87a56999-9a36-4359-a8c2-8217260f5a85";

/// One-way key derived from the shared network secret.
pub fn derive_access_key(secret: &str) -> String {
    sha256_hex(format!("{secret}-{NETWORK_ID}").as_bytes())
}

/// Decides whether an inbound peer request may read or update local state.
#[derive(Clone, Debug)]
pub struct AccessPolicy {
    access_key: String,
    self_address: String,
}

impl AccessPolicy {
    pub fn new(secret: &str, self_address: impl Into<String>) -> Self {
        Self {
            access_key: derive_access_key(secret),
            self_address: self_address.into(),
        }
    }

    /// Key attached to outbound requests.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Returns the requester's address when the key matches and the
    /// requester is not this node.
    pub fn authorize<'a>(
        &self,
        request_key: Option<&str>,
        request_address: Option<&'a str>,
    ) -> Result<&'a str, AuthError> {
        let (Some(key), Some(address)) = (request_key, request_address) else {
            return Err(AuthError::MissingCredentials);
        };
        if key != self.access_key {
            return Err(AuthError::InvalidKey);
        }
        if address == self.self_address {
            return Err(AuthError::SelfAuthorization);
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_secret() {
        assert_eq!(derive_access_key("s3cret"), derive_access_key("s3cret"));
        assert_ne!(derive_access_key("s3cret"), derive_access_key("other"));
    }

    #[test]
    fn authorize_rules() {
        let policy = AccessPolicy::new("s3cret", "10.0.0.1:5000");
        let key = derive_access_key("s3cret");

        assert_eq!(
            policy.authorize(Some(&key), Some("10.0.0.2:5000")),
            Ok("10.0.0.2:5000")
        );
        assert_eq!(
            policy.authorize(Some(&key), Some("10.0.0.1:5000")),
            Err(AuthError::SelfAuthorization)
        );
        assert_eq!(
            policy.authorize(Some("nope"), Some("10.0.0.2:5000")),
            Err(AuthError::InvalidKey)
        );
        assert_eq!(
            policy.authorize(None, Some("10.0.0.2:5000")),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            policy.authorize(Some(&key), None),
            Err(AuthError::MissingCredentials)
        );
    }
}
