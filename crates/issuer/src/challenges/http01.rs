use std::collections::HashMap;

use async_trait::async_trait;
use certhub_acme::{AccountKey, KeyAuthorization, OrderIdentifier, HTTP01_PATH_PREFIX};
use parking_lot::RwLock;
use tracing::debug;

use super::provider::{ChallengeProvider, ProviderError};

/// Bellek içi http-01 kaynakları. HTTP sunucusu
/// `/.well-known/acme-challenge/<token>` isteklerini [`Http01Responder::respond`] ile yanıtlar.
#[derive(Debug, Default)]
pub struct Http01Responder {
    resources: RwLock<HashMap<String, String>>,
}

impl Http01Responder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key_authorization(&self, token: &str) -> Option<String> {
        self.resources.read().get(token).cloned()
    }

    /// İstek yolu hazırlanmış bir token'ı gösteriyorsa sunulacak gövde.
    #[must_use]
    pub fn respond(&self, path: &str) -> Option<String> {
        let token = path.strip_prefix(HTTP01_PATH_PREFIX)?;
        self.key_authorization(token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[async_trait]
impl ChallengeProvider for Http01Responder {
    async fn provision(
        &self,
        identifier: &OrderIdentifier,
        token: &str,
        key: &AccountKey,
    ) -> Result<(), ProviderError> {
        let authorization = KeyAuthorization::new(token, key)?;
        debug!(identifier = %identifier.value(), path = %authorization.http01_path(), "http-01 kaynağı eklendi");
        self.resources
            .write()
            .insert(token.to_owned(), authorization.as_str().to_owned());
        Ok(())
    }

    async fn deprovision(
        &self,
        identifier: &OrderIdentifier,
        token: &str,
        _key: &AccountKey,
    ) -> Result<(), ProviderError> {
        if self.resources.write().remove(token).is_some() {
            debug!(identifier = %identifier.value(), token, "http-01 kaynağı kaldırıldı");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn serves_key_authorization_until_deprovisioned() {
        let responder = Http01Responder::new();
        let key = AccountKey::p256_from_be_bytes(&[9u8; 32]).unwrap();
        let identifier = OrderIdentifier::dns("example.com").unwrap();

        responder.provision(&identifier, "abc", &key).await.unwrap();
        let expected = format!("abc.{}", key.jwk_thumbprint());
        assert_eq!(
            responder.respond("/.well-known/acme-challenge/abc"),
            Some(expected)
        );
        assert_eq!(responder.respond("/index.html"), None);

        responder.deprovision(&identifier, "abc", &key).await.unwrap();
        assert!(responder.is_empty());
        assert_eq!(responder.key_authorization("abc"), None);
    }

    #[tokio::test]
    async fn rejects_tokens_outside_base64url() {
        let responder = Http01Responder::new();
        let key = AccountKey::p256_from_be_bytes(&[9u8; 32]).unwrap();
        let identifier = OrderIdentifier::dns("example.com").unwrap();

        let err = responder
            .provision(&identifier, "../../etc", &key)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::KeyAuthorization(_)));
        assert!(responder.is_empty());
    }
}
