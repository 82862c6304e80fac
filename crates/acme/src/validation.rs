//! http-01 ve dns-01 challenge yöntemleri için key authorization üretimi.

#![allow(clippy::module_name_repetitions)]

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::jws::AccountKey;
use crate::order::OrderIdentifier;

/// http-01 yanıtlarının sunulduğu yol öneki.
pub const HTTP01_PATH_PREFIX: &str = "/.well-known/acme-challenge/";

/// dns-01 TXT kayıtlarında tanımlayıcının önüne eklenen etiket.
pub const DNS01_LABEL: &str = "_acme-challenge";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("challenge token değeri boş olamaz")]
    EmptyToken,
    #[error("challenge token değeri base64url karakterleri dışındakiler içeriyor")]
    InvalidToken,
    #[error("DNS-01 challenge yalnızca DNS identifier ile kullanılabilir")]
    UnsupportedIdentifier,
}

/// `token || '.' || base64url(JWK thumbprint)` (RFC 8555 §8.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAuthorization {
    token: String,
    value: String,
}

impl KeyAuthorization {
    /// `token` için hesap anahtarının thumbprint değeriyle key authorization üretir.
    ///
    /// # Errors
    ///
    /// Token boşsa veya base64url alfabesi dışında karakter içeriyorsa
    /// [`ValidationError`] döner.
    pub fn new(token: &str, key: &AccountKey) -> Result<Self, ValidationError> {
        Self::with_thumbprint(token, &key.jwk_thumbprint())
    }

    /// Önceden hesaplanmış thumbprint ile key authorization üretir.
    ///
    /// # Errors
    ///
    /// [`KeyAuthorization::new`] ile aynı.
    pub fn with_thumbprint(token: &str, thumbprint: &str) -> Result<Self, ValidationError> {
        if token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        if !is_base64url_token(token) {
            return Err(ValidationError::InvalidToken);
        }
        Ok(Self {
            token: token.to_owned(),
            value: format!("{token}.{thumbprint}"),
        })
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// http-01 yanıtının sunulması gereken HTTP yolu.
    #[must_use]
    pub fn http01_path(&self) -> String {
        format!("{HTTP01_PATH_PREFIX}{}", self.token)
    }

    /// http-01 yanıt gövdesinin, sondaki boşluklar yok sayılarak eşleşip eşleşmediği.
    #[must_use]
    pub fn matches_body(&self, body: &str) -> bool {
        body.trim_end_matches(['\n', '\r', ' ', '\t']) == self.value
    }

    /// `identifier` üzerindeki dns-01 challenge'ı için TXT kaydı.
    ///
    /// # Errors
    ///
    /// DNS dışı tanımlayıcılar için [`ValidationError::UnsupportedIdentifier`] döner.
    pub fn dns01_record(
        &self,
        identifier: &OrderIdentifier,
    ) -> Result<Dns01TxtRecord, ValidationError> {
        let OrderIdentifier::Dns(name) = identifier else {
            return Err(ValidationError::UnsupportedIdentifier);
        };
        let digest = Sha256::digest(self.value.as_bytes());
        Ok(Dns01TxtRecord {
            name: format!(
                "{DNS01_LABEL}.{}",
                name.strip_prefix("*.").unwrap_or(name)
            ),
            value: URL_SAFE_NO_PAD.encode(digest),
        })
    }
}

pub(crate) fn is_base64url_token(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl fmt::Display for KeyAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// dns-01 TXT kaydının FQDN ve değeri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dns01TxtRecord {
    name: String,
    value: String,
}

impl Dns01TxtRecord {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const THUMBPRINT: &str = "ytxINsp8lvQ1mX8kGqCFyT9OQy2M7o1uz7NErHOwhwU";
    const TOKEN: &str = "gDn1sRZqXo9Nhc2ZtF1S7gT4u0Lk-pQ8R6aBcDeFgH";

    #[test]
    fn builds_key_authorization_and_path() {
        let auth = KeyAuthorization::with_thumbprint(TOKEN, THUMBPRINT).unwrap();
        assert_eq!(auth.as_str(), format!("{TOKEN}.{THUMBPRINT}"));
        assert_eq!(
            auth.http01_path(),
            format!("/.well-known/acme-challenge/{TOKEN}")
        );
        assert!(auth.matches_body(&format!("{TOKEN}.{THUMBPRINT}\r\n")));
        assert!(!auth.matches_body("unexpected value"));
    }

    #[test]
    fn key_authorization_uses_account_thumbprint() {
        let key = AccountKey::p256_from_be_bytes(&[7u8; 32]).unwrap();
        let auth = KeyAuthorization::new("abc", &key).unwrap();
        assert_eq!(auth.as_str(), format!("abc.{}", key.jwk_thumbprint()));
    }

    #[test]
    fn rejects_empty_or_invalid_tokens() {
        assert_eq!(
            KeyAuthorization::with_thumbprint("", THUMBPRINT),
            Err(ValidationError::EmptyToken)
        );
        assert_eq!(
            KeyAuthorization::with_thumbprint("../etc/passwd", THUMBPRINT),
            Err(ValidationError::InvalidToken)
        );
    }

    #[test]
    fn builds_dns01_record() {
        let auth = KeyAuthorization::with_thumbprint(TOKEN, THUMBPRINT).unwrap();
        let identifier = OrderIdentifier::dns("example.com").unwrap();
        let record = auth.dns01_record(&identifier).unwrap();
        assert_eq!(record.name(), "_acme-challenge.example.com");
        assert_eq!(record.value(), "X1WjMMFxcIhXcEU6oMwAFrf3Ymk622YZVSoBHxgkzuM");
    }

    #[test]
    fn dns01_record_strips_wildcard_prefix() {
        let auth = KeyAuthorization::with_thumbprint(TOKEN, THUMBPRINT).unwrap();
        let identifier = OrderIdentifier::dns("*.Example.com").unwrap();
        assert_eq!(
            auth.dns01_record(&identifier).unwrap().name(),
            "_acme-challenge.example.com"
        );
    }

    #[test]
    fn dns01_record_rejects_ip_identifier() {
        let auth = KeyAuthorization::with_thumbprint(TOKEN, THUMBPRINT).unwrap();
        let identifier = OrderIdentifier::ip("192.0.2.10").unwrap();
        assert_eq!(
            auth.dns01_record(&identifier),
            Err(ValidationError::UnsupportedIdentifier)
        );
    }
}
