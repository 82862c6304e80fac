use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum AcmeDirectoryError {
    #[error("directory belgesi JSON olarak ayrıştırılamadı: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` alanı geçersiz URL: {source}")]
    InvalidUrl {
        field: String,
        source: url::ParseError,
    },
}

/// ACME directory kaynağı (RFC 8555 §7.1.1).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeDirectory {
    pub new_nonce: Url,
    pub new_account: Url,
    pub new_order: Url,
    #[serde(default)]
    pub revoke_cert: Option<Url>,
    #[serde(default)]
    pub key_change: Option<Url>,
    #[serde(default)]
    pub renewal_info: Option<Url>,
    #[serde(default)]
    pub meta: Option<AcmeDirectoryMeta>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeDirectoryMeta {
    #[serde(default)]
    pub terms_of_service: Option<Url>,
    #[serde(default)]
    pub website: Option<Url>,
    #[serde(default)]
    pub caa_identities: Vec<String>,
    #[serde(default)]
    pub external_account_required: bool,
}

impl AcmeDirectory {
    /// ACME directory JSON belgesini tip güvenli yapıya dönüştürür.
    ///
    /// # Errors
    ///
    /// Zorunlu uç noktalar eksik veya geçersiz URL içeriyorsa
    /// `AcmeDirectoryError` döndürülür.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, AcmeDirectoryError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Sunucuya özgü ek uç noktaları döndürür.
    ///
    /// # Errors
    ///
    /// Ek alanlardan biri URL olarak ayrıştırılamazsa hata döner.
    pub fn additional_endpoints(&self) -> Result<BTreeMap<String, Url>, AcmeDirectoryError> {
        self.extra
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|raw| (key, raw)))
            .map(|(key, raw)| {
                Url::parse(raw)
                    .map(|url| (key.clone(), url))
                    .map_err(|source| AcmeDirectoryError::InvalidUrl {
                        field: key.clone(),
                        source,
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn external_account_required(&self) -> bool {
        self.meta
            .as_ref()
            .is_some_and(|meta| meta.external_account_required)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const STAGING_DIRECTORY: &str = r#"{
        "newNonce": "https://acme-staging-v02.api.letsencrypt.org/acme/new-nonce",
        "newAccount": "https://acme-staging-v02.api.letsencrypt.org/acme/new-acct",
        "newOrder": "https://acme-staging-v02.api.letsencrypt.org/acme/new-order",
        "revokeCert": "https://acme-staging-v02.api.letsencrypt.org/acme/revoke-cert",
        "keyChange": "https://acme-staging-v02.api.letsencrypt.org/acme/key-change",
        "renewalInfo": "https://acme-staging-v02.api.letsencrypt.org/draft-ietf-acme-ari-03/renewalInfo",
        "meta": {
            "termsOfService": "https://letsencrypt.org/documents/LE-SA-v1.4-April-15-2021.pdf",
            "website": "https://letsencrypt.org/docs/staging-environment/",
            "caaIdentities": ["letsencrypt.org"]
        },
        "xk3l9_PIQZk": "https://community.letsencrypt.org/t/adding-random-entries-to-the-directory/33417"
    }"#;

    #[test]
    fn parses_staging_directory() {
        let directory = AcmeDirectory::from_json_slice(STAGING_DIRECTORY.as_bytes()).unwrap();
        assert_eq!(
            directory.new_nonce.as_str(),
            "https://acme-staging-v02.api.letsencrypt.org/acme/new-nonce"
        );
        assert_eq!(
            directory.new_order.path(),
            "/acme/new-order"
        );
        assert!(directory.revoke_cert.is_some());
        assert!(!directory.external_account_required());
        let meta = directory.meta.as_ref().unwrap();
        assert_eq!(meta.caa_identities, vec!["letsencrypt.org".to_owned()]);

        let extra = directory.additional_endpoints().unwrap();
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("xk3l9_PIQZk"));
    }

    #[test]
    fn missing_new_nonce_is_rejected() {
        let json = br#"{
            "newAccount": "https://example.com/new-account",
            "newOrder": "https://example.com/new-order"
        }"#;
        let err = AcmeDirectory::from_json_slice(json).unwrap_err();
        assert!(err.to_string().contains("newNonce"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let json = br#"{
            "newNonce": "not a url",
            "newAccount": "https://example.com/new-account",
            "newOrder": "https://example.com/new-order"
        }"#;
        assert!(matches!(
            AcmeDirectory::from_json_slice(json),
            Err(AcmeDirectoryError::Json(_))
        ));
    }
}
