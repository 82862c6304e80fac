use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::order::OrderIdentifier;
use crate::problem::AcmeProblem;
use crate::validation::is_base64url_token;

/// Authorization belgesi ayrıştırılırken oluşan hatalar.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("ACME authorization belgesi ayrıştırılamadı: {0}")]
    Json(#[from] serde_json::Error),
    /// `pending` durumdaki authorization hiç challenge içermiyor.
    #[error("Bekleyen ACME authorization en az bir challenge içermelidir")]
    MissingChallenges,
    /// Listedeki `index` numaralı challenge geçersiz.
    #[error("ACME authorization challenge[{index}] hatası: {source}")]
    Challenge {
        index: usize,
        #[source]
        source: ChallengeError,
    },
}

/// Challenge nesnesi doğrulanırken oluşan hatalar.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("ACME challenge belgesi ayrıştırılamadı: {0}")]
    Json(#[from] serde_json::Error),
    /// Challenge URL'i `https` değil.
    #[error("ACME challenge URL'i HTTPS kullanmalıdır (şema: {scheme})")]
    InsecureUrl { scheme: String },
    /// Bilinen bir challenge türü token taşımıyor.
    #[error("ACME {kind} challenge'ı token içermiyor")]
    MissingToken { kind: String },
    #[error("ACME challenge token değeri base64url karakterleri dışındakiler içeriyor")]
    InvalidToken,
}

/// Authorization kaynağının durumları.
///
/// Sunucunun gönderdiği tanımsız değerler `Unknown` olarak korunur; karar
/// çağırana bırakılır.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
    Unknown(String),
}

impl From<String> for AuthorizationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "valid" => Self::Valid,
            "invalid" => Self::Invalid,
            "deactivated" => Self::Deactivated,
            "expired" => Self::Expired,
            "revoked" => Self::Revoked,
            _ => Self::Unknown(value),
        }
    }
}

impl AuthorizationStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Deactivated => "deactivated",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Unknown(value) => value,
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        })
    }
}

/// Challenge türü; tanınmayan türler `Other` ile taşınır.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ChallengeKind {
    Http01,
    Dns01,
    TlsAlpn01,
    Other(String),
}

impl From<String> for ChallengeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "http-01" => Self::Http01,
            "dns-01" => Self::Dns01,
            "tls-alpn-01" => Self::TlsAlpn01,
            _ => Self::Other(value),
        }
    }
}

impl ChallengeKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http01 => "http-01",
            Self::Dns01 => "dns-01",
            Self::TlsAlpn01 => "tls-alpn-01",
            Self::Other(value) => value,
        }
    }

    const fn requires_token(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct AuthorizationWire {
    identifier: OrderIdentifier,
    status: AuthorizationStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    expires: Option<OffsetDateTime>,
    #[serde(default)]
    wildcard: bool,
    #[serde(default)]
    challenges: Vec<ChallengeWire>,
}

#[derive(Deserialize)]
struct ChallengeWire {
    #[serde(rename = "type")]
    kind: ChallengeKind,
    status: ChallengeStatus,
    url: Url,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    validated: Option<OffsetDateTime>,
    #[serde(default)]
    error: Option<AcmeProblem>,
}

impl TryFrom<ChallengeWire> for Challenge {
    type Error = ChallengeError;

    fn try_from(wire: ChallengeWire) -> Result<Self, Self::Error> {
        if wire.url.scheme() != "https" {
            return Err(ChallengeError::InsecureUrl {
                scheme: wire.url.scheme().to_owned(),
            });
        }
        match wire.token.as_deref() {
            None if wire.kind.requires_token() => {
                return Err(ChallengeError::MissingToken {
                    kind: wire.kind.as_str().to_owned(),
                })
            }
            Some(token) if !is_base64url_token(token) => return Err(ChallengeError::InvalidToken),
            _ => {}
        }
        Ok(Self {
            kind: wire.kind,
            status: wire.status,
            url: wire.url,
            token: wire.token,
            validated: wire.validated,
            error: wire.error,
        })
    }
}

/// ACME authorization kaynağı (RFC 8555 §7.1.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    identifier: OrderIdentifier,
    status: AuthorizationStatus,
    expires: Option<OffsetDateTime>,
    wildcard: bool,
    challenges: Vec<Challenge>,
}

impl Authorization {
    #[must_use]
    pub const fn new(
        identifier: OrderIdentifier,
        status: AuthorizationStatus,
        challenges: Vec<Challenge>,
    ) -> Self {
        Self {
            identifier,
            status,
            expires: None,
            wildcard: false,
            challenges,
        }
    }

    /// # Errors
    ///
    /// Gövde şemaya uymuyorsa, `pending` bir authorization'ın challenge
    /// listesi boşsa veya bir challenge doğrulanamazsa `AuthorizationError`
    /// döner. Sonuçlanmış durumlarda boş liste kabul edilir.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, AuthorizationError> {
        let wire: AuthorizationWire = serde_json::from_slice(bytes)?;
        if wire.status == AuthorizationStatus::Pending && wire.challenges.is_empty() {
            return Err(AuthorizationError::MissingChallenges);
        }
        let challenges = wire
            .challenges
            .into_iter()
            .enumerate()
            .map(|(index, challenge)| {
                Challenge::try_from(challenge)
                    .map_err(|source| AuthorizationError::Challenge { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            identifier: wire.identifier,
            status: wire.status,
            expires: wire.expires,
            wildcard: wire.wildcard,
            challenges,
        })
    }

    #[must_use]
    pub const fn status(&self) -> &AuthorizationStatus {
        &self.status
    }

    #[must_use]
    pub const fn identifier(&self) -> &OrderIdentifier {
        &self.identifier
    }

    #[must_use]
    pub const fn expires(&self) -> Option<&OffsetDateTime> {
        self.expires.as_ref()
    }

    #[must_use]
    pub const fn wildcard(&self) -> bool {
        self.wildcard
    }

    #[must_use]
    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    kind: ChallengeKind,
    status: ChallengeStatus,
    url: Url,
    token: Option<String>,
    validated: Option<OffsetDateTime>,
    error: Option<AcmeProblem>,
}

impl Challenge {
    #[must_use]
    pub const fn new(
        kind: ChallengeKind,
        status: ChallengeStatus,
        url: Url,
        token: Option<String>,
    ) -> Self {
        Self {
            kind,
            status,
            url,
            token,
            validated: None,
            error: None,
        }
    }

    /// # Errors
    ///
    /// Gövde şemaya uymuyorsa veya URL ya da token geçersizse `ChallengeError` döner.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ChallengeError> {
        let wire: ChallengeWire = serde_json::from_slice(bytes)?;
        Self::try_from(wire)
    }

    #[must_use]
    pub const fn kind(&self) -> &ChallengeKind {
        &self.kind
    }

    #[must_use]
    pub const fn status(&self) -> ChallengeStatus {
        self.status
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub const fn validated(&self) -> Option<&OffsetDateTime> {
        self.validated.as_ref()
    }

    /// Sunucunun doğrulama hatası (`invalid` challenge'larda).
    #[must_use]
    pub const fn error(&self) -> Option<&AcmeProblem> {
        self.error.as_ref()
    }
}
