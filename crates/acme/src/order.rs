use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::problem::AcmeProblem;

const MAX_DNS_NAME_LEN: usize = 253;
const MAX_DNS_LABEL_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum OrderIdentifierError {
    /// DNS değeri boş veya yalnızca nokta.
    #[error("ACME DNS identifier değeri boş olamaz")]
    EmptyDns,
    /// DNS etiketi kurallara uymuyor ya da `*` ilk etiket dışında kullanılmış.
    #[error("ACME DNS identifier değeri geçersiz: {value}")]
    InvalidDns { value: String },
    #[error("ACME IP identifier değeri ayrıştırılamadı: {0}")]
    InvalidIp(#[from] std::net::AddrParseError),
    /// `dns` ve `ip` dışındaki identifier türleri.
    #[error("ACME identifier türü desteklenmiyor: {kind}")]
    UnsupportedKind { kind: String },
}

/// Order ve authorization kaynaklarındaki `identifier` nesnesi.
///
/// DNS değerleri küçük harfe çevrilir ve sondaki nokta atılır; yalnızca ilk
/// etikette `*` kabul edilir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdentifierWire", into = "IdentifierWire")]
pub enum OrderIdentifier {
    Dns(String),
    Ip(IpAddr),
}

#[derive(Serialize, Deserialize)]
struct IdentifierWire {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl TryFrom<IdentifierWire> for OrderIdentifier {
    type Error = OrderIdentifierError;

    fn try_from(wire: IdentifierWire) -> Result<Self, Self::Error> {
        match wire.kind.as_str() {
            "dns" => Self::dns(&wire.value),
            "ip" => Self::ip(&wire.value),
            _ => Err(OrderIdentifierError::UnsupportedKind { kind: wire.kind }),
        }
    }
}

impl From<OrderIdentifier> for IdentifierWire {
    fn from(identifier: OrderIdentifier) -> Self {
        let kind = match identifier {
            OrderIdentifier::Dns(_) => "dns",
            OrderIdentifier::Ip(_) => "ip",
        };
        Self {
            kind: kind.to_owned(),
            value: identifier.value(),
        }
    }
}

impl OrderIdentifier {
    /// # Errors
    ///
    /// Boş isimler, 253 karakteri aşan isimler ve geçersiz etiketler için
    /// `OrderIdentifierError` döner.
    pub fn dns(value: &str) -> Result<Self, OrderIdentifierError> {
        let trimmed = value.trim();
        let name = trimmed.trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err(OrderIdentifierError::EmptyDns);
        }
        let valid = name.len() <= MAX_DNS_NAME_LEN
            && name
                .split('.')
                .enumerate()
                .all(|(index, label)| (index == 0 && label == "*") || is_dns_label(label));
        if !valid {
            return Err(OrderIdentifierError::InvalidDns {
                value: trimmed.to_owned(),
            });
        }
        Ok(Self::Dns(name))
    }

    /// # Errors
    ///
    /// Adres ayrıştırılamazsa `OrderIdentifierError::InvalidIp` döner.
    pub fn ip(value: &str) -> Result<Self, OrderIdentifierError> {
        Ok(Self::Ip(value.trim().parse()?))
    }

    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Dns(name) => name.clone(),
            Self::Ip(addr) => addr.to_string(),
        }
    }
}

impl fmt::Display for OrderIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns(name) => f.write_str(name),
            Self::Ip(addr) => addr.fmt(f),
        }
    }
}

fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_DNS_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Error)]
pub enum NewOrderError {
    #[error("ACME newOrder isteği en az bir identifier içermelidir")]
    MissingIdentifier,
    #[error(transparent)]
    Identifier(#[from] OrderIdentifierError),
}

/// `newOrder` gövdesi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderRequest {
    identifiers: Vec<OrderIdentifier>,
}

impl NewOrderRequest {
    /// # Errors
    ///
    /// Liste boşsa `NewOrderError::MissingIdentifier` döner.
    pub fn new(identifiers: Vec<OrderIdentifier>) -> Result<Self, NewOrderError> {
        if identifiers.is_empty() {
            return Err(NewOrderError::MissingIdentifier);
        }
        Ok(Self { identifiers })
    }

    /// # Errors
    ///
    /// Bir isim geçersizse veya liste boşsa `NewOrderError` döner.
    pub fn for_dns_names<I, S>(names: I) -> Result<Self, NewOrderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers = names
            .into_iter()
            .map(|name| OrderIdentifier::dns(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(identifiers)
    }

    #[must_use]
    pub fn identifiers(&self) -> &[OrderIdentifier] {
        &self.identifiers
    }
}

/// ACME order durumları (RFC 8555 §7.1.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("ACME order belgesi ayrıştırılamadı: {0}")]
pub struct OrderError(#[from] serde_json::Error);

/// ACME order kaynağı. `location` gövdede değil, `Location` başlığında gelir.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Order {
    #[serde(skip)]
    location: Option<Url>,
    status: OrderStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    expires: Option<OffsetDateTime>,
    #[serde(default)]
    identifiers: Vec<OrderIdentifier>,
    #[serde(default)]
    authorizations: Vec<Url>,
    finalize: Url,
    #[serde(default)]
    certificate: Option<Url>,
    #[serde(default)]
    error: Option<AcmeProblem>,
}

impl Order {
    #[must_use]
    pub fn new(status: OrderStatus, authorizations: Vec<Url>, finalize: Url) -> Self {
        Self {
            location: None,
            status,
            expires: None,
            identifiers: Vec::new(),
            authorizations,
            finalize,
            certificate: None,
            error: None,
        }
    }

    /// # Errors
    ///
    /// Gövde order şemasına uymuyorsa `OrderError` döner.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, OrderError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn with_location(mut self, location: Url) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_certificate(mut self, certificate: Url) -> Self {
        self.certificate = Some(certificate);
        self
    }

    #[must_use]
    pub const fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub const fn expires(&self) -> Option<&OffsetDateTime> {
        self.expires.as_ref()
    }

    #[must_use]
    pub fn identifiers(&self) -> &[OrderIdentifier] {
        &self.identifiers
    }

    #[must_use]
    pub fn authorizations(&self) -> &[Url] {
        &self.authorizations
    }

    #[must_use]
    pub const fn finalize(&self) -> &Url {
        &self.finalize
    }

    #[must_use]
    pub const fn certificate(&self) -> Option<&Url> {
        self.certificate.as_ref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&AcmeProblem> {
        self.error.as_ref()
    }
}
