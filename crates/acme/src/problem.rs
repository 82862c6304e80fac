//! ACME sunucularının döndürdüğü RFC 7807 / RFC 8555 §6.7 problem belgeleri.

use std::fmt;

use http::header::{HeaderMap, CONTENT_TYPE};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// ACME hata belgelerinin ortam türü.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const ACME_ERROR_PREFIX: &str = "urn:ietf:params:acme:error:";

/// Çözümlenmiş ACME problem belgesi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeProblem {
    #[serde(rename = "type", default = "default_problem_type")]
    problem_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subproblems: Vec<AcmeSubproblem>,
}

/// Bileşik bir hatanın içindeki tanımlayıcıya özgü problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeSubproblem {
    #[serde(rename = "type", default = "default_problem_type")]
    pub problem_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<serde_json::Value>,
}

fn default_problem_type() -> String {
    "about:blank".to_owned()
}

impl AcmeProblem {
    /// Tür URN'i ve isteğe bağlı açıklamadan problem üretir.
    #[must_use]
    pub fn new(problem_type: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            problem_type: problem_type.into(),
            detail,
            status: None,
            subproblems: Vec::new(),
        }
    }

    /// Problemle birlikte bildirilen HTTP durum kodunu ekler.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Yanıt bir problem belgesi taşıyorsa onu çözümler.
    ///
    /// Yanıt `application/problem+json` bildiriyorsa veya durum kodu başarılı
    /// değilse gövde problem kabul edilir. Hata durumundaki ayrıştırılamayan
    /// gövdeler için `None` döner; çağıran ham durum kodunu raporlar.
    #[must_use]
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<Self> {
        let advertised = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(PROBLEM_CONTENT_TYPE));
        if !advertised && status.is_success() {
            return None;
        }

        let mut problem: Self = serde_json::from_slice(body).ok()?;
        if problem.status.is_none() {
            problem.status = Some(status.as_u16());
        }
        Some(problem)
    }

    /// Problem türünün tam URN'i.
    #[must_use]
    pub fn problem_type(&self) -> &str {
        &self.problem_type
    }

    /// ACME ad alanı atılmış problem türü, örneğin `badNonce`.
    #[must_use]
    pub fn short_type(&self) -> &str {
        self.problem_type
            .strip_prefix(ACME_ERROR_PREFIX)
            .unwrap_or(&self.problem_type)
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn subproblems(&self) -> &[AcmeSubproblem] {
        &self.subproblems
    }

    /// Sunucunun isteğin anti-replay nonce değerini reddedip reddetmediği.
    #[must_use]
    pub fn is_bad_nonce(&self) -> bool {
        self.short_type() == "badNonce"
    }
}

impl fmt::Display for AcmeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.problem_type),
            None => f.write_str(&self.problem_type),
        }
    }
}

impl std::error::Error for AcmeProblem {}
