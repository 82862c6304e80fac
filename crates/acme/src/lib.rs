#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod authorization;
mod certificate;
mod client;
mod directory;
mod jws;
mod nonce;
mod order;
mod problem;
pub mod renewal;
mod transport;
mod validation;

pub use authorization::{
    Authorization, AuthorizationError, AuthorizationStatus, Challenge, ChallengeError,
    ChallengeKind, ChallengeStatus,
};
pub use certificate::{CertificateChain, CertificateError, FinalizeRequest};
pub use client::{AcmeApi, AcmeClient, AcmeClientError};
pub use directory::{AcmeDirectory, AcmeDirectoryError, AcmeDirectoryMeta};
pub use jws::{AccountKey, Jwk, JwsEnvelope, JwsError};
pub use nonce::{
    NewNonceRequester, NonceError, NonceManager, NonceManagerError, NonceRequestError, ReplayNonce,
    REPLAY_NONCE_HEADER,
};
pub use order::{
    NewOrderError, NewOrderRequest, Order, OrderError, OrderIdentifier, OrderIdentifierError,
    OrderStatus,
};
pub use problem::{AcmeProblem, AcmeSubproblem, PROBLEM_CONTENT_TYPE};
pub use transport::{
    SignedResponse, SignedTransport, TransportError, JOSE_CONTENT_TYPE, MAX_BAD_NONCE_RETRIES,
};
pub use validation::{
    Dns01TxtRecord, KeyAuthorization, ValidationError, DNS01_LABEL, HTTP01_PATH_PREFIX,
};
