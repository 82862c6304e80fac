#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod authorizations;
pub mod challenges;
pub mod config;
pub mod environment;
pub mod orders;
pub mod singleflight;
pub mod telemetry;

pub use authorizations::{AuthorizationFulfiller, FulfillError};
pub use challenges::{
    ChallengeMethod, ChallengeProvider, ChallengeProviders, ChallengeSolver, Dns01Provider,
    DnsProvider, DnsProviderError, DnsRecordHandle, Http01Responder, PollPolicy, ProviderError,
    SolveError,
};
pub use config::{ConfigError, IssuerConfig};
pub use environment::{AcmeEnvironment, AcmeServices, LETS_ENCRYPT_PRODUCTION, LETS_ENCRYPT_STAGING};
pub use orders::{
    CertificateRecord, JobTicket, OrchestratorSettings, OrderJobError, OrderOrchestrator,
    OrderOutcome, OrderRecord, OrderStore, OrderSubmitter, Priority, RenewalSchedule, StoreError,
};
pub use singleflight::SingleFlight;
pub use telemetry::{init_tracing, init_tracing_with_filter, TelemetryError, TelemetryGuard};
