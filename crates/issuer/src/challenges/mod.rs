//! Challenge çözümü: sağlayıcı arayüzü, hazır sağlayıcılar ve çözücü
//! durum makinesi.

mod dns01;
mod http01;
mod provider;
mod solver;

pub use dns01::{Dns01Provider, DnsProvider, DnsProviderError, DnsRecordHandle};
pub use http01::Http01Responder;
pub use provider::{ChallengeMethod, ChallengeProvider, ChallengeProviders, ProviderError};
pub use solver::{ChallengeSolver, PollPolicy, SolveError};
