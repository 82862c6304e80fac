mod common;

use std::sync::Arc;
use std::time::Duration;

use certhub_acme::{Authorization, AuthorizationStatus, ChallengeStatus, OrderIdentifier};
use certhub_issuer::{
    AcmeEnvironment, AuthorizationFulfiller, ChallengeMethod, ChallengeProvider,
    ChallengeProviders, ChallengeSolver, FulfillError,
};
use common::{
    account_key, http01, pending_authorization, services, Calls, MockAcme, RecordingProvider,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

struct Fixture {
    production: Arc<MockAcme>,
    staging: Arc<MockAcme>,
    provider: Arc<RecordingProvider>,
    fulfiller: AuthorizationFulfiller,
}

fn fixture() -> Fixture {
    let production = MockAcme::new();
    let staging = MockAcme::new();
    let provider = RecordingProvider::new();
    let providers = ChallengeProviders::new().with(
        &ChallengeMethod::http01_internal(),
        Arc::clone(&provider) as Arc<dyn ChallengeProvider>,
    );
    let services = services(&production, &staging);
    let solver = ChallengeSolver::new(services.clone(), providers, CancellationToken::new());
    Fixture {
        production,
        staging,
        provider,
        fulfiller: AuthorizationFulfiller::new(services, Arc::new(solver)),
    }
}

fn with_status(name: &str, status: AuthorizationStatus) -> Authorization {
    Authorization::new(OrderIdentifier::dns(name).unwrap(), status, Vec::new())
}

/// `/authz/<n>` adresine challenge'ı `outcome` ile sonuçlanan bekleyen bir authorization ekler.
fn add_pending(acme: &MockAcme, n: u32, outcome: ChallengeStatus) -> url::Url {
    let authz = common::url(&format!("/authz/{n}"));
    let chal = format!("/chal/{n}");
    acme.add_authorization(
        &authz,
        pending_authorization(&format!("host{n}.example.com"), vec![http01(&format!("tok{n}"), &chal)]),
    );
    acme.script_challenge(&common::url(&chal), &[outcome]);
    authz
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_for_one_url_share_a_single_worker() {
    let fx = fixture();
    let authz = add_pending(&fx.production, 1, ChallengeStatus::Valid);
    fx.production.delay_authorizations(Duration::from_secs(1));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let fulfiller = fx.fulfiller.clone();
        let authz = authz.clone();
        handles.push(tokio::spawn(async move {
            fulfiller
                .fulfill_authorization(
                    &authz,
                    &ChallengeMethod::http01_internal(),
                    &account_key(2),
                    AcmeEnvironment::Production,
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), AuthorizationStatus::Valid);
    }
    assert_eq!(Calls::count(&fx.production.calls.get_authorization), 1);
    assert_eq!(fx.provider.provisioned(), vec!["tok1".to_owned()]);
    assert_eq!(fx.fulfiller.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_valid_authorization_makes_the_order_valid() {
    let fx = fixture();
    let solved = add_pending(&fx.production, 1, ChallengeStatus::Valid);
    let already = common::url("/authz/2");
    fx.production
        .add_authorization(&already, with_status("b.example.com", AuthorizationStatus::Valid));

    let status = fx
        .fulfiller
        .fulfill_authorizations(
            &[solved, already],
            &ChallengeMethod::http01_internal(),
            &account_key(2),
            AcmeEnvironment::Production,
        )
        .await
        .unwrap();

    assert_eq!(status, AuthorizationStatus::Valid);
    assert_eq!(fx.provider.provisioned(), vec!["tok1".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn any_non_valid_terminal_status_makes_the_order_invalid() {
    let fx = fixture();
    let failed = add_pending(&fx.production, 1, ChallengeStatus::Invalid);
    let expired = common::url("/authz/2");
    fx.production
        .add_authorization(&expired, with_status("b.example.com", AuthorizationStatus::Expired));
    let valid = common::url("/authz/3");
    fx.production
        .add_authorization(&valid, with_status("c.example.com", AuthorizationStatus::Valid));

    let status = fx
        .fulfiller
        .fulfill_authorizations(
            &[failed, expired, valid],
            &ChallengeMethod::http01_internal(),
            &account_key(2),
            AcmeEnvironment::Production,
        )
        .await
        .unwrap();

    assert_eq!(status, AuthorizationStatus::Invalid);
}

#[tokio::test]
async fn unknown_status_is_an_error() {
    let fx = fixture();
    let odd = common::url("/authz/9");
    fx.production.add_authorization(
        &odd,
        with_status("odd.example.com", AuthorizationStatus::Unknown("paused".to_owned())),
    );

    let err = fx
        .fulfiller
        .fulfill_authorizations(
            &[odd],
            &ChallengeMethod::http01_internal(),
            &account_key(2),
            AcmeEnvironment::Production,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillError::UnknownStatus { status } if status == "paused"));
}

#[tokio::test(start_paused = true)]
async fn a_failing_url_does_not_cancel_its_siblings() {
    let fx = fixture();
    let solved = add_pending(&fx.production, 1, ChallengeStatus::Valid);
    let missing = common::url("/authz/404");

    let err = fx
        .fulfiller
        .fulfill_authorizations(
            &[missing, solved],
            &ChallengeMethod::http01_internal(),
            &account_key(2),
            AcmeEnvironment::Production,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillError::Acme(_)));
    assert_eq!(fx.provider.provisioned(), vec!["tok1".to_owned()]);
    assert_eq!(fx.provider.deprovisions(), 1);
}

#[tokio::test(start_paused = true)]
async fn failures_are_not_cached_for_later_callers() {
    let fx = fixture();
    let authz = common::url("/authz/1");
    let method = ChallengeMethod::http01_internal();
    let key = account_key(2);

    let first = fx
        .fulfiller
        .fulfill_authorization(&authz, &method, &key, AcmeEnvironment::Production)
        .await;
    assert!(matches!(first, Err(FulfillError::Acme(_))));

    add_pending(&fx.production, 1, ChallengeStatus::Valid);
    let second = fx
        .fulfiller
        .fulfill_authorization(&authz, &method, &key, AcmeEnvironment::Production)
        .await
        .unwrap();
    assert_eq!(second, AuthorizationStatus::Valid);
    assert_eq!(Calls::count(&fx.production.calls.get_authorization), 2);
}

#[tokio::test(start_paused = true)]
async fn authorizations_are_fetched_from_the_requested_environment() {
    let fx = fixture();
    let authz = add_pending(&fx.staging, 1, ChallengeStatus::Valid);

    let status = fx
        .fulfiller
        .fulfill_authorizations(
            &[authz],
            &ChallengeMethod::http01_internal(),
            &account_key(2),
            AcmeEnvironment::Staging,
        )
        .await
        .unwrap();

    assert_eq!(status, AuthorizationStatus::Valid);
    assert_eq!(Calls::count(&fx.staging.calls.get_authorization), 1);
    assert_eq!(Calls::count(&fx.production.calls.get_authorization), 0);
}
