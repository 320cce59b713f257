// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use oauth2_coordinator::{
	backoff::BackoffPolicy,
	config::CoordinatorConfig,
	coordinator::Coordinator,
	endpoint::ReqwestTokenClient,
	error::Error,
	refresh::{RefreshMode, RefreshOutcome},
	region::{RegionCode, RegionRegistry},
	store::{MemoryStore, SharedStore},
	time::{Duration, OffsetDateTime},
	token::CachedToken,
	url::Url,
};

const TOKEN_KEY: &str = "oauth2:us";
const LOCK_KEY: &str = "oauth2:us:lock";

fn us() -> RegionCode {
	RegionCode::new("us").expect("Region fixture should be valid.")
}

fn build_coordinator(
	server: &MockServer,
	config: CoordinatorConfig,
) -> (Coordinator, Arc<MemoryStore>) {
	let registry = RegionRegistry::builder()
		.region(
			us(),
			Url::parse(&server.url("/oauth/token"))
				.expect("Mock token endpoint should parse successfully."),
			Url::parse(&server.base_url()).expect("Mock API host should parse successfully."),
		)
		.build()
		.expect("Registry fixture should build successfully.");
	let client = oauth2_coordinator::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(oauth2_coordinator::reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");
	let store = Arc::new(MemoryStore::default());
	let coordinator = Coordinator::new(
		store.clone(),
		Arc::new(ReqwestTokenClient::with_client(client)),
		registry,
		config,
	);

	(coordinator, store)
}

fn config_with_backoff(base_ms: i64, cap_ms: i64) -> CoordinatorConfig {
	CoordinatorConfig::new()
		.with_credentials("test-client", "test-secret")
		.with_backoff(BackoffPolicy::new(
			Duration::milliseconds(base_ms),
			Duration::milliseconds(cap_ms),
		))
}

async fn hold_foreign_lock(store: &MemoryStore, ttl: Duration) {
	assert!(
		store
			.put_if_absent(LOCK_KEY, "foreign-holder".into(), ttl)
			.await
			.expect("Seeding the lock should succeed."),
		"The foreign lock fixture should win the empty key.",
	);
}

#[tokio::test]
async fn background_mode_declines_under_contention() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, config_with_backoff(20, 50));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"unexpected\",\"expires_in\":900}");
		})
		.await;

	hold_foreign_lock(&store, Duration::seconds(60)).await;

	let outcome = coordinator
		.refresh(&us(), RefreshMode::Background)
		.await
		.expect("Declining is not an error.");

	assert_eq!(outcome, RefreshOutcome::Declined);

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn blocking_mode_observes_a_foreign_refresh_landing() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, config_with_backoff(50, 100));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"unexpected\",\"expires_in\":900}");
		})
		.await;

	hold_foreign_lock(&store, Duration::seconds(60)).await;

	// Another process finishes its refresh while this call is polling.
	let peer_store = store.clone();
	let writer = tokio::spawn(async move {
		tokio::time::sleep(std::time::Duration::from_millis(80)).await;

		let record =
			CachedToken::new("peer-token", OffsetDateTime::now_utc() + Duration::seconds(600));

		peer_store
			.put(
				TOKEN_KEY,
				record.encode().expect("Record fixture should serialize."),
				Duration::seconds(600),
			)
			.await
			.expect("Peer write should succeed.");
	});
	let outcome = coordinator
		.refresh(&us(), RefreshMode::Blocking)
		.await
		.expect("Observing a peer refresh is a success.");

	assert_eq!(outcome, RefreshOutcome::Observed);

	writer.await.expect("Peer writer should not panic.");
	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn blocking_mode_fails_with_contention_when_nothing_lands() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, config_with_backoff(20, 50));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"unexpected\",\"expires_in\":900}");
		})
		.await;

	hold_foreign_lock(&store, Duration::seconds(60)).await;

	let err = coordinator
		.refresh(&us(), RefreshMode::Blocking)
		.await
		.expect_err("Exhausting the poll budget without a token is a contention failure.");

	assert!(matches!(err, Error::Contention { ref region } if region.as_ref() == "us"));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn blocking_mode_takes_over_after_the_holders_lease_expires() {
	let server = MockServer::start_async().await;
	// Polls long enough for the one-second foreign lease to lapse before the final attempt.
	let (coordinator, store) = build_coordinator(&server, config_with_backoff(500, 1_000));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"takeover-token\",\"expires_in\":900}");
		})
		.await;

	hold_foreign_lock(&store, Duration::seconds(1)).await;

	let outcome = coordinator
		.refresh(&us(), RefreshMode::Blocking)
		.await
		.expect("Taking over an abandoned lock should succeed.");

	assert_eq!(outcome, RefreshOutcome::Refreshed);

	mock.assert_calls_async(1).await;

	let raw = store
		.get(TOKEN_KEY)
		.await
		.expect("Store read should succeed.")
		.expect("The takeover should have stored a token.");

	assert_eq!(
		CachedToken::decode(&raw).expect("Stored record should decode.").access_token.expose(),
		"takeover-token",
	);
	assert_eq!(
		store.get(LOCK_KEY).await.expect("Lock read should succeed."),
		None,
		"The lease must be released after the exchange.",
	);
}

#[tokio::test]
async fn successful_refresh_stores_releases_and_counts() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, config_with_backoff(20, 50));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"counted-token\",\"expires_in\":900}");
		})
		.await;
	let outcome = coordinator
		.refresh(&us(), RefreshMode::Blocking)
		.await
		.expect("Refresh against a healthy endpoint should succeed.");

	assert_eq!(outcome, RefreshOutcome::Refreshed);
	assert_eq!(coordinator.refresh_counters().attempts(), 1);
	assert_eq!(coordinator.refresh_counters().successes(), 1);
	assert_eq!(coordinator.refresh_counters().failures(), 0);
	assert_eq!(
		store.get(LOCK_KEY).await.expect("Lock read should succeed."),
		None,
		"The lease must be released after the exchange.",
	);
}

#[tokio::test]
async fn rejected_refresh_surfaces_the_endpoint_error_and_counts() {
	let server = MockServer::start_async().await;
	let (coordinator, _store) = build_coordinator(&server, config_with_backoff(20, 50));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_request\"}");
		})
		.await;
	let err = coordinator
		.refresh(&us(), RefreshMode::Blocking)
		.await
		.expect_err("A rejected exchange should fail the refresh.");

	assert!(matches!(err, Error::Endpoint(_)));
	assert_eq!(coordinator.refresh_counters().failures(), 1);

	mock.assert_calls_async(1).await;
}
