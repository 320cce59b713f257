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
	region::{RegionCode, RegionRegistry},
	store::{MemoryStore, SharedStore},
	time::{Duration, OffsetDateTime},
	token::CachedToken,
	url::Url,
};

const US_TOKEN_KEY: &str = "oauth2:us";
const US_LOCK_KEY: &str = "oauth2:us:lock";
const EU_TOKEN_KEY: &str = "oauth2:eu";

fn region(code: &str) -> RegionCode {
	RegionCode::new(code).expect("Region fixture should be valid.")
}

fn build_registry(server: &MockServer) -> RegionRegistry {
	let mut builder = RegionRegistry::builder();

	for code in ["us", "eu"] {
		builder = builder.region(
			region(code),
			Url::parse(&server.url("/oauth/token"))
				.expect("Mock token endpoint should parse successfully."),
			Url::parse(&server.base_url()).expect("Mock API host should parse successfully."),
		);
	}

	builder.build().expect("Registry fixture should build successfully.")
}

fn insecure_token_client() -> ReqwestTokenClient {
	let client = oauth2_coordinator::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(oauth2_coordinator::reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestTokenClient::with_client(client)
}

fn build_coordinator(
	server: &MockServer,
	config: CoordinatorConfig,
) -> (Coordinator, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::default());
	let coordinator = Coordinator::new(
		store.clone(),
		Arc::new(insecure_token_client()),
		build_registry(server),
		config,
	);

	(coordinator, store)
}

fn fast_config() -> CoordinatorConfig {
	CoordinatorConfig::new()
		.with_credentials("test-client", "test-secret")
		.with_backoff(BackoffPolicy::new(
			Duration::milliseconds(20),
			Duration::milliseconds(50),
		))
}

async fn seed_token(store: &MemoryStore, key: &str, token: &str, expires_at: OffsetDateTime) {
	let record = CachedToken::new(token, expires_at);

	store
		.put(key, record.encode().expect("Record fixture should serialize."), Duration::hours(1))
		.await
		.expect("Seeding the store should succeed.");
}

#[tokio::test]
async fn get_token_exchanges_once_and_reuses_the_cache() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, fast_config());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"tok1\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let before = OffsetDateTime::now_utc();
	let first =
		coordinator.get_token(&region("us")).await.expect("Initial lookup should succeed.");
	let second =
		coordinator.get_token(&region("us")).await.expect("Cached lookup should succeed.");

	assert_eq!(first.expose(), "tok1");
	assert_eq!(second.expose(), "tok1");

	mock.assert_calls_async(1).await;

	// 1800s lifetime minus the 5s clock-skew margin.
	let raw = store
		.get(US_TOKEN_KEY)
		.await
		.expect("Store read should succeed.")
		.expect("A refreshed record should be stored.");
	let stored = CachedToken::decode(&raw).expect("Stored record should decode.");
	let remaining = stored.remaining(before);

	assert!(
		remaining > Duration::seconds(1780) && remaining <= Duration::seconds(1795),
		"Stored lifetime should be skew-adjusted, got {remaining}.",
	);
}

#[tokio::test]
async fn fresh_cache_skips_lock_and_endpoint() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, fast_config());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"unexpected\",\"expires_in\":1800}");
		})
		.await;

	seed_token(&store, US_TOKEN_KEY, "cached-token", OffsetDateTime::now_utc() + Duration::hours(1))
		.await;

	let token =
		coordinator.get_token(&region("us")).await.expect("Fresh lookup should succeed.");

	assert_eq!(token.expose(), "cached-token");

	mock.assert_calls_async(0).await;

	assert_eq!(
		store.get(US_LOCK_KEY).await.expect("Lock read should succeed."),
		None,
		"The fresh path must never create a lock entry.",
	);
}

#[tokio::test]
async fn stale_cache_serves_immediately_and_renews_in_background() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, fast_config());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"renewed-token\",\"expires_in\":1800}");
		})
		.await;

	// Ten seconds of lifetime left, well inside the 60s leeway window.
	seed_token(&store, US_TOKEN_KEY, "old-token", OffsetDateTime::now_utc() + Duration::seconds(10))
		.await;

	let token =
		coordinator.get_token(&region("us")).await.expect("Stale lookup should succeed.");

	assert_eq!(token.expose(), "old-token", "The stale path must serve the existing token.");

	// The detached renewal lands after the call has already returned.
	for _ in 0..200 {
		if let Some(raw) = store.get(US_TOKEN_KEY).await.expect("Store read should succeed.") {
			let record = CachedToken::decode(&raw).expect("Stored record should decode.");

			if record.access_token.expose() == "renewed-token" {
				mock.assert_calls_async(1).await;

				return;
			}
		}

		tokio::time::sleep(std::time::Duration::from_millis(25)).await;
	}

	panic!("Timed out waiting for the background renewal to land.");
}

#[tokio::test]
async fn concurrent_misses_collapse_into_one_exchange() {
	let server = MockServer::start_async().await;
	// Contenders poll slowly enough to outlast the winner's TLS handshake.
	let config = CoordinatorConfig::new()
		.with_credentials("test-client", "test-secret")
		.with_backoff(BackoffPolicy::new(
			Duration::milliseconds(200),
			Duration::milliseconds(400),
		));
	let (coordinator, _store) = build_coordinator(&server, config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"herd-token\",\"expires_in\":900}");
		})
		.await;
	let us = region("us");
	let (a, b, c, d) = tokio::join!(
		coordinator.get_token(&us),
		coordinator.get_token(&us),
		coordinator.get_token(&us),
		coordinator.get_token(&us),
	);

	for result in [a, b, c, d] {
		let token = result.expect("Every concurrent lookup should succeed.");

		assert_eq!(token.expose(), "herd-token");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn expired_cache_with_failing_endpoint_exhausts_retries_then_fails_unavailable() {
	let server = MockServer::start_async().await;
	let config = fast_config().with_max_retries(3);
	let (coordinator, store) = build_coordinator(&server, config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503).body("upstream overloaded");
		})
		.await;

	seed_token(&store, EU_TOKEN_KEY, "dead-token", OffsetDateTime::now_utc() - Duration::seconds(1))
		.await;

	let err = coordinator
		.get_token(&region("eu"))
		.await
		.expect_err("A fully failing refresh should surface as unavailable.");

	assert!(matches!(err, Error::Unavailable { ref region } if region.as_ref() == "eu"));

	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn non_retryable_rejections_fail_after_a_single_call() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, fast_config());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let err = coordinator
		.get_token(&region("us"))
		.await
		.expect_err("A rejected exchange should surface as unavailable.");

	assert!(matches!(err, Error::Unavailable { .. }));

	mock.assert_calls_async(1).await;

	assert_eq!(
		store.get(US_TOKEN_KEY).await.expect("Store read should succeed."),
		None,
		"A failed refresh must not leave a token behind.",
	);
}

#[tokio::test]
async fn corrupted_entries_are_deleted_on_read() {
	let server = MockServer::start_async().await;
	let (coordinator, store) = build_coordinator(&server, fast_config());
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400).body("{\"error\":\"invalid_request\"}");
		})
		.await;

	store
		.put(US_TOKEN_KEY, "{\"access_token\":42}".into(), Duration::hours(1))
		.await
		.expect("Seeding the store should succeed.");

	let _ = coordinator.get_token(&region("us")).await;

	assert_eq!(
		store.get(US_TOKEN_KEY).await.expect("Store read should succeed."),
		None,
		"A malformed entry must be removed by the read that found it.",
	);
}
