#![cfg(feature = "server")]

// crates.io
use httpmock::prelude::*;
use tokio::net::TcpListener;
// self
use oauth2_popup::{
	_preludet::*,
	auth::{AntiForgeryStore, ProviderId},
	connection::ConnectionState,
	context::{MessageBus, PopupWindow},
	flows::{
		AuthorizationCoordinator, AuthorizationRequest, CallbackHandler, CallbackReport,
		redirect_uri_for,
	},
	gateway::{GatewayClient, GatewayConfig, TokenGateway, server},
	provider::{ClientAuthMethod, ProviderDescriptor},
	store::MemoryStore,
};

struct World {
	coordinator: Arc<AuthorizationCoordinator>,
	launcher: Arc<ScriptedLauncher>,
	bus: MessageBus,
	app: Origin,
	gateway_client: Arc<GatewayClient>,
	csrf: AntiForgeryStore,
}

fn descriptor(provider: &MockServer) -> ProviderDescriptor {
	let id = ProviderId::new("hubspot").expect("Failed to build provider identifier.");

	ProviderDescriptor::builder(id)
		.authorization_endpoint(
			Url::parse(&provider.url("/oauth/authorize")).expect("Failed to parse authorize URL."),
		)
		.token_endpoint(
			Url::parse(&provider.url("/oauth/v1/token")).expect("Failed to parse token URL."),
		)
		.client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("Failed to build provider descriptor.")
}

async fn world(provider: &MockServer) -> World {
	let app = Url::parse("http://localhost:5173/").expect("Failed to parse app URL.").origin();
	let redirect_uri = redirect_uri_for(&app).expect("Failed to build redirect URI.");
	let gateway = TokenGateway::new(
		descriptor(provider),
		GatewayConfig::new("client-e2e", "secret-e2e").with_allowed_redirects([redirect_uri.clone()]),
	)
	.expect("Failed to build token gateway.")
	.with_http_client(test_reqwest_http_client());
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind gateway listener.");
	let addr = listener.local_addr().expect("Gateway listener should have an address.");

	tokio::spawn(async move { axum::serve(listener, server::router(Arc::new(gateway))).await });

	let endpoint = Url::parse(&format!("http://{addr}{}", server::TOKEN_PATH))
		.expect("Failed to parse gateway URL.");
	let gateway_client = GatewayClient::new(endpoint)
		.expect("Failed to build gateway client.")
		.with_http_client(test_reqwest_http_client());
	let bus = MessageBus::new();
	let launcher = Arc::new(ScriptedLauncher::default());
	let csrf = AntiForgeryStore::new();
	let connection = Arc::new(ConnectionState::new(
		ProviderId::new("hubspot").expect("Failed to build provider identifier."),
		Arc::new(MemoryStore::default()),
	));
	let coordinator = AuthorizationCoordinator::new(
		app.clone(),
		bus.clone(),
		launcher.clone(),
		csrf.clone(),
		connection,
		AuthorizationRequest::new(descriptor(provider), "client-e2e", redirect_uri),
	)
	.with_poll_interval(StdDuration::from_millis(10));

	World {
		coordinator: Arc::new(coordinator),
		launcher,
		bus,
		app,
		gateway_client: Arc::new(gateway_client),
		csrf,
	}
}

/// Plays the provider redirect inside the popup and returns the callback report.
async fn redirect_back(world: &World, popup: &ScriptedPopup, code: &str) -> CallbackReport {
	let state = popup
		.url()
		.query_pairs()
		.find_map(|(k, v)| (k == "state").then(|| v.into_owned()))
		.expect("Authorization URL should carry a state parameter.");
	let redirect_uri = redirect_uri_for(&world.app).expect("Failed to build redirect URI.");
	let mut callback = redirect_uri.clone();

	callback.query_pairs_mut().append_pair("code", code).append_pair("state", &state);

	CallbackHandler::new(world.csrf.clone(), world.gateway_client.clone(), redirect_uri)
		.with_opener(world.bus.port(popup.id(), world.app.clone(), world.app.clone()))
		.handle(&callback)
		.await
}

#[tokio::test]
async fn successful_handshake_connects_the_account() {
	let provider = MockServer::start_async().await;
	let token = provider
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"tok1\",\"expires_in\":3600,\"token_type\":\"Bearer\"}");
		})
		.await;
	let world = world(&provider).await;
	let task = {
		let coordinator = world.coordinator.clone();

		tokio::spawn(async move { coordinator.start_authorization().await })
	};
	let popup = world.launcher.wait_for_popup(0).await;
	let report = redirect_back(&world, &popup, "xyz").await;

	assert!(report.outcome.is_connected());
	assert!(report.delivered);

	let bundle = task
		.await
		.expect("Authorization task should not panic.")
		.expect("Handshake should succeed.");

	token.assert_async().await;

	let connection = world.coordinator.connection();

	assert_eq!(bundle.access_token.expose(), "tok1");
	assert!(connection.is_connected());
	assert_eq!(
		connection.record().map(|record| record.access_token.expose().to_owned()).as_deref(),
		Some("tok1")
	);

	world.coordinator.disconnect().await.expect("Disconnect should succeed.");

	assert!(!connection.is_connected());
}

#[tokio::test]
async fn rejected_codes_leave_the_account_disconnected() {
	let provider = MockServer::start_async().await;
	let _token = provider
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code already used\"}");
		})
		.await;
	let world = world(&provider).await;
	let task = {
		let coordinator = world.coordinator.clone();

		tokio::spawn(async move { coordinator.start_authorization().await })
	};
	let popup = world.launcher.wait_for_popup(0).await;
	let report = redirect_back(&world, &popup, "reused").await;

	assert!(!report.outcome.is_connected());

	let err = task
		.await
		.expect("Authorization task should not panic.")
		.expect_err("Rejected code should fail the handshake.");

	assert!(matches!(
		err.handshake(),
		Some(HandshakeError::ExchangeFailure { message }) if message.contains("invalid_grant")
	));
	assert!(!err.to_string().contains("secret-e2e"));

	let status = world.coordinator.connection().status();

	assert!(!status.connected);
	assert!(status.error.is_some_and(|e| e.contains("invalid_grant")));
}
