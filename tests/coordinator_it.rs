#![cfg(feature = "reqwest")]

// crates.io
use serde_json::json;
// self
use oauth2_popup::{
	_preludet::*,
	auth::{AntiForgeryStore, ProviderId, TokenBundle},
	connection::ConnectionState,
	context::{MessageBus, PopupWindow, WindowId},
	flows::{AuthorizationCoordinator, AuthorizationRequest, redirect_uri_at},
	provider::presets,
};

const POLL: StdDuration = StdDuration::from_millis(10);

struct Harness {
	coordinator: Arc<AuthorizationCoordinator>,
	launcher: Arc<ScriptedLauncher>,
	bus: MessageBus,
	app: Origin,
}

fn harness_with(launcher: ScriptedLauncher, max_wait: Option<StdDuration>) -> Harness {
	let app = Url::parse("http://localhost:5173/").expect("Failed to parse app URL.").origin();
	let bus = MessageBus::new();
	let launcher = Arc::new(launcher);
	let connection = Arc::new(ConnectionState::in_memory(
		ProviderId::new("hubspot").expect("Failed to build provider identifier."),
	));
	let request = AuthorizationRequest::new(
		presets::hubspot().expect("Failed to build HubSpot preset."),
		"client-it",
		redirect_uri_at(&app, presets::HUBSPOT_CALLBACK_PATH).expect("Failed to build redirect URI."),
	)
	.with_scope(presets::hubspot_scopes().expect("Failed to build HubSpot scopes."));
	let coordinator = AuthorizationCoordinator::new(
		app.clone(),
		bus.clone(),
		launcher.clone(),
		AntiForgeryStore::new(),
		connection,
		request,
	)
	.with_poll_interval(POLL)
	.with_max_wait(max_wait);

	Harness { coordinator: Arc::new(coordinator), launcher, bus, app }
}

fn harness() -> Harness {
	harness_with(ScriptedLauncher::default(), Some(StdDuration::from_secs(30)))
}

fn spawn_authorization(
	coordinator: &Arc<AuthorizationCoordinator>,
) -> tokio::task::JoinHandle<Result<TokenBundle>> {
	let coordinator = coordinator.clone();

	tokio::spawn(async move { coordinator.start_authorization().await })
}

fn success(access_token: &str) -> serde_json::Value {
	json!({
		"type": "OAUTH_SUCCESS",
		"tokenData": { "access_token": access_token, "expires_in": 3600, "token_type": "Bearer" }
	})
}

fn state_of(popup: &ScriptedPopup) -> String {
	popup
		.url()
		.query_pairs()
		.find_map(|(k, v)| (k == "state").then(|| v.into_owned()))
		.expect("Authorization URL should carry a state parameter.")
}

#[tokio::test]
async fn success_resolves_once_and_persists_the_bundle() {
	let h = harness();
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let port = h.bus.port(popup.id(), h.app.clone(), h.app.clone());

	assert!(port.post_message(success("tok1"), &h.app));

	// Closing right after the message must not turn the result into a cancellation.
	popup.user_close();

	let bundle = task
		.await
		.expect("Authorization task should not panic.")
		.expect("Authorization should succeed.");

	assert_eq!(bundle.access_token.expose(), "tok1");
	assert!(h.coordinator.connection().is_connected());
	assert_eq!(h.coordinator.connection().status().error, None);
	assert_eq!(h.bus.listener_count(), 0, "The listener must be torn down.");
	assert!(popup.is_closed());
}

#[tokio::test]
async fn closing_the_popup_cancels_within_a_poll_interval() {
	let h = harness();
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let closed_at = tokio::time::Instant::now();

	popup.user_close();

	let err = task
		.await
		.expect("Authorization task should not panic.")
		.expect_err("Closed popup should cancel.");

	assert!(closed_at.elapsed() < StdDuration::from_secs(1));
	assert_eq!(err.handshake(), Some(&HandshakeError::Cancelled));
	assert!(!h.coordinator.csrf().is_pending(), "Cancelled sessions are cleared.");
	assert!(!h.coordinator.connection().is_connected());
	assert_eq!(h.coordinator.connection().status().error, None);
	assert_eq!(h.bus.listener_count(), 0);

	// A late message from the closed popup has nobody to reach.
	let port = h.bus.port(popup.id(), h.app.clone(), h.app.clone());

	port.post_message(success("late"), &h.app);

	assert!(!h.coordinator.connection().is_connected());
}

#[tokio::test]
async fn blocked_popups_fail_immediately() {
	let h = harness_with(ScriptedLauncher::blocked(), None);
	let err = h.coordinator.start_authorization().await.expect_err("Blocked popup should fail.");

	assert_eq!(err.handshake(), Some(&HandshakeError::PopupBlocked));
	assert!(err.handshake().is_some_and(HandshakeError::is_retryable));
	assert!(!h.coordinator.csrf().is_pending());
	assert_eq!(h.bus.listener_count(), 0);
	assert_eq!(
		h.coordinator.connection().status().error,
		Some(HandshakeError::PopupBlocked.to_string())
	);
}

#[tokio::test]
async fn foreign_messages_are_ignored() {
	let h = harness();
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let evil = Url::parse("https://evil.example").expect("Failed to parse foreign URL.").origin();
	let forged_origin = h.bus.port(popup.id(), evil, h.app.clone());
	let other_window = h.bus.port(WindowId::next(), h.app.clone(), h.app.clone());
	let genuine = h.bus.port(popup.id(), h.app.clone(), h.app.clone());

	assert!(forged_origin.post_message(success("forged"), &h.app));
	assert!(other_window.post_message(success("other"), &h.app));
	assert!(genuine.post_message(json!({ "type": "SOMETHING_ELSE" }), &h.app));
	assert!(genuine.post_message(success("tok1"), &h.app));

	let bundle = task
		.await
		.expect("Authorization task should not panic.")
		.expect("Genuine message should resolve the attempt.");

	assert_eq!(bundle.access_token.expose(), "tok1");
}

#[tokio::test]
async fn failures_are_recorded_as_the_connection_error() {
	let h = harness();
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let port = h.bus.port(popup.id(), h.app.clone(), h.app.clone());

	port.post_message(
		json!({ "type": "OAUTH_ERROR", "error": "User declined", "kind": "user_denied" }),
		&h.app,
	);

	let err = task
		.await
		.expect("Authorization task should not panic.")
		.expect_err("Denial should fail the attempt.");
	let expected = HandshakeError::UserDenied { reason: "User declined".into() };

	assert_eq!(err.handshake(), Some(&expected));
	assert_eq!(h.coordinator.connection().status().error, Some(expected.to_string()));
	assert!(popup.is_closed());
}

#[tokio::test]
async fn a_new_attempt_supersedes_the_pending_one() {
	let h = harness();
	let first = spawn_authorization(&h.coordinator);
	let first_popup = h.launcher.wait_for_popup(0).await;
	let stale_state = state_of(&first_popup);
	let second = spawn_authorization(&h.coordinator);
	let second_popup = h.launcher.wait_for_popup(1).await;
	let err = first
		.await
		.expect("First task should not panic.")
		.expect_err("Superseded attempt should be cancelled.");

	assert_eq!(err.handshake(), Some(&HandshakeError::Cancelled));
	assert!(first_popup.is_closed());
	assert!(h.coordinator.csrf().is_pending(), "The newer session must survive the teardown.");

	let port = h.bus.port(second_popup.id(), h.app.clone(), h.app.clone());

	port.post_message(success("tok2"), &h.app);

	let bundle = second
		.await
		.expect("Second task should not panic.")
		.expect("Second attempt should succeed.");

	assert_eq!(bundle.access_token.expose(), "tok2");
	assert!(!h.coordinator.csrf().validate_and_consume(&stale_state));
}

#[tokio::test]
async fn overall_wait_is_bounded() {
	let max_wait = StdDuration::from_millis(50);
	let h = harness_with(ScriptedLauncher::default(), Some(max_wait));
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let err = task
		.await
		.expect("Authorization task should not panic.")
		.expect_err("Abandoned popup should time out.");

	assert_eq!(err.handshake(), Some(&HandshakeError::TimedOut(max_wait)));
	assert!(popup.is_closed(), "Timed out popups are closed by the opener.");
	assert!(!h.coordinator.csrf().is_pending());
}

#[tokio::test]
async fn dropping_the_pending_call_tears_down_the_attempt() {
	let h = harness();
	let task = spawn_authorization(&h.coordinator);
	let popup = h.launcher.wait_for_popup(0).await;
	let state = state_of(&popup);

	assert!(h.coordinator.csrf().is_pending());

	task.abort();

	let err = task.await.expect_err("Aborted task should not produce a result.");

	assert!(err.is_cancelled());
	assert!(!h.coordinator.csrf().is_pending(), "An abandoned session must not stay valid.");
	assert!(!h.coordinator.csrf().validate_and_consume(&state));
	assert!(popup.is_closed(), "The abandoned popup is closed by the opener.");
	assert_eq!(h.bus.listener_count(), 0);
	assert!(!h.coordinator.connection().is_connected());
}
