//! Opener-side authorization coordinator.
//!
//! [`AuthorizationCoordinator::start_authorization`] suspends until exactly one of these
//! happens: a terminal message arrives from the popup it opened, the popup is seen closed,
//! a newer call supersedes it, or the overall wait bound elapses. A queued message always
//! wins over closed detection. The message listener, the poll timer and the supersede
//! signal all live inside the call and are dropped with it. An attempt that ends without
//! a bundle, or whose future is dropped, discards its session and closes its popup.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{
	sync::oneshot,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::{AntiForgeryStore, CorrelationToken, TokenBundle},
	connection::ConnectionState,
	context::{
		Envelope, MessageBus, MessageListener, PopupLauncher, PopupRequest, PopupWindow, WindowId,
	},
	flows::{AuthorizationRequest, PopupMessage},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// How often the popup's closed flag is checked.
pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);
/// Upper bound on a single authorization attempt.
pub const DEFAULT_MAX_WAIT: StdDuration = StdDuration::from_secs(600);

const MIN_POLL_INTERVAL: StdDuration = StdDuration::from_millis(1);

/// Drives popup authorizations for one provider on behalf of the application window.
pub struct AuthorizationCoordinator {
	app_origin: Origin,
	bus: MessageBus,
	launcher: Arc<dyn PopupLauncher>,
	csrf: AntiForgeryStore,
	connection: Arc<ConnectionState>,
	request: AuthorizationRequest,
	poll_interval: StdDuration,
	max_wait: Option<StdDuration>,
	attempts: AtomicU64,
	pending: Mutex<Option<(u64, oneshot::Sender<()>)>>,
}
impl AuthorizationCoordinator {
	/// Creates a coordinator for the application window at `app_origin`.
	pub fn new(
		app_origin: Origin,
		bus: MessageBus,
		launcher: Arc<dyn PopupLauncher>,
		csrf: AntiForgeryStore,
		connection: Arc<ConnectionState>,
		request: AuthorizationRequest,
	) -> Self {
		Self {
			app_origin,
			bus,
			launcher,
			csrf,
			connection,
			request,
			poll_interval: DEFAULT_POLL_INTERVAL,
			max_wait: Some(DEFAULT_MAX_WAIT),
			attempts: AtomicU64::new(0),
			pending: Mutex::new(None),
		}
	}

	/// Overrides the closed-check interval.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval.max(MIN_POLL_INTERVAL);

		self
	}

	/// Overrides the overall wait bound; `None` waits for as long as the popup stays open.
	pub fn with_max_wait(mut self, max_wait: Option<StdDuration>) -> Self {
		self.max_wait = max_wait;

		self
	}

	/// Connection state updated by successful attempts.
	pub fn connection(&self) -> &Arc<ConnectionState> {
		&self.connection
	}

	/// Anti-forgery store shared with the callback page.
	pub fn csrf(&self) -> &AntiForgeryStore {
		&self.csrf
	}

	/// Opens the consent popup and waits for its terminal outcome.
	///
	/// On success the bundle is persisted through [`ConnectionState`] before it is
	/// returned. Failures other than cancellation are also recorded as the connection
	/// error. Calling this again while a previous call is pending resolves the previous
	/// call with [`HandshakeError::Cancelled`].
	pub async fn start_authorization(&self) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "start_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.authorize()).await;
		let outcome = obs::outcome_of(&result);

		span.record_outcome(outcome);
		obs::record_flow_outcome(KIND, outcome);

		if let Err(e) = &result
			&& !matches!(e.handshake(), Some(HandshakeError::Cancelled))
		{
			self.connection.record_error(e.to_string());
		}

		result
	}

	/// Forgets the persisted connection.
	pub async fn disconnect(&self) -> Result<()> {
		self.connection.clear().await
	}

	async fn authorize(&self) -> Result<TokenBundle> {
		let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
		let (supersede_tx, superseded) = oneshot::channel();

		if let Some((_, previous)) = self.pending.lock().replace((attempt, supersede_tx)) {
			let _ = previous.send(());
		}

		let result = self.attempt(superseded).await;

		{
			let mut pending = self.pending.lock();

			if pending.as_ref().is_some_and(|(id, _)| *id == attempt) {
				*pending = None;
			}
		}

		let bundle = result?;

		self.connection.persist(&bundle).await?;

		Ok(bundle)
	}

	async fn attempt(&self, superseded: oneshot::Receiver<()>) -> Result<TokenBundle, HandshakeError> {
		// Registered before the popup exists so no early message can be missed.
		let mut listener = self.bus.listen();
		let mut guard = AttemptGuard::new(&self.csrf, self.csrf.begin());
		let request = PopupRequest::new(self.request.authorize_url(&guard.token));
		let Some(popup) = self.launcher.open(&request) else {
			obs::event!(warn, "Authorization popup was blocked.");

			return Err(HandshakeError::PopupBlocked);
		};

		guard.popup = Some(popup.clone());

		let result = self.supervise(&mut listener, popup.as_ref(), superseded).await;

		drop(listener);

		if result.is_ok() {
			guard.disarm();
		}

		result
	}

	async fn supervise(
		&self,
		listener: &mut MessageListener,
		popup: &dyn PopupWindow,
		mut superseded: oneshot::Receiver<()>,
	) -> Result<TokenBundle, HandshakeError> {
		let mut ticker = time::interval(self.poll_interval);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let deadline = self.max_wait.map(|max_wait| (Instant::now() + max_wait, max_wait));
		let timeout = async {
			match deadline {
				Some((at, max_wait)) => {
					time::sleep_until(at).await;

					max_wait
				},
				None => std::future::pending().await,
			}
		};

		tokio::pin!(timeout);

		loop {
			tokio::select! {
				biased;

				envelope = listener.recv() => {
					let Some(envelope) = envelope else {
						return Err(HandshakeError::Cancelled);
					};

					if let Some(message) = self.accept(&envelope, popup.id()) {
						popup.close();

						return message.into_outcome();
					}
				},
				_ = ticker.tick() => {
					if !popup.is_closed() {
						continue;
					}

					// The popup may have posted right before closing.
					while let Some(envelope) = listener.try_recv() {
						if let Some(message) = self.accept(&envelope, popup.id()) {
							return message.into_outcome();
						}
					}

					obs::event!(info, "Authorization popup closed without a result.");

					return Err(HandshakeError::Cancelled);
				},
				_ = &mut superseded => {
					popup.close();

					obs::event!(info, "Authorization superseded by a newer attempt.");

					return Err(HandshakeError::Cancelled);
				},
				max_wait = &mut timeout => {
					popup.close();

					return Err(HandshakeError::TimedOut(max_wait));
				},
			}
		}
	}

	fn accept(&self, envelope: &Envelope, popup: WindowId) -> Option<PopupMessage> {
		if envelope.origin != self.app_origin || envelope.source != popup {
			obs::event!(debug, source = %envelope.source, "Ignored message from a foreign context.");

			return None;
		}

		serde_json::from_value(envelope.data.clone()).ok()
	}
}
impl Debug for AuthorizationCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationCoordinator")
			.field("app_origin", &self.app_origin)
			.field("provider", &self.request.descriptor.id)
			.field("poll_interval", &self.poll_interval)
			.field("max_wait", &self.max_wait)
			.field("pending", &self.pending.lock().is_some())
			.finish()
	}
}

/// Tears down an unfinished attempt: the correlation session is discarded and the popup
/// closed, including when the caller drops the pending future.
struct AttemptGuard<'a> {
	csrf: &'a AntiForgeryStore,
	token: CorrelationToken,
	popup: Option<Arc<dyn PopupWindow>>,
	armed: bool,
}
impl<'a> AttemptGuard<'a> {
	fn new(csrf: &'a AntiForgeryStore, token: CorrelationToken) -> Self {
		Self { csrf, token, popup: None, armed: true }
	}

	fn disarm(&mut self) {
		self.armed = false;
	}
}
impl Drop for AttemptGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		self.csrf.discard(&self.token);

		if let Some(popup) = &self.popup {
			popup.close();
		}
	}
}
