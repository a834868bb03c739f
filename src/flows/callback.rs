//! Popup-side callback handler.
//!
//! Runs once when the provider redirects the popup back to the application. The order of
//! checks is fixed: provider `error`, then a missing `code`, then `state` validation, and
//! only then the gateway exchange. A failed `state` check never reaches the network.

// std
use std::borrow::Cow;
// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{AntiForgeryStore, TokenBundle},
	context::{OpenerPort, PopupWindow},
	flows::PopupMessage,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Display delay before the popup closes after a success.
pub const SUCCESS_CLOSE_DELAY: StdDuration = StdDuration::from_secs(2);
/// Display delay before the popup closes after a failure.
pub const FAILURE_CLOSE_DELAY: StdDuration = StdDuration::from_secs(3);
/// Display delay before the popup closes after a failed `state` check.
pub const CSRF_CLOSE_DELAY: StdDuration = StdDuration::from_secs(4);

/// Boxed future returned by [`CodeExchanger::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenBundle>> + 'a + Send>>;

/// Trades an authorization code for tokens without holding the client secret.
pub trait CodeExchanger
where
	Self: Send + Sync,
{
	/// Exchanges `code` issued for `redirect_uri`.
	fn exchange<'a>(&'a self, code: &'a str, redirect_uri: &'a Url) -> ExchangeFuture<'a>;
}

/// Query parameters of the provider redirect. Empty values count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
	/// One-time authorization code.
	pub code: Option<String>,
	/// Echoed correlation token.
	pub state: Option<String>,
	/// Provider error code.
	pub error: Option<String>,
	/// Provider error description.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Parses the query of `url`.
	pub fn from_url(url: &Url) -> Self {
		Self::from_pairs(url.query_pairs())
	}

	/// Parses a raw query string, with or without the leading `?`.
	pub fn from_query(query: &str) -> Self {
		Self::from_pairs(form_urlencoded::parse(query.trim_start_matches('?').as_bytes()))
	}

	fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
		let mut params = Self::default();

		for (key, value) in pairs {
			let slot = match key.as_ref() {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			if slot.is_none() && !value.is_empty() {
				*slot = Some(value.into_owned());
			}
		}

		params
	}
}

/// Result of the callback as shown inside the popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
	/// Tokens were exchanged and handed to the opener.
	Connected,
	/// The handshake failed.
	Failed(HandshakeError),
}
impl CallbackOutcome {
	/// Returns `true` for [`CallbackOutcome::Connected`].
	pub fn is_connected(&self) -> bool {
		matches!(self, Self::Connected)
	}

	/// Failure carried by the outcome, if any.
	pub fn error(&self) -> Option<&HandshakeError> {
		match self {
			Self::Connected => None,
			Self::Failed(e) => Some(e),
		}
	}
}
impl Display for CallbackOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Connected => f.write_str("Successfully connected!"),
			Self::Failed(e) => Display::fmt(e, f),
		}
	}
}

/// What the callback did. Never carries the token bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackReport {
	/// Outcome displayed in the popup.
	pub outcome: CallbackOutcome,
	/// Whether the terminal message reached the opener.
	pub delivered: bool,
	/// How long the popup stays open before closing itself.
	pub close_after: StdDuration,
}

/// Callback page logic for one popup.
pub struct CallbackHandler {
	csrf: AntiForgeryStore,
	exchanger: Arc<dyn CodeExchanger>,
	opener: Option<OpenerPort>,
	app_origin: Origin,
	redirect_uri: Url,
}
impl CallbackHandler {
	/// Creates a handler for the callback page at `redirect_uri`.
	///
	/// Messages are only ever addressed to the origin of `redirect_uri`.
	pub fn new(csrf: AntiForgeryStore, exchanger: Arc<dyn CodeExchanger>, redirect_uri: Url) -> Self {
		Self { csrf, exchanger, opener: None, app_origin: redirect_uri.origin(), redirect_uri }
	}

	/// Sets the `window.opener` handle; without one the outcome is computed but not sent.
	pub fn with_opener(mut self, opener: OpenerPort) -> Self {
		self.opener = Some(opener);

		self
	}

	/// Processes the redirect at `url` and posts the terminal message to the opener.
	pub async fn handle(&self, url: &Url) -> CallbackReport {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "handle");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.resolve(CallbackParams::from_url(url))).await;
		let (message, outcome, close_after) = match result {
			Ok(bundle) => (
				PopupMessage::Success { token_data: bundle },
				CallbackOutcome::Connected,
				SUCCESS_CLOSE_DELAY,
			),
			Err(e) => {
				let close_after = match e {
					HandshakeError::CsrfFailure => CSRF_CLOSE_DELAY,
					_ => FAILURE_CLOSE_DELAY,
				};

				(PopupMessage::failure(&e), CallbackOutcome::Failed(e), close_after)
			},
		};
		let flow_outcome =
			if outcome.is_connected() { FlowOutcome::Success } else { FlowOutcome::Failure };

		span.record_outcome(flow_outcome);
		obs::record_flow_outcome(KIND, flow_outcome);

		let delivered = self.deliver(&message);

		CallbackReport { outcome, delivered, close_after }
	}

	/// [`handle`](Self::handle), then waits the display delay and closes `window`.
	pub async fn run(&self, url: &Url, window: &dyn PopupWindow) -> CallbackReport {
		let report = self.handle(url).await;

		tokio::time::sleep(report.close_after).await;
		window.close();

		report
	}

	async fn resolve(&self, params: CallbackParams) -> Result<TokenBundle, HandshakeError> {
		if let Some(error) = params.error {
			self.burn_state(params.state.as_deref());

			obs::event!(info, error = %error, "Provider returned an error.");

			return Err(HandshakeError::UserDenied {
				reason: params.error_description.unwrap_or(error),
			});
		}

		let Some(code) = params.code else {
			self.burn_state(params.state.as_deref());

			return Err(HandshakeError::MissingCode);
		};

		if !self.csrf.validate_and_consume(params.state.as_deref().unwrap_or_default()) {
			obs::event!(warn, "Callback state failed validation.");

			return Err(HandshakeError::CsrfFailure);
		}

		self.exchanger
			.exchange(&code, &self.redirect_uri)
			.await
			.map_err(|e| HandshakeError::ExchangeFailure { message: e.to_string() })
	}

	fn burn_state(&self, state: Option<&str>) {
		if let Some(state) = state {
			let _ = self.csrf.validate_and_consume(state);
		}
	}

	fn deliver(&self, message: &PopupMessage) -> bool {
		let Some(opener) = &self.opener else {
			return false;
		};

		match serde_json::to_value(message) {
			Ok(data) => opener.post_message(data, &self.app_origin),
			Err(_e) => {
				obs::event!(error, error = %_e, "Failed to encode the popup message.");

				false
			},
		}
	}
}
impl Debug for CallbackHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackHandler")
			.field("app_origin", &self.app_origin)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("has_opener", &self.opener.is_some())
			.finish()
	}
}
