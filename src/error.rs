//! Crate-level error types shared by the handshake, the gateway, and the stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Terminal outcome of an authorization handshake other than success.
	#[error(transparent)]
	Handshake(#[from] HandshakeError),

	/// Caller supplied an unusable request.
	#[error("Invalid request: {reason}.")]
	InvalidRequest {
		/// Human-readable reason.
		reason: String,
	},
	/// Provider rejected the grant (expired, reused, or unknown code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Provider rejected the client credentials held by the gateway.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Received bundle cannot be turned into a persisted record.
	#[error("Token bundle cannot be persisted: {0}")]
	InvalidBundle(#[from] crate::auth::TokenRecordBuilderError),
	/// Token exchange gateway answered with a non-success status.
	#[error("HTTP {status}: {body}")]
	GatewayRejected {
		/// HTTP status code returned by the gateway.
		status: u16,
		/// Raw response body.
		body: String,
	},
}
impl Error {
	/// Returns the handshake outcome carried by this error, if any.
	pub fn handshake(&self) -> Option<&HandshakeError> {
		match self {
			Self::Handshake(e) => Some(e),
			_ => None,
		}
	}
}

/// Non-success outcomes of a popup authorization handshake.
///
/// Each variant renders a distinct message that can be shown to the user as-is.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum HandshakeError {
	/// The provider redirected back with an `error` parameter.
	#[error("Authorization was denied: {reason}.")]
	UserDenied {
		/// Provider-supplied `error_description` (or `error`).
		reason: String,
	},
	/// Returned `state` did not match the pending correlation token.
	#[error(
		"Could not verify this authorization request. Close this window and start the connection again from the app."
	)]
	CsrfFailure,
	/// Redirect carried neither `code` nor `error`.
	#[error("No authorization code received.")]
	MissingCode,
	/// Token exchange gateway did not return a token bundle.
	#[error("Failed to exchange the authorization code: {message}")]
	ExchangeFailure {
		/// Raw failure detail; never contains the client secret.
		message: String,
	},
	/// Popup was closed before any terminal message arrived.
	#[error("Authorization window was closed before the connection completed.")]
	Cancelled,
	/// Popup could not be opened at all.
	#[error("Failed to open the authorization window. Please allow popups for this site.")]
	PopupBlocked,
	/// Popup stayed open longer than the configured bound.
	#[error("Authorization did not complete within {0:?}.")]
	TimedOut(StdDuration),
}
impl HandshakeError {
	/// Returns `true` when simply retrying the authorization is expected to help.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Cancelled | Self::PopupBlocked | Self::TimedOut(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Environment variable holds a value that cannot be used.
	#[error("Environment variable `{key}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Why the value was rejected.
		reason: String,
	},

	/// Server-held OAuth client credentials are absent.
	#[error("OAuth client credentials are not configured on the server; set {missing}.")]
	MissingCredentials {
		/// Names of the unset settings.
		missing: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON at `{}`: {}.", .source.path(), .source.inner())]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Endpoint answered with a success status but no body.
	#[error("Token endpoint returned an empty response.")]
	EmptyResponse {
		/// HTTP status code of the empty response.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
