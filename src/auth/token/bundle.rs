//! Token bundle returned by a successful code exchange.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// `token_type` assumed when a provider omits it.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Access/refresh token pair as produced by the token exchange gateway.
///
/// The serialized form is the gateway's success body,
/// `{access_token, refresh_token?, expires_in, token_type}`, and is also the `tokenData`
/// payload of a success message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Bearer credential for provider API calls.
	pub access_token: TokenSecret,
	/// Long-lived credential, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token in seconds, counted from persistence time.
	pub expires_in: u64,
	/// Token type, typically `Bearer`.
	#[serde(default = "default_token_type")]
	pub token_type: String,
}
impl TokenBundle {
	/// Creates a bearer bundle without a refresh token.
	pub fn bearer(access_token: impl Into<String>, expires_in: u64) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			expires_in,
			token_type: DEFAULT_TOKEN_TYPE.into(),
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Lifetime as a [`Duration`], or `None` when it does not fit.
	pub fn lifetime(&self) -> Option<Duration> {
		i64::try_from(self.expires_in).ok().map(Duration::seconds)
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

fn default_token_type() -> String {
	DEFAULT_TOKEN_TYPE.into()
}
