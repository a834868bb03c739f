//! Outbound authorization URL construction.

// self
use crate::{
	_prelude::*,
	auth::{CorrelationToken, ScopeSet},
	error::ConfigError,
	provider::ProviderDescriptor,
};

/// Default path of the callback page on the application's origin.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Returns `<origin>/oauth/callback`.
pub fn redirect_uri_for(origin: &Origin) -> Result<Url, ConfigError> {
	redirect_uri_at(origin, CALLBACK_PATH)
}

/// Returns `<origin><path>`, for apps registered with a provider-specific callback path.
pub fn redirect_uri_at(origin: &Origin, path: &str) -> Result<Url, ConfigError> {
	Url::parse(&origin.ascii_serialization())
		.and_then(|base| base.join(path))
		.map_err(|source| ConfigError::InvalidRedirect { source })
}

/// Everything needed to send the user to the provider's consent page.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// Provider being authorized.
	pub descriptor: ProviderDescriptor,
	/// Public client id; the secret lives only in the gateway.
	pub client_id: String,
	/// Registered redirect URI pointing at the callback page.
	pub redirect_uri: Url,
	/// Requested scopes.
	pub scope: ScopeSet,
}
impl AuthorizationRequest {
	/// Creates a request without scopes.
	pub fn new(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		Self { descriptor, client_id: client_id.into(), redirect_uri, scope: ScopeSet::default() }
	}

	/// Sets the requested scopes.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Authorization URL carrying `state`.
	pub fn authorize_url(&self, state: &CorrelationToken) -> Url {
		let mut url = self.descriptor.endpoints.authorization.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("client_id", &self.client_id);

			if !self.scope.is_empty() {
				pairs.append_pair("scope", &self.scope.join(self.descriptor.quirks.scope_delimiter));
			}

			pairs
				.append_pair("redirect_uri", self.redirect_uri.as_str())
				.append_pair("state", state.as_str())
				.append_pair("response_type", "code");
		}

		url
	}
}
