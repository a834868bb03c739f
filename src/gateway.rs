//! Token Exchange Gateway: the backend-only operation that trades an authorization code
//! for tokens with a client secret the browser never sees.
//!
//! [`TokenGateway`] holds the confidential configuration and performs the exchange;
//! `server` (feature `server`) exposes it as `POST /oauth/token`; [`client`] is the
//! browser-side caller used by the callback handler.

#[cfg(feature = "reqwest")] pub mod client;
#[cfg(feature = "server")] pub mod server;

#[cfg(feature = "reqwest")] pub use client::GatewayClient;

// self
use crate::{_prelude::*, error::ConfigError};
#[cfg(feature = "reqwest")]
use crate::{
	auth::TokenBundle,
	http::ReqwestHttpClient,
	oauth::CodeExchangeClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
};

/// Environment variable holding the OAuth client id.
pub const ENV_CLIENT_ID: &str = "HUBSPOT_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "HUBSPOT_CLIENT_SECRET";
/// Environment variable holding the comma separated redirect allow-list.
pub const ENV_ALLOWED_REDIRECTS: &str = "GATEWAY_ALLOWED_REDIRECTS";
/// Environment variable holding the listen port.
pub const ENV_PORT: &str = "PORT";
/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

/// Body of `POST /oauth/token`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
	/// One-time authorization code from the provider redirect.
	#[serde(default)]
	pub code: String,
	/// Redirect URI the code was issued for.
	#[serde(default)]
	pub redirect_uri: String,
}
impl ExchangeRequest {
	/// Creates a request.
	pub fn new(code: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
		Self { code: code.into(), redirect_uri: redirect_uri.into() }
	}
}

/// Server-held configuration of the gateway.
#[derive(Clone)]
pub struct GatewayConfig {
	client_id: Option<String>,
	client_secret: Option<String>,
	/// Redirect URIs codes may be exchanged for; empty allows any.
	pub allowed_redirects: Vec<Url>,
	/// Listen port of the HTTP surface.
	pub port: u16,
}
impl GatewayConfig {
	/// Configuration with both credentials present.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: Some(client_id.into()),
			client_secret: Some(client_secret.into()),
			allowed_redirects: Vec::new(),
			port: DEFAULT_PORT,
		}
	}

	/// Reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads settings through `lookup`; blank values count as unset.
	///
	/// Missing credentials are accepted here and reported by every exchange instead, so
	/// the server can start and answer with a configuration error.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let port = match get(ENV_PORT) {
			Some(raw) => raw
				.parse()
				.map_err(|e| ConfigError::InvalidEnv { key: ENV_PORT, reason: format!("{e}") })?,
			None => DEFAULT_PORT,
		};
		let allowed_redirects = get(ENV_ALLOWED_REDIRECTS)
			.map(|raw| {
				raw.split(',')
					.map(str::trim)
					.filter(|item| !item.is_empty())
					.map(|item| {
						Url::parse(item).map_err(|e| ConfigError::InvalidEnv {
							key: ENV_ALLOWED_REDIRECTS,
							reason: format!("{item}: {e}"),
						})
					})
					.collect::<Result<Vec<_>, _>>()
			})
			.transpose()?
			.unwrap_or_default();

		Ok(Self {
			client_id: get(ENV_CLIENT_ID),
			client_secret: get(ENV_CLIENT_SECRET),
			allowed_redirects,
			port,
		})
	}

	/// Restricts exchanges to the given redirect URIs.
	pub fn with_allowed_redirects(mut self, redirects: impl IntoIterator<Item = Url>) -> Self {
		self.allowed_redirects = redirects.into_iter().collect();

		self
	}

	/// Overrides the listen port.
	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;

		self
	}

	/// Client id, if configured.
	pub fn client_id(&self) -> Option<&str> {
		self.client_id.as_deref()
	}

	/// Returns `true` when both credentials are present.
	pub fn has_credentials(&self) -> bool {
		self.credentials().is_ok()
	}

	fn credentials(&self) -> Result<(&str, &str), ConfigError> {
		match (self.client_id.as_deref(), self.client_secret.as_deref()) {
			(Some(id), Some(secret)) => Ok((id, secret)),
			(None, Some(_)) => Err(ConfigError::MissingCredentials { missing: ENV_CLIENT_ID }),
			(Some(_), None) => Err(ConfigError::MissingCredentials { missing: ENV_CLIENT_SECRET }),
			(None, None) => Err(ConfigError::MissingCredentials {
				missing: "HUBSPOT_CLIENT_ID and HUBSPOT_CLIENT_SECRET",
			}),
		}
	}
}
impl Debug for GatewayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewayConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("allowed_redirects", &self.allowed_redirects)
			.field("port", &self.port)
			.finish()
	}
}

/// Performs authorization-code exchanges for one provider.
#[cfg(feature = "reqwest")]
pub struct TokenGateway {
	descriptor: ProviderDescriptor,
	config: GatewayConfig,
	strategy: Arc<dyn ProviderStrategy>,
	http_client: ReqwestHttpClient,
}
#[cfg(feature = "reqwest")]
impl TokenGateway {
	/// Creates a gateway with the default strategy and HTTP client.
	pub fn new(descriptor: ProviderDescriptor, config: GatewayConfig) -> Result<Self> {
		Ok(Self {
			descriptor,
			config,
			strategy: Arc::new(DefaultProviderStrategy),
			http_client: ReqwestHttpClient::new()?,
		})
	}

	/// Replaces the HTTP client used to reach the provider.
	pub fn with_http_client(mut self, http_client: ReqwestHttpClient) -> Self {
		self.http_client = http_client;

		self
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Gateway configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Provider the gateway exchanges codes with.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Exchanges `request.code` and returns the provider's tokens.
	///
	/// Fails with [`Error::InvalidRequest`] for an empty code or a redirect outside the
	/// allow-list, with [`ConfigError::MissingCredentials`] when the server lacks its
	/// credentials, and with the strategy's classification when the provider rejects the
	/// exchange.
	pub async fn exchange(&self, request: &ExchangeRequest) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::Exchange;

		let span = FlowSpan::new(KIND, "exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.exchange_inner(request)).await;
		let outcome = obs::outcome_of(&result);

		span.record_outcome(outcome);
		obs::record_flow_outcome(KIND, outcome);

		if let Err(e) = &result {
			obs::event!(warn, error = %e, "Code exchange failed.");
		}

		result
	}

	async fn exchange_inner(&self, request: &ExchangeRequest) -> Result<TokenBundle> {
		let code = request.code.trim();

		if code.is_empty() {
			return Err(Error::InvalidRequest { reason: "Authorization code is required".into() });
		}

		let redirect_uri = Url::parse(request.redirect_uri.trim()).map_err(|e| {
			Error::InvalidRequest { reason: format!("redirect_uri is not a valid URL: {e}") }
		})?;

		if !self.redirect_allowed(&redirect_uri) {
			return Err(Error::InvalidRequest {
				reason: format!("redirect_uri {redirect_uri} is not allowed"),
			});
		}

		let (client_id, client_secret) = self.config.credentials()?;
		let client = CodeExchangeClient::from_descriptor(
			&self.descriptor,
			client_id,
			client_secret,
			self.http_client.clone(),
		)?;

		client.exchange(self.strategy.as_ref(), code, &redirect_uri).await
	}

	fn redirect_allowed(&self, candidate: &Url) -> bool {
		self.config.allowed_redirects.is_empty()
			|| self
				.config
				.allowed_redirects
				.iter()
				.any(|registered| self.descriptor.redirect_matches(registered, candidate))
	}
}
#[cfg(feature = "reqwest")]
impl Debug for TokenGateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGateway")
			.field("provider", &self.descriptor.id)
			.field("config", &self.config)
			.finish()
	}
}
