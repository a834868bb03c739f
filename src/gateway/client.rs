//! Browser-side caller of the token exchange gateway.

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	error::{ConfigError, TransientError, TransportError},
	flows::{CodeExchanger, ExchangeFuture},
	http::ReqwestHttpClient,
	obs,
};

/// Posts `{code, redirect_uri}` to a gateway's `/oauth/token` endpoint.
///
/// Holds no secret; the gateway owns the client credentials.
#[derive(Clone, Debug)]
pub struct GatewayClient {
	endpoint: Url,
	http_client: ReqwestHttpClient,
}
impl GatewayClient {
	/// Creates a client for `endpoint` using the default HTTP client.
	pub fn new(endpoint: Url) -> Result<Self> {
		Ok(Self { endpoint, http_client: ReqwestHttpClient::new()? })
	}

	/// Replaces the HTTP client.
	pub fn with_http_client(mut self, http_client: ReqwestHttpClient) -> Self {
		self.http_client = http_client;

		self
	}

	/// Gateway endpoint the client posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Exchanges `code` through the gateway.
	///
	/// A non-2xx answer becomes [`Error::GatewayRejected`] carrying the raw body.
	pub async fn exchange(&self, code: &str, redirect_uri: &Url) -> Result<TokenBundle> {
		let payload = serde_json::json!({ "code": code, "redirect_uri": redirect_uri.as_str() });
		let response = self
			.http_client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.body(payload.to_string())
			.send()
			.await
			.map_err(map_send_error)?;
		let status = response.status().as_u16();
		let body = response.text().await.map_err(TransportError::from)?;

		if !(200..300).contains(&status) {
			obs::event!(debug, status, "Gateway rejected the exchange.");

			return Err(Error::GatewayRejected { status, body });
		}
		if body.trim().is_empty() {
			return Err(TransientError::EmptyResponse { status }.into());
		}

		let mut deserializer = serde_json::Deserializer::from_str(&body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::TokenResponseParse { source, status: Some(status) }.into())
	}
}
impl CodeExchanger for GatewayClient {
	fn exchange<'a>(&'a self, code: &'a str, redirect_uri: &'a Url) -> ExchangeFuture<'a> {
		Box::pin(GatewayClient::exchange(self, code, redirect_uri))
	}
}

fn map_send_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token exchange gateway".into(),
			status: None,
			retry_after: None,
		}
		.into();
	}

	TransportError::from(err).into()
}
