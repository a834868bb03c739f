//! Authorization-code exchange against the provider's token endpoint via `oauth2`.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenType},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenBundle, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type ExchangeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Confidential client performing the authorization-code grant.
pub(crate) struct CodeExchangeClient {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
}
impl CodeExchangeClient {
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Trades `code` for a token bundle.
	pub(crate) async fn exchange(
		&self,
		strategy: &dyn ProviderStrategy,
		code: &str,
		redirect_uri: &Url,
	) -> Result<TokenBundle> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(strategy, meta.take(), err))?;

		map_token_response(response, meta.take())
	}
}

// Unusable 2xx bodies are upstream failures.
fn map_token_response(
	response: ExchangeTokenResponse,
	meta: Option<ResponseMetadata>,
) -> Result<TokenBundle> {
	let meta = meta.as_ref();
	let expires_in = response
		.expires_in()
		.ok_or_else(|| unusable_response("response is missing expires_in", meta))?
		.as_secs();

	if i64::try_from(expires_in).is_err() {
		return Err(unusable_response("expires_in exceeds the supported range", meta));
	}

	let token_type = meta
		.and_then(|value| value.token_type.clone())
		.unwrap_or_else(|| response.token_type().as_ref().to_owned());

	Ok(TokenBundle {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|t| TokenSecret::new(t.secret().to_owned())),
		expires_in,
		token_type,
	})
}

fn unusable_response(message: &str, meta: Option<&ResponseMetadata>) -> Error {
	TransientError::TokenEndpoint {
		message: message.into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(error, body) => match meta_status(meta) {
			// Non-JSON-OAuth error bodies (HubSpot answers `{"status":"BAD_AUTH_CODE",..}`).
			Some(status) if !(200..300).contains(&status) => {
				let ctx = ProviderErrorContext::default()
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(&body));

				classify(strategy, &ctx, meta)
			},
			status => TransientError::TokenResponseParse { source: error, status }.into(),
		},
		RequestTokenError::Other(message) => match meta_status(meta) {
			Some(status) if !(200..300).contains(&status) => {
				let ctx = ProviderErrorContext::default()
					.with_http_status(status)
					.with_body_preview(message);

				classify(strategy, &ctx, meta)
			},
			status => TransientError::TokenEndpoint {
				message,
				status,
				retry_after: meta_retry_after(meta),
			}
			.into(),
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::default().with_oauth_error(response.error().as_ref().to_owned());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	classify(strategy, &ctx, meta)
}

fn classify(
	strategy: &dyn ProviderStrategy,
	ctx: &ProviderErrorContext,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let reason = match (&ctx.oauth_error, &ctx.error_description) {
		(Some(code), Some(description)) => format!("{code}: {description}"),
		_ => ctx.reason(),
	};

	match strategy.classify_token_error(ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ProviderErrorKind::InvalidRequest => Error::InvalidRequest { reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(meta: Option<&ResponseMetadata>, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
