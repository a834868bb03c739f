//! HTTP surface of the gateway: `POST /oauth/token` behind permissive CORS and request
//! tracing.

// crates.io
use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
	routing::post,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	error::TransientError,
	gateway::{ExchangeRequest, TokenGateway},
};

/// Route the exchange endpoint is mounted at.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Builds the gateway router.
pub fn router(gateway: Arc<TokenGateway>) -> Router {
	Router::new()
		.route(TOKEN_PATH, post(exchange_token))
		.layer(CorsLayer::permissive())
		.layer(TraceLayer::new_for_http())
		.with_state(gateway)
}

/// Error payload returned with every non-2xx answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Summary of the failure.
	pub error: String,
	/// Upstream detail, when there is one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
}

/// [`Error`] rendered as an HTTP answer.
#[derive(Debug)]
pub struct ApiError(Error);
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		Self(e)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_for(&self.0);
		let body = match &self.0 {
			Error::InvalidRequest { reason } => ErrorBody { error: reason.clone(), details: None },
			Error::Config(e) => ErrorBody { error: e.to_string(), details: None },
			Error::InvalidGrant { .. } | Error::InvalidClient { .. } | Error::Transient(_) =>
				ErrorBody {
					error: "Failed to exchange code for token".into(),
					details: Some(self.0.to_string()),
				},
			e => ErrorBody {
				error: "Internal server error during token exchange".into(),
				details: Some(e.to_string()),
			},
		};

		let retry_after = match &self.0 {
			Error::Transient(TransientError::TokenEndpoint { retry_after: Some(delay), .. }) =>
				u64::try_from(delay.whole_seconds()).ok(),
			_ => None,
		};
		let mut response = (status, Json(body)).into_response();

		// Upstream back-off hints are forwarded to the popup.
		if let Some(secs) = retry_after {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}

/// HTTP status used for a failed exchange.
pub fn status_for(error: &Error) -> StatusCode {
	match error {
		Error::InvalidRequest { .. } | Error::InvalidGrant { .. } => StatusCode::BAD_REQUEST,
		Error::Transient(_) | Error::Transport(_) => StatusCode::BAD_GATEWAY,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

async fn exchange_token(
	State(gateway): State<Arc<TokenGateway>>,
	payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<TokenBundle>, ApiError> {
	let Json(request) = payload.map_err(|rejection| Error::InvalidRequest {
		reason: format!(
			"Request body must be JSON with code and redirect_uri: {}",
			rejection.body_text()
		),
	})?;

	Ok(Json(gateway.exchange(&request).await?))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ConfigError;

	#[test]
	fn statuses_separate_caller_config_and_upstream_failures() {
		assert_eq!(
			status_for(&Error::InvalidRequest { reason: "x".into() }),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(status_for(&Error::InvalidGrant { reason: "x".into() }), StatusCode::BAD_REQUEST);
		assert_eq!(
			status_for(&ConfigError::MissingCredentials { missing: "HUBSPOT_CLIENT_ID" }.into()),
			StatusCode::INTERNAL_SERVER_ERROR
		);
		assert_eq!(
			status_for(&Error::InvalidClient { reason: "x".into() }),
			StatusCode::INTERNAL_SERVER_ERROR
		);
		assert_eq!(
			status_for(
				&TransientError::TokenEndpoint { message: "x".into(), status: None, retry_after: None }
					.into()
			),
			StatusCode::BAD_GATEWAY
		);
	}

	#[test]
	fn upstream_retry_hints_become_retry_after_headers() {
		let response = ApiError::from(Error::from(TransientError::TokenEndpoint {
			message: "temporarily_unavailable".into(),
			status: Some(503),
			retry_after: Some(Duration::seconds(30)),
		}))
		.into_response();

		assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
		assert_eq!(response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()), Some("30"));

		let response = ApiError::from(Error::InvalidGrant { reason: "x".into() }).into_response();

		assert!(response.headers().get(RETRY_AFTER).is_none());
	}

	#[test]
	fn error_bodies_omit_empty_details() {
		let body = ErrorBody { error: "Authorization code is required".into(), details: None };

		assert_eq!(
			serde_json::to_string(&body).expect("Error body should serialize."),
			r#"{"error":"Authorization code is required"}"#
		);
	}
}
