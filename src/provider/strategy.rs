//! Provider strategy hook that classifies token endpoint failures.
//!
//! The gateway hands the strategy plain data (status, OAuth fields, body preview) so
//! strategies never depend on a particular HTTP client.

// self
use crate::_prelude::*;

/// Classifies failed authorization-code exchanges for a provider.
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps a failed token response into the crate taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The code is expired, reused, unknown, or bound to another redirect URI.
	InvalidGrant,
	/// The exchange request itself was malformed (bad scope, unsupported grant).
	InvalidRequest,
	/// The gateway's client credentials were rejected.
	InvalidClient,
	/// Temporary upstream failure.
	Transient,
}

/// Data describing a failed token response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// The failure originated from the network layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Context for transport-level failures.
	pub fn network_failure() -> Self {
		Self { network_error: true, ..Default::default() }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a truncated body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Best human-readable reason: description, then error code, then body preview.
	pub fn reason(&self) -> String {
		self.error_description
			.as_deref()
			.or(self.oauth_error.as_deref())
			.or(self.body_preview.as_deref())
			.map(ToOwned::to_owned)
			.unwrap_or_else(|| match self.http_status {
				Some(status) => format!("token endpoint returned HTTP {status}"),
				None => "token endpoint request failed".into(),
			})
	}
}

/// Strategy applying RFC 6749 heuristics.
///
/// Structured OAuth fields win, then body text hints, then the HTTP status. Network
/// failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(match_exact_value)
			.or_else(|| ctx.error_description.as_deref().and_then(classify_text))
			.or_else(|| ctx.body_preview.as_deref().and_then(classify_text))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	const TABLE: [(&str, ProviderErrorKind); 8] = [
		("invalid_grant", ProviderErrorKind::InvalidGrant),
		("access_denied", ProviderErrorKind::InvalidGrant),
		("invalid_client", ProviderErrorKind::InvalidClient),
		("unauthorized_client", ProviderErrorKind::InvalidClient),
		("invalid_request", ProviderErrorKind::InvalidRequest),
		("invalid_scope", ProviderErrorKind::InvalidRequest),
		("temporarily_unavailable", ProviderErrorKind::Transient),
		("server_error", ProviderErrorKind::Transient),
	];

	TABLE.iter().find(|(code, _)| value.eq_ignore_ascii_case(code)).map(|(_, kind)| *kind)
}

fn classify_text(text: &str) -> Option<ProviderErrorKind> {
	let lowered = text.to_ascii_lowercase();

	match lowered.as_str() {
		t if t.contains("invalid_grant") || t.contains("bad_auth_code") =>
			Some(ProviderErrorKind::InvalidGrant),
		t if t.contains("invalid_client") || t.contains("bad_client_id") =>
			Some(ProviderErrorKind::InvalidClient),
		t if t.contains("redirect_uri") => Some(ProviderErrorKind::InvalidGrant),
		t if t.contains("temporarily_unavailable") || t.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401 | 403) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_fields_win_over_status() {
		let ctx = ProviderErrorContext::default().with_http_status(500).with_oauth_error("invalid_grant");

		assert_eq!(DefaultProviderStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);
		assert_eq!(ctx.reason(), "invalid_grant");
	}

	#[test]
	fn hubspot_style_bodies_are_recognized() {
		let ctx = ProviderErrorContext::default()
			.with_http_status(400)
			.with_oauth_error("BAD_CLIENT_ID")
			.with_error_description("missing or unknown client id BAD_CLIENT_ID");

		assert_eq!(DefaultProviderStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidClient);

		let ctx = ProviderErrorContext::default()
			.with_http_status(400)
			.with_body_preview("{\"status\":\"BAD_AUTH_CODE\"}");

		assert_eq!(DefaultProviderStrategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn status_and_network_fallbacks() {
		let strategy = DefaultProviderStrategy;

		assert_eq!(
			strategy.classify_token_error(&ProviderErrorContext::network_failure()),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			strategy.classify_token_error(&ProviderErrorContext::default().with_http_status(401)),
			ProviderErrorKind::InvalidClient
		);
		assert_eq!(
			strategy.classify_token_error(&ProviderErrorContext::default().with_http_status(503)),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			ProviderErrorContext::default().with_http_status(503).reason(),
			"token endpoint returned HTTP 503"
		);
	}

	#[test]
	fn previews_are_truncated() {
		let ctx = ProviderErrorContext::default().with_body_preview("x".repeat(1_000));

		assert_eq!(ctx.body_preview.map(|p| p.chars().count()), Some(257));
	}
}
