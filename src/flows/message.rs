//! Cross-context message schema.
//!
//! Wire shape: `{"type":"OAUTH_SUCCESS","tokenData":{..}}` or
//! `{"type":"OAUTH_ERROR","error":"..","kind":".."}`. `kind` is optional so plain
//! `{type, error}` payloads are still understood.

// self
use crate::{_prelude::*, auth::TokenBundle};

/// Reason attached to `OAUTH_ERROR` payloads sent from the popup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Provider redirected back with an `error` parameter.
	UserDenied,
	/// `state` failed validation.
	CsrfFailure,
	/// Redirect carried no `code`.
	MissingCode,
	/// Gateway exchange failed.
	ExchangeFailure,
}

/// Terminal message the popup posts to its opener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PopupMessage {
	/// Tokens were obtained.
	#[serde(rename = "OAUTH_SUCCESS")]
	Success {
		/// Bundle returned by the gateway.
		#[serde(rename = "tokenData")]
		token_data: TokenBundle,
	},
	/// The handshake failed inside the popup.
	#[serde(rename = "OAUTH_ERROR")]
	Failure {
		/// Human-readable failure detail.
		error: String,
		/// Failure category, when the sender supplied one.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		kind: Option<FailureKind>,
	},
}
impl PopupMessage {
	/// Message reporting `error`.
	pub fn failure(error: &HandshakeError) -> Self {
		let (error, kind) = match error {
			HandshakeError::UserDenied { reason } => (reason.clone(), Some(FailureKind::UserDenied)),
			HandshakeError::CsrfFailure => (
				"Invalid state parameter - possible CSRF attack".to_owned(),
				Some(FailureKind::CsrfFailure),
			),
			HandshakeError::MissingCode =>
				("No authorization code received".to_owned(), Some(FailureKind::MissingCode)),
			HandshakeError::ExchangeFailure { message } =>
				(message.clone(), Some(FailureKind::ExchangeFailure)),
			other => (other.to_string(), None),
		};

		Self::Failure { error, kind }
	}

	/// Converts the message into the opener-side outcome.
	///
	/// Untagged failures are reported as exchange failures carrying the raw text.
	pub fn into_outcome(self) -> Result<TokenBundle, HandshakeError> {
		match self {
			Self::Success { token_data } => Ok(token_data),
			Self::Failure { error, kind } => Err(match kind {
				Some(FailureKind::UserDenied) => HandshakeError::UserDenied { reason: error },
				Some(FailureKind::CsrfFailure) => HandshakeError::CsrfFailure,
				Some(FailureKind::MissingCode) => HandshakeError::MissingCode,
				Some(FailureKind::ExchangeFailure) | None =>
					HandshakeError::ExchangeFailure { message: error },
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_messages_use_the_browser_field_names() {
		let message = PopupMessage::Success { token_data: TokenBundle::bearer("tok1", 3_600) };
		let value = serde_json::to_value(&message).expect("Success message should serialize.");

		assert_eq!(value["type"], "OAUTH_SUCCESS");
		assert_eq!(value["tokenData"]["access_token"], "tok1");
		assert_eq!(value["tokenData"]["expires_in"], 3_600);
	}

	#[test]
	fn failures_survive_the_trip_to_the_opener() {
		for error in [
			HandshakeError::UserDenied { reason: "User declined".into() },
			HandshakeError::CsrfFailure,
			HandshakeError::MissingCode,
			HandshakeError::ExchangeFailure { message: "HTTP 400: {\"error\":\"invalid_grant\"}".into() },
		] {
			let value = serde_json::to_value(PopupMessage::failure(&error))
				.expect("Failure message should serialize.");
			let message: PopupMessage =
				serde_json::from_value(value).expect("Failure message should deserialize.");

			assert_eq!(message.into_outcome(), Err(error));
		}
	}

	#[test]
	fn untagged_errors_become_exchange_failures() {
		let message: PopupMessage =
			serde_json::from_str(r#"{"type":"OAUTH_ERROR","error":"Empty response from server"}"#)
				.expect("Plain error payload should deserialize.");

		assert_eq!(
			message.into_outcome(),
			Err(HandshakeError::ExchangeFailure { message: "Empty response from server".into() })
		);
		assert!(serde_json::from_str::<PopupMessage>(r#"{"type":"HUBSPOT_OAUTH_SUCCESS"}"#).is_err());
	}
}
