//! Persisted token records and their lifecycle.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenBundle, TokenSecret},
};

/// Lifecycle status of a persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Access token is still usable.
	Active,
	/// `expires_in` has elapsed since the record was persisted.
	Expired,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// No access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// No expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// `expires_in` pushes the expiry past the representable range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiryOutOfRange,
}

/// Token bundle as stored for one provider connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Provider the connection belongs to.
	pub provider: ProviderId,
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Refresh token secret, if issued.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider.
	pub token_type: String,
	/// Instant the bundle was persisted.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for `provider`.
	pub fn builder(provider: ProviderId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(provider)
	}

	/// Stamps `bundle` as persisted at `issued_at`.
	pub fn from_bundle(
		provider: ProviderId,
		bundle: &TokenBundle,
		issued_at: OffsetDateTime,
	) -> Result<Self, TokenRecordBuilderError> {
		let lifetime = bundle.lifetime().ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?;
		let mut builder = Self::builder(provider)
			.access_token(bundle.access_token.expose())
			.token_type(bundle.token_type.clone())
			.issued_at(issued_at)
			.expires_in(lifetime);

		if let Some(refresh) = &bundle.refresh_token {
			builder = builder.refresh_token(refresh.expose());
		}

		builder.build()
	}

	/// Status at `instant`.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires_at { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Status against the current clock.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` when the record is active at `instant`.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Returns `true` when the record has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Seconds of validity left at `instant`, zero once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	provider: ProviderId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(provider: ProviderId) -> Self {
		Self {
			provider,
			access_token: None,
			refresh_token: None,
			token_type: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the persistence instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry counted from `issued_at`.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			provider: self.provider,
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(|| super::bundle::DEFAULT_TOKEN_TYPE.into()),
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn provider() -> ProviderId {
		ProviderId::new("hubspot").expect("Provider fixture should be valid.")
	}

	#[test]
	fn bundles_expire_relative_to_persistence_time() {
		let persisted = macros::datetime!(2025-01-01 00:00 UTC);
		let record = TokenRecord::from_bundle(
			provider(),
			&TokenBundle::bearer("tok1", 3_600).with_refresh_token("ref1"),
			persisted,
		)
		.expect("Bundle with a sane lifetime should convert.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(record.status_at(macros::datetime!(2025-01-01 00:59 UTC)), TokenStatus::Active);
		assert_eq!(record.status_at(macros::datetime!(2025-01-01 01:00 UTC)), TokenStatus::Expired);
		assert_eq!(record.refresh_token.as_ref().map(TokenSecret::expose), Some("ref1"));
		assert_eq!(record.remaining_at(macros::datetime!(2025-01-01 02:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn oversized_lifetimes_are_rejected() {
		let err = TokenRecord::from_bundle(
			provider(),
			&TokenBundle::bearer("tok1", u64::MAX),
			OffsetDateTime::now_utc(),
		)
		.expect_err("Unrepresentable lifetimes must be rejected.");

		assert_eq!(err, TokenRecordBuilderError::ExpiryOutOfRange);
	}

	#[test]
	fn builder_requires_token_and_expiry() {
		assert_eq!(
			TokenRecord::builder(provider()).expires_in(Duration::minutes(1)).build().err(),
			Some(TokenRecordBuilderError::MissingAccessToken)
		);
		assert_eq!(
			TokenRecord::builder(provider()).access_token("a").build().err(),
			Some(TokenRecordBuilderError::MissingExpiry)
		);

		let record = TokenRecord::builder(provider())
			.access_token("a")
			.expires_in(Duration::minutes(1))
			.build()
			.expect("Complete builder should succeed.");

		assert_eq!(record.token_type, "Bearer");
		assert!(!format!("{record:?}").contains("\"a\""));
	}
}
