// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints, ProviderQuirks},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	client_auth_method: ClientAuthMethod,
	quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;

		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("token", &token)?;
		validate_scope_delimiter(self.quirks.scope_delimiter)?;

		Ok(ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token },
			client_auth_method: self.client_auth_method,
			quirks: self.quirks,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder(ProviderId::new("demo").expect("Provider fixture should be valid."))
	}

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("URL fixture should parse.")
	}

	#[test]
	fn plain_http_is_only_allowed_on_loopback() {
		let err = builder()
			.authorization_endpoint(url("http://auth.example.com/authorize"))
			.token_endpoint(url("https://auth.example.com/token"))
			.build()
			.expect_err("Remote plain-HTTP endpoints must be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }));

		for local in ["http://localhost:8080/token", "http://127.0.0.1:9/token", "http://[::1]:9/token"] {
			builder()
				.authorization_endpoint(url("https://auth.example.com/authorize"))
				.token_endpoint(url(local))
				.build()
				.expect("Loopback endpoints should be accepted.");
		}
	}

	#[test]
	fn missing_endpoints_and_bad_delimiters_are_rejected() {
		assert_eq!(
			builder().token_endpoint(url("https://a.example/t")).build(),
			Err(ProviderDescriptorError::MissingAuthorizationEndpoint)
		);
		assert_eq!(
			builder()
				.authorization_endpoint(url("https://a.example/a"))
				.token_endpoint(url("https://a.example/t"))
				.quirks(ProviderQuirks { scope_delimiter: '\n', ..Default::default() })
				.build(),
			Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter: '\n' })
		);
	}

	#[test]
	fn redirect_matching_honours_the_quirk() {
		let registered = url("https://app.example.com/oauth/callback");
		let candidate = url("https://app.example.com/oauth/callback?x=1");
		let exact = builder()
			.authorization_endpoint(url("https://a.example/a"))
			.token_endpoint(url("https://a.example/t"))
			.build()
			.expect("Descriptor fixture should build.");
		let prefix = builder()
			.authorization_endpoint(url("https://a.example/a"))
			.token_endpoint(url("https://a.example/t"))
			.quirks(ProviderQuirks { exact_redirect_match: false, ..Default::default() })
			.build()
			.expect("Descriptor fixture should build.");

		assert!(exact.redirect_matches(&registered, &registered));
		assert!(!exact.redirect_matches(&registered, &candidate));
		assert!(prefix.redirect_matches(&registered, &candidate));
	}
}
