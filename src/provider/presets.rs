//! Ready-made descriptors for known providers.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ProviderId, ScopeSet, ScopeValidationError},
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderDescriptorError},
};

/// HubSpot authorization endpoint.
pub const HUBSPOT_AUTHORIZE_URL: &str = "https://app.hubspot.com/oauth/authorize";
/// HubSpot token endpoint.
pub const HUBSPOT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
/// Callback path HubSpot apps are registered with.
pub const HUBSPOT_CALLBACK_PATH: &str = "/oauth/hubspot/callback";
/// Scopes requested for contact and list export.
pub const HUBSPOT_SCOPES: &str =
	"crm.objects.contacts.read crm.objects.contacts.write crm.lists.read crm.lists.write";

/// Errors raised while assembling a preset.
#[derive(Debug, ThisError)]
pub enum PresetError {
	/// Preset identifier was rejected.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// Preset endpoint could not be parsed.
	#[error(transparent)]
	Url(#[from] url::ParseError),
	/// Preset descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Preset scopes failed validation.
	#[error(transparent)]
	Scope(#[from] ScopeValidationError),
}

/// HubSpot descriptor; the token endpoint expects credentials in the form body.
pub fn hubspot() -> Result<ProviderDescriptor, PresetError> {
	let descriptor = ProviderDescriptor::builder(ProviderId::new("hubspot")?)
		.authorization_endpoint(Url::parse(HUBSPOT_AUTHORIZE_URL)?)
		.token_endpoint(Url::parse(HUBSPOT_TOKEN_URL)?)
		.client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;

	Ok(descriptor)
}

/// [`HUBSPOT_SCOPES`] as a [`ScopeSet`].
pub fn hubspot_scopes() -> Result<ScopeSet, PresetError> {
	Ok(ScopeSet::from_str(HUBSPOT_SCOPES)?)
}
