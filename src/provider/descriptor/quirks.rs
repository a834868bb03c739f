// self
use crate::_prelude::*;

/// Provider-specific quirks that influence request construction and validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Redirect URIs must match the allow-list exactly (instead of by prefix).
	pub exact_redirect_match: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { exact_redirect_match: true, scope_delimiter: ' ' }
	}
}
