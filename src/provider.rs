//! Provider-facing descriptors (data), strategies (behavior), and presets.
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]): HTTPS endpoints,
//! the client authentication method the token endpoint expects, and provider quirks
//! (redirect matching, scope delimiter). `strategy` defines [`ProviderStrategy`], the
//! hook that maps token endpoint failures into the crate error taxonomy. `presets` ships
//! ready-made descriptors for known providers.

pub mod descriptor;
pub mod presets;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
