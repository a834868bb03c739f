//! Auth-domain identifiers, scope sets, anti-forgery state, and token models.

pub mod csrf;
pub mod id;
pub mod scope;
pub mod token;

pub use csrf::*;
pub use id::*;
pub use scope::*;
pub use token::{bundle::*, record::*, secret::*};
