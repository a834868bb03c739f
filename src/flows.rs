//! The popup handshake: the opener-side [`AuthorizationCoordinator`], the popup-side
//! [`CallbackHandler`], the [`AuthorizationRequest`] that links them through the provider,
//! and the [`PopupMessage`] schema they exchange.

pub mod authorize;
pub mod callback;
pub mod coordinator;
pub mod message;

pub use authorize::*;
pub use callback::*;
pub use coordinator::*;
pub use message::*;
