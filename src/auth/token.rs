//! Token shapes moving through the handshake: the wire bundle, the persisted record, and
//! the redacting secret wrapper both are built from.

pub mod bundle;
pub mod record;
pub mod secret;
