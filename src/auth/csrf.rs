//! Single-slot anti-forgery store for the pending authorization attempt.
//!
//! The opener calls [`AntiForgeryStore::begin`] right before it opens the popup and embeds
//! the returned [`CorrelationToken`] as the `state` parameter. The callback handler, running
//! in the popup, calls [`AntiForgeryStore::validate_and_consume`] exactly once with the
//! `state` it received. Only a SHA-256 digest of the token is held, and the slot is emptied
//! by every validation attempt regardless of its result, so a token can never be replayed.
//! Starting a new attempt overwrites the slot and thereby invalidates any older popup.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const TOKEN_BYTES: usize = 32;

/// Sessions older than this are rejected even when the token matches.
pub const DEFAULT_SESSION_WINDOW: Duration = Duration::minutes(10);

/// Opaque, unguessable, single-use value round-tripped through the `state` parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct CorrelationToken(String);
impl CorrelationToken {
	/// Returns the value to embed in the authorization URL.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for CorrelationToken {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for CorrelationToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CorrelationToken").field(&"<redacted>").finish()
	}
}

#[derive(Clone, Copy)]
struct PendingSession {
	digest: [u8; 32],
	created_at: OffsetDateTime,
}

/// Origin-scoped, short-lived storage for one pending correlation token.
///
/// Clones share the same slot, mirroring session storage shared by every context of the
/// application origin.
#[derive(Clone)]
pub struct AntiForgeryStore {
	slot: Arc<Mutex<Option<PendingSession>>>,
	window: Duration,
}
impl AntiForgeryStore {
	/// Creates an empty store using [`DEFAULT_SESSION_WINDOW`].
	pub fn new() -> Self {
		Self { slot: Default::default(), window: DEFAULT_SESSION_WINDOW }
	}

	/// Overrides how long a pending session stays valid.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Starts a new session, replacing any pending one, and returns its token.
	pub fn begin(&self) -> CorrelationToken {
		self.begin_at(OffsetDateTime::now_utc())
	}

	/// [`begin`](Self::begin) with an explicit clock reading.
	pub fn begin_at(&self, now: OffsetDateTime) -> CorrelationToken {
		let token = generate_token();

		*self.slot.lock() = Some(PendingSession { digest: digest(&token.0), created_at: now });

		token
	}

	/// Returns `true` and empties the slot iff `candidate` matches the pending, unexpired
	/// session. Any other outcome also empties the slot.
	pub fn validate_and_consume(&self, candidate: &str) -> bool {
		self.validate_and_consume_at(candidate, OffsetDateTime::now_utc())
	}

	/// [`validate_and_consume`](Self::validate_and_consume) with an explicit clock reading.
	pub fn validate_and_consume_at(&self, candidate: &str, now: OffsetDateTime) -> bool {
		let Some(session) = self.slot.lock().take() else {
			return false;
		};
		let age = now - session.created_at;

		!age.is_negative() && age < self.window && digest(candidate) == session.digest
	}

	/// Returns `true` while a session is waiting for its callback.
	pub fn is_pending(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Drops the pending session, but only if it still belongs to `token`.
	pub(crate) fn discard(&self, token: &CorrelationToken) {
		let mut slot = self.slot.lock();

		if slot.is_some_and(|session| session.digest == digest(&token.0)) {
			*slot = None;
		}
	}
}
impl Default for AntiForgeryStore {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for AntiForgeryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AntiForgeryStore")
			.field("pending", &self.is_pending())
			.field("window", &self.window)
			.finish()
	}
}

fn generate_token() -> CorrelationToken {
	let mut bytes = [0_u8; TOKEN_BYTES];

	rand::rng().fill(&mut bytes);

	CorrelationToken(URL_SAFE_NO_PAD.encode(bytes))
}

fn digest(value: &str) -> [u8; 32] {
	Sha256::digest(value.as_bytes()).into()
}
