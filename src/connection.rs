//! Process-wide record of whether the provider account is connected.
//!
//! [`ConnectionState`] owns the persisted [`TokenRecord`] for one provider. The opener's
//! coordinator persists bundles it receives from the popup, and UI collaborators either
//! query [`ConnectionState::status`] or [`subscribe`](ConnectionState::subscribe) to a
//! `watch` channel that is updated on every persist, clear, and recorded error.

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenBundle, TokenRecord, TokenSecret},
	obs,
	store::{MemoryStore, TokenStore},
};

/// Derived connection status consumed by UI collaborators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
	/// A non-expired token record is persisted.
	pub connected: bool,
	/// Human-readable message of the last failed authorization, if any.
	pub error: Option<String>,
}

/// Connection state for one provider, backed by a [`TokenStore`].
pub struct ConnectionState {
	provider: ProviderId,
	store: Arc<dyn TokenStore>,
	record: RwLock<Option<TokenRecord>>,
	error: RwLock<Option<String>>,
	mutation: AsyncMutex<()>,
	tx: watch::Sender<ConnectionStatus>,
}
impl ConnectionState {
	/// Creates an empty state over `store` without reading it.
	pub fn new(provider: ProviderId, store: Arc<dyn TokenStore>) -> Self {
		let (tx, _) = watch::channel(ConnectionStatus::default());

		Self {
			provider,
			store,
			record: RwLock::new(None),
			error: RwLock::new(None),
			mutation: AsyncMutex::new(()),
			tx,
		}
	}

	/// Creates an empty state backed by a fresh [`MemoryStore`].
	pub fn in_memory(provider: ProviderId) -> Self {
		Self::new(provider, Arc::new(MemoryStore::default()))
	}

	/// Creates a state over `store` and restores any record persisted for `provider`.
	pub async fn load(provider: ProviderId, store: Arc<dyn TokenStore>) -> Result<Self> {
		let state = Self::new(provider, store);
		let restored = state.store.fetch(&state.provider).await?;

		*state.record.write() = restored;

		state.notify();

		Ok(state)
	}

	/// Provider this state belongs to.
	pub fn provider(&self) -> &ProviderId {
		&self.provider
	}

	/// Returns `true` iff a bundle is persisted and has not outlived its `expires_in`.
	pub fn is_connected(&self) -> bool {
		self.is_connected_at(OffsetDateTime::now_utc())
	}

	/// [`is_connected`](Self::is_connected) evaluated at `now`.
	pub fn is_connected_at(&self, now: OffsetDateTime) -> bool {
		self.record.read().as_ref().is_some_and(|record| record.is_active_at(now))
	}

	/// Current status, recomputed against the clock.
	pub fn status(&self) -> ConnectionStatus {
		ConnectionStatus { connected: self.is_connected(), error: self.error.read().clone() }
	}

	/// Access token for API collaborators while connected.
	pub fn access_token(&self) -> Option<TokenSecret> {
		let now = OffsetDateTime::now_utc();

		self.record
			.read()
			.as_ref()
			.filter(|record| record.is_active_at(now))
			.map(|record| record.access_token.clone())
	}

	/// Snapshot of the persisted record, expired or not.
	pub fn record(&self) -> Option<TokenRecord> {
		self.record.read().clone()
	}

	/// Persists `bundle`, stamping it with the current time, and clears any recorded error.
	pub async fn persist(&self, bundle: &TokenBundle) -> Result<TokenRecord> {
		self.persist_at(bundle, OffsetDateTime::now_utc()).await
	}

	/// [`persist`](Self::persist) with an explicit persistence instant.
	pub async fn persist_at(&self, bundle: &TokenBundle, now: OffsetDateTime) -> Result<TokenRecord> {
		let record = TokenRecord::from_bundle(self.provider.clone(), bundle, now)?;
		let _guard = self.mutation.lock().await;

		self.store.save(record.clone()).await?;

		*self.record.write() = Some(record.clone());
		*self.error.write() = None;

		obs::event!(debug, provider = %self.provider, "Connection persisted.");

		self.notify();

		Ok(record)
	}

	/// Removes the persisted record (explicit disconnect).
	pub async fn clear(&self) -> Result<()> {
		let _guard = self.mutation.lock().await;

		self.store.delete(&self.provider).await?;

		*self.record.write() = None;
		*self.error.write() = None;

		obs::event!(debug, provider = %self.provider, "Connection cleared.");

		self.notify();

		Ok(())
	}

	/// Subscribes to status changes. The receiver starts with the current status.
	///
	/// Observers are only woken when the recomputed status differs from the last one sent.
	pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
		self.notify();

		self.tx.subscribe()
	}

	pub(crate) fn record_error(&self, message: impl Into<String>) {
		*self.error.write() = Some(message.into());

		self.notify();
	}

	fn notify(&self) {
		let status = self.status();

		self.tx.send_if_modified(|current| {
			if *current == status {
				return false;
			}

			*current = status;

			true
		});
	}
}
impl Debug for ConnectionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionState")
			.field("provider", &self.provider)
			.field("record", &*self.record.read())
			.field("error", &*self.error.read())
			.finish()
	}
}
