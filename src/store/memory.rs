//! Thread-safe in-memory [`TokenStore`].

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenRecord},
	store::{StoreFuture, TokenStore},
};

/// Keeps records in-process; the default backing for a [`ConnectionState`](crate::connection::ConnectionState).
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<ProviderId, TokenRecord>>>);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().insert(record.provider.clone(), record);

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.0.read().get(provider).cloned()) })
	}

	fn delete<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.0.write().remove(provider)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn records_are_keyed_by_provider() {
		let store = MemoryStore::default();
		let hubspot = ProviderId::new("hubspot").expect("Provider fixture should be valid.");
		let other = ProviderId::new("other").expect("Provider fixture should be valid.");
		let record = TokenRecord::builder(hubspot.clone())
			.access_token("tok1")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Record fixture should build.");

		store.save(record).await.expect("Saving to memory should succeed.");

		assert_eq!(store.len(), 1);
		assert!(store.fetch(&other).await.expect("Fetch should succeed.").is_none());

		let fetched = store
			.fetch(&hubspot)
			.await
			.expect("Fetch should succeed.")
			.expect("Saved record should be present.");

		assert_eq!(fetched.access_token.expose(), "tok1");
		assert!(store.delete(&hubspot).await.expect("Delete should succeed.").is_some());
		assert!(store.delete(&hubspot).await.expect("Delete should succeed.").is_none());
		assert!(store.is_empty());
	}
}
