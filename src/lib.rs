//! Popup-driven OAuth 2.0 authorization-code handshake: forgery-proof `state`, exactly-once
//! outcome delivery across browsing contexts, and a confidential token exchange gateway.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod connection;
pub mod context;
pub mod error;
pub mod flows;
pub mod gateway;
#[cfg(feature = "reqwest")] pub mod http;
#[cfg(feature = "reqwest")] pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicBool, Ordering};
	// self
	use crate::{
		context::{PopupLauncher, PopupRequest, PopupWindow, WindowId},
		http::ReqwestHttpClient,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Popup window whose lifetime is driven by the test.
	#[derive(Debug)]
	pub struct ScriptedPopup {
		id: WindowId,
		url: Url,
		closed: AtomicBool,
	}
	impl ScriptedPopup {
		/// URL the popup was opened at.
		pub fn url(&self) -> &Url {
			&self.url
		}

		/// Simulates the user closing the window.
		pub fn user_close(&self) {
			self.closed.store(true, Ordering::SeqCst);
		}
	}
	impl PopupWindow for ScriptedPopup {
		fn id(&self) -> WindowId {
			self.id
		}

		fn is_closed(&self) -> bool {
			self.closed.load(Ordering::SeqCst)
		}

		fn close(&self) {
			self.closed.store(true, Ordering::SeqCst);
		}
	}

	/// Launcher that records every popup it opens, or refuses to open any when blocked.
	#[derive(Debug, Default)]
	pub struct ScriptedLauncher {
		blocked: bool,
		opened: Mutex<Vec<Arc<ScriptedPopup>>>,
		notify: tokio::sync::Notify,
	}
	impl ScriptedLauncher {
		/// Launcher that behaves like a browser with a popup blocker.
		pub fn blocked() -> Self {
			Self { blocked: true, ..Default::default() }
		}

		/// Number of popups opened so far.
		pub fn opened_count(&self) -> usize {
			self.opened.lock().len()
		}

		/// Waits until the `nth` (zero-based) popup has been opened and returns it.
		pub async fn wait_for_popup(&self, nth: usize) -> Arc<ScriptedPopup> {
			loop {
				let notified = self.notify.notified();

				if let Some(popup) = self.opened.lock().get(nth).cloned() {
					return popup;
				}

				notified.await;
			}
		}
	}
	impl PopupLauncher for ScriptedLauncher {
		fn open(&self, request: &PopupRequest) -> Option<Arc<dyn PopupWindow>> {
			if self.blocked {
				return None;
			}

			let popup = Arc::new(ScriptedPopup {
				id: WindowId::next(),
				url: request.url.clone(),
				closed: AtomicBool::new(false),
			});

			self.opened.lock().push(popup.clone());
			self.notify.notify_waiters();

			Some(popup)
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::{Origin, Url};

	pub use crate::error::{Error, HandshakeError, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "server")] use {color_eyre as _, tracing_subscriber as _};
