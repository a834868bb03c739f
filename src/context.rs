//! In-process model of the two browsing contexts taking part in the handshake.
//!
//! The opener (main application) and the popup never share memory. They talk through a
//! [`MessageBus`] owned by the opener window, reached from the popup via an [`OpenerPort`].
//! Delivery follows browser `postMessage` rules: the sender names the origin it expects the
//! receiver to have, and the message is dropped when that origin does not match. Receivers
//! get the sender's origin and window id with every [`Envelope`] and must check both.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::_prelude::*;

/// Default popup width in CSS pixels.
pub const DEFAULT_POPUP_WIDTH: u32 = 600;
/// Default popup height in CSS pixels.
pub const DEFAULT_POPUP_HEIGHT: u32 = 700;

/// Process-unique identifier of a browsing context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);
impl WindowId {
	/// Allocates a fresh identifier.
	pub fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);

		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}
impl Display for WindowId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "window#{}", self.0)
	}
}

/// Message as observed by a listener.
#[derive(Clone, Debug)]
pub struct Envelope {
	/// Origin of the sending context.
	pub origin: Origin,
	/// Sending context.
	pub source: WindowId,
	/// Structured-clone payload.
	pub data: serde_json::Value,
}

type Listeners = Arc<Mutex<BTreeMap<u64, UnboundedSender<Envelope>>>>;

/// Message event target of the opener window.
///
/// Messages dispatched while no listener is registered are dropped.
#[derive(Clone, Default)]
pub struct MessageBus {
	listeners: Listeners,
	next_listener: Arc<AtomicU64>,
}
impl MessageBus {
	/// Creates a bus with no listeners.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a listener. Dropping the returned handle unregisters it.
	pub fn listen(&self) -> MessageListener {
		let (tx, rx) = mpsc::unbounded_channel();
		let key = self.next_listener.fetch_add(1, Ordering::Relaxed);

		self.listeners.lock().insert(key, tx);

		MessageListener { key, rx, listeners: self.listeners.clone() }
	}

	/// Number of listeners currently registered.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	/// Returns the `window.opener` handle a popup uses to reach this bus.
	///
	/// `source_origin` is the popup's current origin; `opener_origin` is the origin of the
	/// window owning this bus.
	pub fn port(&self, source: WindowId, source_origin: Origin, opener_origin: Origin) -> OpenerPort {
		OpenerPort { bus: self.clone(), source, source_origin, opener_origin }
	}

	fn dispatch(&self, envelope: Envelope) {
		let listeners = self.listeners.lock();

		for tx in listeners.values() {
			let _ = tx.send(envelope.clone());
		}
	}
}
impl Debug for MessageBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MessageBus").field("listeners", &self.listener_count()).finish()
	}
}

/// Registered message listener; unregisters itself on drop.
pub struct MessageListener {
	key: u64,
	rx: UnboundedReceiver<Envelope>,
	listeners: Listeners,
}
impl MessageListener {
	/// Waits for the next message. Never returns `None` while the handle is alive.
	pub async fn recv(&mut self) -> Option<Envelope> {
		self.rx.recv().await
	}

	/// Takes an already queued message without waiting.
	pub fn try_recv(&mut self) -> Option<Envelope> {
		self.rx.try_recv().ok()
	}
}
impl Drop for MessageListener {
	fn drop(&mut self) {
		self.listeners.lock().remove(&self.key);
	}
}
impl Debug for MessageListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MessageListener").field("key", &self.key).finish()
	}
}

/// Popup-side handle on the opener window.
#[derive(Clone, Debug)]
pub struct OpenerPort {
	bus: MessageBus,
	source: WindowId,
	source_origin: Origin,
	opener_origin: Origin,
}
impl OpenerPort {
	/// Posts `data` to the opener if its origin equals `target_origin`.
	///
	/// Returns whether the message was dispatched. Opaque origins never match.
	pub fn post_message(&self, data: serde_json::Value, target_origin: &Origin) -> bool {
		if !target_origin.is_tuple() || *target_origin != self.opener_origin {
			return false;
		}

		self.bus.dispatch(Envelope {
			origin: self.source_origin.clone(),
			source: self.source,
			data,
		});

		true
	}

	/// Window the messages are sent from.
	pub fn source(&self) -> WindowId {
		self.source
	}
}

/// Request to open a popup browsing context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupRequest {
	/// URL to navigate the popup to.
	pub url: Url,
	/// Window name (`window.open` target).
	pub name: String,
	/// Width in CSS pixels.
	pub width: u32,
	/// Height in CSS pixels.
	pub height: u32,
}
impl PopupRequest {
	/// Request with the default name and size.
	pub fn new(url: Url) -> Self {
		Self {
			url,
			name: "oauth2_popup".into(),
			width: DEFAULT_POPUP_WIDTH,
			height: DEFAULT_POPUP_HEIGHT,
		}
	}

	/// `window.open` feature string for this request.
	pub fn features(&self) -> String {
		format!("width={},height={},scrollbars=yes", self.width, self.height)
	}
}

/// Handle on an opened popup window.
pub trait PopupWindow
where
	Self: Send + Sync,
{
	/// Identifier the popup posts messages from.
	fn id(&self) -> WindowId;

	/// Whether the window has been closed, by the user or programmatically.
	fn is_closed(&self) -> bool;

	/// Closes the window. Closing an already closed window is a no-op.
	fn close(&self);
}

/// Opens popup windows on behalf of the opener.
pub trait PopupLauncher
where
	Self: Send + Sync,
{
	/// Opens a popup, returning `None` when it was blocked.
	fn open(&self, request: &PopupRequest) -> Option<Arc<dyn PopupWindow>>;
}
