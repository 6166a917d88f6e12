//! The realtime session: one logical connection, its lifecycle and event delivery.

use crate::audio::AudioChunk;
use crate::codec::EventCodec;
use crate::config::{DEFAULT_CONNECT_TIMEOUT, SessionConfig};
use crate::error::{RealtimeError, Result};
use crate::events::ClientEvent;
use crate::handler::{Disconnect, ServerEventHandler};
use crate::state::{AtomicConnectivityState, ConnectivityState};
use crate::transport::{
    CloseReason, ConnectRequest, Transport, TransportHandle, TransportListener,
};
use aiwire_telemetry::{realtime_connect_span, realtime_frame_span, realtime_session_span, record_event_type};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tracing::{Instrument, Span};

use ConnectivityState::*;

/// A full-duplex realtime session.
///
/// The session owns the connection lifecycle and delivers decoded server events to a
/// [`ServerEventHandler`]. It never reconnects on its own; after a disconnect the caller may
/// call [`start`](Self::start) again (see [`reconnect`](crate::reconnect::reconnect) for an
/// opt-in retry loop).
///
/// Transport callbacks run on the session's runtime: the injected [`Handle`], the runtime
/// current at build time, or a single-worker runtime the session creates and shuts down in
/// [`close`](Self::close). One worker is enough; handlers must not block it.
///
/// # Example
///
/// ```rust,ignore
/// use aiwire_realtime::{ChannelEventHandler, ClientEvent, RealtimeSession, WebSocketTransport};
///
/// let (handler, mut events) = ChannelEventHandler::new();
/// let session = RealtimeSession::builder()
///     .transport(Arc::new(WebSocketTransport::from_env()?))
///     .handler(Arc::new(handler))
///     .build()?;
///
/// session.start()?;
/// session.wait_until_connected(Duration::from_secs(10)).await?;
/// session.send(&ClientEvent::user_text("Hello!")).await?;
/// session.create_response().await?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct RealtimeSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    transport: Arc<dyn Transport>,
    codec: EventCodec,
    handler: RwLock<Option<Arc<dyn ServerEventHandler>>>,
    state: AtomicConnectivityState,
    state_tx: watch::Sender<ConnectivityState>,
    live: ArcSwapOption<LiveHandle>,
    generation: AtomicU32,
    disposed: AtomicBool,
    runtime: Handle,
    owned_runtime: Mutex<Option<Runtime>>,
    connect_timeout: Duration,
    span: Span,
}

/// The handle of the open connection, tagged with the `start()` that produced it.
struct LiveHandle {
    generation: u32,
    handle: Arc<dyn TransportHandle>,
}

/// Builder for [`RealtimeSession`].
pub struct RealtimeSessionBuilder {
    transport: Option<Arc<dyn Transport>>,
    handler: Option<Arc<dyn ServerEventHandler>>,
    codec: Option<EventCodec>,
    runtime: Option<Handle>,
    connect_timeout: Duration,
}

impl Default for RealtimeSessionBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            handler: None,
            codec: None,
            runtime: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl RealtimeSessionBuilder {
    /// Set the transport (required).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the server event handler (required).
    pub fn handler(mut self, handler: Arc<dyn ServerEventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use a custom codec instead of [`EventCodec::new`].
    pub fn codec(mut self, codec: EventCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Run transport callbacks on this runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Upper bound on each connect handshake.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the session, in [`ConnectivityState::Stopped`].
    pub fn build(self) -> Result<RealtimeSession> {
        let transport =
            self.transport.ok_or_else(|| RealtimeError::config("a transport is required"))?;
        let handler = self.handler.ok_or_else(|| RealtimeError::config("a handler is required"))?;
        if self.connect_timeout.is_zero() {
            return Err(RealtimeError::config("connect timeout must be non-zero"));
        }

        let (runtime, owned_runtime) = match self.runtime.or_else(|| Handle::try_current().ok()) {
            Some(handle) => (handle, None),
            None => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .thread_name("aiwire-realtime")
                    .enable_all()
                    .build()?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        let id = uuid::Uuid::new_v4().to_string();
        let span = realtime_session_span(&id, transport.endpoint());
        let (state_tx, _) = watch::channel(Stopped);
        tracing::debug!(
            session_id = %id,
            endpoint = transport.endpoint(),
            owned_runtime = owned_runtime.is_some(),
            "realtime session created"
        );

        Ok(RealtimeSession {
            inner: Arc::new(SessionInner {
                id,
                transport,
                codec: self.codec.unwrap_or_default(),
                handler: RwLock::new(Some(handler)),
                state: AtomicConnectivityState::default(),
                state_tx,
                live: ArcSwapOption::empty(),
                generation: AtomicU32::new(0),
                disposed: AtomicBool::new(false),
                runtime,
                owned_runtime: Mutex::new(owned_runtime),
                connect_timeout: self.connect_timeout,
                span,
            }),
        })
    }
}

impl RealtimeSession {
    /// Start building a session.
    pub fn builder() -> RealtimeSessionBuilder {
        RealtimeSessionBuilder::default()
    }

    /// Locally generated id, used to correlate logs.
    pub fn session_id(&self) -> &str {
        &self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectivityState {
        self.inner.state.load()
    }

    /// Whether sends are currently accepted.
    pub fn is_connected(&self) -> bool {
        self.state() == Connected
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// The codec used for this session.
    pub fn codec(&self) -> &EventCodec {
        &self.inner.codec
    }

    /// Begin connecting.
    ///
    /// Legal from `STOPPED` and `DISCONNECTED`. The state moves to `CONNECTING` before the
    /// connect is issued, so of two concurrent calls exactly one succeeds. Returns as soon as
    /// the connect has been spawned; use [`wait_until_connected`](Self::wait_until_connected)
    /// to wait for the handshake.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(RealtimeError::SessionClosed);
        }
        match inner.transition(&[Stopped, Disconnected], Connecting) {
            Ok(_) => {}
            Err(Closed) => return Err(RealtimeError::SessionClosed),
            Err(observed) => {
                tracing::warn!(session_id = %inner.id, state = %observed, "start rejected");
                return Err(RealtimeError::invalid_state("start", observed));
            }
        }

        let request = match ConnectRequest::for_transport(inner.transport.as_ref(), inner.connect_timeout)
        {
            Ok(request) => request,
            Err(e) => {
                let _ = inner.transition(&[Connecting], Disconnected);
                return Err(e);
            }
        };

        let generation = inner.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let listener = Arc::new(SessionListener {
            inner: Arc::downgrade(inner),
            generation,
            opened: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });
        let transport = inner.transport.clone();
        let span = inner.span.in_scope(|| realtime_connect_span(&inner.id, generation));

        tracing::info!(session_id = %inner.id, attempt = generation, endpoint = %request.url, "connecting");
        inner.runtime.spawn(
            async move {
                let callbacks: Arc<dyn TransportListener> = listener.clone();
                if let Err(error) = transport.open(request, callbacks).await {
                    listener.on_failure(error).await;
                }
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Encode `event` and hand it to the transport.
    ///
    /// Fails without touching the transport unless the session is `CONNECTED`.
    pub async fn send(&self, event: &ClientEvent) -> Result<()> {
        let inner = &self.inner;
        match inner.state.load() {
            Connected => {}
            Closed => return Err(RealtimeError::SessionClosed),
            other => return Err(RealtimeError::invalid_state("send", other)),
        }
        let Some(live) = inner.live.load_full() else {
            return Err(RealtimeError::NotConnected);
        };

        let span = realtime_frame_span(&inner.id, "outbound");
        record_event_type(&span, event.event_type());
        let text = inner.codec.encode(event)?;
        tracing::debug!(
            parent: &span,
            session_id = %inner.id,
            event_type = event.event_type(),
            bytes = text.len(),
            "sending client event"
        );
        live.handle.send_text(text).instrument(span).await
    }

    /// Request a clean shutdown of the connection.
    ///
    /// Legal only from `CONNECTED`. Sends a normal closure to the peer; the session moves to
    /// `DISCONNECTED` when the transport reports the close, after which `start()` may be
    /// called again.
    pub async fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        match inner.transition(&[Connected], Stopping) {
            Ok(_) => {}
            Err(Closed) => return Err(RealtimeError::SessionClosed),
            Err(observed) => {
                tracing::warn!(session_id = %inner.id, state = %observed, "stop rejected");
                return Err(RealtimeError::invalid_state("stop", observed));
            }
        }
        match inner.live.load_full() {
            Some(live) => live.handle.close(CloseReason::normal()).await,
            None => Ok(()),
        }
    }

    /// Close the session for good.
    ///
    /// Closes the connection if one is open, detaches the handler, and shuts down the owned
    /// runtime if there is one. Only the first call does any of this; later and concurrent
    /// calls return `Ok(())` immediately.
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.disposed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
        {
            tracing::trace!(session_id = %inner.id, "close already performed");
            return Ok(());
        }

        let previous = inner.state.close();
        inner.publish();

        if let Some(live) = inner.live.swap(None) {
            if let Err(e) = live.handle.close(CloseReason::normal()).await {
                tracing::debug!(session_id = %inner.id, error = %e, "close frame not sent");
            }
        }
        inner.handler.write().take();
        if let Some(runtime) = inner.owned_runtime.lock().take() {
            runtime.shutdown_background();
        }

        tracing::info!(session_id = %inner.id, from = %previous, "realtime session closed");
        Ok(())
    }

    /// Wait until the session is `CONNECTED`, for at most `timeout`.
    ///
    /// Fails with [`RealtimeError::SessionClosed`] if the session is closed while waiting and
    /// with [`RealtimeError::Timeout`] when the time runs out.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<()> {
        match self.wait_for(timeout, |state| matches!(state, Connected | Closed)).await? {
            Connected => Ok(()),
            _ => Err(RealtimeError::SessionClosed),
        }
    }

    /// Wait until a connect attempt has settled, returning the resulting state.
    pub(crate) async fn wait_until_settled(&self, timeout: Duration) -> Result<ConnectivityState> {
        self.wait_for(timeout, |state| state != Connecting).await
    }

    async fn wait_for(
        &self,
        timeout: Duration,
        ready: impl Fn(ConnectivityState) -> bool,
    ) -> Result<ConnectivityState> {
        let mut rx = self.inner.state_tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|state| ready(*state)).await.map(|state| *state)
        })
        .await;
        match waited {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => Err(RealtimeError::SessionClosed),
            Err(_) => Err(RealtimeError::timeout(format!(
                "session still {} after {timeout:?}",
                self.state()
            ))),
        }
    }

    /// Send raw audio in the session's input format.
    pub async fn send_audio(&self, audio: &AudioChunk) -> Result<()> {
        self.send(&ClientEvent::append_audio(audio.data.clone())).await
    }

    /// Add a user text message to the conversation.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send(&ClientEvent::user_text(text)).await
    }

    /// Return the output of a function call.
    pub async fn send_function_output(&self, call_id: &str, output: &str) -> Result<()> {
        self.send(&ClientEvent::function_call_output(call_id, output)).await
    }

    /// Commit the input audio buffer (manual turn detection).
    pub async fn commit_audio(&self) -> Result<()> {
        self.send(&ClientEvent::commit_audio()).await
    }

    /// Discard the input audio buffer.
    pub async fn clear_audio(&self) -> Result<()> {
        self.send(&ClientEvent::clear_audio()).await
    }

    /// Ask the model to respond.
    pub async fn create_response(&self) -> Result<()> {
        self.send(&ClientEvent::create_response()).await
    }

    /// Cancel the in-progress response.
    pub async fn cancel_response(&self) -> Result<()> {
        self.send(&ClientEvent::cancel_response()).await
    }

    /// Change the session configuration.
    pub async fn update_session(&self, config: SessionConfig) -> Result<()> {
        self.send(&ClientEvent::session_update(config)).await
    }
}

impl fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSession")
            .field("session_id", &self.inner.id)
            .field("state", &self.state())
            .field("endpoint", &self.inner.transport.endpoint())
            .finish()
    }
}

impl SessionInner {
    fn transition(
        &self,
        from: &[ConnectivityState],
        to: ConnectivityState,
    ) -> std::result::Result<ConnectivityState, ConnectivityState> {
        let result = self.state.transition_from(from, to);
        if let Ok(previous) = result {
            debug_assert!(previous.can_transition_to(to), "{previous} -> {to}");
            tracing::debug!(session_id = %self.id, from = %previous, to = %to, "state transition");
            self.publish();
        }
        result
    }

    /// Copy the atomic state into the watch channel.
    ///
    /// The state is re-read under the channel lock, so racing publishers always leave the
    /// latest value behind.
    fn publish(&self) {
        self.state_tx.send_if_modified(|published| {
            let current = self.state.load();
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        });
    }

    fn handler(&self) -> Option<Arc<dyn ServerEventHandler>> {
        self.handler.read().clone()
    }

    /// Drop the live handle if it belongs to `generation`.
    fn clear_handle(&self, generation: u32) {
        self.live.rcu(|current| match current {
            Some(live) if live.generation == generation => None,
            other => other.clone(),
        });
    }

    async fn dispatch(&self, text: String) {
        let span = realtime_frame_span(&self.id, "inbound");
        async {
            let Some(handler) = self.handler() else {
                tracing::trace!(session_id = %self.id, "no handler attached, dropping frame");
                return;
            };
            match self.codec.decode(&text) {
                Ok(event) => {
                    record_event_type(&Span::current(), event.event_type());
                    tracing::debug!(
                        session_id = %self.id,
                        event_type = event.event_type(),
                        "server event"
                    );
                    handler.on_event(event).await;
                }
                Err(error) => {
                    tracing::warn!(session_id = %self.id, error = %error, "dropping undecodable frame");
                    handler.on_decode_error(&error, &text).await;
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let owned = self.owned_runtime.get_mut().take();
        // Dropped without close(): still tell the peer we are going away.
        if let Some(live) = self.live.swap(None) {
            if owned.is_none() {
                self.runtime.spawn(async move {
                    let _ = live.handle.close(CloseReason::normal()).await;
                });
            }
        }
        if let Some(runtime) = owned {
            runtime.shutdown_background();
        }
    }
}

/// Transport callbacks for one `start()`.
struct SessionListener {
    inner: Weak<SessionInner>,
    generation: u32,
    opened: AtomicBool,
    finished: AtomicBool,
}

impl SessionListener {
    async fn finish(&self, close: Option<CloseReason>, error: Option<RealtimeError>) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(inner) = self.inner.upgrade() else { return };
        inner.clear_handle(self.generation);

        match inner.transition(&[Connecting, Connected, Stopping], Disconnected) {
            Ok(previous) => {
                let expected = previous == Stopping;
                if expected {
                    tracing::info!(session_id = %inner.id, "disconnected");
                } else {
                    tracing::warn!(
                        session_id = %inner.id,
                        from = %previous,
                        close = ?close,
                        error = ?error.as_ref().map(ToString::to_string),
                        "connection lost"
                    );
                }
                if let Some(handler) = inner.handler() {
                    handler.on_disconnect(Disconnect { close, error, expected }).await;
                }
            }
            Err(observed) => {
                tracing::debug!(session_id = %inner.id, state = %observed, "connection ended");
            }
        }
    }
}

#[async_trait]
impl TransportListener for SessionListener {
    async fn on_open(&self, handle: Arc<dyn TransportHandle>) {
        let first_open = !self.opened.swap(true, Ordering::AcqRel);
        let inner = match self.inner.upgrade() {
            Some(inner) if first_open && !self.finished.load(Ordering::Acquire) => inner,
            _ => {
                let _ = handle.close(CloseReason::normal()).await;
                return;
            }
        };

        inner.live.store(Some(Arc::new(LiveHandle { generation: self.generation, handle: handle.clone() })));
        match inner.transition(&[Connecting], Connected) {
            Ok(_) => tracing::info!(session_id = %inner.id, "connected"),
            Err(observed) => {
                tracing::debug!(session_id = %inner.id, state = %observed, "closing late connection");
                inner.clear_handle(self.generation);
                let _ = handle.close(CloseReason::normal()).await;
            }
        }
    }

    async fn on_message(&self, text: String) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(text).await;
        }
    }

    async fn on_closed(&self, reason: CloseReason) {
        self.finish(Some(reason), None).await;
    }

    async fn on_failure(&self, error: RealtimeError) {
        self.finish(None, Some(error)).await;
    }
}
