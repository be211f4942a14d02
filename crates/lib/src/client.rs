//! The add-in side of the bridge: init, subscriptions, state getters, outbound actions and
//! correlated requests.
//!
//! One inbound entry point (`handle_envelope` / `handle_message`) updates state, runs handlers and
//! settles pending requests. Every outbound call goes through `post`, which refuses to send
//! before `init`. The core lock is never held while the transport or a handler runs, so both may
//! call back into the bridge.

use crate::dispatch::{Handler, HandlerRegistry, OnReject, Outcome, PendingRequests, Settlement};
use crate::error::{BridgeError, Result};
use crate::protocol::{
    self, ContactName, Conversation, Envelope, InitPayload,
    PrepareMessageParams, PrepareMethod, RequestParams, SendOnCloseParams, UpdateContactParams,
};
use crate::state::StateStore;
use crate::transport::Transport;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

#[derive(Default)]
struct Core {
    state: StateStore,
    handlers: HandlerRegistry,
    pending: PendingRequests,
}

struct Inner {
    core: Mutex<Core>,
    transport: Arc<dyn Transport>,
}

/// Handle to the bridge. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(Core::default()),
                transport,
            }),
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the origin outbound envelopes are addressed to. May be called again to retarget.
    pub fn init(&self, host: &str) -> Result<()> {
        let host = host.trim();
        if host.is_empty() {
            return Err(BridgeError::MissingHost);
        }
        self.core().state.host = Some(host.to_string());
        log::info!("bridge initialized for host {}", host);
        Ok(())
    }

    pub fn host(&self) -> Option<String> {
        self.core().state.host.clone()
    }

    /// Subscribe to an inbound event. Handlers run in registration order and cannot be removed.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.core().handlers.add(event.into(), handler);
    }

    /// Raw conversation object from the last `init` (`Null` before any).
    pub fn conversation(&self) -> serde_json::Value {
        self.core().state.conversation.clone()
    }

    /// The conversation decoded into its typed view.
    pub fn typed_conversation(&self) -> std::result::Result<Conversation, serde_json::Error> {
        serde_json::from_value(self.conversation())
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.core().state.conversation_id.clone()
    }

    /// Id of the agent currently logged in to the host.
    pub fn user_id(&self) -> Option<String> {
        self.core().state.user_id.clone()
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.core().state.tenant_id.clone()
    }

    pub fn extension_id(&self) -> Option<String> {
        self.core().state.extension_id.clone()
    }

    /// Extension data for this add-in on the current conversation, verbatim.
    pub fn extension_data(&self) -> Option<String> {
        self.core().state.extension_data.clone()
    }

    /// Parse a raw JSON frame and dispatch it. Frames that are not envelopes are dropped.
    pub fn handle_message(&self, raw: &str) {
        match serde_json::from_str::<Envelope>(raw) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => log::warn!("ignoring inbound frame that is not an envelope: {}", e),
        }
    }

    /// Dispatch one inbound envelope: update state, run handlers, settle a pending request.
    pub fn handle_envelope(&self, envelope: Envelope) {
        let Envelope { event_type, data } = envelope;
        log::debug!("handling event {}", event_type);

        let (handlers, settled) = {
            let mut core = self.core();
            match event_type.as_str() {
                protocol::EVENT_INIT => core.state.apply_init(InitPayload::from_data(&data)),
                protocol::EVENT_EXTENSION_DATA_CHANGED => {
                    core.state.extension_data = protocol::changed_extension_data(&data);
                }
                _ => {}
            }

            let settled = core.pending.take(&event_type);
            if let Some((Outcome::Error, req)) = &settled {
                if let OnReject::RestoreExtensionData(previous) = &req.on_reject {
                    core.state.extension_data = previous.clone();
                }
            }
            (core.handlers.get(&event_type), settled)
        };

        for handler in handlers {
            handler(&data);
        }

        if let Some((outcome, req)) = settled {
            let answer: Settlement = match outcome {
                Outcome::Success => Ok(data.get("data").cloned().unwrap_or_default()),
                Outcome::Error => Err(data),
            };
            if req.tx.send(answer).is_err() {
                log::debug!("response for {} arrived after its future was dropped", event_type);
            }
        }
    }

    /// Stage text in the agent's compose box without sending it.
    pub fn prepare_message(&self, message: &str, method: Option<PrepareMethod>) -> Result<()> {
        let conversation_id = self.checked_conversation_id();
        let data = serde_json::to_value(PrepareMessageParams {
            conversation_id: conversation_id.as_deref(),
            message,
            method,
        })?;
        self.post(protocol::ACTION_PREPARE_MESSAGE, data)
    }

    /// Message the host sends when the agent closes the conversation.
    pub fn send_on_close(&self, message: &str) -> Result<()> {
        let conversation_id = self.checked_conversation_id();
        let data = serde_json::to_value(SendOnCloseParams {
            conversation_id: conversation_id.as_deref(),
            message,
        })?;
        self.post(protocol::ACTION_SEND_ON_CLOSE, data)
    }

    pub fn update_contact_display_name(&self, contact: &ContactName) -> Result<()> {
        let conversation_id = self.checked_conversation_id();
        let data = serde_json::to_value(UpdateContactParams {
            conversation_id: conversation_id.as_deref(),
            contact,
        })?;
        self.post(protocol::ACTION_UPDATE_CONTACT_DISPLAY_NAME, data)
    }

    /// Send a correlated request. The host answers with `<type>.success<N>` or `<type>.error<N>`,
    /// where `N` is the `requestCounter` carried in the payload.
    pub fn async_request(
        &self,
        request_type: &str,
        data: Option<serde_json::Value>,
    ) -> Result<PendingResponse> {
        self.request(request_type, data, OnReject::Nothing)
    }

    pub fn fetch_users(&self) -> Result<PendingResponse> {
        self.async_request(protocol::REQUEST_FETCH_USERS, None)
    }

    /// Store extension data on the conversation. The local value changes immediately and is put
    /// back if the host rejects the write.
    pub fn set_extension_data(&self, data: impl Into<String>) -> Result<PendingResponse> {
        let data = data.into();
        let previous = self.core().state.extension_data.replace(data.clone());
        self.request(
            protocol::REQUEST_SET_EXTENSION_DATA,
            Some(serde_json::Value::String(data)),
            OnReject::RestoreExtensionData(previous),
        )
    }

    fn request(
        &self,
        request_type: &str,
        data: Option<serde_json::Value>,
        on_reject: OnReject,
    ) -> Result<PendingResponse> {
        let (counter, params, rx) = {
            let mut core = self.core();
            let counter = core.state.next_request_counter();
            let rx = core.pending.register(request_type, counter, on_reject);
            let params = RequestParams {
                request_counter: counter,
                conversation_id: core.state.conversation_id.clone(),
                extension_id: core.state.extension_id.clone(),
                data,
            };
            (counter, params, rx)
        };
        log::debug!("sending {} request {}", request_type, counter);

        let sent = serde_json::to_value(&params)
            .map_err(BridgeError::from)
            .and_then(|v| self.post(request_type, v));
        if let Err(e) = sent {
            let mut core = self.core();
            if let Some(req) = core.pending.discard(request_type, counter) {
                if let OnReject::RestoreExtensionData(previous) = req.on_reject {
                    core.state.extension_data = previous;
                }
            }
            return Err(e);
        }
        Ok(PendingResponse { rx })
    }

    fn checked_conversation_id(&self) -> Option<String> {
        let id = self.conversation_id();
        if id.is_none() {
            log::error!(
                "can't send a message without a conversationId; verify the add-in initialized properly"
            );
        }
        id
    }

    fn post(&self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let host = self.host().ok_or(BridgeError::NotInitialized)?;
        self.inner
            .transport
            .post_message(Envelope::new(event_type, data), &host)
            .map_err(BridgeError::Transport)
    }
}

/// Answer to a correlated request: the success payload's `data`, or `BridgeError::Rejected` with
/// the host's error payload. Never times out.
#[must_use = "the host's answer is only observable by awaiting the response"]
pub struct PendingResponse {
    rx: oneshot::Receiver<Settlement>,
}

impl Future for PendingResponse {
    type Output = Result<serde_json::Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| match res {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(error)) => Err(BridgeError::Rejected(error)),
            Err(_) => Err(BridgeError::Closed),
        })
    }
}
