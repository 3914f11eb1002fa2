//! The registry of streamed sessions

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

use super::protocol::ServerFactory;
use crate::{
    errors::SessionError,
    jsonrpc::{JsonRpcMessage, JsonRpcResponse, Reply},
};

/// An event pushed to the client of a streamed session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Where the client should post its follow-up messages
    Endpoint(String),

    /// The response to one request
    Message(JsonRpcResponse),
}

type Registry = Arc<RwLock<HashMap<String, UnboundedSender<JsonRpcMessage>>>>;

/// Owns every live session, keyed by session id
///
/// Each session gets its own protocol server and a worker task draining its
/// inbound queue, so responses keep the order of that session's requests.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Registry,
    factory: ServerFactory,
    message_path: String,
}

impl SessionManager {
    pub fn new(factory: ServerFactory, message_path: impl Into<String>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            factory,
            message_path: message_path.into(),
        }
    }

    /// Start a new session
    ///
    /// The session lives until the returned stream is dropped or it is
    /// closed with [`SessionManager::close`].
    pub fn open(&self) -> SessionStream {
        let id = Uuid::new_v4().to_string();
        let (inbound, mut queue) = mpsc::unbounded_channel::<JsonRpcMessage>();
        let (outbound, events) = mpsc::unbounded_channel();

        // The receiver is still held here, so this cannot fail
        let _ = outbound.send(SessionEvent::Endpoint(format!(
            "{}?sessionId={id}",
            self.message_path
        )));

        let mut server = (self.factory)();
        let session_id = id.clone();
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                if let Reply::Response(response) = server.dispatch(message).await
                    && outbound.send(SessionEvent::Message(response)).is_err()
                {
                    debug!(session_id, "Session closed before its response was sent");
                    break;
                }
            }
            debug!(session_id, "Session worker stopped");
        });

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), inbound);
        info!(session_id = id, "Session opened");

        SessionStream {
            id,
            events,
            sessions: Arc::clone(&self.sessions),
        }
    }

    /// Queue a follow-up message for a session
    pub fn forward(&self, session_id: &str, message: JsonRpcMessage) -> Result<(), SessionError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .ok_or(SessionError::NotFound)?
            .send(message)
            .map_err(|_| SessionError::NotFound)
    }

    /// End a session, returning whether it existed
    pub fn close(&self, session_id: &str) -> bool {
        remove(&self.sessions, session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove(sessions: &Registry, session_id: &str) -> bool {
    let removed = sessions
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(session_id)
        .is_some();
    if removed {
        info!(session_id, "Session closed");
    }
    removed
}

/// The outbound events of one session
///
/// Dropping the stream deregisters the session.
pub struct SessionStream {
    id: String,
    events: UnboundedReceiver<SessionEvent>,
    sessions: Registry,
}

impl SessionStream {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for SessionStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        remove(&self.sessions, &self.id);
    }
}
