use crate::client::ClientError;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tracing::debug;
use uuid::Uuid;

const EVENT_BUFFER: usize = 256;

/// Realtime channel to the chat gateway.
///
/// Outgoing events go through a command queue; incoming events fan out
/// on a broadcast channel so the session and the notification
/// aggregator can each hold their own receiver.
pub struct ChatSocket {
    commands: mpsc::UnboundedSender<WsInboundEvent>,
    events: broadcast::Sender<WsOutboundEvent>,
    connected: Arc<AtomicBool>,
    io_task: JoinHandle<()>,
}

impl ChatSocket {
    /// Open the socket, authenticating with the token in the query
    /// string. Fails if the handshake is rejected.
    pub async fn connect(ws_url: &str, token: &str) -> Result<Self, ClientError> {
        let url = format!("{ws_url}?token={token}");
        let (stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| ClientError::Socket(e.to_string()))?;

        let (commands, mut command_rx) = mpsc::unbounded_channel::<WsInboundEvent>();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let events_tx = events.clone();
        let connected_flag = Arc::clone(&connected);
        let io_task = tokio::spawn(async move {
            let (mut sink, mut source) = stream.split();
            loop {
                tokio::select! {
                    command = command_rx.recv() => {
                        match command {
                            Some(event) => {
                                let Ok(text) = serde_json::to_string(&event) else { continue };
                                if sink.send(WsFrame::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = sink.send(WsFrame::Close(None)).await;
                                break;
                            }
                        }
                    }
                    frame = source.next() => {
                        match frame {
                            Some(Ok(WsFrame::Text(text))) => {
                                if let Ok(event) = serde_json::from_str::<WsOutboundEvent>(&text) {
                                    let _ = events_tx.send(event);
                                } else {
                                    debug!("ignoring unrecognized gateway frame");
                                }
                            }
                            Some(Ok(WsFrame::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(_)) => break,
                        }
                    }
                }
            }
            connected_flag.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            commands,
            events,
            connected,
            io_task,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// A fresh receiver for gateway events. Each caller gets the full
    /// stream from the point of subscription.
    pub fn events(&self) -> broadcast::Receiver<WsOutboundEvent> {
        self.events.subscribe()
    }

    pub fn send(&self, event: WsInboundEvent) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.commands
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }

    pub fn join_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.send(WsInboundEvent::JoinConversation { conversation_id })
    }

    pub fn leave_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.send(WsInboundEvent::LeaveConversation { conversation_id })
    }

    pub fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        message: &str,
        client_ref: Option<String>,
    ) -> Result<(), ClientError> {
        self.send(WsInboundEvent::SendMessage {
            conversation_id,
            message: message.to_string(),
            sender_id,
            client_ref,
        })
    }

    pub fn typing(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        user_name: &str,
    ) -> Result<(), ClientError> {
        self.send(WsInboundEvent::Typing {
            conversation_id,
            user_id,
            user_name: user_name.to_string(),
        })
    }

    pub fn stop_typing(&self, conversation_id: Uuid, user_id: Uuid) -> Result<(), ClientError> {
        self.send(WsInboundEvent::StopTyping {
            conversation_id,
            user_id,
        })
    }

    pub fn mark_as_seen(&self, conversation_id: Uuid, user_id: Uuid) -> Result<(), ClientError> {
        self.send(WsInboundEvent::MarkAsSeen {
            conversation_id,
            user_id,
        })
    }

    /// Close the connection and stop the I/O task.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.io_task.abort();
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}
