use crate::client::{ChatApi, ClientError};
use crate::routes::conversations::ConversationDto;
use crate::websocket::message_types::WsOutboundEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const PREVIEW_LEN: usize = 50;

/// A derived notification: a projection of "latest unseen message per
/// conversation", never persisted anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Deterministic (`message_<id>`), so re-deriving the same message
    /// collapses into one entry.
    pub id: String,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    /// Local-only; resets when the aggregator is rebuilt.
    pub read: bool,
}

fn preview_of(content: &str) -> String {
    let mut preview: String = content.chars().take(PREVIEW_LEN).collect();
    if content.chars().count() > PREVIEW_LEN {
        preview.push_str("...");
    }
    preview
}

/// One notification per conversation whose latest message was sent by
/// someone else and not yet seen by `current_user`.
pub fn derive_notifications(
    current_user: Uuid,
    conversations: &[ConversationDto],
) -> Vec<Notification> {
    conversations
        .iter()
        .filter_map(|conversation| {
            let latest = conversation.last_message.as_ref()?;
            if latest.sender_id == current_user {
                return None;
            }
            if latest.seen_by.iter().any(|s| s.user == current_user) {
                return None;
            }
            Some(Notification {
                id: format!("message_{}", latest.id),
                conversation_id: conversation.id,
                sender_id: latest.sender_id,
                preview: preview_of(&latest.content),
                created_at: latest.created_at,
                read: false,
            })
        })
        .collect()
}

type NotificationMap = Arc<Mutex<HashMap<String, Notification>>>;

/// Replace the feed with a fresh derivation, keeping local read flags
/// for notifications that are still present.
fn apply_derived(store: &NotificationMap, derived: Vec<Notification>) {
    let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
    let mut next: HashMap<String, Notification> = HashMap::with_capacity(derived.len());
    for mut notification in derived {
        if let Some(existing) = guard.get(&notification.id) {
            notification.read = existing.read;
        }
        next.insert(notification.id.clone(), notification);
    }
    *guard = next;
}

async fn refresh(api: &ChatApi, current_user: Uuid, store: &NotificationMap) {
    let result: Result<(), ClientError> = async {
        let unread = api.unread_count().await?;
        let derived = if unread == 0 {
            Vec::new()
        } else {
            derive_notifications(current_user, &api.list_conversations().await?)
        };
        apply_derived(store, derived);
        Ok(())
    }
    .await;

    if let Err(err) = result {
        debug!(error = %err, "notification refresh failed, keeping last known state");
    }
}

/// Client-side poller that keeps a notification feed in sync with the
/// server's seen-state. Constructed per login and stopped on logout;
/// it owns its background task.
pub struct NotificationAggregator {
    api: Arc<ChatApi>,
    current_user: Uuid,
    interval: Duration,
    notifications: NotificationMap,
    poll_task: Option<JoinHandle<()>>,
}

impl NotificationAggregator {
    pub fn new(api: Arc<ChatApi>, current_user: Uuid) -> Self {
        Self {
            api,
            current_user,
            interval: DEFAULT_POLL_INTERVAL,
            notifications: Arc::new(Mutex::new(HashMap::new())),
            poll_task: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling. When gateway events are supplied, an incoming
    /// `messageReceived` triggers an immediate refresh between ticks.
    pub fn start(&mut self, mut push: Option<broadcast::Receiver<WsOutboundEvent>>) {
        if self.poll_task.is_some() {
            return;
        }

        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.notifications);
        let current_user = self.current_user;
        let poll_interval = self.interval;

        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresh(&api, current_user, &store).await;
                    }
                    event = async {
                        match push.as_mut() {
                            Some(rx) => rx.recv().await,
                            None => std::future::pending().await,
                        }
                    } => {
                        match event {
                            Ok(WsOutboundEvent::MessageReceived(_)) => {
                                refresh(&api, current_user, &store).await;
                            }
                            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => {
                                // socket gone, polling carries on alone
                                push = None;
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Stop the background task. The last derived feed stays readable.
    pub fn stop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    /// One immediate refresh, independent of the poll loop.
    pub async fn refresh_now(&self) {
        refresh(&self.api, self.current_user, &self.notifications).await;
    }

    /// Current feed, newest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        let guard = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Notification> = guard.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn unread_notifications(&self) -> usize {
        let guard = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        guard.values().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, id: &str) {
        let mut guard = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(notification) = guard.get_mut(id) {
            notification.read = true;
        }
    }

    /// Empty the local feed. Deliberately has no server effect: the
    /// messages stay unseen, and the next poll resurrects them unless
    /// the user actually opens the conversation.
    pub fn clear_all(&self) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Drop for NotificationAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::messages::{MessageDto, SeenByDto};

    fn conversation_with_latest(
        participants: [Uuid; 2],
        sender_id: Uuid,
        content: &str,
        seen_by: Vec<SeenByDto>,
    ) -> ConversationDto {
        let id = Uuid::new_v4();
        let now = Utc::now();
        ConversationDto {
            id,
            participants,
            last_message: Some(MessageDto {
                id: Uuid::new_v4(),
                conversation_id: id,
                sender_id,
                content: content.to_string(),
                seen_by,
                created_at: now,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn derives_only_unseen_messages_from_others() {
        let me = Uuid::new_v4();
        let peer = Uuid::new_v4();

        let unseen = conversation_with_latest([me, peer], peer, "new message", vec![]);
        let mine = conversation_with_latest([me, peer], me, "sent by me", vec![]);
        let seen = conversation_with_latest(
            [me, peer],
            peer,
            "already read",
            vec![SeenByDto {
                user: me,
                seen_at: Utc::now(),
            }],
        );
        let empty = ConversationDto {
            id: Uuid::new_v4(),
            participants: [me, peer],
            last_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let derived = derive_notifications(me, &[unseen.clone(), mine, seen, empty]);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].conversation_id, unseen.id);
        assert!(!derived[0].read);
    }

    #[test]
    fn notification_ids_are_deterministic() {
        let me = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let conversation = conversation_with_latest([me, peer], peer, "hello", vec![]);

        let first = derive_notifications(me, std::slice::from_ref(&conversation));
        let second = derive_notifications(me, std::slice::from_ref(&conversation));
        assert_eq!(first[0].id, second[0].id);
        let message_id = conversation.last_message.as_ref().unwrap().id;
        assert_eq!(first[0].id, format!("message_{message_id}"));
    }

    #[test]
    fn clear_all_is_local_only_and_the_next_poll_resurrects() {
        let me = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let conversation = conversation_with_latest([me, peer], peer, "still unseen", vec![]);

        let api = Arc::new(ChatApi::new("http://127.0.0.1:0", "token"));
        let aggregator = NotificationAggregator::new(api, me);

        let derived = derive_notifications(me, std::slice::from_ref(&conversation));
        apply_derived(&aggregator.notifications, derived.clone());
        let id = aggregator.snapshot()[0].id.clone();
        aggregator.mark_read(&id);
        assert_eq!(aggregator.unread_notifications(), 0);

        // clearing empties only the local feed; the message is still
        // unseen on the server, so nothing stops it coming back
        aggregator.clear_all();
        assert!(aggregator.snapshot().is_empty());

        // the next poll derives the same message again under the same
        // id, and the pre-clear read flag is gone with the old entry
        apply_derived(&aggregator.notifications, derived);
        let resurrected = aggregator.snapshot();
        assert_eq!(resurrected.len(), 1);
        assert_eq!(resurrected[0].id, id);
        assert!(!resurrected[0].read);
        assert_eq!(aggregator.unread_notifications(), 1);
    }

    #[test]
    fn read_flags_survive_a_poll_that_keeps_the_entry() {
        let me = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let conversation = conversation_with_latest([me, peer], peer, "hello", vec![]);

        let api = Arc::new(ChatApi::new("http://127.0.0.1:0", "token"));
        let aggregator = NotificationAggregator::new(api, me);

        let derived = derive_notifications(me, std::slice::from_ref(&conversation));
        apply_derived(&aggregator.notifications, derived.clone());
        let id = aggregator.snapshot()[0].id.clone();
        aggregator.mark_read(&id);

        apply_derived(&aggregator.notifications, derived);
        assert!(aggregator.snapshot()[0].read);
        assert_eq!(aggregator.unread_notifications(), 0);
    }

    #[test]
    fn long_previews_are_truncated() {
        let me = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let long = "x".repeat(80);
        let conversation = conversation_with_latest([me, peer], peer, &long, vec![]);

        let derived = derive_notifications(me, std::slice::from_ref(&conversation));
        assert_eq!(derived[0].preview.chars().count(), PREVIEW_LEN + 3);
        assert!(derived[0].preview.ends_with("..."));

        let short = conversation_with_latest([me, peer], peer, "short", vec![]);
        let derived = derive_notifications(me, std::slice::from_ref(&short));
        assert_eq!(derived[0].preview, "short");
    }
}
