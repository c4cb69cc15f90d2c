//! WebSocket delivery of out-of-band notices.
//!
//! A connection starts subscribed to every channel. Clients narrow or widen
//! the set with control frames:
//!
//! ```json
//! {"type": "subscribe", "event_types": ["show-diff-preview"]}
//! {"type": "unsubscribe", "event_types": ["ai-response"]}
//! ```
//!
//! Each control frame is answered with the resulting channel list. A socket
//! that falls behind the hub is closed; the client reconnects for a fresh
//! feed.

use std::collections::BTreeSet;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use scribe_core::events::{Notice, NoticeHub};

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Control {
    Subscribe { event_types: Vec<String> },
    Unsubscribe { event_types: Vec<String> },
}

#[derive(Debug, Serialize, PartialEq)]
struct SubscriptionAck {
    #[serde(rename = "type")]
    kind: &'static str,
    event_types: Vec<String>,
}

/// Channels one connection wants to hear about.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    channels: BTreeSet<String>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            channels: Notice::CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Subscription {
    pub fn wants(&self, notice: &Notice) -> bool {
        self.channels.contains(notice.channel())
    }

    /// Applies a control frame and returns the acknowledgement to send back.
    /// Unknown channel names are ignored.
    pub fn apply(&mut self, text: &str) -> anyhow::Result<String> {
        match serde_json::from_str::<Control>(text)? {
            Control::Subscribe { event_types } => {
                self.channels.extend(event_types.into_iter().filter(|c| is_channel(c)));
            }
            Control::Unsubscribe { event_types } => {
                for channel in &event_types {
                    self.channels.remove(channel);
                }
            }
        }
        let ack = SubscriptionAck {
            kind: "subscription",
            event_types: self.channels.iter().cloned().collect(),
        };
        Ok(serde_json::to_string(&ack)?)
    }
}

fn is_channel(name: &str) -> bool {
    Notice::CHANNELS.contains(&name)
}

#[derive(Debug, PartialEq)]
enum Delivery {
    Send(String),
    Skip,
    Close,
}

/// Decides what a socket does with the next item from the hub.
fn deliver(received: Result<Notice, RecvError>, subscription: &Subscription) -> Delivery {
    match received {
        Ok(notice) if subscription.wants(&notice) => match serde_json::to_string(&notice) {
            Ok(text) => Delivery::Send(text),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to encode notice");
                Delivery::Skip
            }
        },
        Ok(_) => Delivery::Skip,
        Err(RecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Notice socket fell behind; closing it");
            Delivery::Close
        }
        Err(RecvError::Closed) => Delivery::Close,
    }
}

/// Pumps notices to one socket until either side goes away.
pub async fn serve_socket(socket: WebSocket, hub: NoticeHub) {
    let (mut outgoing, mut incoming) = socket.split();
    let mut notices = hub.subscribe();
    let mut subscription = Subscription::default();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    tracing::debug!(subscribers = hub.subscriber_count(), "Notice socket connected");

    loop {
        tokio::select! {
            received = notices.recv() => match deliver(received, &subscription) {
                Delivery::Send(text) => {
                    if outgoing.send(WsMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
                Delivery::Skip => {}
                Delivery::Close => {
                    let _ = outgoing.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            frame = incoming.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let reply = subscription.apply(&text).unwrap_or_else(|err| {
                        serde_json::json!({"type": "error", "detail": err.to_string()}).to_string()
                    });
                    if outgoing.send(WsMessage::Text(reply)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = ping.tick() => {
                if outgoing.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Notice socket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::events::{DiffPreview, ToolLifecycle};
    use serde_json::{json, Value};

    fn preview() -> Notice {
        Notice::DiffPreview(DiffPreview {
            file_path: "ch1.md".into(),
            suggested_content: "new".into(),
            original_content: None,
        })
    }

    fn ai_response() -> Notice {
        Notice::AiResponse(ToolLifecycle::named("ai_message", json!({"content": "hi"})))
    }

    #[test]
    fn new_connections_hear_every_channel() {
        let subscription = Subscription::default();
        assert!(subscription.wants(&preview()));
        assert!(subscription.wants(&ai_response()));
    }

    #[test]
    fn unsubscribe_then_subscribe_round_trips() {
        let mut subscription = Subscription::default();

        let ack: Value = serde_json::from_str(
            &subscription
                .apply(r#"{"type": "unsubscribe", "event_types": ["ai-response"]}"#)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(ack["type"], "subscription");
        assert_eq!(ack["event_types"], json!(["show-diff-preview", "tool-call-events"]));
        assert!(!subscription.wants(&ai_response()));
        assert!(subscription.wants(&preview()));

        subscription
            .apply(r#"{"type": "subscribe", "event_types": ["ai-response", "bogus"]}"#)
            .unwrap();
        assert_eq!(subscription, Subscription::default());
    }

    #[test]
    fn lagging_socket_is_closed_and_filtered_notices_skipped() {
        let mut subscription = Subscription::default();
        subscription
            .apply(r#"{"type": "unsubscribe", "event_types": ["ai-response"]}"#)
            .unwrap();

        assert_eq!(deliver(Ok(ai_response()), &subscription), Delivery::Skip);
        match deliver(Ok(preview()), &subscription) {
            Delivery::Send(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "show-diff-preview");
            }
            other => panic!("expected a send, got {other:?}"),
        }
        assert_eq!(deliver(Err(RecvError::Lagged(3)), &subscription), Delivery::Close);
        assert_eq!(deliver(Err(RecvError::Closed), &subscription), Delivery::Close);
    }

    #[tokio::test]
    async fn slow_listener_sees_lag_from_the_hub() {
        let hub = NoticeHub::new(2);
        let mut listener = hub.subscribe();
        for _ in 0..5 {
            hub.publish(preview());
        }
        let received = listener.recv().await;
        assert!(matches!(received, Err(RecvError::Lagged(_))));
        assert_eq!(deliver(received, &Subscription::default()), Delivery::Close);
    }

    #[test]
    fn malformed_control_frames_are_errors() {
        let mut subscription = Subscription::default();
        assert!(subscription.apply("not json").is_err());
        assert!(subscription.apply(r#"{"type": "shout"}"#).is_err());
    }
}
