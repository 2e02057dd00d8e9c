use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::api::models::{Message, Session};
use crate::error::ApiError;

pub const MESSAGES_TOPIC: &str = "realtime:messages";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One frame of the realtime service's channel protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Joined,
    Inserted(Message),
    Closed(String),
    Ignored,
}

/// Join request for insert events on `messages`.
pub fn join_frame(access_token: &str, reference: u64) -> ChannelFrame {
    ChannelFrame {
        topic: MESSAGES_TOPIC.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "INSERT", "schema": "public", "table": "messages" }
                ]
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

/// Hands the channel a renewed token so the subscription outlives the one it joined with.
pub fn access_token_frame(access_token: &str, reference: u64) -> ChannelFrame {
    ChannelFrame {
        topic: MESSAGES_TOPIC.to_string(),
        event: "access_token".to_string(),
        payload: json!({ "access_token": access_token }),
        reference: Some(reference.to_string()),
    }
}

/// What a session change means for a running feed.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenChange {
    Unchanged,
    Renewed(String),
    SignedOut,
}

pub fn token_change(current: &str, session: Option<&Session>) -> TokenChange {
    match session {
        None => TokenChange::SignedOut,
        Some(s) if s.access_token == current => TokenChange::Unchanged,
        Some(s) => TokenChange::Renewed(s.access_token.clone()),
    }
}

pub fn heartbeat_frame(reference: u64) -> ChannelFrame {
    ChannelFrame {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn classify(frame: &ChannelFrame) -> FeedEvent {
    if frame.topic != MESSAGES_TOPIC {
        return FeedEvent::Ignored;
    }
    match frame.event.as_str() {
        "phx_reply" => match frame.payload.get("status").and_then(|s| s.as_str()) {
            Some("ok") => FeedEvent::Joined,
            Some("error") => FeedEvent::Closed(
                frame
                    .payload
                    .get("response")
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "join rejected".into()),
            ),
            _ => FeedEvent::Ignored,
        },
        "phx_error" => FeedEvent::Closed("channel error".into()),
        "phx_close" => FeedEvent::Closed("channel closed".into()),
        "postgres_changes" => {
            let Some(data) = frame.payload.get("data") else {
                return FeedEvent::Ignored;
            };
            let is_insert = data.get("type").and_then(|t| t.as_str()) == Some("INSERT");
            let on_messages = data.get("table").and_then(|t| t.as_str()) == Some("messages");
            if !is_insert || !on_messages {
                return FeedEvent::Ignored;
            }
            match data.get("record").cloned().map(serde_json::from_value::<Message>) {
                Some(Ok(msg)) => FeedEvent::Inserted(msg),
                Some(Err(e)) => {
                    log::warn!("dropping malformed message row from realtime feed: {}", e);
                    FeedEvent::Ignored
                }
                None => FeedEvent::Ignored,
            }
        }
        _ => FeedEvent::Ignored,
    }
}

fn text(frame: &ChannelFrame) -> Result<WsMessage, ApiError> {
    Ok(WsMessage::Text(serde_json::to_string(frame)?))
}

/// Holds one subscription to inserted message rows until the server closes it or the
/// session ends. Renewed tokens from `sessions` are pushed onto the open channel.
/// There is no reconnect: a dropped feed is reported to the caller and left down.
pub async fn run_insert_feed<F>(
    url: Url,
    mut sessions: watch::Receiver<Option<Session>>,
    mut on_insert: F,
) -> Result<(), ApiError>
where
    F: FnMut(Message) + Send,
{
    let initial = sessions.borrow_and_update().as_ref().map(|s| s.access_token.clone());
    let Some(mut access_token) = initial else {
        return Err(ApiError::NotSignedIn);
    };
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws.split();
    let mut next_ref: u64 = 1;
    write.send(text(&join_frame(&access_token, next_ref))?).await?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                next_ref += 1;
                write.send(text(&heartbeat_frame(next_ref))?).await?;
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    log::info!("session source gone, leaving realtime feed");
                    return Ok(());
                }
                let change = token_change(&access_token, sessions.borrow_and_update().as_ref());
                match change {
                    TokenChange::Unchanged => {}
                    TokenChange::Renewed(token) => {
                        next_ref += 1;
                        write.send(text(&access_token_frame(&token, next_ref))?).await?;
                        log::debug!("realtime feed switched to renewed token");
                        access_token = token;
                    }
                    TokenChange::SignedOut => {
                        log::info!("signed out, leaving realtime feed");
                        let _ = write.send(WsMessage::Close(None)).await;
                        return Ok(());
                    }
                }
            }
            incoming = read.next() => {
                let Some(incoming) = incoming else {
                    log::info!("realtime feed ended");
                    return Ok(());
                };
                match incoming? {
                    WsMessage::Text(raw) => {
                        let frame: ChannelFrame = match serde_json::from_str(&raw) {
                            Ok(f) => f,
                            Err(e) => {
                                log::warn!("unreadable realtime frame: {}", e);
                                continue;
                            }
                        };
                        match classify(&frame) {
                            FeedEvent::Joined => log::info!("subscribed to message inserts"),
                            FeedEvent::Inserted(msg) => on_insert(msg),
                            FeedEvent::Closed(reason) => return Err(ApiError::Realtime(reason)),
                            FeedEvent::Ignored => {}
                        }
                    }
                    WsMessage::Close(_) => {
                        log::info!("realtime feed closed by server");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: Value) -> ChannelFrame {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn insert_on_messages_yields_the_row() {
        let f = frame(json!({
            "topic": "realtime:messages",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "messages",
                    "type": "INSERT",
                    "commit_timestamp": "2024-03-01T10:00:01Z",
                    "errors": null,
                    "record": {
                        "id": "m9",
                        "chat_id": "c1",
                        "sender_id": "u2",
                        "content": "hello",
                        "created_at": "2024-03-01T10:00:00+00:00",
                        "is_read": false
                    }
                }
            }
        }));
        match classify(&f) {
            FeedEvent::Inserted(m) => {
                assert_eq!(m.id, "m9");
                assert_eq!(m.chat_id, "c1");
                assert_eq!(m.content, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_tables_and_topics_are_ignored() {
        let update = frame(json!({
            "topic": "realtime:messages",
            "event": "postgres_changes",
            "payload": { "data": { "table": "messages", "type": "UPDATE", "record": {} } }
        }));
        assert_eq!(classify(&update), FeedEvent::Ignored);

        let heartbeat_reply = frame(json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "ref": "2",
            "payload": { "status": "ok", "response": {} }
        }));
        assert_eq!(classify(&heartbeat_reply), FeedEvent::Ignored);
    }

    #[test]
    fn join_reply_and_errors() {
        let ok = frame(json!({
            "topic": "realtime:messages",
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "ok", "response": { "postgres_changes": [] } }
        }));
        assert_eq!(classify(&ok), FeedEvent::Joined);

        let err = frame(json!({
            "topic": "realtime:messages",
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        }));
        assert!(matches!(classify(&err), FeedEvent::Closed(r) if r.contains("unauthorized")));
    }

    fn session(token: &str) -> Session {
        Session {
            access_token: token.into(),
            refresh_token: "r".into(),
            expires_at: 0,
            user: crate::api::models::SessionUser { id: "u1".into(), email: None },
        }
    }

    #[test]
    fn renewed_token_goes_to_the_messages_channel() {
        let f = access_token_frame("fresh", 7);
        let encoded = serde_json::to_value(&f).unwrap();
        assert_eq!(
            encoded,
            json!({
                "topic": "realtime:messages",
                "event": "access_token",
                "payload": { "access_token": "fresh" },
                "ref": "7"
            })
        );
    }

    #[test]
    fn session_changes_map_to_token_changes() {
        assert_eq!(token_change("old", Some(&session("old"))), TokenChange::Unchanged);
        assert_eq!(token_change("old", Some(&session("new"))), TokenChange::Renewed("new".into()));
        assert_eq!(token_change("old", None), TokenChange::SignedOut);
    }

    #[tokio::test]
    async fn feed_needs_a_session() {
        let (_tx, rx) = watch::channel(None);
        let url = Url::parse("ws://127.0.0.1:9/realtime/v1/websocket").unwrap();
        let res = run_insert_feed(url, rx, |_| {}).await;
        assert!(matches!(res, Err(ApiError::NotSignedIn)));
    }

    #[test]
    fn join_frame_subscribes_to_message_inserts() {
        let f = join_frame("tok", 1);
        let encoded = serde_json::to_value(&f).unwrap();
        assert_eq!(encoded["ref"], "1");
        assert_eq!(encoded["event"], "phx_join");
        assert_eq!(encoded["payload"]["access_token"], "tok");
        assert_eq!(
            encoded["payload"]["config"]["postgres_changes"][0],
            json!({ "event": "INSERT", "schema": "public", "table": "messages" })
        );
    }
}
