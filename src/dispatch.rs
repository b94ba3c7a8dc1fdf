//! Minimal chat message routing — the one slice of full chat semantics that
//! intersects the core (spec §1: "full chat semantics... out of scope").
//!
//! A text frame is parsed as JSON (spec §4.7) and handed here. Two message
//! shapes are understood: `{"type":"join","channel":"..."}` and
//! `{"type":"msg","text":"..."}`. Anything else, or anything from a
//! currently-punished user, is dropped silently — moderation and
//! role-gated commands are explicitly out of scope.

use std::sync::Arc;
use std::time::Instant;

use crate::channel::{ChannelId, SharedRegistry};
use crate::json::Value;
use crate::user::UserId;

pub enum Outcome {
  /// Nothing to send back.
  Ignored,
  /// A message was broadcast to the user's current channel.
  Broadcast,
  /// The user joined `channel`.
  Joined(ChannelId),
}

pub async fn handle_message(registry: &SharedRegistry, user_id: &UserId, payload: &[u8]) -> Outcome {
  let Ok(value) = crate::json::parse(payload) else {
    return Outcome::Ignored;
  };

  let now = Instant::now();
  {
    let mut reg = registry.write().await;
    let Some(user) = reg.user_mut(user_id) else { return Outcome::Ignored };
    if user.is_punished(now) {
      return Outcome::Ignored;
    }
    if !user.touch(now) {
      return Outcome::Ignored; // rate limited
    }
  }

  match value.get("type").and_then(Value::as_str) {
    Some("join") => {
      let Some(name) = value.get("channel").and_then(Value::as_str) else { return Outcome::Ignored };
      let channel_id = ChannelId(name.to_string());
      registry.write().await.join(user_id, channel_id.clone());
      Outcome::Joined(channel_id)
    }
    Some("msg") => {
      let Some(text) = value.get("text").and_then(Value::as_str) else { return Outcome::Ignored };
      let reg = registry.read().await;
      let Some(user) = reg.user(user_id) else { return Outcome::Ignored };
      let Some(channel_id) = user.channel.clone() else { return Outcome::Ignored };
      let Some(channel) = reg.channel(&channel_id) else { return Outcome::Ignored };

      let out = Value::Object(vec![
        ("type".into(), Value::String("msg".into())),
        ("from".into(), Value::String(user_id.as_str().to_string())),
        ("text".into(), Value::String(text.to_string())),
      ]);
      channel.broadcast(Arc::from(crate::json::to_string(&out)));
      Outcome::Broadcast
    }
    _ => Outcome::Ignored,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::new_shared_registry;
  use crate::user::User;

  #[tokio::test]
  async fn join_then_broadcast_reaches_subscriber() {
    let registry = new_shared_registry();
    let id = UserId::new("u1").unwrap();
    registry.write().await.insert_user(User::new(id.clone(), "Alice"));

    let outcome = handle_message(&registry, &id, br#"{"type":"join","channel":"lobby"}"#).await;
    assert!(matches!(outcome, Outcome::Joined(_)));

    let mut rx = registry.read().await.channel(&ChannelId("lobby".into())).unwrap().subscribe();

    let outcome = handle_message(&registry, &id, br#"{"type":"msg","text":"hi"}"#).await;
    assert!(matches!(outcome, Outcome::Broadcast));

    let received = rx.try_recv().unwrap();
    assert!(received.contains("\"text\":\"hi\""));
  }

  #[tokio::test]
  async fn malformed_json_is_ignored() {
    let registry = new_shared_registry();
    let id = UserId::new("u1").unwrap();
    registry.write().await.insert_user(User::new(id.clone(), "Alice"));
    assert!(matches!(handle_message(&registry, &id, b"not json").await, Outcome::Ignored));
  }
}
