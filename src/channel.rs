//! Channel registry — the minimal piece of chat domain state that the core
//! needs to route a text frame somewhere (spec §1, §5 "shared resources").
//!
//! The user and channel tables are process-wide within one worker (spec
//! §5c); here that's `Arc<RwLock<_>>` shared between every connection task
//! spawned inside a worker process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::user::{User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(pub String);

/// A named chat room (spec GLOSSARY "Channel"). Broadcast fan-out uses a
/// `tokio::sync::broadcast` channel: messages from one sender reach every
/// subscriber in send order, matching spec §5's ordering guarantee, while
/// ordering between distinct senders is left unspecified exactly as
/// spec §5 allows.
pub struct Channel {
  pub id: ChannelId,
  pub members: Vec<UserId>,
  sender: broadcast::Sender<Arc<str>>,
}

impl Channel {
  fn new(id: ChannelId) -> Self {
    let (sender, _) = broadcast::channel(256);
    Channel { id, members: Vec::new(), sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
    self.sender.subscribe()
  }

  /// Best-effort broadcast; a lagging/disconnected subscriber never blocks
  /// or panics the sender (spec §5: "no global order is promised" across
  /// connections).
  pub fn broadcast(&self, message: Arc<str>) {
    let _ = self.sender.send(message);
  }
}

#[derive(Default)]
pub struct Registry {
  users: HashMap<UserId, User>,
  channels: HashMap<ChannelId, Channel>,
}

impl Registry {
  pub fn new() -> Self {
    Registry::default()
  }

  pub fn insert_user(&mut self, user: User) {
    self.users.insert(user.id.clone(), user);
  }

  pub fn remove_user(&mut self, id: &UserId) -> Option<User> {
    self.users.remove(id)
  }

  pub fn user(&self, id: &UserId) -> Option<&User> {
    self.users.get(id)
  }

  pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
    self.users.get_mut(id)
  }

  pub fn channel_or_create(&mut self, id: ChannelId) -> &mut Channel {
    self.channels.entry(id.clone()).or_insert_with(|| Channel::new(id))
  }

  pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
    self.channels.get(id)
  }

  pub fn join(&mut self, user_id: &UserId, channel_id: ChannelId) {
    if let Some(user) = self.users.get_mut(user_id) {
      user.channel = Some(channel_id.clone());
    }
    let channel = self.channel_or_create(channel_id);
    if !channel.members.contains(user_id) {
      channel.members.push(user_id.clone());
    }
  }

  pub fn leave(&mut self, user_id: &UserId) {
    let Some(user) = self.users.get_mut(user_id) else { return };
    let Some(channel_id) = user.channel.take() else { return };
    if let Some(channel) = self.channels.get_mut(&channel_id) {
      channel.members.retain(|m| m != user_id);
    }
  }
}

/// Shared, process-wide state for one worker.
pub type SharedRegistry = Arc<RwLock<Registry>>;

pub fn new_shared_registry() -> SharedRegistry {
  Arc::new(RwLock::new(Registry::new()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::user::UserId;

  #[test]
  fn join_then_leave_updates_membership() {
    let mut reg = Registry::new();
    let id = UserId::new("u1").unwrap();
    reg.insert_user(User::new(id.clone(), "Alice"));
    reg.join(&id, ChannelId("lobby".into()));
    assert_eq!(reg.channel(&ChannelId("lobby".into())).unwrap().members.len(), 1);

    reg.leave(&id);
    assert_eq!(reg.channel(&ChannelId("lobby".into())).unwrap().members.len(), 0);
    assert!(reg.user(&id).unwrap().channel.is_none());
  }
}
