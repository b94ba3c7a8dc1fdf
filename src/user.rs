//! The user domain model, specified only where it intersects the core
//! (spec §1, §3). Grounded on `stu_user.h`.

use std::time::{Duration, Instant};

use crate::channel::ChannelId;

pub const USER_ID_MAX_LEN: usize = 16;

/// Role bitmask. Values match the original's `STU_USER_ROLE_*` constants so
/// the ordering (higher value = more privileged) is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Role(pub u8);

impl Role {
  pub const VISITOR: Role = Role(0x00);
  pub const NORMAL: Role = Role(0x01);
  pub const VIP: Role = Role(0x0E);
  pub const ASSISTANT: Role = Role(0x10);
  pub const SECRETARY: Role = Role(0x20);
  pub const ANCHOR: Role = Role(0x30);
  pub const ADMIN: Role = Role(0x40);
  pub const SUPER_ADMIN: Role = Role(0x80);
  pub const SYSTEM: Role = Role(0xC0);

  pub fn at_least(&self, other: Role) -> bool {
    self.0 >= other.0
  }
}

/// A `(code, expiry)` restriction attached to a user (spec GLOSSARY
/// "Punishment").
#[derive(Debug, Clone, Copy)]
pub struct Punishment {
  pub code: u8,
  pub until: Instant,
}

impl Punishment {
  pub fn is_active(&self, now: Instant) -> bool {
    now < self.until
  }
}

/// A unique identifier for a user, bounded to [`USER_ID_MAX_LEN`] bytes as
/// in the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Option<Self> {
    let id = id.into();
    if id.is_empty() || id.len() > USER_ID_MAX_LEN {
      return None;
    }
    Some(UserId(id))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone)]
pub struct User {
  pub id: UserId,
  pub name: String,
  pub role: Role,
  pub rate_limit_interval: Duration,
  pub last_active: Instant,
  pub punishment: Option<Punishment>,
  pub channel: Option<ChannelId>,
}

impl User {
  pub fn new(id: UserId, name: impl Into<String>) -> Self {
    User {
      id,
      name: name.into(),
      role: Role::VISITOR,
      rate_limit_interval: Duration::from_millis(500),
      last_active: Instant::now(),
      punishment: None,
      channel: None,
    }
  }

  pub fn is_punished(&self, now: Instant) -> bool {
    self.punishment.map(|p| p.is_active(now)).unwrap_or(false)
  }

  pub fn touch(&mut self, now: Instant) -> bool {
    let elapsed = now.saturating_duration_since(self.last_active);
    if elapsed < self.rate_limit_interval {
      return false;
    }
    self.last_active = now;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_ordering_matches_original_bit_values() {
    assert!(Role::SYSTEM.at_least(Role::SUPER_ADMIN));
    assert!(Role::ADMIN.at_least(Role::ANCHOR));
    assert!(!Role::VIP.at_least(Role::ASSISTANT));
  }

  #[test]
  fn user_id_rejects_too_long() {
    assert!(UserId::new("0123456789abcdef").is_some()); // exactly 16
    assert!(UserId::new("0123456789abcdefg").is_none()); // 17
    assert!(UserId::new("").is_none());
  }

  #[test]
  fn punishment_expires() {
    let now = Instant::now();
    let p = Punishment { code: 1, until: now + Duration::from_secs(1) };
    assert!(p.is_active(now));
    assert!(!p.is_active(now + Duration::from_secs(2)));
  }
}
