//! Messages between manors
//!
//! Manors share one bus on the [`EngineContext`](crate::EngineContext).
//! A message goes to one manor or, without a recipient, to every manor but
//! its sender. Each recipient reads a message once; expired messages are
//! dropped on the next access.

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

use crate::action::Value;

/// Messages kept at most; the oldest go first
pub const MAX_MESSAGES: usize = 1000;

/// Lifetime of a message sent without one (s)
pub const DEFAULT_TTL_SECS: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u64,
    pub from: String,
    /// `None` for a broadcast
    pub to: Option<String>,
    pub kind: String,
    pub body: Option<Value>,
    pub sent_at: f64,
    pub expires_at: f64,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }

    fn is_for(&self, manor: &str) -> bool {
        match &self.to {
            Some(to) => to == manor,
            None => self.from != manor,
        }
    }
}

/// What to post, the bus fills in id and times
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Option<String>,
    pub kind: String,
    pub body: Option<Value>,
    pub ttl_secs: Option<f64>,
}

impl Outgoing {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            to: None,
            kind: kind.into(),
            body: None,
            ttl_secs: None,
        }
    }

    pub fn to(mut self, manor: impl Into<String>) -> Self {
        self.to = Some(manor.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_ttl(mut self, secs: f64) -> Self {
        self.ttl_secs = Some(secs);
        self
    }
}

#[derive(Debug)]
struct Posted {
    message: Message,
    read_by: BTreeSet<String>,
}

impl Posted {
    fn unread_for(&self, manor: &str) -> bool {
        self.message.is_for(manor) && !self.read_by.contains(manor)
    }

    /// A direct message is done once read, a broadcast only expires
    fn is_done(&self) -> bool {
        !self.message.is_broadcast() && !self.read_by.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MessageBus {
    posted: VecDeque<Posted>,
    next_id: u64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a message from `from`; returns its id
    pub fn send(&mut self, from: &str, outgoing: Outgoing, now: f64) -> u64 {
        self.drop_expired(now);
        if self.posted.len() >= MAX_MESSAGES {
            if let Some(dropped) = self.posted.pop_front() {
                log::warn!(
                    "Message bus full, dropping '{}' from [{}]",
                    dropped.message.kind,
                    dropped.message.from
                );
            }
        }

        self.next_id += 1;
        let ttl = outgoing.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
        let message = Message {
            id: self.next_id,
            from: from.to_string(),
            to: outgoing.to,
            kind: outgoing.kind,
            body: outgoing.body,
            sent_at: now,
            expires_at: now + ttl,
        };
        log::debug!(
            "[{}] -> [{}] '{}'",
            message.from,
            message.to.as_deref().unwrap_or("*"),
            message.kind
        );
        self.posted.push_back(Posted {
            message,
            read_by: BTreeSet::new(),
        });
        self.next_id
    }

    /// Unread messages for `manor`, oldest first, marked as read
    pub fn receive(&mut self, manor: &str, now: f64) -> Vec<Message> {
        self.drop_expired(now);
        let mut received = Vec::new();
        for posted in self.posted.iter_mut().filter(|p| p.unread_for(manor)) {
            posted.read_by.insert(manor.to_string());
            received.push(posted.message.clone());
        }
        self.posted.retain(|p| !p.is_done());
        received
    }

    /// Unread messages for `manor`, left unread
    pub fn peek(&self, manor: &str, now: f64) -> Vec<&Message> {
        self.posted
            .iter()
            .filter(|p| !p.message.is_expired(now) && p.unread_for(manor))
            .map(|p| &p.message)
            .collect()
    }

    pub fn has_messages(&self, manor: &str, now: f64) -> bool {
        !self.peek(manor, now).is_empty()
    }

    /// Forget everything sent to or by `manor`
    pub fn clear_for(&mut self, manor: &str) {
        self.posted
            .retain(|p| p.message.from != manor && p.message.to.as_deref() != Some(manor));
    }

    pub fn len(&self) -> usize {
        self.posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }

    fn drop_expired(&mut self, now: f64) {
        self.posted.retain(|p| !p.message.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_message_is_read_once() {
        let mut bus = MessageBus::new();
        bus.send("a", Outgoing::new("raid").to("b").with_body(Value::Int(3)), 0.0);

        assert!(bus.receive("a", 1.0).is_empty());
        assert!(bus.has_messages("b", 1.0));
        let got = bus.receive("b", 1.0);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].from, "a");
        assert_eq!(got[0].body, Some(Value::Int(3)));
        assert!(bus.receive("b", 2.0).is_empty());
        assert!(bus.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_the_sender() {
        let mut bus = MessageBus::new();
        bus.send("a", Outgoing::new("event_started"), 0.0);

        assert!(bus.receive("a", 1.0).is_empty());
        assert_eq!(bus.receive("b", 1.0).len(), 1);
        assert_eq!(bus.receive("c", 1.0).len(), 1);
        assert!(bus.receive("b", 2.0).is_empty());
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_expired_messages_are_dropped() {
        let mut bus = MessageBus::new();
        bus.send("a", Outgoing::new("short").to("b").with_ttl(10.0), 0.0);
        bus.send("a", Outgoing::new("long").to("b"), 0.0);

        assert_eq!(bus.peek("b", 5.0).len(), 2);
        let got = bus.receive("b", 10.0);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind, "long");
        assert_eq!(got[0].expires_at, DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_bus_is_bounded() {
        let mut bus = MessageBus::new();
        for _ in 0..MAX_MESSAGES + 5 {
            bus.send("a", Outgoing::new("tick").to("b"), 0.0);
        }
        assert_eq!(bus.len(), MAX_MESSAGES);
        assert_eq!(bus.peek("b", 0.0)[0].id, 6);
    }

    #[test]
    fn test_clear_for() {
        let mut bus = MessageBus::new();
        bus.send("a", Outgoing::new("x").to("b"), 0.0);
        bus.send("c", Outgoing::new("y"), 0.0);
        bus.clear_for("b");
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.peek("b", 0.0)[0].kind, "y");
    }
}
