//! Bounded message-id → [`RawEvent`] cache.
//!
//! Deletion events only carry ids, so the handler remembers the last
//! `capacity` messages it has seen and resolves deletes and content-only
//! edits against them. Oldest entries are evicted first.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use courier_pipeline::RawEvent;

use crate::convert::{MessageEdit, apply_update};

pub struct MessageCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<u64, RawEvent>,
    order: VecDeque<u64>,
}

impl MessageCache {
    /// A zero capacity disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Insert or replace. Replacing keeps the original eviction position.
    pub fn insert(&self, message_id: u64, raw: RawEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.insert(message_id, raw).is_some() {
            return;
        }
        inner.order.push_back(message_id);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn get(&self, message_id: u64) -> Option<RawEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .get(&message_id)
            .cloned()
    }

    /// Apply `edit` to the cached copy, store the result, and return it.
    /// `None` when the message was never seen, so there is nothing to relay.
    pub fn apply_edit(&self, message_id: u64, edit: &MessageEdit) -> Option<RawEvent> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entries.get_mut(&message_id)?;
        *entry = apply_update(entry.clone(), edit);
        Some(entry.clone())
    }

    /// Take a deleted message out of the cache. `None` when it was never
    /// seen or has been evicted.
    pub fn remove(&self, message_id: u64) -> Option<RawEvent> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.remove(&message_id)?;
        inner.order.retain(|id| *id != message_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn raw(content: &str) -> RawEvent {
        RawEvent {
            channel_id: Some(42),
            author_id: Some(7),
            author: Some("alice".into()),
            content: content.into(),
            ..RawEvent::default()
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let cache = MessageCache::new(2);
        cache.insert(1, raw("one"));
        cache.insert(2, raw("two"));
        cache.insert(3, raw("three"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(3).unwrap().content, "three");
    }

    #[test]
    fn replace_keeps_position() {
        let cache = MessageCache::new(2);
        cache.insert(1, raw("one"));
        cache.insert(2, raw("two"));
        cache.insert(1, raw("one, edited"));
        assert_eq!(cache.get(1).unwrap().content, "one, edited");
        cache.insert(3, raw("three"));
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn remove_frees_a_slot() {
        let cache = MessageCache::new(2);
        cache.insert(1, raw("one"));
        cache.insert(2, raw("two"));
        assert_eq!(cache.remove(1).unwrap().content, "one");
        assert!(cache.remove(1).is_none());
        cache.insert(3, raw("three"));
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn edit_of_cached_message_is_stored() {
        let cache = MessageCache::new(4);
        cache.insert(1, raw("one"));
        let edit = MessageEdit {
            content: Some("one, edited".into()),
            ..MessageEdit::default()
        };
        let edited = cache.apply_edit(1, &edit).unwrap();
        assert_eq!(edited.content, "one, edited");
        assert_eq!(edited.author.as_deref(), Some("alice"));
        assert_eq!(cache.get(1).unwrap().content, "one, edited");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn edit_of_unknown_message_is_skipped() {
        let cache = MessageCache::new(4);
        cache.insert(1, raw("one"));
        let edit = MessageEdit {
            content: Some("ghost".into()),
            ..MessageEdit::default()
        };
        assert!(cache.apply_edit(2, &edit).is_none());
        assert!(cache.get(2).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_of_evicted_message_is_skipped() {
        let cache = MessageCache::new(1);
        cache.insert(1, raw("one"));
        cache.insert(2, raw("two"));
        assert!(cache.remove(1).is_none());
        assert_eq!(cache.remove(2).unwrap().content, "two");
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = MessageCache::new(0);
        cache.insert(1, raw("one"));
        assert!(cache.is_empty());
    }
}
