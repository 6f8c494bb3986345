//! In-process [`CacheStore`] used when no other store is configured.

use std::{collections::HashMap, time::Duration};

use tokio::{sync::RwLock, time::Instant};

use super::store::{CacheStore, StoreFuture};

#[derive(Debug)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A `HashMap` behind a [`RwLock`], with lazy expiry.
///
/// Expired keys read as absent and are removed the next time they are read
/// or when [`purge_expired`](Self::purge_expired) runs. There is no size bound.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that have not expired.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired key, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_expired(now));
        before - slots.len()
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let now = Instant::now();
            {
                let slots = self.slots.read().await;
                match slots.get(key) {
                    None => return Ok(None),
                    Some(slot) if !slot.is_expired(now) => return Ok(Some(slot.value.clone())),
                    Some(_) => {}
                }
            }

            // Expired: take the write lock and re-check, the key may have been rewritten.
            let mut slots = self.slots.write().await;
            if slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
                slots.remove(key);
                return Ok(None);
            }
            Ok(slots.get(key).map(|slot| slot.value.clone()))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.slots.write().await.insert(
                key.to_owned(),
                Slot {
                    value,
                    expires_at: None,
                },
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.slots.write().await.remove(key);
            Ok(())
        })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if let Some(slot) = self.slots.write().await.get_mut(key) {
                slot.expires_at = Some(Instant::now() + ttl);
            }
            Ok(())
        })
    }
}
