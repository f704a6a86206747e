//! Session-scoped device registry.
//!
//! The registry is the single serialization point for sightings: every
//! bonded or broadcast sighting passes through [`DeviceRegistry::upsert`],
//! which either creates the record for its address or merges the sighting
//! into the existing one.
//!
//! Merge rules for a repeat sighting:
//!
//! - `last_seen` moves forward to the sighting time (never backwards)
//! - a known name is never replaced by an unknown one
//! - `is_connected` only ever goes from `false` to `true`
//!
//! There is no removal. A registry lives exactly as long as the session
//! that owns it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use tracing::debug;

use nearby_types::{DeviceRecord, RecordError, Sighting, normalize_address, normalize_name};

use crate::error::Result;

/// Result of applying one sighting to the registry.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Copy of the stored record after the sighting was applied.
    pub record: DeviceRecord,
    /// Whether this sighting created the record.
    pub is_new: bool,
}

struct Entry {
    record: DeviceRecord,
    /// Insertion order, breaks ties between equal `first_seen` values.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// In-memory store of device records keyed by address.
///
/// All mutation happens under one mutex scoped to the registry, so
/// concurrent `upsert` calls for the same address are applied one after
/// the other. Callers only ever receive copies of the stored records.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Merging cannot panic halfway, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a sighting observed now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRecord`] if the sighting's address is
    /// empty. The registry is left unchanged in that case.
    pub fn upsert(&self, candidate: Sighting) -> Result<UpsertOutcome> {
        self.upsert_at(candidate, OffsetDateTime::now_utc())
    }

    /// Apply a sighting observed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRecord`] if the sighting's address is
    /// empty. The registry is left unchanged in that case.
    pub fn upsert_at(&self, candidate: Sighting, now: OffsetDateTime) -> Result<UpsertOutcome> {
        let address = normalize_address(&candidate.address).ok_or(RecordError::EmptyAddress)?;

        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get_mut(&address) {
            merge(&mut entry.record, candidate, now);
            debug!(
                "Updated {} (connected={}, last_seen={})",
                address, entry.record.is_connected, entry.record.last_seen
            );
            return Ok(UpsertOutcome {
                record: entry.record.clone(),
                is_new: false,
            });
        }

        let record = DeviceRecord::first_sighting(
            Sighting {
                address: address.clone(),
                ..candidate
            },
            now,
        )?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            address.clone(),
            Entry {
                record: record.clone(),
                seq,
            },
        );
        debug!("Inserted {} (connected={})", address, record.is_connected);

        Ok(UpsertOutcome {
            record,
            is_new: true,
        })
    }

    /// All records, ordered by `first_seen` ascending.
    ///
    /// Records first seen at the same instant keep their insertion order.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        let inner = self.lock();
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|e| (e.record.first_seen, e.seq));
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    /// Look up the record for an address.
    pub fn get(&self, address: &str) -> Option<DeviceRecord> {
        let address = normalize_address(address)?;
        self.lock().entries.get(&address).map(|e| e.record.clone())
    }

    /// Number of distinct devices seen.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no device has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of devices currently flagged as connected.
    pub fn connected_count(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.record.is_connected)
            .count()
    }
}

fn merge(record: &mut DeviceRecord, candidate: Sighting, now: OffsetDateTime) {
    if now > record.last_seen {
        record.last_seen = now;
    }
    if record.name.is_none() {
        record.name = normalize_name(candidate.name);
    }
    record.is_connected |= candidate.is_connected;
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use time::Duration;
    use time::macros::datetime;

    const ADDRESSES: [&str; 4] = ["AA", "BB", "CC", "DD"];

    fn op() -> impl Strategy<Value = (usize, bool, Option<String>, i64)> {
        (
            0..ADDRESSES.len(),
            any::<bool>(),
            proptest::option::of("[A-Za-z]{1,8}"),
            0i64..10_000,
        )
    }

    proptest! {
        /// first_seen is fixed by the first sighting, is_connected never
        /// drops back to false, and first_seen <= last_seen.
        #[test]
        fn upsert_invariants_hold(ops in proptest::collection::vec(op(), 1..64)) {
            let registry = DeviceRegistry::new();
            let base = datetime!(2024-01-01 00:00:00 UTC);
            let mut first: HashMap<&str, OffsetDateTime> = HashMap::new();
            let mut connected: HashMap<&str, bool> = HashMap::new();

            for (idx, is_connected, name, offset) in ops {
                let address = ADDRESSES[idx];
                let now = base + Duration::seconds(offset);
                let sighting = Sighting {
                    address: address.to_string(),
                    name,
                    is_connected,
                    origin: if is_connected {
                        nearby_types::SightingOrigin::Bonded
                    } else {
                        nearby_types::SightingOrigin::Broadcast
                    },
                };
                let outcome = registry.upsert_at(sighting, now).unwrap();

                let expected_first = *first.entry(address).or_insert(now);
                prop_assert_eq!(outcome.record.first_seen, expected_first);
                prop_assert!(outcome.record.first_seen <= outcome.record.last_seen);

                let was_connected = connected.get(address).copied().unwrap_or(false);
                if was_connected {
                    prop_assert!(outcome.record.is_connected);
                }
                connected.insert(address, was_connected || is_connected);
                prop_assert_eq!(outcome.record.is_connected, was_connected || is_connected);
            }

            prop_assert_eq!(registry.len(), first.len());
        }

        /// snapshot() is ordered by first_seen no matter the update order.
        #[test]
        fn snapshot_is_sorted(ops in proptest::collection::vec(op(), 1..64)) {
            let registry = DeviceRegistry::new();
            let base = datetime!(2024-01-01 00:00:00 UTC);
            for (idx, is_connected, name, offset) in ops {
                let sighting = Sighting {
                    address: ADDRESSES[idx].to_string(),
                    name,
                    is_connected,
                    origin: nearby_types::SightingOrigin::Broadcast,
                };
                registry.upsert_at(sighting, base + Duration::seconds(offset)).unwrap();
            }

            let snapshot = registry.snapshot();
            prop_assert!(snapshot.windows(2).all(|w| w[0].first_seen <= w[1].first_seen));
        }
    }
}
