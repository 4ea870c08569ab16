//! Bounded in-memory history of received spots.
//!
//! The store keeps spots in arrival order. Once it holds `capacity` spots,
//! each append evicts the oldest one. A single writer (the receive task) and
//! any number of readers share it behind a `RwLock`; every operation takes
//! the lock exactly once, so readers never observe a half-applied append.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::band::{self, Region};
use crate::spot::DxSpot;

/// Contents guarded by the store lock.
#[derive(Debug, Default)]
struct Inner {
    spots: VecDeque<DxSpot>,
    last_append: Option<DateTime<Utc>>,
}

/// Fixed-capacity FIFO history of spots.
#[derive(Debug)]
pub struct SpotStore {
    capacity: usize,
    inner: RwLock<Inner>,

    /// Number of spots appended since creation.
    pub total_appended: AtomicU64,

    /// Number of spots dropped to make room for newer ones.
    pub evicted: AtomicU64,
}

impl SpotStore {
    /// Create an empty store holding at most `capacity` spots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(Inner {
                spots: VecDeque::with_capacity(capacity),
                last_append: None,
            }),
            total_appended: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Maximum number of spots kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of spots currently stored.
    pub fn len(&self) -> usize {
        self.read().spots.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read().spots.is_empty()
    }

    /// When the most recent spot was appended.
    pub fn last_append(&self) -> Option<DateTime<Utc>> {
        self.read().last_append
    }

    /// Append a spot, evicting the oldest one if the store is full.
    pub fn append(&self, spot: DxSpot) {
        let mut inner = self.write();
        if inner.spots.len() >= self.capacity {
            inner.spots.pop_front();
            self.evicted.fetch_add(1, Relaxed);
        }
        inner.spots.push_back(spot);
        inner.last_append = Some(Utc::now());
        self.total_appended.fetch_add(1, Relaxed);
    }

    /// Up to `count` most recent spots, oldest first.
    pub fn recent(&self, count: usize) -> Vec<DxSpot> {
        let inner = self.read();
        let skip = inner.spots.len().saturating_sub(count);
        inner.spots.iter().skip(skip).cloned().collect()
    }

    /// Spots whose callsign contains `pattern`, ignoring case.
    pub fn by_callsign(&self, pattern: &str) -> Vec<DxSpot> {
        let pattern = pattern.to_uppercase();
        self.filter(|spot| spot.callsign.to_uppercase().contains(&pattern))
    }

    /// Spots with `min <= frequency <= max` (kHz).
    pub fn by_frequency(&self, min: f64, max: f64) -> Vec<DxSpot> {
        self.filter(|spot| min <= spot.frequency && spot.frequency <= max)
    }

    /// Spots inside `band` as defined for `region`. Unknown bands match nothing.
    pub fn by_band(&self, band: &str, region: Region) -> Vec<DxSpot> {
        match band::range_for(band, region) {
            Some((min, max)) => self.by_frequency(min, max),
            None => Vec::new(),
        }
    }

    /// Copy of every stored spot, oldest first.
    pub fn snapshot(&self) -> Vec<DxSpot> {
        self.read().spots.iter().cloned().collect()
    }

    fn filter(&self, predicate: impl Fn(&DxSpot) -> bool) -> Vec<DxSpot> {
        self.read()
            .spots
            .iter()
            .filter(|spot| predicate(*spot))
            .cloned()
            .collect()
    }
}
