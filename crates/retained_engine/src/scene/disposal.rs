//! Disposal leak tracking
//!
//! Every disposable registered with the scene gets a record. Removing its
//! owner from the scene marks the record as removed; the record is purged
//! once the object also reports itself disposed. Whatever is still removed
//! but not disposed when the registry goes away is reported as a leak.

use std::sync::Arc;

use crate::scene::capability::Disposable;

/// One tracked disposable
pub struct DisposableRecord {
    /// Diagnostic name of the owning object
    pub label: String,
    /// Whether the object has left the scene
    pub removed: bool,
    address: usize,
    disposable: Arc<dyn Disposable>,
}

impl DisposableRecord {
    /// Whether the tracked object reports itself disposed
    pub fn is_disposed(&self) -> bool {
        self.disposable.is_disposed()
    }

    /// Removed from the scene but never disposed
    pub fn is_leaking(&self) -> bool {
        self.removed && !self.is_disposed()
    }
}

/// Leak table
#[derive(Default)]
pub struct DisposalLedger {
    records: Vec<DisposableRecord>,
}

impl DisposalLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or resume) tracking a disposable as "in the scene"
    pub fn track(&mut self, address: usize, label: String, disposable: Arc<dyn Disposable>) {
        if let Some(record) = self.records.iter_mut().find(|record| record.address == address) {
            record.removed = false;
            return;
        }
        self.records.push(DisposableRecord {
            label,
            removed: false,
            address,
            disposable,
        });
    }

    /// Mark a disposable as having left the scene
    pub fn mark_removed(&mut self, address: usize) {
        if let Some(record) = self.records.iter_mut().find(|record| record.address == address) {
            record.removed = true;
        }
    }

    /// Drop records that are removed and disposed; returns how many
    pub fn purge(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !(record.removed && record.is_disposed()));
        before - self.records.len()
    }

    /// Labels of records that are removed but not disposed
    pub fn leaks(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.is_leaking())
            .map(|record| record.label.clone())
            .collect()
    }

    /// Log every leak; returns how many were found
    pub fn report_leaks(&self) -> usize {
        let leaks = self.leaks();
        for label in &leaks {
            log::warn!("Leaked resource: {} was removed from the scene but never disposed", label);
        }
        leaks.len()
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for an address
    pub fn record(&self, address: usize) -> Option<&DisposableRecord> {
        self.records.iter().find(|record| record.address == address)
    }
}
