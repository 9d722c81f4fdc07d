//! Append-only, hash-chained audit trail of physician decisions.
//!
//! Each entry's hash covers the previous entry's hash plus the canonical
//! JSON of its record, so editing, dropping or reordering any entry breaks
//! verification from that point on.

mod export;

pub use export::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{AuditEntry, AuditRecord, AuditStatus};

/// Audit errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit chain broken at entry {index}")]
    ChainBroken { index: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// SHA-256 of `data`, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Chain hash for a record following `prev_hash`.
pub fn chain_hash(prev_hash: Option<&str>, record: &AuditRecord) -> AuditResult<String> {
    let payload = record.to_canonical_json()?;
    let mut data = String::with_capacity(64 + payload.len());
    data.push_str(prev_hash.unwrap_or_default());
    data.push_str(&payload);
    Ok(hash_data(data.as_bytes()))
}

/// In-memory audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored entries. The chain is verified first.
    pub fn from_entries(entries: Vec<AuditEntry>) -> AuditResult<Self> {
        let log = Self { entries };
        log.verify()?;
        Ok(log)
    }

    /// Seal a record onto the end of the chain.
    pub fn append(&mut self, record: AuditRecord) -> AuditResult<&AuditEntry> {
        let entry = self.seal(record)?;
        self.commit(entry)
    }

    /// Compute the entry that would follow the current head, without
    /// adding it.
    pub fn seal(&self, record: AuditRecord) -> AuditResult<AuditEntry> {
        let prev_hash = self.head_hash().map(str::to_string);
        let entry_hash = chain_hash(prev_hash.as_deref(), &record)?;

        tracing::debug!(
            request_id = %record.request_id,
            status = %record.status,
            hash = %entry_hash,
            "Audit entry sealed"
        );

        Ok(AuditEntry::sealed(record, prev_hash, entry_hash))
    }

    /// Add an entry produced by [`AuditLog::seal`]. It must link to the
    /// current head.
    pub fn commit(&mut self, entry: AuditEntry) -> AuditResult<&AuditEntry> {
        let index = self.entries.len();
        if entry.prev_hash() != self.head_hash() {
            return Err(AuditError::ChainBroken { index });
        }
        self.entries.push(entry);
        Ok(&self.entries[index])
    }

    /// Recompute every hash and check each link.
    pub fn verify(&self) -> AuditResult<()> {
        let mut prev: Option<&str> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash() != prev {
                return Err(AuditError::ChainBroken { index });
            }
            if chain_hash(prev, entry.record())? != entry.entry_hash() {
                return Err(AuditError::ChainBroken { index });
            }
            prev = Some(entry.entry_hash());
        }
        Ok(())
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Hash of the newest entry.
    pub fn head_hash(&self) -> Option<&str> {
        self.entries.last().map(|e| e.entry_hash())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching a filter, oldest first.
    pub fn filter(&self, filter: &AuditFilter) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }
}

/// Audit view filter. Date bounds are inclusive and compared in UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditFilter {
    pub status: Option<AuditStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let date = entry.timestamp().date_naive();
        self.status.map_or(true, |s| entry.status() == s)
            && self.from.map_or(true, |from| date >= from)
            && self.to.map_or(true, |to| date <= to)
    }
}
