//! Side channel for classification problems.
//!
//! The classifier never returns errors to its caller; anything worth
//! auditing (a label outside the taxonomy, a failed or malformed service
//! call) is recorded here instead. Each event is logged as a structured
//! warning and kept in a bounded ring for `/api/classifier/diagnostics`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::ClassificationInput;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The service answered with a label that is not in the taxonomy.
    OutOfTaxonomy { value: String, input: ClassificationInput },
    /// Transport error, HTTP error, unparsable or malformed output, timeout.
    ServiceFailure { error: String, input: ClassificationInput },
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    capacity: usize,
    entries: Mutex<VecDeque<DiagnosticEntry>>,
    total: AtomicU64,
}

impl DiagnosticLog {
    /// `capacity` bounds retained entries; `0` keeps none (events are still logged).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
        }
    }

    pub fn record(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::OutOfTaxonomy { value, input } => warn!(
                value = %value,
                title = %input.title,
                description = %input.description,
                "suggested category is not in the taxonomy — discarded"
            ),
            Diagnostic::ServiceFailure { error, input } => warn!(
                error = %error,
                title = %input.title,
                description = %input.description,
                "category suggestion failed — no suggestion returned"
            ),
        }
        self.total.fetch_add(1, Ordering::Relaxed);

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(DiagnosticEntry { at: Utc::now(), diagnostic });
    }

    /// Retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }

    /// Events recorded since startup, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
