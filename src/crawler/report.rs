use crate::session::{ProcessingTime, Session, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a link discovery session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub session_id: SessionId,

    /// Canonical internal links in discovery order
    pub internal_links: Vec<String>,

    pub errors: Vec<String>,
}

impl DiscoveryReport {
    pub(crate) fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id().clone(),
            internal_links: session.discovered().to_vec(),
            errors: session.errors(),
        }
    }
}

/// Result of a content extraction session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub session_id: SessionId,

    /// Readable text keyed by the URL it was extracted from
    pub results: BTreeMap<String, String>,

    /// Document titles, for extracted pages that declare one
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub titles: BTreeMap<String, String>,

    pub processing_times: BTreeMap<String, ProcessingTime>,

    pub errors: Vec<String>,
}

impl ExtractionReport {
    pub(crate) fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id().clone(),
            results: session.results(),
            titles: session.titles(),
            processing_times: session.processing_times(),
            errors: session.errors(),
        }
    }

    /// Truncates every text to `length` characters, marking cut texts with `...`
    pub fn with_preview(mut self, length: usize) -> Self {
        for text in self.results.values_mut() {
            if let Some((cut, _)) = text.char_indices().nth(length) {
                text.truncate(cut);
                text.push_str("...");
            }
        }
        self
    }
}
