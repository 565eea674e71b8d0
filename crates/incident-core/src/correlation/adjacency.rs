//! Service adjacency inferred from message text
//!
//! Two services are adjacent when a message logged by one mentions the
//! other by name. Names match case-insensitively as substrings.

use crate::types::LogEntry;
use indexmap::IndexMap;
use std::collections::{BTreeSet, VecDeque};

/// Normalized service key
pub fn service_key(service: &str) -> String {
    service.trim().to_lowercase()
}

/// Whether entries of `service` can be attributed to a real service
pub fn is_attributable(service: &str) -> bool {
    let key = service_key(service);
    !key.is_empty() && key != "unknown"
}

/// Undirected adjacency relation over known services
#[derive(Debug, Clone, Default)]
pub struct ServiceAdjacency {
    /// Normalized key to first-seen spelling
    known: IndexMap<String, String>,
    edges: BTreeSet<(String, String)>,
}

impl ServiceAdjacency {
    /// Collect known services from every entry, then scan every message
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut adjacency = ServiceAdjacency::default();
        for entry in entries {
            if is_attributable(&entry.service) {
                adjacency
                    .known
                    .entry(service_key(&entry.service))
                    .or_insert_with(|| entry.service.trim().to_string());
            }
        }

        let keys: Vec<String> = adjacency.known.keys().cloned().collect();
        for entry in entries {
            let own = service_key(&entry.service);
            if !adjacency.known.contains_key(&own) {
                continue;
            }
            let message = entry.message.to_lowercase();
            for other in &keys {
                if *other != own && message.contains(other.as_str()) {
                    adjacency.edges.insert(ordered(&own, other));
                }
            }
        }

        tracing::debug!(
            services = adjacency.known.len(),
            edges = adjacency.edges.len(),
            "service adjacency built"
        );
        adjacency
    }

    /// Known services in first-seen order
    pub fn known_services(&self) -> Vec<&str> {
        self.known.values().map(String::as_str).collect()
    }

    /// Whether either message of the pair names the other service
    ///
    /// Names are compared by normalized key, in either order.
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.edges.contains(&ordered(&service_key(a), &service_key(b)))
    }

    /// Distinct undirected service pairs
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether `services` form one connected subgraph
    ///
    /// Zero or one service is trivially connected.
    pub fn is_connected(&self, services: &BTreeSet<String>) -> bool {
        let keys: BTreeSet<String> = services.iter().map(|s| service_key(s)).collect();
        let Some(start) = keys.iter().next() else {
            return true;
        };

        let mut seen: BTreeSet<&String> = BTreeSet::from([start]);
        let mut queue: VecDeque<&String> = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in &keys {
                if !seen.contains(next) && self.edges.contains(&ordered(current, next)) {
                    seen.insert(next);
                    queue.push_back(next);
                }
            }
        }
        seen.len() == keys.len()
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
