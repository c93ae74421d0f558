//! Observable provisioning events
//!
//! Every log line carries one of these as its `event` field.

use std::fmt;

/// Observable events during a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Run begins
    ProvisionBegin,
    /// Run finished, schema converged
    ProvisionComplete,
    /// Run aborted (FATAL)
    ProvisionFailed,

    // Setup
    /// Configuration resolved
    ConfigLoaded,
    /// Database answered a ping
    DatabaseConnected,

    // Reconciliation
    /// Plan computed against the live schema
    PlanComputed,
    /// Collection created
    CollectionCreated,
    /// Collection already existed
    CollectionPresent,
    /// Index created
    IndexCreated,
    /// Identical index already existed
    IndexPresent,
    /// Existing index differs from the declaration
    IndexConflict,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ProvisionBegin => "PROVISION_BEGIN",
            Event::ProvisionComplete => "PROVISION_COMPLETE",
            Event::ProvisionFailed => "PROVISION_FAILED",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DatabaseConnected => "DATABASE_CONNECTED",

            Event::PlanComputed => "PLAN_COMPUTED",
            Event::CollectionCreated => "COLLECTION_CREATED",
            Event::CollectionPresent => "COLLECTION_PRESENT",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexPresent => "INDEX_PRESENT",
            Event::IndexConflict => "INDEX_CONFLICT",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ProvisionFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ProvisionBegin,
            Event::ProvisionComplete,
            Event::ProvisionFailed,
            Event::ConfigLoaded,
            Event::DatabaseConnected,
            Event::PlanComputed,
            Event::CollectionCreated,
            Event::CollectionPresent,
            Event::IndexCreated,
            Event::IndexPresent,
            Event::IndexConflict,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::ProvisionFailed.is_fatal());
        assert!(!Event::IndexConflict.is_fatal());
        assert!(!Event::ProvisionBegin.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::IndexCreated), "INDEX_CREATED");
    }
}
