//! Presence tracking
//!
//! Periodically refreshed list of technicians active on the same audit.
//! A failed refresh keeps the stale cached list and bumps a failure counter;
//! presence is never worth a user-facing error.

use elaudit_common::api::TechnicianInfo;

use crate::hub::HubClient;

/// Cached view of the technicians working this audit
#[derive(Debug, Default)]
pub struct PresenceTracker {
    cached: Vec<TechnicianInfo>,
    consecutive_failures: u64,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current (possibly stale) technician list
    pub fn technicians(&self) -> &[TechnicianInfo] {
        &self.cached
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// Poll the Hub for the active technician list
    ///
    /// Returns `true` when the cached list changed. On failure the previous
    /// list is kept and `false` is returned.
    pub async fn refresh(&mut self, hub: &HubClient) -> bool {
        match hub.list_technicians().await {
            Ok(technicians) => {
                self.consecutive_failures = 0;
                if technicians != self.cached {
                    tracing::debug!(count = technicians.len(), "Active technician list changed");
                    self.cached = technicians;
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::debug!(
                    consecutive_failures = self.consecutive_failures,
                    "Presence refresh failed, keeping cached list: {}",
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let tracker = PresenceTracker::new();
        assert!(tracker.technicians().is_empty());
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_list_and_counts() {
        // Unroutable port: the request fails fast and the tracker must keep
        // whatever it had while counting the failure.
        let hub = HubClient::new("http://127.0.0.1:1", "tok-p").unwrap();
        let mut tracker = PresenceTracker::new();
        tracker.cached = vec![TechnicianInfo {
            id: "tech_a".to_string(),
            name: "Ana".to_string(),
            last_seen: None,
        }];

        let changed = tracker.refresh(&hub).await;

        assert!(!changed);
        assert_eq!(tracker.technicians().len(), 1);
        assert_eq!(tracker.consecutive_failures(), 1);

        tracker.refresh(&hub).await;
        assert_eq!(tracker.consecutive_failures(), 2);
    }
}
