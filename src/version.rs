//! Server protocol version tracking.

/// Result of observing a version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    /// First token seen; establishes the baseline.
    Baseline,
    Unchanged,
    /// The server was upgraded underneath us.
    Upgraded { from: String, to: String },
}

#[derive(Debug, Default)]
pub struct VersionWatch {
    current: Option<String>,
}

impl VersionWatch {
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record a non-empty token. The newest token becomes the comparison
    /// baseline, so a single upgrade is reported once.
    pub fn observe(&mut self, token: &str) -> VersionChange {
        match self.current.replace(token.to_string()) {
            None => VersionChange::Baseline,
            Some(previous) if previous == token => VersionChange::Unchanged,
            Some(previous) => VersionChange::Upgraded {
                from: previous,
                to: token.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_version_is_baseline() {
        let mut watch = VersionWatch::default();
        assert_eq!(watch.observe("v1"), VersionChange::Baseline);
        assert_eq!(watch.current(), Some("v1"));
    }

    #[test]
    fn test_repeat_then_upgrade_reports_once() {
        let mut watch = VersionWatch::default();
        watch.observe("v1");
        assert_eq!(watch.observe("v1"), VersionChange::Unchanged);
        assert_eq!(
            watch.observe("v2"),
            VersionChange::Upgraded {
                from: "v1".to_string(),
                to: "v2".to_string()
            }
        );
        assert_eq!(watch.observe("v2"), VersionChange::Unchanged);
    }
}
