use serde::{Deserialize, Serialize};

use crate::validation::validate_username;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum UsernameStatus {
    #[default]
    Idle,
    Invalid(String),
    Checking,
    Available,
    Taken,
}

/// Drives the "checking / available / taken" hint next to the username
/// field. Pair with a `Debouncer` on `USERNAME_DEBOUNCE`: feed every
/// keystroke to `on_input`, run the lookup for debounced values, and hand
/// answers to `resolve`. Answers for anything but the latest input are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct UsernameProbe {
    latest: String,
    status: UsernameStatus,
}

impl UsernameProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &UsernameStatus {
        &self.status
    }

    /// Record a keystroke. Returns true when the value needs a lookup.
    pub fn on_input(&mut self, raw: &str) -> bool {
        let name = raw.trim();
        self.latest = name.to_string();
        self.status = if name.is_empty() {
            UsernameStatus::Idle
        } else if let Err(e) = validate_username(name) {
            UsernameStatus::Invalid(e.message)
        } else {
            UsernameStatus::Checking
        };
        self.status == UsernameStatus::Checking
    }

    pub fn resolve(&mut self, username: &str, available: bool) -> bool {
        if self.status != UsernameStatus::Checking || username != self.latest {
            return false;
        }
        self.status = if available { UsernameStatus::Available } else { UsernameStatus::Taken };
        true
    }

    /// Lookup failed; go back to neutral rather than claim either answer.
    pub fn fail(&mut self, username: &str) {
        if username == self.latest && self.status == UsernameStatus::Checking {
            self.status = UsernameStatus::Idle;
        }
    }

    /// Submission is allowed only once the name is confirmed free.
    pub fn can_submit(&self) -> bool {
        self.status == UsernameStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_visible_states() {
        let mut probe = UsernameProbe::new();
        assert!(probe.on_input("dana"));
        assert_eq!(probe.status(), &UsernameStatus::Checking);
        assert!(probe.resolve("dana", false));
        assert_eq!(probe.status(), &UsernameStatus::Taken);

        assert!(probe.on_input("dana2"));
        assert!(probe.resolve("dana2", true));
        assert_eq!(probe.status(), &UsernameStatus::Available);
        assert!(probe.can_submit());
    }

    #[test]
    fn test_stale_answer_is_dropped() {
        let mut probe = UsernameProbe::new();
        probe.on_input("dan");
        probe.on_input("dana");
        assert!(!probe.resolve("dan", true));
        assert_eq!(probe.status(), &UsernameStatus::Checking);
    }

    #[test]
    fn test_invalid_and_empty_skip_lookup() {
        let mut probe = UsernameProbe::new();
        assert!(!probe.on_input("  "));
        assert_eq!(probe.status(), &UsernameStatus::Idle);
        assert!(!probe.on_input("a b"));
        assert!(matches!(probe.status(), UsernameStatus::Invalid(_)));
        assert!(!probe.can_submit());
    }
}
