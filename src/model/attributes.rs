use chrono::Duration;

/// Per-graveyard behavior knobs. Immutable; every field is replaced through a
/// `with_*` method that returns a new bundle.
///
/// Sentinels: a negative discovery or safety range means "use the global
/// default"; a zero safety time disables respawn safety for this graveyard and
/// a negative one means "use the global default". Empty messages fall back to
/// the default message and a blank permission group means unrestricted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    enabled: bool,
    hidden: bool,
    discovery_range: i32,
    discovery_message: String,
    respawn_message: String,
    permission_group: String,
    safety_range: i32,
    safety_time: Duration,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            enabled: true,
            hidden: true,
            discovery_range: -1,
            discovery_message: String::new(),
            respawn_message: String::new(),
            permission_group: String::new(),
            safety_range: -1,
            safety_time: Duration::seconds(-1),
        }
    }
}

impl Attributes {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn discovery_range(&self) -> i32 {
        self.discovery_range
    }

    pub fn discovery_message(&self) -> Option<&str> {
        non_blank(&self.discovery_message)
    }

    pub fn respawn_message(&self) -> Option<&str> {
        non_blank(&self.respawn_message)
    }

    pub fn permission_group(&self) -> Option<&str> {
        non_blank(&self.permission_group)
    }

    pub fn safety_range(&self) -> i32 {
        self.safety_range
    }

    pub fn safety_time(&self) -> Duration {
        self.safety_time
    }

    /// Discovery radius in blocks, substituting `default_range` for the negative sentinel.
    pub fn effective_discovery_range(&self, default_range: i32) -> i32 {
        if self.discovery_range < 0 {
            default_range
        } else {
            self.discovery_range
        }
    }

    pub fn effective_safety_range(&self, default_range: i32) -> i32 {
        if self.safety_range < 0 {
            default_range
        } else {
            self.safety_range
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    pub fn with_hidden(self, hidden: bool) -> Self {
        Self { hidden, ..self }
    }

    pub fn with_discovery_range(self, discovery_range: i32) -> Self {
        Self {
            discovery_range,
            ..self
        }
    }

    pub fn with_discovery_message(self, message: impl Into<String>) -> Self {
        Self {
            discovery_message: message.into(),
            ..self
        }
    }

    pub fn with_respawn_message(self, message: impl Into<String>) -> Self {
        Self {
            respawn_message: message.into(),
            ..self
        }
    }

    pub fn with_permission_group(self, group: impl Into<String>) -> Self {
        Self {
            permission_group: group.into(),
            ..self
        }
    }

    pub fn with_safety_range(self, safety_range: i32) -> Self {
        Self {
            safety_range,
            ..self
        }
    }

    pub fn with_safety_time(self, safety_time: Duration) -> Self {
        Self {
            safety_time,
            ..self
        }
    }

    /// Raw stored message text, empty when the default applies.
    pub(crate) fn raw_discovery_message(&self) -> &str {
        &self.discovery_message
    }

    pub(crate) fn raw_respawn_message(&self) -> &str {
        &self.respawn_message
    }

    pub(crate) fn raw_permission_group(&self) -> &str {
        &self.permission_group
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_methods_replace_one_field() {
        let base = Attributes::default();
        let changed = base.clone().with_hidden(false);
        assert!(!changed.hidden());
        assert_eq!(changed.clone().with_hidden(true), base);

        let changed = base.clone().with_safety_time(Duration::seconds(30));
        assert_eq!(changed.safety_time(), Duration::seconds(30));
        assert_eq!(changed.discovery_range(), base.discovery_range());
        assert_eq!(changed.enabled(), base.enabled());
    }

    #[test]
    fn sentinels_resolve_to_defaults() {
        let attrs = Attributes::default();
        assert_eq!(attrs.effective_discovery_range(50), 50);
        assert_eq!(attrs.with_discovery_range(0).effective_discovery_range(50), 0);
    }

    #[test]
    fn blank_text_means_default() {
        let attrs = Attributes::default()
            .with_permission_group("  ")
            .with_discovery_message("");
        assert_eq!(attrs.permission_group(), None);
        assert_eq!(attrs.discovery_message(), None);
        let attrs = attrs.with_permission_group("vip");
        assert_eq!(attrs.permission_group(), Some("vip"));
    }
}
