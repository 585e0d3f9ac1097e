//! Audit history events and the field changes derived from them.
//!
//! The catalog keeps a per-record audit log. Each entry names the attribute
//! that changed, its old and new values, who made the change, and when.
//! Entries arrive ordered oldest first.

use serde::Deserialize;

/// Attribute name used when a history entry does not name one.
pub const ATTRIBUTE_PLACEHOLDER: &str = "—";

/// Value shown when a history entry carries no old or new value.
pub const VALUE_PLACEHOLDER: &str = "None";

/// Shown when the actor or time of a change is not known.
pub const UNKNOWN: &str = "Unknown";

/// One entry of a record's audit history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireHistoryEvent")]
pub struct HistoryEvent {
    /// When the change happened (catalog timestamp format).
    pub created_at: String,
    /// Name of the attribute that changed, if any.
    pub affected_attribute: Option<String>,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change.
    pub new_value: Option<String>,
    /// Display name of the user who made the change.
    pub actor_name: Option<String>,
}

impl HistoryEvent {
    /// Create a history event at the given time with no details.
    pub fn at(created_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            affected_attribute: None,
            old_value: None,
            new_value: None,
            actor_name: None,
        }
    }

    /// Set the changed attribute and its old and new values.
    #[must_use]
    pub fn with_change(
        mut self,
        attribute: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        self.affected_attribute = Some(attribute.into());
        self.old_value = Some(old_value.into());
        self.new_value = Some(new_value.into());
        self
    }

    /// Set the actor's display name.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_name = Some(actor.into());
        self
    }
}

/// Audit entry exactly as the catalog API returns it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHistoryEvent {
    created: String,
    #[serde(default)]
    affected_attribute: Option<String>,
    #[serde(default)]
    old_value: Option<String>,
    #[serde(default)]
    new_value: Option<String>,
    #[serde(default)]
    actor: Option<WireActor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireActor {
    #[serde(default)]
    display_name: Option<String>,
}

impl From<WireHistoryEvent> for HistoryEvent {
    fn from(wire: WireHistoryEvent) -> Self {
        Self {
            created_at: wire.created,
            affected_attribute: wire.affected_attribute,
            old_value: wire.old_value,
            new_value: wire.new_value,
            actor_name: wire.actor.and_then(|a| a.display_name),
        }
    }
}

/// A single attribute change reported inside an update notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Attribute name, or [`ATTRIBUTE_PLACEHOLDER`].
    pub attribute: String,
    /// Previous value, or [`VALUE_PLACEHOLDER`].
    pub old_value: String,
    /// New value, or [`VALUE_PLACEHOLDER`].
    pub new_value: String,
}

impl FieldChange {
    /// Create a field change from explicit parts.
    pub fn new(
        attribute: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    /// Build the reported change for one history entry.
    ///
    /// Empty values count as missing.
    pub fn from_event(event: &HistoryEvent) -> Self {
        Self {
            attribute: event
                .affected_attribute
                .clone()
                .unwrap_or_else(|| ATTRIBUTE_PLACEHOLDER.to_owned()),
            old_value: value_or_placeholder(event.old_value.as_deref()),
            new_value: value_or_placeholder(event.new_value.as_deref()),
        }
    }
}

impl core::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {} → {}", self.attribute, self.old_value, self.new_value)
    }
}

fn value_or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => VALUE_PLACEHOLDER.to_owned(),
    }
}
