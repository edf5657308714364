//! Manual-field changes accepted by [`ChannelRegistry::update_partial`].
//!
//! [`ChannelRegistry::update_partial`]: crate::store::ChannelRegistry::update_partial

use {serde_json::Value, tracing::debug};

/// Field names that may be changed through a partial update.
pub const EDITABLE_FIELDS: &[&str] = &["owner", "notes", "aliases"];

/// A manual edit. `None` means "not provided" and leaves the field alone;
/// clearing a text field requires an explicit empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelChanges {
    pub owner: Option<String>,
    pub notes: Option<String>,
    /// Merged into the existing aliases, never replacing them.
    pub aliases: Option<Vec<String>>,
    /// The raw identifier the caller used to reach the record; folded into
    /// the alias set whenever aliases are merged.
    pub base_identifier: Option<String>,
}

impl ChannelChanges {
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn base_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.base_identifier = Some(identifier.into());
        self
    }

    /// Whether any editable field carries a value.
    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.notes.is_none() && self.aliases.is_none()
    }

    /// Build changes from a JSON object of `field -> value`.
    ///
    /// Keys outside [`EDITABLE_FIELDS`] are ignored, as are `null` values.
    /// `aliases` accepts an array of strings or a single comma-separated
    /// string.
    pub fn from_json(value: &Value) -> Self {
        let mut changes = Self::default();
        let Some(object) = value.as_object() else {
            return changes;
        };
        for (key, value) in object {
            if !EDITABLE_FIELDS.contains(&key.as_str()) {
                debug!(field = %key, "ignoring non-editable field in channel update");
                continue;
            }
            match key.as_str() {
                "owner" => changes.owner = value.as_str().map(str::to_string),
                "notes" => changes.notes = value.as_str().map(str::to_string),
                "aliases" => changes.aliases = parse_aliases(value),
                _ => {},
            }
        }
        changes
    }
}

fn parse_aliases(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Value::String(text) => Some(text.split(',').map(str::to_string).collect()),
        _ => None,
    }
}
