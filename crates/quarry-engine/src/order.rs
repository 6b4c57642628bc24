use crate::error::QueryError;

/// Named sort keys supported by the registry query. A closed set:
/// every key maps to a concrete column, a comparison type, a null
/// policy, and a default direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Epoch of the most recent commit. Requires the summary join.
    Committed,
    /// Repository display name.
    Name,
    /// Short unique code. Unique where present, so no id tie-break.
    Callsign,
    /// Commit count. Requires the summary join.
    Size,
    /// Primary numeric id. The universal tie-break.
    Id,
}

impl SortKey {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        match raw {
            "committed" => Ok(Self::Committed),
            "name" => Ok(Self::Name),
            "callsign" => Ok(Self::Callsign),
            "size" => Ok(Self::Size),
            "id" => Ok(Self::Id),
            other => Err(QueryError::UnknownSortKey(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Name => "name",
            Self::Callsign => "callsign",
            Self::Size => "size",
            Self::Id => "id",
        }
    }

    /// Qualified column the key sorts on.
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Committed => "s.epoch",
            Self::Name => "r.name",
            Self::Callsign => "r.callsign",
            Self::Size => "s.size",
            Self::Id => "r.id",
        }
    }

    /// Whether the column can be NULL; such keys sort nulls last.
    pub(crate) fn nullable(self) -> bool {
        matches!(self, Self::Committed | Self::Size | Self::Callsign)
    }

    /// Unique keys terminate an ordering vector on their own.
    pub(crate) fn unique(self) -> bool {
        matches!(self, Self::Callsign | Self::Id)
    }

    /// Direction when the caller does not flip the key: most recent /
    /// largest first for the numeric keys, A-to-Z for the string keys.
    pub fn default_descending(self) -> bool {
        matches!(self, Self::Committed | Self::Size | Self::Id)
    }

    pub(crate) fn requires_summary(self) -> bool {
        matches!(self, Self::Committed | Self::Size)
    }
}

/// One resolved step of an ordering vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderEntry {
    pub key: SortKey,
    pub descending: bool,
}

impl OrderEntry {
    /// Entry in the key's default direction.
    pub fn new(key: SortKey) -> Self {
        Self {
            key,
            descending: key.default_descending(),
        }
    }

    /// Flip the direction.
    pub fn reversed(self) -> Self {
        Self {
            key: self.key,
            descending: !self.descending,
        }
    }

    /// Parse `"name"` or `"-name"`; a leading `-` flips the key's
    /// default direction.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        match raw.strip_prefix('-') {
            Some(rest) => Ok(Self::new(SortKey::parse(rest)?).reversed()),
            None => Ok(Self::new(SortKey::parse(raw)?)),
        }
    }
}

/// An ordering vector: resolved sort entries, deduplicated by key and
/// always terminated by a unique key (`id` is appended when the caller's
/// last key is not unique), so the produced order is total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderVector {
    entries: Vec<OrderEntry>,
}

impl Default for OrderVector {
    /// Newest first.
    fn default() -> Self {
        Self::new([OrderEntry::new(SortKey::Id)])
    }
}

impl OrderVector {
    pub fn new(entries: impl IntoIterator<Item = OrderEntry>) -> Self {
        let mut resolved: Vec<OrderEntry> = Vec::new();
        for entry in entries {
            if resolved.iter().any(|e| e.key == entry.key) {
                continue;
            }
            resolved.push(entry);
            if entry.key.unique() {
                break;
            }
        }
        let terminated = resolved.last().is_some_and(|last| last.key.unique());
        if !terminated {
            resolved.push(OrderEntry::new(SortKey::Id));
        }
        Self { entries: resolved }
    }

    pub fn single(key: SortKey) -> Self {
        Self::new([OrderEntry::new(key)])
    }

    /// Parse keys like `["name", "-id"]`.
    pub fn parse<I, S>(keys: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for key in keys {
            entries.push(OrderEntry::parse(key.as_ref())?);
        }
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    pub fn contains(&self, key: SortKey) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub(crate) fn requires_summary(&self) -> bool {
        self.entries.iter().any(|e| e.key.requires_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vector_is_newest_first() {
        let vector = OrderVector::default();
        assert_eq!(vector.entries(), &[OrderEntry { key: SortKey::Id, descending: true }]);
    }

    #[test]
    fn non_unique_key_gets_id_tie_break() {
        let vector = OrderVector::single(SortKey::Name);
        let keys: Vec<SortKey> = vector.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![SortKey::Name, SortKey::Id]);
    }

    #[test]
    fn unique_key_terminates_vector() {
        let vector = OrderVector::single(SortKey::Callsign);
        let keys: Vec<SortKey> = vector.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![SortKey::Callsign]);
    }

    #[test]
    fn entries_after_a_unique_key_are_dropped() {
        let vector = OrderVector::new([
            OrderEntry::new(SortKey::Id),
            OrderEntry::new(SortKey::Name),
        ]);
        let keys: Vec<SortKey> = vector.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![SortKey::Id]);
    }

    #[test]
    fn duplicate_keys_collapse() {
        let vector = OrderVector::new([
            OrderEntry::new(SortKey::Name),
            OrderEntry::new(SortKey::Name).reversed(),
        ]);
        let keys: Vec<SortKey> = vector.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![SortKey::Name, SortKey::Id]);
    }

    #[test]
    fn parse_flips_default_direction() {
        let entry = OrderEntry::parse("name").unwrap();
        assert!(!entry.descending);
        let entry = OrderEntry::parse("-name").unwrap();
        assert!(entry.descending);

        let entry = OrderEntry::parse("committed").unwrap();
        assert!(entry.descending);
        let entry = OrderEntry::parse("-committed").unwrap();
        assert!(!entry.descending);
    }

    #[test]
    fn parse_rejects_unknown_key() {
        let err = OrderVector::parse(["created"]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownSortKey(_)));
    }

    #[test]
    fn summary_requirement_tracks_keys() {
        assert!(OrderVector::single(SortKey::Committed).requires_summary());
        assert!(OrderVector::single(SortKey::Size).requires_summary());
        assert!(!OrderVector::single(SortKey::Name).requires_summary());
    }
}
