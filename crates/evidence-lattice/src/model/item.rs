//! Item and count value types shared by every engine.

use std::fmt;

/// Display count attached to a tree item.
///
/// "Did this node change" comparisons use value equality of the whole
/// `Count`: `Exact(5)` and `AtLeast(5)` are different counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Count {
    /// The precise number of rows under the item.
    Exact(u64),
    /// A guarded or truncated query stopped counting at this many rows.
    AtLeast(u64),
    /// Static, non-countable item.
    #[default]
    NotShown,
}

impl Count {
    /// Returns the numeric magnitude, if the count is shown at all.
    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Exact(n) | Self::AtLeast(n) => Some(*n),
            Self::NotShown => None,
        }
    }

    /// Returns `true` if the count should be rendered.
    pub fn is_shown(&self) -> bool {
        !matches!(self, Self::NotShown)
    }

    /// Formats the suffix appended to a display name, e.g. `" (12)"` or
    /// `" (1000+)"`. Empty for [`Count::NotShown`].
    pub fn display_suffix(&self) -> String {
        match self {
            Self::Exact(n) => format!(" ({n})"),
            Self::AtLeast(n) => format!(" ({n}+)"),
            Self::NotShown => String::new(),
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::AtLeast(n) => write!(f, "{n}+"),
            Self::NotShown => Ok(()),
        }
    }
}

/// One row of a backing-store snapshot.
///
/// `id` is unique among the siblings of one parent at a given instant. Two
/// items are treated as "the same logical row across refreshes" only when
/// both `id` and `type_key` agree.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<K, P> {
    /// Identity among siblings.
    pub id: K,
    /// The category of backing-store rows this item counts.
    pub type_key: String,
    /// Typed payload (usually the search parameters the item stands for).
    pub payload: P,
    /// Human-readable name, without count suffix.
    pub display_name: String,
    /// Display count.
    pub display_count: Count,
}

impl<K, P> Item<K, P> {
    /// Creates an item with a [`Count::NotShown`] count.
    pub fn new(
        id: K,
        type_key: impl Into<String>,
        payload: P,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            type_key: type_key.into(),
            payload,
            display_name: display_name.into(),
            display_count: Count::NotShown,
        }
    }

    /// Sets the display count.
    pub fn with_count(mut self, count: Count) -> Self {
        self.display_count = count;
        self
    }

    /// Display name with the count suffix appended.
    pub fn label(&self) -> String {
        format!("{}{}", self.display_name, self.display_count.display_suffix())
    }

    /// Returns `true` if `other` can be applied in place to a node showing
    /// `self`: same identity and same type key.
    pub fn is_comparable(&self, other: &Self) -> bool
    where
        K: PartialEq,
    {
        self.id == other.id && self.type_key == other.type_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_equality_is_whole_value() {
        assert_ne!(Count::Exact(5), Count::AtLeast(5));
        assert_eq!(Count::Exact(5).value(), Count::AtLeast(5).value());
        assert_eq!(Count::NotShown.value(), None);
        assert!(!Count::NotShown.is_shown());
    }

    #[test]
    fn test_count_display() {
        assert_eq!(Count::Exact(12).display_suffix(), " (12)");
        assert_eq!(Count::AtLeast(1000).display_suffix(), " (1000+)");
        assert_eq!(Count::NotShown.display_suffix(), "");
        assert_eq!(Count::AtLeast(3).to_string(), "3+");
    }

    #[test]
    fn test_item_label_and_comparability() {
        let item = Item::new(1_u64, "tag_name", (), "Bookmark").with_count(Count::Exact(3));
        assert_eq!(item.label(), "Bookmark (3)");

        let same = Item::new(1_u64, "tag_name", (), "Renamed");
        let other_kind = Item::new(1_u64, "file_size", (), "Bookmark");
        assert!(item.is_comparable(&same));
        assert!(!item.is_comparable(&other_kind));
    }
}
