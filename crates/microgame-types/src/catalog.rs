//! The fixed set of participant icons.

/// Icons offered to participants, in display order.
pub const DEFAULT_ICONS: [&str; 9] = [
    "ava",
    "cubert",
    "potat",
    "azra",
    "eepy",
    "frog",
    "iconokeeb",
    "void",
    "zoe",
];

/// Ordered, immutable catalog of icon names.
///
/// Built once at startup and shared read-only for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconCatalog {
    names: Vec<String>,
}

impl IconCatalog {
    /// Build a catalog from an ordered list of names. Duplicates are dropped,
    /// keeping the first occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    /// Whether `icon` is one of the catalog's names.
    pub fn contains(&self, icon: &str) -> bool {
        self.names.iter().any(|name| name == icon)
    }

    /// Iterate names in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of icons in the catalog.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the catalog has no icons.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for IconCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_ICONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_nine_icons_in_order() {
        let catalog = IconCatalog::default();
        assert_eq!(catalog.len(), 9);
        assert_eq!(catalog.iter().next(), Some("ava"));
        assert_eq!(catalog.iter().last(), Some("zoe"));
    }

    #[test]
    fn duplicates_are_dropped() {
        let catalog = IconCatalog::new(["frog", "void", "frog"]);
        assert_eq!(catalog.iter().collect::<Vec<_>>(), vec!["frog", "void"]);
    }

    #[test]
    fn contains_is_exact() {
        let catalog = IconCatalog::default();
        assert!(catalog.contains("eepy"));
        assert!(!catalog.contains("Eepy"));
        assert!(!catalog.contains(""));
    }
}
