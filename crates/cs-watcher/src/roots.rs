//! The set of watched roots and relative path resolution.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};

/// A deduplicated, ordered set of watched root directories.
///
/// Roots are stored in normalized (canonical) form, so two spellings of the
/// same directory collapse to one entry. Nested roots are allowed.
///
/// # Examples
///
/// ```
/// use cs_watcher::RootSet;
/// use camino::{Utf8Path, Utf8PathBuf};
///
/// let mut roots = RootSet::new();
/// roots.insert(Utf8PathBuf::from("/home/dev/code"));
/// roots.insert(Utf8PathBuf::from("/home/dev/code/app"));
///
/// assert_eq!(roots.resolve(Utf8Path::new("/home/dev/code/app/src/main.rs")), "src/main.rs");
/// assert_eq!(roots.resolve(Utf8Path::new("/home/dev/code/lib.rs")), "lib.rs");
/// assert_eq!(roots.resolve(Utf8Path::new("/opt/other.rs")), "/opt/other.rs");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSet {
    roots: BTreeSet<Utf8PathBuf>,
}

impl RootSet {
    /// Creates an empty root set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root. Returns `false` if it was already present.
    pub fn insert(&mut self, root: Utf8PathBuf) -> bool {
        self.roots.insert(root)
    }

    /// Removes a root. Returns `false` if it was not present.
    pub fn remove(&mut self, root: &Utf8Path) -> bool {
        self.roots.remove(root)
    }

    /// Returns `true` if the root is tracked.
    #[must_use]
    pub fn contains(&self, root: &Utf8Path) -> bool {
        self.roots.contains(root)
    }

    /// Number of roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` if no roots are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Iterates over roots in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.roots.iter()
    }

    /// Returns `path` relative to the most specific root that contains it.
    ///
    /// Matching is done on whole path components. A path outside every root,
    /// or equal to a root, is returned unchanged.
    #[must_use]
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.roots
            .iter()
            .filter_map(|root| {
                path.strip_prefix(root)
                    .ok()
                    .filter(|relative| !relative.as_str().is_empty())
                    .map(|relative| (root.components().count(), relative))
            })
            .max_by_key(|(depth, _)| *depth)
            .map_or_else(|| path.to_owned(), |(_, relative)| relative.to_owned())
    }
}

impl FromIterator<Utf8PathBuf> for RootSet {
    fn from_iter<T: IntoIterator<Item = Utf8PathBuf>>(iter: T) -> Self {
        Self {
            roots: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RootSet {
    type Item = &'a Utf8PathBuf;
    type IntoIter = std::collections::btree_set::Iter<'a, Utf8PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.iter()
    }
}

impl IntoIterator for RootSet {
    type Item = Utf8PathBuf;
    type IntoIter = std::collections::btree_set::IntoIter<Utf8PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.into_iter()
    }
}

/// Normalizes a candidate root to its canonical absolute form.
///
/// Returns `None` if the path does not exist or its canonical form is not
/// valid UTF-8.
#[must_use]
pub fn normalize_root(path: &Utf8Path) -> Option<Utf8PathBuf> {
    match path.canonicalize_utf8() {
        Ok(canonical) => Some(canonical),
        Err(error) => {
            tracing::debug!(path = %path, error = %error, "Cannot normalize root");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut roots = RootSet::new();
        assert!(roots.insert(Utf8PathBuf::from("/a")));
        assert!(!roots.insert(Utf8PathBuf::from("/a")));
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut roots: RootSet = [Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")]
            .into_iter()
            .collect();
        assert!(roots.remove(Utf8Path::new("/a")));
        assert!(!roots.remove(Utf8Path::new("/a")));
        assert!(roots.contains(Utf8Path::new("/b")));
        assert!(!roots.is_empty());
    }

    #[test]
    fn test_resolve_prefers_most_specific_root() {
        let roots: RootSet = [Utf8PathBuf::from("/w"), Utf8PathBuf::from("/w/app")]
            .into_iter()
            .collect();
        assert_eq!(roots.resolve(Utf8Path::new("/w/app/src/x.rs")), "src/x.rs");
        assert_eq!(roots.resolve(Utf8Path::new("/w/other/y.rs")), "other/y.rs");
    }

    #[test]
    fn test_resolve_matches_whole_components() {
        let roots: RootSet = std::iter::once(Utf8PathBuf::from("/a/foo")).collect();
        assert_eq!(
            roots.resolve(Utf8Path::new("/a/foobar/x.rs")),
            Utf8PathBuf::from("/a/foobar/x.rs")
        );
    }

    #[test]
    fn test_resolve_without_roots_is_identity() {
        let roots = RootSet::new();
        assert_eq!(roots.resolve(Utf8Path::new("/x/y.rs")), "/x/y.rs");
    }

    #[test]
    fn test_into_iter_yields_owned_roots_in_order() {
        let roots: RootSet = [Utf8PathBuf::from("/b"), Utf8PathBuf::from("/a")]
            .into_iter()
            .collect();
        let owned: Vec<Utf8PathBuf> = roots.into_iter().collect();
        assert_eq!(owned, vec![Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")]);
    }

    #[test]
    fn test_normalize_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        let normalized = normalize_root(path).unwrap();
        assert!(normalized.is_absolute());
        assert_eq!(normalize_root(&normalized.join(".")), Some(normalized.clone()));
        assert!(normalize_root(Utf8Path::new("/nonexistent/codestream/root")).is_none());
    }
}
