//! Common development directories watched in addition to explicit roots.

use camino::{Utf8Path, Utf8PathBuf};

/// Directories under the home directory checked on every platform.
const COMMON_DIRS: &[&str] = &[
    "Documents",
    "Projects",
    "Desktop",
    "workspace",
    "code",
    "OneDrive",
    "Downloads",
];

#[cfg(windows)]
const PLATFORM_DIRS: &[&str] = &[
    "Documents/Visual Studio Code",
    "Documents/GitHub",
    "Documents/GitLab",
];

#[cfg(not(windows))]
const PLATFORM_DIRS: &[&str] = &["git"];

/// Returns every candidate development directory under `home`, existing or not.
#[must_use]
pub fn candidate_dev_directories(home: &Utf8Path) -> Vec<Utf8PathBuf> {
    COMMON_DIRS
        .iter()
        .chain(PLATFORM_DIRS)
        .map(|relative| home.join(relative))
        .collect()
}

/// Returns the candidate development directories that exist right now.
///
/// Returns an empty list when the home directory is unknown.
#[must_use]
pub fn default_dev_directories() -> Vec<Utf8PathBuf> {
    let Some(home) = cs_core::home_dir() else {
        tracing::debug!("No home directory, skipping default roots");
        return Vec::new();
    };

    candidate_dev_directories(&home)
        .into_iter()
        .filter(|dir| dir.is_dir())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_are_under_home() {
        let home = Utf8Path::new("/home/dev");
        let candidates = candidate_dev_directories(home);
        assert!(candidates.iter().all(|dir| dir.starts_with(home)));
        assert!(candidates.contains(&home.join("Projects")));
        assert!(candidates.contains(&home.join("Downloads")));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unix_candidates_include_git() {
        let candidates = candidate_dev_directories(Utf8Path::new("/home/dev"));
        assert!(candidates.contains(&Utf8PathBuf::from("/home/dev/git")));
    }

    #[test]
    fn test_defaults_exist() {
        assert!(default_dev_directories().iter().all(|dir| dir.is_dir()));
    }
}
