//! Path classification for watch events.
//!
//! Every filesystem notification is run through a [`PathClassifier`] before
//! anything else happens to it. A path is relevant only when:
//!
//! 1. no component of the path is an ignored directory name,
//! 2. its extension is not in the ignored-extension set, and
//! 3. its extension maps to a language.
//!
//! The ignored-extension set always wins, even for extensions that also have a
//! language mapping (`.txt`, `.sh`, `.ini`, ...).
//!
//! Extensions are taken from the final path component using the last `.`, so
//! `archive.tar.gz` has the extension `.gz`. Compound suffixes in the tables
//! (`.min.js`) therefore never match as a unit.
//!
//! # Examples
//!
//! ```
//! use cs_watcher::{Classification, ClassificationRules, PathClassifier};
//! use camino::Utf8Path;
//!
//! let rules = ClassificationRules::default();
//!
//! assert_eq!(
//!     rules.classify(Utf8Path::new("/work/app/src/main.rs")).language(),
//!     Some("rust"),
//! );
//! assert!(!rules.classify(Utf8Path::new("/work/app/node_modules/x/index.js")).is_relevant());
//! assert!(!rules.classify(Utf8Path::new("/work/notes.txt")).is_relevant());
//! ```

use std::sync::Arc;

use camino::Utf8Path;
use cs_core::MonitorConfig;
use rustc_hash::{FxHashMap, FxHashSet};

/// Directory names that make every path beneath them irrelevant.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".idea",
    ".vscode",
    ".venv",
    "env",
    ".env",
    "dist",
    "build",
    "out",
    "target",
    "bin",
    "obj",
];

/// Extensions that are never reported, grouped roughly by kind.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    // system binaries
    ".exe", ".dll", ".so", ".dylib", ".pyd", ".pyc", ".pyo", ".class", ".jar", ".war", ".ear",
    // documents
    ".txt", ".doc", ".docx", ".pdf", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp",
    // media
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".ico", ".webp", ".mp3", ".wav", ".mp4",
    ".avi", ".mov", ".mkv",
    // archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz", ".iso", ".img",
    // installers
    ".msi", ".deb", ".rpm", ".apk", ".app", ".dmg", ".pkg", ".bin", ".dat",
    // config, logs, backups
    ".ini", ".cfg", ".conf", ".config", ".log", ".tmp", ".temp", ".bak", ".backup", ".old",
    // windows
    ".lnk", ".url", ".bat", ".cmd", ".ps1", ".reg", ".sys", ".drv",
    // macos
    ".plist", ".icns", ".webloc",
    // linux
    ".run", ".sh", ".service", ".socket",
    // tooling dotfiles
    ".gitignore", ".gitkeep", ".gitattributes", ".editorconfig", ".prettierrc", ".eslintrc",
    ".babelrc", ".npmrc", ".yarnrc", ".pnp", ".lock", ".map", ".min.js", ".min.css",
    // ide
    ".vscode", ".idea", ".vs", ".suo", ".user", ".sln", ".csproj", ".vcxproj", ".vcproj",
    // environments and caches
    ".venv", ".env", ".next", ".nuxt", ".cache", ".swp", ".swo", ".swn",
    // databases
    ".db", ".sqlite", ".sqlite3", ".mdb", ".accdb", ".frm", ".ibd", ".myd", ".myi",
    // fonts
    ".ttf", ".otf", ".woff", ".woff2", ".eot",
    // misc
    ".ds_store", ".localized", ".directory", ".trash", ".trashes", ".fseventsd",
    ".temporaryitems", ".apdisk",
];

/// Extension to language tag mapping.
pub const LANGUAGES: &[(&str, &str)] = &[
    (".py", "python"),
    (".java", "java"),
    (".js", "javascript"),
    (".ts", "typescript"),
    (".jsx", "javascript"),
    (".tsx", "typescript"),
    (".cpp", "cpp"),
    (".c", "c"),
    (".h", "cpp"),
    (".hpp", "cpp"),
    (".cs", "csharp"),
    (".go", "go"),
    (".rb", "ruby"),
    (".php", "php"),
    (".swift", "swift"),
    (".kt", "kotlin"),
    (".rs", "rust"),
    (".scala", "scala"),
    (".html", "html"),
    (".css", "css"),
    (".scss", "scss"),
    (".sass", "sass"),
    (".less", "less"),
    (".json", "json"),
    (".xml", "xml"),
    (".yaml", "yaml"),
    (".yml", "yaml"),
    (".md", "markdown"),
    (".sql", "sql"),
    // shadowed by IGNORED_EXTENSIONS
    (".env", "text"),
    (".config", "text"),
    (".conf", "text"),
    (".ini", "text"),
    (".txt", "text"),
    (".sh", "shell"),
    (".bat", "batch"),
    (".ps1", "powershell"),
    (".db", "sql"),
    (".sqlite", "sql"),
    (".sqlite3", "sql"),
];

/// The outcome of classifying a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The path should produce events, tagged with this language.
    Relevant {
        /// Language tag for the file's content.
        language: Arc<str>,
    },
    /// The path is dropped.
    Irrelevant,
}

impl Classification {
    /// Returns `true` for [`Classification::Relevant`].
    #[inline]
    #[must_use]
    pub const fn is_relevant(&self) -> bool {
        matches!(self, Self::Relevant { .. })
    }

    /// Returns the language tag of a relevant path.
    #[inline]
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Relevant { language } => Some(language),
            Self::Irrelevant => None,
        }
    }
}

/// Decides whether a path is relevant and which language it holds.
///
/// Classifiers are called from the notification thread, so they must be
/// cheap, [`Send`] and [`Sync`].
pub trait PathClassifier: Send + Sync + 'static {
    /// Classifies an absolute file path.
    fn classify(&self, path: &Utf8Path) -> Classification;
}

impl<C: PathClassifier + ?Sized> PathClassifier for Arc<C> {
    fn classify(&self, path: &Utf8Path) -> Classification {
        (**self).classify(path)
    }
}

/// Table-driven classifier: language map plus two exclusion sets.
///
/// Extensions are stored lowercase with their leading dot.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    languages: FxHashMap<String, Arc<str>>,
    ignored_dirs: FxHashSet<String>,
    ignored_extensions: FxHashSet<String>,
}

impl ClassificationRules {
    /// Rules with empty tables. Every path is irrelevant.
    fn empty() -> Self {
        Self {
            languages: FxHashMap::default(),
            ignored_dirs: FxHashSet::default(),
            ignored_extensions: FxHashSet::default(),
        }
    }

    /// Builds the default tables extended by the monitor configuration.
    #[must_use]
    pub fn from_config(config: &MonitorConfig) -> Self {
        let mut rules = Self::default();
        for dir in &config.extra_ignored_dirs {
            rules = rules.ignore_dir(dir);
        }
        for ext in &config.extra_ignored_extensions {
            rules = rules.ignore_extension(ext);
        }
        for (ext, language) in &config.extra_languages {
            rules = rules.with_language(ext, language);
        }
        rules
    }

    /// Maps an extension to a language, replacing any existing mapping.
    #[must_use]
    pub fn with_language(mut self, extension: &str, language: &str) -> Self {
        self.languages
            .insert(normalize_extension(extension), Arc::from(language));
        self
    }

    /// Adds a directory name to the ignored set.
    #[must_use]
    pub fn ignore_dir(mut self, name: &str) -> Self {
        self.ignored_dirs.insert(name.to_owned());
        self
    }

    /// Adds an extension to the ignored set.
    #[must_use]
    pub fn ignore_extension(mut self, extension: &str) -> Self {
        self.ignored_extensions.insert(normalize_extension(extension));
        self
    }

    #[cfg(test)]
    fn language_for(&self, extension: &str) -> Option<&str> {
        self.languages
            .get(&normalize_extension(extension))
            .map(AsRef::as_ref)
    }

    fn in_ignored_dir(&self, path: &Utf8Path) -> bool {
        path.components()
            .any(|component| self.ignored_dirs.contains(component.as_str()))
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.ignored_dirs = IGNORED_DIRS.iter().map(|d| (*d).to_owned()).collect();
        rules.ignored_extensions = IGNORED_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect();
        rules.languages = LANGUAGES
            .iter()
            .map(|(ext, lang)| ((*ext).to_owned(), Arc::from(*lang)))
            .collect();
        rules
    }
}

impl PathClassifier for ClassificationRules {
    fn classify(&self, path: &Utf8Path) -> Classification {
        if self.in_ignored_dir(path) {
            return Classification::Irrelevant;
        }

        let Some(extension) = last_extension(path) else {
            return Classification::Irrelevant;
        };

        if self.ignored_extensions.contains(&extension) {
            return Classification::Irrelevant;
        }

        match self.languages.get(&extension) {
            Some(language) => Classification::Relevant {
                language: Arc::clone(language),
            },
            None => Classification::Irrelevant,
        }
    }
}

/// Returns the lowercase text from the last `.` of the file name, inclusive.
///
/// A name that is nothing but a leading dot (`.env`) yields the whole name.
fn last_extension(path: &Utf8Path) -> Option<String> {
    let name = path.file_name()?;
    let dot = name.rfind('.')?;
    let extension = &name[dot..];
    if extension.len() == 1 {
        return None;
    }
    Some(extension.to_lowercase())
}

fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassificationRules {
        ClassificationRules::default()
    }

    #[test]
    fn test_supported_languages() {
        let rules = rules();
        assert_eq!(rules.classify(Utf8Path::new("/p/app.py")).language(), Some("python"));
        assert_eq!(rules.classify(Utf8Path::new("/p/App.tsx")).language(), Some("typescript"));
        assert_eq!(rules.classify(Utf8Path::new("/p/lib.h")).language(), Some("cpp"));
        assert_eq!(rules.classify(Utf8Path::new("/p/ci.yml")).language(), Some("yaml"));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let rules = rules();
        assert_eq!(rules.classify(Utf8Path::new("/p/MAIN.RS")).language(), Some("rust"));
        assert!(!rules.classify(Utf8Path::new("/p/Photo.PNG")).is_relevant());
    }

    #[test]
    fn test_ignored_extension_wins_over_language_map() {
        let rules = rules();
        for path in ["/p/notes.txt", "/p/run.sh", "/p/app.ini", "/p/data.db", "/p/x.ps1"] {
            let path = Utf8Path::new(path);
            let ext = last_extension(path).unwrap();
            assert!(rules.language_for(&ext).is_some(), "{ext} should be mapped");
            assert_eq!(rules.classify(path), Classification::Irrelevant, "{path}");
        }
    }

    #[test]
    fn test_ignored_directory_anywhere_in_path() {
        let rules = rules();
        assert!(!rules.classify(Utf8Path::new("/p/.git/hooks/pre-commit.py")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("node_modules/pkg/index.js")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("/p/a/b/target/debug/build.rs")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("/p/__pycache__/m.py")).is_relevant());
    }

    #[test]
    fn test_ignored_directory_matches_whole_components() {
        let rules = rules();
        assert!(rules.classify(Utf8Path::new("/p/binary/tool.rs")).is_relevant());
        assert!(rules.classify(Utf8Path::new("/p/my_target/x.go")).is_relevant());
    }

    #[test]
    fn test_unknown_extension_is_irrelevant() {
        let rules = rules();
        assert!(!rules.classify(Utf8Path::new("/p/Makefile")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("/p/data.parquet")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("/p/trailing.")).is_relevant());
    }

    #[test]
    fn test_last_suffix_rule() {
        assert_eq!(last_extension(Utf8Path::new("a.tar.gz")).as_deref(), Some(".gz"));
        assert_eq!(last_extension(Utf8Path::new("app.min.js")).as_deref(), Some(".js"));
        assert_eq!(last_extension(Utf8Path::new(".env")).as_deref(), Some(".env"));
        assert_eq!(last_extension(Utf8Path::new("README")), None);

        // `.min.js` is in the ignored table but the last-suffix rule reduces it to `.js`.
        assert_eq!(
            rules().classify(Utf8Path::new("/p/app.min.js")).language(),
            Some("javascript")
        );
    }

    #[test]
    fn test_config_extensions() {
        let mut config = MonitorConfig::default();
        config.extra_languages.insert("vue".to_owned(), "vue".to_owned());
        config.extra_ignored_dirs.push("vendor".to_owned());
        config.extra_ignored_extensions.push(".GO".to_owned());

        let rules = ClassificationRules::from_config(&config);
        assert_eq!(rules.classify(Utf8Path::new("/p/App.vue")).language(), Some("vue"));
        assert!(!rules.classify(Utf8Path::new("/p/vendor/lib.rs")).is_relevant());
        assert!(!rules.classify(Utf8Path::new("/p/main.go")).is_relevant());
    }

    #[test]
    fn test_empty_rules_reject_everything() {
        let rules = ClassificationRules::empty();
        assert!(!rules.classify(Utf8Path::new("/p/main.rs")).is_relevant());
    }

    #[test]
    fn test_shared_classifier() {
        let classifier: Arc<dyn PathClassifier> = Arc::new(rules());
        assert!(classifier.classify(Utf8Path::new("/p/main.rs")).is_relevant());
        assert!(!classifier.classify(Utf8Path::new("/p/main.exe")).is_relevant());
    }
}
