use std::path::PathBuf;
use std::time::Duration;

use crate::chip::Category;

pub const DEFAULT_RESTORE_DELAY: Duration = Duration::from_millis(10);

/// Settings for one authoring session.
///
/// Passed into the session explicitly; nothing here is read from or written
/// back to shared storage while the editor runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    /// Palette categories, in display order.
    pub categories: Vec<Category>,
    /// Treat bare category names typed into text as blanks when compiling.
    pub inline_keywords: bool,
    /// How long the caret restore waits after a re-render.
    pub restore_delay: Duration,
    /// Where log output goes. `None` disables logging.
    pub log_path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            inline_keywords: true,
            restore_delay: DEFAULT_RESTORE_DELAY,
            log_path: None,
        }
    }
}

impl EditorConfig {
    /// Load config from environment variables.
    ///
    /// - `MADLIBS_PALETTE`: comma-separated category names (optional)
    /// - `MADLIBS_INLINE_KEYWORDS`: `0`, `false` or `off` disables inline keywords
    /// - `MADLIBS_RESTORE_DELAY_MS`: caret restore delay in milliseconds
    /// - `MADLIBS_LOG`: log file path (optional)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(palette) = lookup("MADLIBS_PALETTE") {
            let categories = parse_categories(&palette);
            if categories.is_empty() {
                tracing::debug!(%palette, "no known categories in MADLIBS_PALETTE, using defaults");
            } else {
                config.categories = categories;
            }
        }

        if let Some(flag) = lookup("MADLIBS_INLINE_KEYWORDS") {
            config.inline_keywords = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }

        if let Some(delay) = lookup("MADLIBS_RESTORE_DELAY_MS") {
            match delay.trim().parse::<u64>() {
                Ok(ms) => config.restore_delay = Duration::from_millis(ms),
                Err(err) => tracing::debug!(%delay, %err, "ignoring MADLIBS_RESTORE_DELAY_MS"),
            }
        }

        config.log_path = lookup("MADLIBS_LOG")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        config
    }
}

fn parse_categories(value: &str) -> Vec<Category> {
    let mut categories = Vec::new();
    for name in value.split(',') {
        if let Some(category) = Category::from_label(name.trim()) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    categories
}
