// Theme configuration
// Supports: built-in light/dark themes, "system" (follow the OS), and custom JSON themes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Result;
use crate::migration::THEME_IN_USE;
use crate::settings::SettingsHandler;

/// Prefix marking a custom theme in theme names (`custom-<name>`).
pub const CUSTOM_THEME_PREFIX: &str = "custom-";

/// Setting holding the list of custom themes the user added.
pub const CUSTOM_THEMES_SETTING: &str = "custom_themes";

/// Value of the `theme_in_use` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    /// Follow the OS color-scheme preference
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Theme> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }

    /// Quick light/dark toggle: dark goes to light, everything else to dark.
    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light | Theme::System => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied theme, as stored in the `custom_themes` setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTheme {
    pub name: String,
    #[serde(default)]
    pub is_dark: bool,
    /// Color overrides; opaque here, consumed by whatever renders the theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Value>,
}

/// Look up a custom theme by name in the raw `custom_themes` value.
///
/// Entries that fail to deserialize are skipped rather than failing the lookup.
pub fn find_custom_theme(custom_themes: &Value, name: &str) -> Option<CustomTheme> {
    custom_themes
        .as_array()?
        .iter()
        .filter_map(|entry| serde_json::from_value::<CustomTheme>(entry.clone()).ok())
        .find(|theme| theme.name == name)
}

/// Light/dark bucket for consumers that can't render arbitrary themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleTheme {
    Light,
    Dark,
}

impl SimpleTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimpleTheme::Light => "light",
            SimpleTheme::Dark => "dark",
        }
    }
}

impl fmt::Display for SimpleTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse any theme name to light or dark.
///
/// Custom themes go by their own `is_dark` flag. Everything else (including
/// legacy-light/legacy-dark) is light if the name mentions "light", and dark
/// otherwise, dark having been the only state once.
pub fn simplify_theme(
    theme: &str,
    lookup_custom: impl FnOnce(&str) -> Option<CustomTheme>,
) -> SimpleTheme {
    if let Some(custom_name) = theme.strip_prefix(CUSTOM_THEME_PREFIX) {
        match lookup_custom(custom_name) {
            Some(custom) if custom.is_dark => return SimpleTheme::Dark,
            Some(_) => return SimpleTheme::Light,
            None => log::warn!("Unknown custom theme '{}', guessing from its name", custom_name),
        }
    }

    if theme.contains("light") {
        SimpleTheme::Light
    } else {
        SimpleTheme::Dark
    }
}

/// Fallbacks for theme settings that have no stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeDefaults {
    pub theme_in_use: Theme,
    pub light_theme: String,
    pub dark_theme: String,
}

impl Default for ThemeDefaults {
    fn default() -> Self {
        Self {
            theme_in_use: Theme::Light,
            light_theme: "light".into(),
            dark_theme: "dark".into(),
        }
    }
}

/// Flip `theme_in_use` between light and dark (system counts as light).
///
/// Returns the theme that was written.
pub fn toggle_theme_in_use(
    settings: &dyn SettingsHandler,
    defaults: &ThemeDefaults,
) -> Result<Theme> {
    let current = settings
        .get_value(THEME_IN_USE, None)?
        .as_str()
        .and_then(Theme::parse)
        .unwrap_or(defaults.theme_in_use);
    let next = current.toggled();
    settings.set_value(THEME_IN_USE, None, Value::String(next.as_str().to_string()))?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_custom(_: &str) -> Option<CustomTheme> {
        None
    }

    #[test]
    fn test_theme_parse_roundtrip() {
        for theme in [Theme::Light, Theme::Dark, Theme::System] {
            assert_eq!(Theme::parse(theme.as_str()), Some(theme));
        }
        assert_eq!(Theme::parse("purple"), None);
    }

    #[test]
    fn test_toggle() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::System.toggled(), Theme::Dark);
    }

    #[test]
    fn test_simplify_by_name() {
        assert_eq!(simplify_theme("legacy-light", no_custom), SimpleTheme::Light);
        assert_eq!(simplify_theme("light-high-contrast", no_custom), SimpleTheme::Light);
        assert_eq!(simplify_theme("midnight", no_custom), SimpleTheme::Dark);
        assert_eq!(simplify_theme("legacy-dark", no_custom), SimpleTheme::Dark);
    }

    #[test]
    fn test_simplify_custom_uses_flag() {
        let themes = json!([
            {"name": "Paper", "is_dark": false, "colors": {"accent-color": "#0dbd8b"}},
            {"name": "Dimmed", "is_dark": true}
        ]);
        let lookup = |name: &str| find_custom_theme(&themes, name);

        // The flag beats the name: "Paper" has no "light" in it
        assert_eq!(simplify_theme("custom-Paper", lookup), SimpleTheme::Light);
        assert_eq!(simplify_theme("custom-Dimmed", lookup), SimpleTheme::Dark);
        assert_eq!(simplify_theme("custom-Missing", lookup), SimpleTheme::Dark);
    }

    #[test]
    fn test_find_custom_theme_skips_bad_entries() {
        let themes = json!([{"is_dark": true}, "junk", {"name": "Ok"}]);
        let found = find_custom_theme(&themes, "Ok").unwrap();
        assert!(!found.is_dark);
        assert_eq!(find_custom_theme(&json!(null), "Ok"), None);
    }
}
