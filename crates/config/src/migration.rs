//! Legacy setting names and the rules that map them onto current ones.
//!
//! Older installs stored some settings under different keys or combined
//! several settings into one field. These rules are applied lazily on every
//! read and write so an untouched legacy store keeps reading correctly, and
//! the first write to an affected setting rewrites the blob in current form.

use serde_json::{Map, Value};

use crate::theme::Theme;

pub const THEME_IN_USE: &str = "theme_in_use";
pub const LIGHT_THEME: &str = "light_theme";
pub const DARK_THEME: &str = "dark_theme";
pub const LAYOUT: &str = "layout";

/// Single theme field used before light/dark themes were split.
pub const LEGACY_THEME: &str = "theme";
/// Boolean that predates `theme_in_use = "system"`.
pub const LEGACY_USE_SYSTEM_THEME: &str = "use_system_theme";
/// Booleans replaced by the `layout` enum.
pub const LEGACY_LAYOUT_FIELDS: [&str; 2] = ["useBubbleLayout", "useIRCLayout"];

/// Logical setting name -> legacy storage key, for settings kept as
/// standalone booleans outside the settings blob.
pub const BOOLEAN_ALIASES: &[(&str, &str)] = &[
    ("notificationsEnabled", "notifications_enabled"),
    ("notificationBodyEnabled", "notifications_body_enabled"),
    ("audioNotificationsEnabled", "audio_notifications_enabled"),
];

pub fn boolean_alias(setting: &str) -> Option<&'static str> {
    BOOLEAN_ALIASES
        .iter()
        .find(|(name, _)| *name == setting)
        .map(|(_, key)| *key)
}

/// The three settings whose stored values a theme write may touch.
pub fn is_theme_setting(setting: &str) -> bool {
    matches!(setting, THEME_IN_USE | LIGHT_THEME | DARK_THEME)
}

/// Loose truthiness, matching how values written by older clients are judged.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn uses_system_theme(blob: &Map<String, Value>) -> bool {
    blob.get(LEGACY_USE_SYSTEM_THEME).is_some_and(is_truthy)
}

/// The legacy combined theme, when it is still in effect.
pub fn legacy_single_theme(blob: &Map<String, Value>) -> Option<&Value> {
    blob.get(LEGACY_THEME)
        .filter(|theme| is_truthy(theme) && !uses_system_theme(blob))
}

/// Read `theme_in_use`: the legacy system flag wins over the stored value.
pub fn read_theme_in_use(blob: &Map<String, Value>) -> Value {
    if uses_system_theme(blob) {
        return Value::String(Theme::System.as_str().to_string());
    }
    blob.get(THEME_IN_USE).cloned().unwrap_or(Value::Null)
}

/// Read `light_theme` / `dark_theme`: a legacy single theme overrides both.
pub fn read_mode_theme(blob: &Map<String, Value>, setting: &str) -> Value {
    if let Some(theme) = legacy_single_theme(blob) {
        return theme.clone();
    }
    blob.get(setting).cloned().unwrap_or(Value::Null)
}

/// Fold the legacy theme fields into current ones ahead of writing `target`.
///
/// The legacy theme is copied to every theme field the caller is not about
/// to overwrite, then both legacy fields are dropped.
pub fn migrate_theme_fields(blob: &mut Map<String, Value>, target: &str) {
    if let Some(theme) = legacy_single_theme(blob).cloned() {
        if target != LIGHT_THEME {
            blob.insert(LIGHT_THEME.to_string(), theme.clone());
        }
        if target != DARK_THEME {
            blob.insert(DARK_THEME.to_string(), theme);
        }
    }
    blob.remove(LEGACY_USE_SYSTEM_THEME);
    blob.remove(LEGACY_THEME);
}

pub fn strip_legacy_layout(blob: &mut Map<String, Value>) {
    for field in LEGACY_LAYOUT_FIELDS {
        blob.remove(field);
    }
}
