//! Persisted preferences
//!
//! The UI language and theme, stored as plain strings under fixed keys.
//! Read once at startup; written whenever they change. A missing or
//! unrecognized value means "use the default".

use crate::events::{EventBus, Payload, topics};
use crate::platform::{KeyValueStore, PlatformError};
use std::cell::RefCell;
use std::rc::Rc;

pub const LANGUAGE_KEY: &str = "simplets_language";
pub const THEME_KEY: &str = "preferredTheme";

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_THEME: &str = "dark";

/// Supported languages: (code, display name)
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("es", "Español")];

/// Supported themes: (name, display name)
pub const THEMES: &[(&str, &str)] = &[("dark", "Dark"), ("light", "Light")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    UnsupportedLanguage(String),
    UnsupportedTheme(String),
    /// The store refused a read or write
    Store(PlatformError),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::UnsupportedLanguage(code) => write!(
                f,
                "Invalid language '{}'. Available languages: {}",
                code,
                codes(LANGUAGES)
            ),
            SettingsError::UnsupportedTheme(name) => write!(
                f,
                "Invalid theme '{}'. Available themes: {}",
                name,
                codes(THEMES)
            ),
            SettingsError::Store(e) => write!(f, "preference store failed: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlatformError> for SettingsError {
    fn from(e: PlatformError) -> Self {
        SettingsError::Store(e)
    }
}

fn codes(table: &[(&str, &str)]) -> String {
    table.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", ")
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], code: &str) -> Option<(&'a str, &'a str)> {
    table.iter().copied().find(|(c, _)| *c == code)
}

/// Display name for a language code
pub fn language_name(code: &str) -> Option<&'static str> {
    lookup(LANGUAGES, code).map(|(_, name)| name)
}

pub fn theme_name(name: &str) -> Option<&'static str> {
    lookup(THEMES, name).map(|(_, display)| display)
}

pub struct Settings {
    store: Rc<dyn KeyValueStore>,
    bus: Rc<EventBus>,
    language: RefCell<String>,
    theme: RefCell<String>,
}

impl Settings {
    /// Read stored preferences, falling back to defaults
    pub fn load(store: Rc<dyn KeyValueStore>, bus: Rc<EventBus>) -> Self {
        let language = read(&*store, LANGUAGE_KEY, LANGUAGES, DEFAULT_LANGUAGE);
        let theme = read(&*store, THEME_KEY, THEMES, DEFAULT_THEME);
        tracing::debug!(%language, %theme, "settings loaded");
        Self {
            store,
            bus,
            language: RefCell::new(language),
            theme: RefCell::new(theme),
        }
    }

    pub fn language(&self) -> String {
        self.language.borrow().clone()
    }

    pub fn theme(&self) -> String {
        self.theme.borrow().clone()
    }

    /// Switch language, persist it and announce `language:changed`
    pub fn set_language(&self, code: &str) -> Result<&'static str, SettingsError> {
        let code = code.trim().to_lowercase();
        let (code, name) = lookup(LANGUAGES, &code)
            .ok_or_else(|| SettingsError::UnsupportedLanguage(code.clone()))?;
        *self.language.borrow_mut() = code.to_string();
        if let Err(e) = self.persist(LANGUAGE_KEY, code) {
            tracing::warn!(key = LANGUAGE_KEY, "{}", e);
        }
        self.bus.emit(topics::LANGUAGE_CHANGED, Payload::text(code));
        Ok(name)
    }

    /// Switch theme, persist it and announce `theme:changed`
    pub fn set_theme(&self, name: &str) -> Result<&'static str, SettingsError> {
        let name = name.trim().to_lowercase();
        let (name, display) =
            lookup(THEMES, &name).ok_or_else(|| SettingsError::UnsupportedTheme(name.clone()))?;
        *self.theme.borrow_mut() = name.to_string();
        if let Err(e) = self.persist(THEME_KEY, name) {
            tracing::warn!(key = THEME_KEY, "{}", e);
        }
        self.bus.emit(topics::THEME_CHANGED, Payload::text(name));
        Ok(display)
    }

    /// Write one preference. A failure leaves the in-memory value as set.
    fn persist(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        Ok(self.store.set(key, value)?)
    }
}

fn read(store: &dyn KeyValueStore, key: &str, table: &[(&str, &str)], default: &str) -> String {
    match store.get(key) {
        Ok(Some(value)) if lookup(table, &value).is_some() => value,
        Ok(Some(value)) => {
            tracing::warn!(key, %value, "ignoring unsupported stored value");
            default.to_string()
        }
        Ok(None) => default.to_string(),
        Err(e) => {
            tracing::warn!(key, "{}", SettingsError::from(e));
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryStore;

    fn settings(store: Rc<MemoryStore>) -> (Rc<EventBus>, Settings) {
        let bus = Rc::new(EventBus::new());
        let settings = Settings::load(store, Rc::clone(&bus));
        (bus, settings)
    }

    #[test]
    fn test_defaults_when_store_empty() {
        let (_, s) = settings(Rc::new(MemoryStore::new()));
        assert_eq!(s.language(), "en");
        assert_eq!(s.theme(), "dark");
    }

    #[test]
    fn test_reads_stored_values() {
        let store = MemoryStore::with_entries([(LANGUAGE_KEY, "es"), (THEME_KEY, "light")]);
        let (_, s) = settings(Rc::new(store));
        assert_eq!(s.language(), "es");
        assert_eq!(s.theme(), "light");
    }

    #[test]
    fn test_unsupported_stored_value_falls_back() {
        let store = MemoryStore::with_entries([(LANGUAGE_KEY, "klingon")]);
        let (_, s) = settings(Rc::new(store));
        assert_eq!(s.language(), "en");
    }

    #[test]
    fn test_set_language_persists_and_emits() {
        let store = Rc::new(MemoryStore::new());
        let (bus, s) = settings(Rc::clone(&store));
        let seen = Rc::new(RefCell::new(None));
        let seen2 = Rc::clone(&seen);
        bus.on(topics::LANGUAGE_CHANGED, move |p| {
            *seen2.borrow_mut() = p.as_text().map(str::to_string);
            Ok(())
        });

        assert_eq!(s.set_language(" ES "), Ok("Español"));
        assert_eq!(s.language(), "es");
        assert_eq!(store.get(LANGUAGE_KEY).unwrap().as_deref(), Some("es"));
        assert_eq!(seen.borrow().as_deref(), Some("es"));
    }

    #[test]
    fn test_set_invalid_language() {
        let store = Rc::new(MemoryStore::new());
        let (_, s) = settings(Rc::clone(&store));
        let err = s.set_language("fr").unwrap_err();
        assert_eq!(err, SettingsError::UnsupportedLanguage("fr".into()));
        assert_eq!(err.to_string(), "Invalid language 'fr'. Available languages: en, es");
        assert_eq!(store.get(LANGUAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_theme() {
        let store = Rc::new(MemoryStore::new());
        let (_, s) = settings(Rc::clone(&store));
        assert_eq!(s.set_theme("light"), Ok("Light"));
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("light"));
        assert!(s.set_theme("neon").is_err());
        assert_eq!(s.theme(), "light");
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, PlatformError> {
            Err(PlatformError::Storage("quota exceeded".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), PlatformError> {
            Err(PlatformError::Storage("quota exceeded".into()))
        }
    }

    #[test]
    fn test_store_failure_is_not_fatal() {
        let bus = Rc::new(EventBus::new());
        let s = Settings::load(Rc::new(BrokenStore), bus);
        assert_eq!(s.language(), "en");

        assert_eq!(s.set_language("es"), Ok("Español"));
        assert_eq!(s.language(), "es");

        let err = s.persist(THEME_KEY, "light").unwrap_err();
        assert_eq!(
            err,
            SettingsError::Store(PlatformError::Storage("quota exceeded".into()))
        );
        assert_eq!(
            err.to_string(),
            "preference store failed: storage error: quota exceeded"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
