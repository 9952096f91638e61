//! Display preferences. Stored outside the identity so they survive logout.

use crate::db::DatabaseError;
use crate::models::enums::Theme;
use crate::store::{LocalStore, NOTIFICATIONS_KEY, THEME_KEY};

pub struct Preferences {
    store: LocalStore,
}

impl Preferences {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Stored theme; light when unset or unrecognized.
    pub fn theme(&self) -> Result<Theme, DatabaseError> {
        let stored = self.store.get(THEME_KEY)?;
        Ok(stored
            .and_then(|t| t.parse().ok())
            .unwrap_or(Theme::Light))
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), DatabaseError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    /// On unless explicitly turned off.
    pub fn notifications_enabled(&self) -> Result<bool, DatabaseError> {
        Ok(self.store.get(NOTIFICATIONS_KEY)?.as_deref() != Some("false"))
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.store
            .set(NOTIFICATIONS_KEY, if enabled { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let prefs = Preferences::new(LocalStore::open_in_memory().unwrap());
        assert_eq!(prefs.theme().unwrap(), Theme::Light);
        assert!(prefs.notifications_enabled().unwrap());
    }

    #[test]
    fn values_round_trip() {
        let prefs = Preferences::new(LocalStore::open_in_memory().unwrap());
        prefs.set_theme(Theme::Dark).unwrap();
        prefs.set_notifications_enabled(false).unwrap();
        assert_eq!(prefs.theme().unwrap(), Theme::Dark);
        assert!(!prefs.notifications_enabled().unwrap());
    }

    #[test]
    fn unknown_theme_falls_back_to_light() {
        let store = LocalStore::open_in_memory().unwrap();
        store.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(Preferences::new(store).theme().unwrap(), Theme::Light);
    }
}
