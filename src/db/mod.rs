pub mod models;

use models::{Theme, API_KEY_SETTING, THEME_SETTING};
use rusqlite::{params, Connection, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Durable key-value store for client preferences.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(app_dir: &Path) -> std::result::Result<Self, crate::error::AppError> {
        std::fs::create_dir_all(app_dir)?;
        let conn = Connection::open(app_dir.join("compliance-analyzer.db"))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn().query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Cached {
    api_key: String,
    theme: Theme,
}

/// Process-wide credential and theme. Values are restored once at startup and
/// written through on every change; nothing is validated.
pub struct Settings {
    db: Database,
    cached: Mutex<Cached>,
}

impl Settings {
    pub fn load(db: Database) -> Result<Self> {
        let api_key = db.get_setting(API_KEY_SETTING)?.unwrap_or_default();
        let theme = db
            .get_setting(THEME_SETTING)?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Ok(Self {
            db,
            cached: Mutex::new(Cached { api_key, theme }),
        })
    }

    fn cached(&self) -> MutexGuard<'_, Cached> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn api_key(&self) -> String {
        self.cached().api_key.clone()
    }

    pub fn has_api_key(&self) -> bool {
        !self.cached().api_key.trim().is_empty()
    }

    pub fn set_api_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            self.db.delete_setting(API_KEY_SETTING)?;
        } else {
            self.db.set_setting(API_KEY_SETTING, key)?;
        }
        self.cached().api_key = key.to_string();
        Ok(())
    }

    /// Key with the middle hidden, safe to print.
    pub fn masked_api_key(&self) -> Option<String> {
        let value = self.api_key();
        if value.is_empty() {
            return None;
        }
        let chars: Vec<char> = value.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            Some(format!("{}...{}", head, tail))
        } else {
            Some("*".repeat(chars.len()))
        }
    }

    pub fn theme(&self) -> Theme {
        self.cached().theme
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.db.set_setting(THEME_SETTING, theme.as_str())?;
        self.cached().theme = theme;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let settings = Settings::load(Database::open(dir.path()).unwrap()).unwrap();
            assert_eq!(settings.api_key(), "");
            assert_eq!(settings.theme(), Theme::Light);
            settings.set_api_key("sk-compliance-1234").unwrap();
            settings.set_theme(Theme::Dark).unwrap();
        }

        let settings = Settings::load(Database::open(dir.path()).unwrap()).unwrap();
        assert_eq!(settings.api_key(), "sk-compliance-1234");
        assert_eq!(settings.theme(), Theme::Dark);
    }

    #[test]
    fn test_clearing_api_key_removes_row() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(API_KEY_SETTING, "abc").unwrap();
        let settings = Settings::load(db).unwrap();
        assert!(settings.has_api_key());

        settings.set_api_key("").unwrap();
        assert!(!settings.has_api_key());
        assert_eq!(settings.db.get_setting(API_KEY_SETTING).unwrap(), None);
    }

    #[test]
    fn test_unknown_theme_falls_back_to_default() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(THEME_SETTING, "solarized").unwrap();
        let settings = Settings::load(db).unwrap();
        assert_eq!(settings.theme(), Theme::Light);
    }

    #[test]
    fn test_masked_api_key() {
        let settings = Settings::load(Database::open_in_memory().unwrap()).unwrap();
        assert_eq!(settings.masked_api_key(), None);
        settings.set_api_key("abcd1234efgh").unwrap();
        assert_eq!(settings.masked_api_key().as_deref(), Some("abcd...efgh"));
        settings.set_api_key("short").unwrap();
        assert_eq!(settings.masked_api_key().as_deref(), Some("*****"));
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
