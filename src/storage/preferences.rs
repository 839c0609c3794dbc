use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{keys, load, save, KeyValueStore};
use crate::error::{BurpError, BurpResult};

/// Colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Black,
    White,
    Grey,
}

/// Colours a theme resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
}

impl Theme {
    pub fn palette(&self) -> Palette {
        match self {
            Theme::Black => Palette {
                background: "linear-gradient(135deg, #000000 0%, #1a1a1a 50%, #000000 100%)",
                text: "#ffffff",
                muted: "rgba(255, 255, 255, 0.6)",
            },
            Theme::White => Palette {
                background: "linear-gradient(135deg, #ffffff 0%, #f8f9fa 50%, #ffffff 100%)",
                text: "#000000",
                muted: "rgba(0, 0, 0, 0.6)",
            },
            Theme::Grey => Palette {
                background: "linear-gradient(135deg, #6c757d 0%, #495057 50%, #6c757d 100%)",
                text: "#ffffff",
                muted: "rgba(255, 255, 255, 0.6)",
            },
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = BurpError;

    fn from_str(s: &str) -> BurpResult<Self> {
        match s.to_lowercase().as_str() {
            "black" | "dark" => Ok(Theme::Black),
            "white" | "light" => Ok(Theme::White),
            "grey" | "gray" => Ok(Theme::Grey),
            _ => Err(BurpError::validation(format!("Unknown theme: {}", s))),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Black => write!(f, "black"),
            Theme::White => write!(f, "white"),
            Theme::Grey => write!(f, "grey"),
        }
    }
}

/// `appSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub auto_export: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Black,
            notifications: true,
            auto_export: false,
        }
    }
}

/// `user`: the locally logged-in account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub username: String,
    pub name: String,
    pub is_logged_in: bool,
}

impl UserAccount {
    pub fn logged_in(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            name: username.clone(),
            username,
            is_logged_in: true,
        }
    }
}

/// `userProfile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dob: String,
}

/// Typed access to the account, settings and profile keys
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored settings, defaults when none were saved
    pub async fn settings(&self) -> BurpResult<AppSettings> {
        Ok(load(self.store.as_ref(), keys::APP_SETTINGS)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> BurpResult<()> {
        save(self.store.as_ref(), keys::APP_SETTINGS, settings).await?;
        info!("Settings saved (theme {})", settings.theme);
        Ok(())
    }

    pub async fn user(&self) -> BurpResult<Option<UserAccount>> {
        let user: Option<UserAccount> = load(self.store.as_ref(), keys::USER).await?;
        Ok(user.filter(|u| u.is_logged_in))
    }

    pub async fn save_user(&self, user: &UserAccount) -> BurpResult<()> {
        save(self.store.as_ref(), keys::USER, user).await?;
        Ok(())
    }

    /// Forget the account and its profile
    pub async fn clear_user(&self) -> BurpResult<()> {
        self.store.remove(keys::USER).await?;
        self.store.remove(keys::USER_PROFILE).await?;
        Ok(())
    }

    pub async fn profile(&self) -> BurpResult<UserProfile> {
        Ok(load(self.store.as_ref(), keys::USER_PROFILE)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> BurpResult<()> {
        save(self.store.as_ref(), keys::USER_PROFILE, profile).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_settings_wire_shape() {
        let value = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(value, json!({"theme": "black", "notifications": true, "autoExport": false}));

        let parsed: AppSettings = serde_json::from_value(json!({"theme": "grey"})).unwrap();
        assert_eq!(parsed.theme, Theme::Grey);
        assert!(parsed.notifications);
    }

    #[test]
    fn test_theme_palettes() {
        assert_eq!(Theme::White.palette().text, "#000000");
        assert_eq!(Theme::Grey.palette().text, "#ffffff");
        assert!(Theme::Black.palette().background.contains("#1a1a1a"));
        assert_eq!("Gray".parse::<Theme>().unwrap(), Theme::Grey);
        assert!("purple".parse::<Theme>().is_err());
    }

    #[tokio::test]
    async fn test_user_round_trip_and_logout() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert!(prefs.user().await.unwrap().is_none());

        prefs.save_user(&UserAccount::logged_in("tharun")).await.unwrap();
        prefs
            .save_profile(&UserProfile {
                name: "Tharun".into(),
                email: "tharun@burp.ai".into(),
                dob: "1995-01-01".into(),
            })
            .await
            .unwrap();

        let user = prefs.user().await.unwrap().unwrap();
        assert_eq!(user.name, "tharun");
        assert_eq!(prefs.profile().await.unwrap().email, "tharun@burp.ai");

        prefs.clear_user().await.unwrap();
        assert!(prefs.user().await.unwrap().is_none());
        assert_eq!(prefs.profile().await.unwrap(), UserProfile::default());
    }

    #[tokio::test]
    async fn test_settings_default_when_missing() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert_eq!(prefs.settings().await.unwrap(), AppSettings::default());

        let settings = AppSettings {
            theme: Theme::White,
            ..AppSettings::default()
        };
        prefs.save_settings(&settings).await.unwrap();
        assert_eq!(prefs.settings().await.unwrap().theme, Theme::White);
    }
}
