use super::{AppState, Console};
use crate::db::models::Theme;

pub fn api_key(state: &AppState, value: Option<String>, console: &Console) {
    match value {
        None => match state.settings.masked_api_key() {
            Some(masked) => console.print(format!("API key: {}", masked)),
            None => console.print("API key: not set"),
        },
        Some(value) => {
            // "-" clears the stored key
            let value = if value == "-" { String::new() } else { value };
            match state.settings.set_api_key(&value) {
                Ok(()) if value.is_empty() => console.notice("API key cleared"),
                Ok(()) => console.notice("API key saved"),
                Err(e) => console.error(e),
            }
        }
    }
}

pub fn theme(state: &AppState, value: Option<String>, console: &Console) {
    let theme = match value {
        None => {
            console.print(format!("Theme: {}", state.settings.theme()));
            return;
        }
        Some(value) if value == "toggle" => state.settings.theme().toggled(),
        Some(value) => match value.parse::<Theme>() {
            Ok(theme) => theme,
            Err(e) => {
                console.error(e);
                return;
            }
        },
    };
    match state.settings.set_theme(theme) {
        Ok(()) => console.notice(format!("Theme set to {}", theme)),
        Err(e) => console.error(e),
    }
}
