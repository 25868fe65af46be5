use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    De,
    Es,
    Fr,
    Ru,
}

pub fn system_locale() -> Locale {
    static DETECTED: OnceLock<Locale> = OnceLock::new();
    *DETECTED.get_or_init(detect_system_locale)
}

fn detect_system_locale() -> Locale {
    #[cfg(target_os = "macos")]
    if let Some(raw) = macos_apple_locale() {
        if let Some(locale) = parse_env_locale(&raw) {
            return locale;
        }
    }

    for key in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(raw) = std::env::var(key) {
            if let Some(locale) = parse_env_locale(&raw) {
                return locale;
            }
        }
    }
    Locale::En
}

fn parse_env_locale(raw: &str) -> Option<Locale> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let short = normalized
        .split(['.', '@'])
        .next()
        .unwrap_or(&normalized)
        .trim();
    if short.starts_with("de") {
        return Some(Locale::De);
    }
    if short.starts_with("es") {
        return Some(Locale::Es);
    }
    if short.starts_with("fr") {
        return Some(Locale::Fr);
    }
    if short.starts_with("ru") {
        return Some(Locale::Ru);
    }
    if short.starts_with("en") {
        return Some(Locale::En);
    }
    None
}

#[cfg(target_os = "macos")]
fn macos_apple_locale() -> Option<String> {
    let out = std::process::Command::new("defaults")
        .args(["read", "-g", "AppleLocale"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let value = String::from_utf8(out.stdout).ok()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn prompt_title(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Close all windows?",
        Locale::De => "Alle Fenster schließen?",
        Locale::Es => "¿Cerrar todas las ventanas?",
        Locale::Fr => "Fermer toutes les fenêtres ?",
        Locale::Ru => "Закрыть все окна?",
    }
}

pub fn prompt_message(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "This application has multiple windows open. What would you like to do?",
        Locale::De => "Diese Anwendung hat mehrere geöffnete Fenster. Was möchten Sie tun?",
        Locale::Es => "Esta aplicación tiene varias ventanas abiertas. ¿Qué deseas hacer?",
        Locale::Fr => "Cette application a plusieurs fenêtres ouvertes. Que voulez-vous faire ?",
        Locale::Ru => "У этого приложения открыто несколько окон. Что вы хотите сделать?",
    }
}

pub fn choice_quit_app(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Quit Application",
        Locale::De => "Anwendung beenden",
        Locale::Es => "Salir de la aplicación",
        Locale::Fr => "Quitter l'application",
        Locale::Ru => "Закрыть приложение",
    }
}

pub fn choice_close_window(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Close Current Window",
        Locale::De => "Aktuelles Fenster schließen",
        Locale::Es => "Cerrar ventana actual",
        Locale::Fr => "Fermer la fenêtre actuelle",
        Locale::Ru => "Закрыть текущее окно",
    }
}

pub fn choice_cancel(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Cancel",
        Locale::De => "Abbrechen",
        Locale::Es => "Cancelar",
        Locale::Fr => "Annuler",
        Locale::Ru => "Отмена",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_env_locales() {
        assert_eq!(parse_env_locale("de_DE.UTF-8"), Some(Locale::De));
        assert_eq!(parse_env_locale("en_US"), Some(Locale::En));
        assert_eq!(parse_env_locale("ru_RU.UTF-8"), Some(Locale::Ru));
        assert_eq!(parse_env_locale("fr_FR@euro"), Some(Locale::Fr));
        assert_eq!(parse_env_locale("es_ES"), Some(Locale::Es));
    }

    #[test]
    fn unknown_or_empty_locale_is_none() {
        assert_eq!(parse_env_locale(""), None);
        assert_eq!(parse_env_locale("zz_ZZ"), None);
        assert_eq!(parse_env_locale("   "), None);
    }

    #[test]
    fn every_locale_has_prompt_strings() {
        for locale in [Locale::En, Locale::De, Locale::Es, Locale::Fr, Locale::Ru] {
            assert!(!prompt_title(locale).is_empty());
            assert!(!prompt_message(locale).is_empty());
            assert!(!choice_quit_app(locale).is_empty());
            assert!(!choice_close_window(locale).is_empty());
            assert!(!choice_cancel(locale).is_empty());
        }
    }
}
