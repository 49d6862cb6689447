//! Translation loader and email template rendering
//!
//! Translation files live in `{translations_dir}/{lang}.json`. Email templates
//! are stored under `email.{template}.subject` and `email.{template}.body`;
//! `{name}` placeholders are filled from the email data of the outbox row.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::I18nConfig;
use crate::models::EmailTemplate;
use crate::utils::errors::{Result, SchoolEventsError};

/// Placeholder values by name
pub type TranslationParams = HashMap<String, String>;

/// Localized email templates
#[derive(Debug, Clone)]
pub struct I18n {
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
    translations_dir: PathBuf,
}

/// Subject and HTML body of a rendered email
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

impl I18n {
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            translations: HashMap::new(),
            default_language: config.default_language.clone(),
            supported_languages: config.supported_languages.clone(),
            translations_dir: PathBuf::from(&config.translations_dir),
        }
    }

    /// Read `{lang}.json` for every supported language; only the default language is mandatory
    pub async fn load_translations(&mut self) -> Result<()> {
        for lang in self.supported_languages.clone() {
            let file = self.translations_dir.join(format!("{}.json", lang));
            let loaded = match fs::read_to_string(&file).await {
                Ok(content) => serde_json::from_str(&content)
                    .map_err(SchoolEventsError::from)
                    .and_then(|document| self.insert_language(&lang, document)),
                Err(e) => Err(SchoolEventsError::from(e)),
            };

            match loaded {
                Ok(()) => info!(language = %lang, "Translations loaded"),
                Err(e) if lang == self.default_language => {
                    return Err(SchoolEventsError::Config(format!(
                        "Default language translations {} unusable: {}",
                        file.display(),
                        e
                    )))
                }
                Err(e) => warn!(language = %lang, file = %file.display(), error = %e, "Translations skipped"),
            }
        }

        Ok(())
    }

    /// Register translations for a language from an already parsed document
    pub fn insert_language(&mut self, lang: &str, document: Value) -> Result<()> {
        let Value::Object(map) = document else {
            return Err(SchoolEventsError::Config(format!("Invalid translation file format for {}", lang)));
        };
        debug!(language = %lang, sections = map.len(), "Translation document registered");
        self.translations.insert(lang.to_string(), map);
        Ok(())
    }

    /// Render subject and body of an email template
    ///
    /// Placeholder values are HTML-escaped in the body; the subject is a
    /// plain-text header and gets them verbatim.
    pub fn render_email(&self, template: EmailTemplate, lang: &str, data: &Value) -> Result<RenderedEmail> {
        let subject_key = format!("email.{}.subject", template.as_str());
        let body_key = format!("email.{}.body", template.as_str());

        let (subject, body) = [self.effective_language(lang), self.default_language.as_str()]
            .into_iter()
            .find_map(|l| Some((self.lookup(&subject_key, l)?, self.lookup(&body_key, l)?)))
            .ok_or_else(|| SchoolEventsError::Config(format!("Missing email template: {}", template)))?;

        let params = params_from_json(data);
        Ok(RenderedEmail {
            subject: fill_placeholders(subject, &params, false),
            html: fill_placeholders(body, &params, true),
        })
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    /// Pick a supported language from a stored preference or `Accept-Language`
    pub fn detect_language(&self, preferred: Option<&str>) -> String {
        let Some(raw) = preferred else {
            return self.default_language.clone();
        };

        let code = raw.split(['-', '_', ',', ';']).next().unwrap_or(raw).to_lowercase();
        // Czech is stored as "cz"
        let code = if code == "cs" { "cz".to_string() } else { code };
        if self.is_language_supported(&code) {
            code
        } else {
            self.default_language.clone()
        }
    }

    fn effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.is_language_supported(lang) && self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    /// Dotted lookup into the nested document, e.g. `email.user_registration.subject`
    fn lookup(&self, key: &str, lang: &str) -> Option<&str> {
        let mut parts = key.split('.');
        let mut current = self.translations.get(lang)?.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        current.as_str()
    }
}

/// Flatten top-level JSON fields into placeholder values
fn params_from_json(data: &Value) -> TranslationParams {
    let Value::Object(map) = data else {
        return TranslationParams::new();
    };

    map.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

fn fill_placeholders(template: &str, params: &TranslationParams, html: bool) -> String {
    params.iter().fold(template.to_string(), |text, (key, value)| {
        let value = if html { escape_html(value) } else { value.clone() };
        text.replace(&format!("{{{}}}", key), &value)
    })
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_i18n() -> I18n {
        let config = I18nConfig {
            default_language: "sk".to_string(),
            supported_languages: vec!["en".to_string(), "sk".to_string(), "cz".to_string()],
            translations_dir: "translations".to_string(),
        };
        let mut i18n = I18n::new(&config);
        i18n.insert_language("sk", json!({
            "email": {
                "user_registration": {
                    "subject": "Registrácia {first_name}",
                    "body": "<p>Dobrý deň {first_name} {last_name}</p>"
                },
                "report_ready": {"subject": "Report", "body": "<p>Report {report_id}</p>"}
            }
        })).unwrap();
        i18n.insert_language("en", json!({
            "email": {
                "user_registration": {
                    "subject": "Welcome {first_name}",
                    "body": "<p>Hello {first_name} {last_name}</p>"
                }
            }
        })).unwrap();
        i18n
    }

    #[test]
    fn test_render_email_in_requested_language() {
        let i18n = create_test_i18n();
        let rendered = i18n
            .render_email(EmailTemplate::UserRegistration, "en", &json!({"first_name": "Jana", "last_name": "Nová"}))
            .unwrap();
        assert_eq!(rendered.subject, "Welcome Jana");
        assert_eq!(rendered.html, "<p>Hello Jana Nová</p>");
    }

    #[test]
    fn test_render_email_falls_back_to_default_language() {
        let i18n = create_test_i18n();
        // no Czech file loaded and no English report_ready template
        let rendered = i18n.render_email(EmailTemplate::ReportReady, "cz", &json!({"report_id": 4})).unwrap();
        assert_eq!(rendered.html, "<p>Report 4</p>");
        let rendered = i18n.render_email(EmailTemplate::ReportReady, "en", &json!({"report_id": 5})).unwrap();
        assert_eq!(rendered.html, "<p>Report 5</p>");
    }

    #[test]
    fn test_placeholders_are_escaped_in_body_only() {
        let i18n = create_test_i18n();
        let rendered = i18n
            .render_email(
                EmailTemplate::UserRegistration,
                "en",
                &json!({"first_name": "<script>alert('x')</script>", "last_name": "Tom & Jerry"}),
            )
            .unwrap();
        assert_eq!(
            rendered.html,
            "<p>Hello &lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; Tom &amp; Jerry</p>"
        );
        assert_eq!(rendered.subject, "Welcome <script>alert('x')</script>");
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let i18n = create_test_i18n();
        assert!(i18n.render_email(EmailTemplate::UserResetPassword, "sk", &json!({})).is_err());
    }

    #[test]
    fn test_language_detection() {
        let i18n = create_test_i18n();
        assert_eq!(i18n.detect_language(Some("en-US")), "en");
        assert_eq!(i18n.detect_language(Some("cs-CZ,cs;q=0.9")), "cz");
        assert_eq!(i18n.detect_language(Some("fr")), "sk");
        assert_eq!(i18n.detect_language(None), "sk");
    }

    #[test]
    fn test_placeholder_filling() {
        let mut params = TranslationParams::new();
        params.insert("name".to_string(), "Jana".to_string());
        params.insert("count".to_string(), "5".to_string());

        let result = fill_placeholders("Hello {name}, you have {count} seats", &params, false);
        assert_eq!(result, "Hello Jana, you have 5 seats");
    }

    #[tokio::test]
    async fn test_shipped_translations_cover_every_template() {
        let config = I18nConfig {
            default_language: "sk".to_string(),
            supported_languages: vec!["en".to_string(), "sk".to_string(), "cz".to_string()],
            translations_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/translations").to_string(),
        };
        let mut i18n = I18n::new(&config);
        i18n.load_translations().await.unwrap();
        for lang in ["en", "sk", "cz"] {
            for template in EmailTemplate::ALL {
                let key = format!("email.{}.subject", template.as_str());
                assert!(i18n.lookup(&key, lang).is_some(), "{} missing in {}", key, lang);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_default_language_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = I18nConfig {
            default_language: "sk".to_string(),
            supported_languages: vec!["sk".to_string()],
            translations_dir: dir.path().to_string_lossy().into_owned(),
        };
        let mut i18n = I18n::new(&config);
        assert!(i18n.load_translations().await.is_err());
    }
}
