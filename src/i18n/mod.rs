//! Internationalization module
//!
//! Localized email templates for English, Slovak and Czech recipients.

pub mod loader;

// Re-export commonly used i18n components
pub use loader::{I18n, RenderedEmail, TranslationParams};
