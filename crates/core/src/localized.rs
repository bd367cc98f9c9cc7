//! Text that is either language-neutral or translated per language.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::LanguageId;

/// A display string as stored by the catalog.
///
/// Resolution to a concrete string is total: it either yields text or fails with
/// [`TranslationMissing`]. There is no fallback language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizedText {
    Plain(String),
    PerLanguage(BTreeMap<LanguageId, String>),
}

/// The requested language has no entry in a per-language value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no translation for language {language_id}")]
pub struct TranslationMissing {
    pub language_id: LanguageId,
}

impl LocalizedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn per_language<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (LanguageId, S)>,
        S: Into<String>,
    {
        Self::PerLanguage(entries.into_iter().map(|(l, s)| (l, s.into())).collect())
    }

    /// Resolve the text for `language_id`.
    pub fn resolve(&self, language_id: LanguageId) -> Result<&str, TranslationMissing> {
        match self {
            LocalizedText::Plain(text) => Ok(text.as_str()),
            LocalizedText::PerLanguage(map) => map
                .get(&language_id)
                .map(String::as_str)
                .ok_or(TranslationMissing { language_id }),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for LocalizedText {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(id: u32) -> LanguageId {
        LanguageId::new(id).unwrap()
    }

    #[test]
    fn plain_text_ignores_language() {
        let text = LocalizedText::plain("Mug");
        assert_eq!(text.resolve(lang(1)).unwrap(), "Mug");
        assert_eq!(text.resolve(lang(9)).unwrap(), "Mug");
    }

    #[test]
    fn per_language_picks_requested_entry() {
        let text = LocalizedText::per_language([(lang(1), "Mug"), (lang(2), "Tasse")]);
        assert_eq!(text.resolve(lang(2)).unwrap(), "Tasse");
    }

    #[test]
    fn per_language_without_entry_fails() {
        let text = LocalizedText::per_language([(lang(1), "Mug")]);
        let err = text.resolve(lang(3)).unwrap_err();
        assert_eq!(err.language_id, lang(3));
    }
}
