//! Social-marker detection over free-text responses.
//!
//! Detection sits behind [`MarkerDetector`] so the analyzer's aggregation does
//! not care which language or heuristic produced the flags. The shipped
//! [`KeywordMarkerDetector`] matches a [`MarkerVocabulary`] of phrases at word
//! boundaries; an entry ending in `*` matches as a word prefix.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "camelCase")]
pub enum Marker {
    AskBack,
    Gratitude,
    Help,
    Justify,
    Greeting,
    AssertiveRequest,
}

impl Marker {
    pub const ALL: [Marker; 6] = [
        Marker::AskBack,
        Marker::Gratitude,
        Marker::Help,
        Marker::Justify,
        Marker::Greeting,
        Marker::AssertiveRequest,
    ];
}

/// Independent marker flags for one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMarkers {
    pub ask_back: bool,
    pub gratitude: bool,
    pub help: bool,
    pub justify: bool,
    pub greeting: bool,
    pub assertive_request: bool,
}

impl SocialMarkers {
    pub fn get(&self, marker: Marker) -> bool {
        match marker {
            Marker::AskBack => self.ask_back,
            Marker::Gratitude => self.gratitude,
            Marker::Help => self.help,
            Marker::Justify => self.justify,
            Marker::Greeting => self.greeting,
            Marker::AssertiveRequest => self.assertive_request,
        }
    }

    pub fn any(&self) -> bool {
        Marker::ALL.iter().any(|m| self.get(*m))
    }
}

/// Strategy turning a response text into marker flags
pub trait MarkerDetector: Send + Sync {
    fn detect(&self, text: &str) -> SocialMarkers;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerVocabulary {
    /// A `?` anywhere counts as asking back
    pub question_mark_asks_back: bool,
    pub ask_back: Vec<String>,
    pub gratitude: Vec<String>,
    pub help: Vec<String>,
    pub justify: Vec<String>,
    pub greeting: Vec<String>,
    pub assertive_request: Vec<String>,
}

impl MarkerVocabulary {
    pub fn portuguese() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            question_mark_asks_back: true,
            ask_back: list(&["e você", "e vc", "e tu"]),
            gratitude: list(&["obrigad*", "valeu", "agradeç*"]),
            help: list(&[
                "me ajuda",
                "me ajude",
                "pode me ajudar",
                "preciso de ajuda",
            ]),
            justify: list(&[
                "porque",
                "por que",
                "pois",
                "é que",
                "agora não",
                "depois eu",
                "mais tarde",
                "não posso",
            ]),
            greeting: list(&["oi", "olá", "oiê", "bom dia", "boa tarde", "boa noite"]),
            assertive_request: list(&[
                "posso",
                "quero",
                "eu preciso",
                "poderia",
                "você pode",
                "me empresta",
                "me dá",
                "me passa",
            ]),
        }
    }
}

impl Default for MarkerVocabulary {
    fn default() -> Self {
        Self::portuguese()
    }
}

/// Word-boundary keyword matcher built from a [`MarkerVocabulary`]
#[derive(Debug, Clone)]
pub struct KeywordMarkerDetector {
    question_mark_asks_back: bool,
    ask_back: Option<Regex>,
    gratitude: Option<Regex>,
    help: Option<Regex>,
    justify: Option<Regex>,
    greeting: Option<Regex>,
    assertive_request: Option<Regex>,
}

impl KeywordMarkerDetector {
    pub fn new(vocabulary: &MarkerVocabulary) -> Self {
        Self {
            question_mark_asks_back: vocabulary.question_mark_asks_back,
            ask_back: compile(Marker::AskBack, &vocabulary.ask_back),
            gratitude: compile(Marker::Gratitude, &vocabulary.gratitude),
            help: compile(Marker::Help, &vocabulary.help),
            justify: compile(Marker::Justify, &vocabulary.justify),
            greeting: compile(Marker::Greeting, &vocabulary.greeting),
            assertive_request: compile(Marker::AssertiveRequest, &vocabulary.assertive_request),
        }
    }
}

impl Default for KeywordMarkerDetector {
    fn default() -> Self {
        Self::new(&MarkerVocabulary::portuguese())
    }
}

impl MarkerDetector for KeywordMarkerDetector {
    fn detect(&self, text: &str) -> SocialMarkers {
        let t = text.to_lowercase();
        let hit = |re: &Option<Regex>| re.as_ref().is_some_and(|re| re.is_match(&t));

        SocialMarkers {
            ask_back: (self.question_mark_asks_back && t.contains('?')) || hit(&self.ask_back),
            gratitude: hit(&self.gratitude),
            help: hit(&self.help),
            justify: hit(&self.justify),
            greeting: hit(&self.greeting),
            assertive_request: hit(&self.assertive_request),
        }
    }
}

fn compile(marker: Marker, phrases: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty() && p != "*")
        .map(|p| match p.strip_suffix('*') {
            Some(stem) => format!(r"{}\w*", regex::escape(stem)),
            None => format!(r"{}\b", regex::escape(&p)),
        })
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    let pattern = format!(r"\b(?:{})", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(%marker, %err, "marker vocabulary did not compile, marker disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> SocialMarkers {
        KeywordMarkerDetector::default().detect(text)
    }

    #[test]
    fn test_ask_back_by_question_mark_and_phrase() {
        assert!(detect("Estou bem, e você?").ask_back);
        assert!(detect("tudo certo e vc").ask_back);
        assert!(detect("Tudo bem?").ask_back);
        assert!(!detect("Estou bem.").ask_back);
    }

    #[test]
    fn test_gratitude_prefixes() {
        assert!(detect("Obrigado!").gratitude);
        assert!(detect("muito obrigada").gratitude);
        assert!(detect("Valeu").gratitude);
        assert!(detect("agradeço a ajuda").gratitude);
        assert!(!detect("desobrigado").gratitude);
    }

    #[test]
    fn test_help_justify_greeting_request() {
        let m = detect("Oi, você pode me ajudar? É que agora não consigo");
        assert!(m.greeting);
        assert!(m.help);
        assert!(m.justify);
        assert!(m.assertive_request);
        assert!(m.ask_back);
        assert!(!m.gratitude);
        assert!(m.any());
    }

    #[test]
    fn test_greeting_requires_word_boundary() {
        assert!(detect("oiê").greeting);
        assert!(detect("Bom dia!").greeting);
        assert!(!detect("oito horas").greeting);
    }

    #[test]
    fn test_plain_text_has_no_markers() {
        let m = detect("Estou em casa.");
        assert_eq!(m, SocialMarkers::default());
        assert!(!m.any());
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = MarkerVocabulary {
            question_mark_asks_back: false,
            ask_back: vec!["and you".into()],
            gratitude: vec!["thank*".into()],
            help: vec![],
            justify: vec!["because".into()],
            greeting: vec!["hello".into()],
            assertive_request: vec!["can i".into()],
        };
        let detector = KeywordMarkerDetector::new(&vocab);

        let m = detector.detect("Hello! Thanks, and you");
        assert!(m.greeting);
        assert!(m.gratitude);
        assert!(m.ask_back);
        assert!(!m.help);

        // question marks only count when enabled
        assert!(!detector.detect("really?").ask_back);
    }

    #[test]
    fn test_vocabulary_partial_json_uses_defaults() {
        let vocab: MarkerVocabulary = serde_json::from_str(r#"{"greeting": ["hey"]}"#).unwrap();
        assert_eq!(vocab.greeting, vec!["hey".to_string()]);
        assert_eq!(vocab.gratitude, MarkerVocabulary::portuguese().gratitude);
    }
}
