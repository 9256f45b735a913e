//! # Classificador por Gazetteers e Regras
//!
//! Uma fonte de tokens rotulados que roda sem modelo estatístico: listas de
//! entidades conhecidas (gazetteers), palavras de título que antecedem nomes
//! e expressões regulares por token. Serve para demonstração, testes e
//! domínios fechados; um classificador estatístico entra pelo mesmo trait
//! [`SequenceClassifier`].
//!
//! ## Formato do recurso (JSON)
//!
//! ```json
//! {
//!   "background": "O",
//!   "case_sensitive": false,
//!   "entities": { "PERSON": ["Barack Obama"], "ORGANIZATION": ["Petrobras"] },
//!   "titles":   { "PERSON": ["president", "dr."] },
//!   "patterns": { "DATE": ["^\\d{4}$"] }
//! }
//! ```
//!
//! ## Ordem das regras
//!
//! 1. Gazetteers de n-gramas: vence o casamento mais longo, da esquerda para a direita.
//! 2. Títulos: tokens capitalizados logo após um título recebem a tag do título.
//! 3. Padrões regex: aplicados aos tokens ainda sem tag.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};
use crate::tagger::{Sentence, SequenceClassifier, TaggedToken, BACKGROUND_TAG};
use crate::tokenizer::{leading_gaps, split_sentences, tokenize, Token};

/// Forma serializada do modelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerModel {
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default)]
    pub case_sensitive: bool,
    /// tag → entidades conhecidas (uma ou mais palavras)
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    /// tag → palavras que precedem entidades dessa tag
    #[serde(default)]
    pub titles: BTreeMap<String, Vec<String>>,
    /// tag → expressões regulares aplicadas a um token inteiro
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<String>>,
}

fn default_background() -> String {
    BACKGROUND_TAG.to_string()
}

impl Default for GazetteerModel {
    fn default() -> Self {
        Self {
            background: default_background(),
            case_sensitive: false,
            entities: BTreeMap::new(),
            titles: BTreeMap::new(),
            patterns: BTreeMap::new(),
        }
    }
}

/// Classificador compilado a partir de um [`GazetteerModel`].
#[derive(Debug)]
pub struct GazetteerClassifier {
    background: String,
    case_sensitive: bool,
    /// (palavras, tag), da entrada mais longa para a mais curta
    entries: Vec<(Vec<String>, String)>,
    titles: HashMap<String, String>,
    patterns: Vec<(Regex, String)>,
}

impl GazetteerClassifier {
    /// Compila o modelo. Falha se alguma expressão regular for inválida.
    pub fn from_model(model: GazetteerModel) -> std::result::Result<Self, regex::Error> {
        let case_sensitive = model.case_sensitive;
        let normalize = |s: &str| {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };

        let mut entries: Vec<(Vec<String>, String)> = model
            .entities
            .iter()
            .flat_map(|(tag, names)| {
                names.iter().filter_map(move |name| {
                    let parts: Vec<String> = tokenize(name).iter().map(|t| normalize(&t.text)).collect();
                    (!parts.is_empty()).then(|| (parts, tag.clone()))
                })
            })
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let titles = model
            .titles
            .iter()
            .flat_map(|(tag, words)| words.iter().map(move |w| (normalize(w), tag.clone())))
            .collect();

        let mut patterns = Vec::new();
        for (tag, sources) in &model.patterns {
            for source in sources {
                patterns.push((Regex::new(source)?, tag.clone()));
            }
        }

        Ok(Self {
            background: model.background,
            case_sensitive,
            entries,
            titles,
            patterns,
        })
    }

    /// Lê e compila um modelo JSON. `id` identifica o recurso nos erros.
    pub fn from_slice(id: &str, bytes: &[u8]) -> Result<Self> {
        let model: GazetteerModel = serde_json::from_slice(bytes).map_err(|e| NerError::Deserialize {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_model(model).map_err(|e| NerError::Deserialize {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn normalize(&self, word: &str) -> String {
        if self.case_sensitive {
            word.to_string()
        } else {
            word.to_lowercase()
        }
    }

    /// Atribui uma tag a cada token da sentença.
    fn tag_sentence(&self, tokens: &[Token]) -> Vec<String> {
        let words: Vec<String> = tokens.iter().map(|t| self.normalize(&t.text)).collect();
        let n = words.len();
        let mut tags: Vec<Option<&str>> = vec![None; n];

        // 1. Gazetteers (casamento mais longo)
        let mut i = 0;
        while i < n {
            let found = self.entries.iter().find(|(parts, _)| {
                i + parts.len() <= n && parts.iter().zip(&words[i..]).all(|(p, w)| p == w)
            });
            match found {
                Some((parts, tag)) => {
                    for slot in &mut tags[i..i + parts.len()] {
                        *slot = Some(tag.as_str());
                    }
                    i += parts.len();
                }
                None => i += 1,
            }
        }

        // 2. Títulos: "President Lula" → Lula recebe a tag do título
        for i in 0..n {
            if tags[i].is_some() {
                continue;
            }
            let Some(tag) = self.titles.get(&words[i]) else {
                continue;
            };
            let mut j = i + 1;
            while j < n && tags[j].is_none() && is_capitalized(&tokens[j].text) {
                tags[j] = Some(tag.as_str());
                j += 1;
            }
        }

        // 3. Padrões regex
        for (i, token) in tokens.iter().enumerate() {
            if tags[i].is_some() {
                continue;
            }
            if let Some((_, tag)) = self.patterns.iter().find(|(re, _)| re.is_match(&token.text)) {
                tags[i] = Some(tag.as_str());
            }
        }

        tags.into_iter()
            .map(|tag| tag.unwrap_or(self.background.as_str()).to_string())
            .collect()
    }
}

impl SequenceClassifier for GazetteerClassifier {
    /// Cada token recebe o texto que o precede em `before`; só o último
    /// token carrega `after` (o sufixo do texto).
    fn classify(&self, text: &str) -> Vec<Sentence> {
        let tokens = tokenize(text);
        let Some(last) = tokens.last() else {
            return Vec::new();
        };
        let total = tokens.len();
        let trailing = &text[last.end..];
        let gaps = leading_gaps(text, &tokens);

        split_sentences(tokens)
            .into_iter()
            .map(|sentence| {
                let tags = self.tag_sentence(&sentence);
                sentence
                    .into_iter()
                    .zip(tags)
                    .map(|(token, tag)| {
                        let index = token.index;
                        let tagged = TaggedToken::new(token.text, tag).with_before(gaps[index]);
                        if index + 1 == total {
                            tagged.with_after(trailing)
                        } else {
                            tagged
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn background(&self) -> &str {
        &self.background
    }
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, AssemblerConfig};
    use crate::segment::{plain_text, Segment};

    fn classifier(json: &str) -> GazetteerClassifier {
        GazetteerClassifier::from_slice("test.json", json.as_bytes()).unwrap()
    }

    fn tags_of(sentences: &[Sentence]) -> Vec<&str> {
        sentences.iter().flatten().map(|t| t.tag.as_str()).collect()
    }

    #[test]
    fn test_longest_gazetteer_match_wins() {
        let c = classifier(
            r#"{"entities": {"PERSON": ["Obama"], "LOCATION": ["Rio de Janeiro"], "ORGANIZATION": ["Rio"]}}"#,
        );
        let sentences = c.classify("Obama visitou o Rio de Janeiro");
        assert_eq!(
            tags_of(&sentences),
            ["PERSON", "O", "O", "LOCATION", "LOCATION", "LOCATION"]
        );
    }

    #[test]
    fn test_title_rule() {
        let c = classifier(r#"{"titles": {"PERSON": ["president"]}}"#);
        let sentences = c.classify("the president Barack Obama spoke");
        assert_eq!(tags_of(&sentences), ["O", "O", "PERSON", "PERSON", "O"]);
    }

    #[test]
    fn test_pattern_rule() {
        let c = classifier(r#"{"patterns": {"DATE": ["^\\d{4}$"]}}"#);
        let sentences = c.classify("em 2023 e 12345");
        assert_eq!(tags_of(&sentences), ["O", "DATE", "O", "O"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let insensitive = classifier(r#"{"entities": {"ORGANIZATION": ["Apple"]}}"#);
        assert_eq!(tags_of(&insensitive.classify("apple")), ["ORGANIZATION"]);

        let sensitive = classifier(r#"{"case_sensitive": true, "entities": {"ORGANIZATION": ["Apple"]}}"#);
        assert_eq!(tags_of(&sensitive.classify("apple")), ["O"]);
    }

    #[test]
    fn test_gaps_are_attached() {
        let c = classifier("{}");
        let sentences = c.classify("  Olá, mundo. Tchau!\n");
        assert_eq!(sentences.len(), 2);
        let first = &sentences[0][0];
        assert_eq!(first.before.as_deref(), Some("  "));
        assert_eq!(first.after, None);
        let last = sentences[1].last().unwrap();
        assert_eq!(last.text, "!");
        assert_eq!(last.after.as_deref(), Some("\n"));
    }

    #[test]
    fn test_end_to_end_with_assembler() {
        let c = classifier(r#"{"entities": {"PERSON": ["Barack Obama"], "ORGANIZATION": ["Google"]}}"#);
        let text = "Barack Obama Google, e mais.";
        let segments = assemble(c.classify(text), &AssemblerConfig::new(c.background()));
        assert_eq!(
            segments,
            vec![
                Segment::span("PERSON", "Barack Obama"),
                Segment::text(" "),
                Segment::span("ORGANIZATION", "Google"),
                Segment::text(", e mais."),
            ]
        );
        assert_eq!(plain_text(&segments), text);
    }

    #[test]
    fn test_empty_text_has_no_sentences() {
        let c = classifier("{}");
        assert!(c.classify("").is_empty());
        assert!(c.classify("   ").is_empty());
    }

    #[test]
    fn test_invalid_model_is_a_deserialize_error() {
        let err = GazetteerClassifier::from_slice("bad.json", b"{not json").unwrap_err();
        assert!(matches!(err, NerError::Deserialize { .. }));

        let err = GazetteerClassifier::from_slice("bad.json", br#"{"patterns": {"X": ["("]}}"#).unwrap_err();
        assert!(matches!(err, NerError::Deserialize { .. }));
    }

    #[test]
    fn test_custom_background() {
        let c = classifier(r#"{"background": "OTHER"}"#);
        assert_eq!(c.background(), "OTHER");
        assert_eq!(tags_of(&c.classify("oi")), ["OTHER"]);
    }
}
