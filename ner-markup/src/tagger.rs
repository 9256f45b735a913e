//! # Contrato do Classificador de Sequências
//!
//! O classificador estatístico é um colaborador externo: dado um texto, ele
//! devolve uma lista de sentenças, cada uma uma lista de tokens rotulados.
//! Este módulo define apenas a forma desses tokens e o trait que qualquer
//! classificador deve implementar.
//!
//! ## Tags
//!
//! | Tag            | Significado                                  |
//! |----------------|----------------------------------------------|
//! | `O`            | Tag de fundo: o token não é entidade         |
//! | `PERSON`       | Pessoa (vira o elemento `person`)            |
//! | `ORGANIZATION` | Organização (vira o elemento `organization`) |
//! | `LOCATION`     | Local (vira o elemento `location`)           |
//!
//! Qualquer rótulo diferente da tag de fundo é tratado como entidade; a lista
//! acima é só o vocabulário usual dos modelos.
//!
//! ## Lacunas (gaps)
//!
//! Cada token carrega o texto exato que o precedia (`before`) e o que o seguia
//! (`after`) no original. `None` significa "lacuna não registrada" e
//! `Some("")` significa "lacuna de tamanho zero"; as duas situações são
//! distintas e o montador trata cada uma de forma diferente.

use serde::{Deserialize, Serialize};

/// Símbolo de fundo padrão ("não é entidade").
pub const BACKGROUND_TAG: &str = "O";

/// Um token com sua tag e as lacunas que o cercavam no texto original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    /// Texto literal reconhecido (ex: "Obama").
    pub text: String,
    /// Rótulo atribuído pelo classificador (ex: "PERSON" ou "O").
    pub tag: String,
    /// Texto entre o token anterior e este.
    #[serde(default)]
    pub before: Option<String>,
    /// Texto entre este token e o próximo.
    #[serde(default)]
    pub after: Option<String>,
}

impl TaggedToken {
    /// Token sem lacunas registradas.
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: tag.into(),
            before: None,
            after: None,
        }
    }

    /// Define a lacuna anterior.
    pub fn with_before(mut self, gap: impl Into<String>) -> Self {
        self.before = Some(gap.into());
        self
    }

    /// Define a lacuna posterior.
    pub fn with_after(mut self, gap: impl Into<String>) -> Self {
        self.after = Some(gap.into());
        self
    }
}

/// Uma sentença é uma sequência ordenada de tokens.
pub type Sentence = Vec<TaggedToken>;

/// Fonte de tokens rotulados (o classificador externo).
///
/// Implementações devem ser seguras para uso concorrente: uma mesma instância
/// carregada é compartilhada entre requisições pelo cache de classificadores.
pub trait SequenceClassifier: Send + Sync {
    /// Classifica o texto e devolve as sentenças rotuladas, na ordem original.
    fn classify(&self, text: &str) -> Vec<Sentence>;

    /// Símbolo de fundo usado por este classificador.
    fn background(&self) -> &str {
        BACKGROUND_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_gaps_are_distinct() {
        let absent = TaggedToken::new("Obama", "PERSON");
        let empty = TaggedToken::new("Obama", "PERSON").with_before("");
        assert_eq!(absent.before, None);
        assert_eq!(empty.before, Some(String::new()));
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_missing_gaps_deserialize_as_absent() {
        let token: TaggedToken = serde_json::from_str(r#"{"text":"was","tag":"O","before":" "}"#).unwrap();
        assert_eq!(token.before.as_deref(), Some(" "));
        assert_eq!(token.after, None);
    }
}
