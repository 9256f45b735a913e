//! # Pré-tokenização (Segmentação de Palavras)
//!
//! Idiomas como o chinês não separam palavras com espaços, e o tokenizador do
//! classificador enxergaria uma frase inteira como um único token. A
//! pré-tokenização reescreve o texto inserindo separadores explícitos antes
//! da classificação.
//!
//! A etapa é escolhida por requisição via [`Pretokenization`]. Ela **não é
//! idempotente**: segmentar um texto já segmentado pode dividir palavras de
//! novo, então deve rodar no máximo uma vez por trecho de entrada.
//!
//! ## Dados auxiliares
//!
//! O [`DictionarySegmenter`] lê seus dados do diretório onde está o modelo do
//! classificador:
//!
//! | Arquivo          | Conteúdo                                            |
//! |------------------|-----------------------------------------------------|
//! | `norm.simp.utf8` | Tabela de normalização: `origem destino` por linha  |
//! | `dict.txt`       | Dicionário: uma palavra por linha (primeiro campo)  |

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{NerError, Result};

/// Nome do arquivo da tabela de normalização.
pub const NORMALIZATION_TABLE: &str = "norm.simp.utf8";
/// Nome do arquivo do dicionário.
pub const DICTIONARY: &str = "dict.txt";

/// Qual pré-tokenização aplicar a uma requisição.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pretokenization {
    /// O texto vai direto para o classificador.
    #[default]
    None,
    /// Segmentação de palavras em chinês.
    Chinese,
}

/// Reescreve texto bruto com separadores de palavra explícitos.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> String;
}

/// Segmentador por casamento máximo à frente (forward maximum matching).
///
/// Trechos de caracteres Han são divididos na palavra mais longa do
/// dicionário que começa em cada posição; caracteres fora do dicionário viram
/// palavras de um caractere. Texto que não é Han passa intacto.
#[derive(Debug, Clone, Default)]
pub struct DictionarySegmenter {
    normalization: HashMap<String, String>,
    words: HashSet<String>,
    /// Tamanho (em grafemas) da palavra mais longa do dicionário.
    max_word_len: usize,
}

impl DictionarySegmenter {
    pub fn new<I, S>(words: I, normalization: HashMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: HashSet<String> = words.into_iter().map(Into::into).collect();
        let max_word_len = words
            .iter()
            .map(|w| w.graphemes(true).count())
            .max()
            .unwrap_or(1);
        Self {
            normalization,
            words,
            max_word_len,
        }
    }

    /// Carrega tabela de normalização e dicionário de `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let normalization = parse_normalization_table(&read_data_file(data_dir, NORMALIZATION_TABLE)?);
        let dictionary = read_data_file(data_dir, DICTIONARY)?;
        let words = dictionary
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().next());
        let segmenter = Self::new(words, normalization);
        debug!(
            dir = %data_dir.display(),
            words = segmenter.words.len(),
            "segmentador carregado"
        );
        Ok(segmenter)
    }

    fn normalize<'a>(&'a self, grapheme: &'a str) -> &'a str {
        self.normalization
            .get(grapheme)
            .map(String::as_str)
            .unwrap_or(grapheme)
    }

    /// Tamanho da palavra do dicionário mais longa começando em `units[0]`.
    fn longest_match(&self, units: &[&str]) -> usize {
        let limit = self.max_word_len.min(units.len());
        (2..=limit)
            .rev()
            .find(|&len| {
                units[..len].iter().all(|u| is_han(u)) && self.words.contains(&units[..len].concat())
            })
            .unwrap_or(1)
    }
}

impl Segmenter for DictionarySegmenter {
    fn segment(&self, text: &str) -> String {
        let units: Vec<&str> = text.graphemes(true).map(|g| self.normalize(g)).collect();
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        let mut i = 0;

        while i < units.len() {
            if !is_han(units[i]) {
                out.push_str(units[i]);
                i += 1;
                continue;
            }
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            let len = self.longest_match(&units[i..]);
            for unit in &units[i..i + len] {
                out.push_str(unit);
            }
            i += len;
            if let Some(next) = units.get(i) {
                if !is_han(next) && !next.chars().all(char::is_whitespace) {
                    out.push(' ');
                }
            }
        }
        out
    }
}

fn read_data_file(data_dir: &Path, name: &str) -> Result<String> {
    let path = data_dir.join(name);
    fs::read_to_string(&path).map_err(|e| NerError::from_io(path.display().to_string(), e))
}

fn parse_normalization_table(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            Some((fields.next()?.to_string(), fields.next()?.to_string()))
        })
        .collect()
}

/// Verifica se o grafema começa com um ideograma CJK.
fn is_han(grapheme: &str) -> bool {
    grapheme.chars().next().is_some_and(|c| {
        matches!(c,
            '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2A6DF}'
            | '\u{2A700}'..='\u{2EBEF}')
    })
}
