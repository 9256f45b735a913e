//! # Tokenizador
//!
//! Divide o texto bruto em tokens (palavras e pontuações) preservando a
//! posição de cada um no original. As posições permitem recuperar as lacunas
//! exatas entre tokens, que o montador precisa para reconstruir o texto sem
//! perdas.
//!
//! ## Regras
//!
//! - Letras, dígitos e hífens internos formam palavras.
//! - O ponto de abreviações conhecidas ("Dr.", "Mr.") e de números
//!   ("1.234") fica no token.
//! - Apóstrofos ficam dentro da palavra ("O'Brien", "d'água").
//! - Qualquer outro caractere que não seja espaço vira um token próprio.
//!
//! Textos sem separação entre palavras (chinês) saem como um único token por
//! trecho; veja [`crate::segmenter`] para a pré-tokenização.

use serde::{Deserialize, Serialize};

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Obama", ",").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

/// Abreviações cujo ponto não encerra o token.
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Dra", "Mr", "Mrs", "Ms", "Sr", "Sra", "Jr", "Prof", "Profa", "Gov", "Sen", "Rep",
    "Gen", "Capt", "Col", "Lt", "St", "Inc", "Ltd", "Corp", "Co", "vs", "etc", "No", "Vol",
    "Av", "Dep", "Min", "Pres", "Eng",
];

/// Pontuações que encerram uma sentença.
const SENTENCE_TERMINATORS: &[&str] = &[".", "!", "?", "。", "！", "？"];

/// Tokeniza o texto.
///
/// # Exemplo
/// ```rust
/// use ner_markup::tokenizer::tokenize;
///
/// let tokens = tokenize("Dr. Silva chegou.");
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["Dr.", "Silva", "chegou", "."]);
/// ```
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(byte_pos, ch)) in chars.iter().enumerate() {
        if ch.is_alphanumeric() || ch == '-' && !current_text.is_empty() {
            if current_text.is_empty() {
                current_start = byte_pos;
            }
            current_text.push(ch);
        } else if ch == '.' && !current_text.is_empty() {
            let is_abbrev = ABBREVIATIONS.contains(&current_text.as_str());
            let current_is_num = current_text.chars().all(char::is_numeric);
            let next_is_num = chars
                .get(i + 1)
                .map(|(_, c)| c.is_numeric())
                .unwrap_or(false);

            if is_abbrev || (current_is_num && next_is_num) {
                current_text.push('.');
            } else {
                flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
                push_token(&mut tokens, ".".to_string(), byte_pos, byte_pos + 1);
            }
        } else if (ch == '\'' || ch == '\u{2019}') && !current_text.is_empty() {
            current_text.push(ch);
        } else if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
        } else {
            flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
            push_token(&mut tokens, ch.to_string(), byte_pos, byte_pos + ch.len_utf8());
        }
    }
    flush_token(&mut tokens, &mut current_text, current_start, text.len());

    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Agrupa tokens em sentenças, cortando após cada pontuação terminal.
pub fn split_sentences(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        let terminal = SENTENCE_TERMINATORS.contains(&token.text.as_str());
        current.push(token);
        if terminal {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Texto que precede cada token no original (desde o fim do token anterior).
///
/// O primeiro item é o prefixo do texto antes do primeiro token.
pub fn leading_gaps<'a>(text: &'a str, tokens: &[Token]) -> Vec<&'a str> {
    let mut previous_end = 0;
    tokens
        .iter()
        .map(|token| {
            let gap = &text[previous_end..token.start];
            previous_end = token.end;
            gap
        })
        .collect()
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        tokens.push(Token {
            text: std::mem::take(text),
            start,
            end,
            index: 0,
        });
    }
}

/// Adiciona um token de pontuação diretamente
fn push_token(tokens: &mut Vec<Token>, text: String, start: usize, end: usize) {
    tokens.push(Token {
        text,
        start,
        end,
        index: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Barack Obama was President.");
        assert_eq!(texts(&tokens), ["Barack", "Obama", "was", "President", "."]);
        assert_eq!(tokens[1].start, 7);
        assert_eq!(tokens[1].end, 12);
        assert_eq!(tokens[4].index, 4);
    }

    #[test]
    fn test_offsets_match_source() {
        let text = "São Paulo, 1.234 km — ok";
        for token in tokenize(text) {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_decimal_and_hyphen() {
        let tokens = tokenize("COVID-19 custou 1.5 bi");
        assert_eq!(texts(&tokens), ["COVID-19", "custou", "1.5", "bi"]);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences(tokenize("Lula falou. Dilma ouviu! E agora"));
        assert_eq!(sentences.len(), 3);
        assert_eq!(texts(&sentences[0]), ["Lula", "falou", "."]);
        assert_eq!(texts(&sentences[2]), ["E", "agora"]);
    }

    #[test]
    fn test_leading_gaps_cover_the_text() {
        let text = "  Obama ,  Google\t";
        let tokens = tokenize(text);
        let gaps = leading_gaps(text, &tokens);
        assert_eq!(gaps, ["  ", " ", "  "]);
        let last = tokens.last().unwrap();
        assert_eq!(&text[last.end..], "\t");
    }

    #[test]
    fn test_unsegmented_chinese_is_one_token() {
        let tokens = tokenize("我爱北京。");
        assert_eq!(texts(&tokens), ["我爱北京", "。"]);
    }
}
