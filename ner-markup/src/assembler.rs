//! # Montador de Spans
//!
//! Percorre o fluxo de tokens rotulados e reconstrói o texto de entrada como
//! uma sequência alternada de trechos de texto e spans de entidade.
//!
//! ## Garantias
//!
//! - **Sem perdas**: cada byte de texto de token e de lacuna aparece exatamente
//!   uma vez na saída, na ordem original.
//! - **Plano**: spans nunca se aninham; cada span envolve um único texto.
//! - **Mínimo**: nenhum texto vazio é emitido e nenhum span envolve texto vazio.
//! - **Fusão**: uma sequência contígua de tokens com a mesma tag vira um único span.
//!
//! ## Máquina de Estados
//!
//! O estado é pequeno: o buffer de acumulação, a tag do span aberto (se houver)
//! e a lacuna posterior do último token, ainda não atribuída.
//!
//! | Anterior → Atual     | Ação                                                         |
//! |----------------------|--------------------------------------------------------------|
//! | igual                | buffer += lacuna + texto                                     |
//! | fundo → entidade     | buffer += lacuna; emite Text; abre span; buffer += texto     |
//! | entidade → fundo     | emite Span; buffer += lacuna + texto                         |
//! | entidade A → B       | emite Span A; buffer += lacuna; emite Text; abre B; += texto |
//!
//! Uma lacuna que cai numa fronteira de tag fica sempre fora dos spans.
//!
//! ## Atribuição das lacunas
//!
//! O texto entre o token `i` e o token `i+1` vem do `before` de `i+1` quando
//! ele existe (mesmo vazio). Só quando `before` está ausente o `after` de `i`
//! é usado. Assim cada separador é emitido uma única vez, mesmo quando o
//! classificador registra a mesma lacuna nos dois campos.

use std::collections::VecDeque;
use std::iter::Peekable;

use serde::{Deserialize, Serialize};

use crate::segment::Segment;
use crate::tagger::{TaggedToken, BACKGROUND_TAG};

/// Opções do montador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Tag que significa "não é entidade".
    pub background: String,
    /// Fecha o span aberto no fim de cada sentença, e não só no fim da entrada.
    #[serde(default)]
    pub close_at_sentence_end: bool,
}

impl AssemblerConfig {
    pub fn new(background: impl Into<String>) -> Self {
        Self {
            background: background.into(),
            close_at_sentence_end: false,
        }
    }

    pub fn close_at_sentence_end(mut self, enabled: bool) -> Self {
        self.close_at_sentence_end = enabled;
        self
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::new(BACKGROUND_TAG)
    }
}

/// Estado mutável de uma montagem. Vive apenas durante uma chamada.
#[derive(Debug)]
struct AssemblyState {
    config: AssemblerConfig,
    buffer: String,
    /// Tag do span aberto; `None` quando a última tag foi a de fundo.
    open: Option<String>,
    /// `after` do último token, usado se o próximo token não tiver `before`.
    pending_after: Option<String>,
}

impl AssemblyState {
    fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            open: None,
            pending_after: None,
        }
    }

    fn is_background(&self, tag: &str) -> bool {
        tag == self.config.background
    }

    fn push(&mut self, token: TaggedToken, sentence_end: bool, out: &mut VecDeque<Segment>) {
        let TaggedToken {
            text,
            tag,
            before,
            after,
        } = token;
        let gap = before.or_else(|| self.pending_after.take());
        self.pending_after = after;
        let gap = gap.unwrap_or_default();

        let entity = !self.is_background(&tag);
        let same = match &self.open {
            Some(open) => *open == tag,
            None => !entity,
        };

        if same {
            self.buffer.push_str(&gap);
        } else {
            self.close_span(out);
            self.buffer.push_str(&gap);
            if entity {
                self.flush_text(out);
                self.open = Some(tag);
            }
        }
        self.buffer.push_str(&text);

        if sentence_end && self.config.close_at_sentence_end {
            self.close_span(out);
        }
    }

    fn finish(&mut self, out: &mut VecDeque<Segment>) {
        self.close_span(out);
        if let Some(after) = self.pending_after.take() {
            self.buffer.push_str(&after);
        }
        self.flush_text(out);
    }

    /// Emite o conteúdo do buffer como span e volta ao estado de fundo.
    fn close_span(&mut self, out: &mut VecDeque<Segment>) {
        if let Some(tag) = self.open.take() {
            if !self.buffer.is_empty() {
                out.push_back(Segment::Span {
                    tag,
                    text: std::mem::take(&mut self.buffer),
                });
            }
        }
    }

    fn flush_text(&mut self, out: &mut VecDeque<Segment>) {
        if !self.buffer.is_empty() {
            out.push_back(Segment::Text {
                text: std::mem::take(&mut self.buffer),
            });
        }
    }
}

/// Iterador preguiçoso de [`Segment`]s sobre um fluxo de sentenças.
///
/// Consome uma sentença por vez e emite os segmentos assim que ficam
/// completos. Cada token produz no máximo três segmentos.
///
/// # Exemplo
/// ```rust
/// use ner_markup::assembler::{AssemblerConfig, SpanAssembler};
/// use ner_markup::segment::Segment;
/// use ner_markup::tagger::TaggedToken;
///
/// let sentence = vec![
///     TaggedToken::new("Lula", "PERSON").with_before(""),
///     TaggedToken::new("falou", "O").with_before(" "),
/// ];
/// let segments: Vec<Segment> =
///     SpanAssembler::new(vec![sentence], AssemblerConfig::default()).collect();
/// assert_eq!(segments, vec![Segment::span("PERSON", "Lula"), Segment::text(" falou")]);
/// ```
pub struct SpanAssembler<S>
where
    S: Iterator,
    S::Item: IntoIterator<Item = TaggedToken>,
{
    sentences: S,
    current: Option<Peekable<<S::Item as IntoIterator>::IntoIter>>,
    state: AssemblyState,
    ready: VecDeque<Segment>,
    finished: bool,
}

impl<S> SpanAssembler<S>
where
    S: Iterator,
    S::Item: IntoIterator<Item = TaggedToken>,
{
    pub fn new<I>(sentences: I, config: AssemblerConfig) -> Self
    where
        I: IntoIterator<IntoIter = S>,
    {
        Self {
            sentences: sentences.into_iter(),
            current: None,
            state: AssemblyState::new(config),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Avança um token (ou uma sentença). Devolve `false` quando a entrada acabou.
    fn step(&mut self) -> bool {
        if let Some(tokens) = self.current.as_mut() {
            if let Some(token) = tokens.next() {
                let sentence_end = tokens.peek().is_none();
                self.state.push(token, sentence_end, &mut self.ready);
                return true;
            }
        }
        match self.sentences.next() {
            Some(sentence) => {
                self.current = Some(sentence.into_iter().peekable());
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }
}

impl<S> Iterator for SpanAssembler<S>
where
    S: Iterator,
    S::Item: IntoIterator<Item = TaggedToken>,
{
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            if let Some(segment) = self.ready.pop_front() {
                return Some(segment);
            }
            if self.finished {
                return None;
            }
            if !self.step() {
                self.state.finish(&mut self.ready);
                self.finished = true;
            }
        }
    }
}

/// Monta todos os segmentos de uma vez.
pub fn assemble<I>(sentences: I, config: &AssemblerConfig) -> Vec<Segment>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = TaggedToken>,
{
    SpanAssembler::new(sentences, config.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::plain_text;

    fn tok(text: &str, tag: &str, before: &str) -> TaggedToken {
        TaggedToken::new(text, tag).with_before(before)
    }

    fn run(sentences: Vec<Vec<TaggedToken>>) -> Vec<Segment> {
        assemble(sentences, &AssemblerConfig::default())
    }

    #[test]
    fn test_empty_input() {
        assert!(run(vec![]).is_empty());
        assert!(run(vec![vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_person_then_background() {
        // Lacunas duplicadas em `after` e no `before` seguinte, como fazem
        // classificadores que registram os dois lados.
        let sentence = vec![
            TaggedToken::new("Barack", "PERSON").with_before("").with_after(" "),
            TaggedToken::new("Obama", "PERSON").with_before(" ").with_after(" "),
            TaggedToken::new("was", "O").with_before(" ").with_after(" "),
            TaggedToken::new("President", "O").with_before(" ").with_after(""),
        ];
        assert_eq!(
            run(vec![sentence]),
            vec![
                Segment::span("PERSON", "Barack Obama"),
                Segment::text(" was President"),
            ]
        );
    }

    #[test]
    fn test_adjacent_entities_keep_gap_outside() {
        let sentence = vec![
            tok("Obama", "PERSON", ""),
            tok("Google", "ORGANIZATION", " "),
        ];
        assert_eq!(
            run(vec![sentence]),
            vec![
                Segment::span("PERSON", "Obama"),
                Segment::text(" "),
                Segment::span("ORGANIZATION", "Google"),
            ]
        );
    }

    #[test]
    fn test_adjacent_entities_with_empty_gap() {
        let sentence = vec![tok("Obama", "PERSON", ""), tok("Google", "ORGANIZATION", "")];
        assert_eq!(
            run(vec![sentence]),
            vec![Segment::span("PERSON", "Obama"), Segment::span("ORGANIZATION", "Google")]
        );
    }

    #[test]
    fn test_open_span_is_closed_at_end_of_input() {
        let sentence = vec![tok("visited", "O", ""), tok("Paris", "LOCATION", " ")];
        let segments = run(vec![sentence]);
        assert_eq!(
            segments,
            vec![Segment::text("visited "), Segment::span("LOCATION", "Paris")]
        );
    }

    #[test]
    fn test_trailing_text_after_final_entity_is_plain() {
        let sentence = vec![
            tok("visited", "O", ""),
            TaggedToken::new("Paris", "LOCATION").with_before(" ").with_after(".\n"),
        ];
        assert_eq!(
            run(vec![sentence]),
            vec![
                Segment::text("visited "),
                Segment::span("LOCATION", "Paris"),
                Segment::text(".\n"),
            ]
        );
    }

    #[test]
    fn test_gap_from_after_when_before_is_absent() {
        let sentence = vec![
            TaggedToken::new("Lula", "PERSON").with_after("  "),
            TaggedToken::new("falou", "O").with_after("\n"),
        ];
        assert_eq!(
            run(vec![sentence]),
            vec![Segment::span("PERSON", "Lula"), Segment::text("  falou\n")]
        );
    }

    #[test]
    fn test_empty_before_wins_over_after() {
        let sentence = vec![
            TaggedToken::new("São", "LOCATION").with_after(" "),
            TaggedToken::new("Paulo", "LOCATION").with_before(""),
        ];
        assert_eq!(run(vec![sentence]), vec![Segment::span("LOCATION", "SãoPaulo")]);
    }

    #[test]
    fn test_run_spans_sentence_boundary_by_default() {
        let first = vec![tok("Rio", "LOCATION", "")];
        let second = vec![tok("Grande", "LOCATION", " ")];
        assert_eq!(
            run(vec![first, second]),
            vec![Segment::span("LOCATION", "Rio Grande")]
        );
    }

    #[test]
    fn test_close_at_sentence_end() {
        let config = AssemblerConfig::default().close_at_sentence_end(true);
        let first = vec![tok("Rio", "LOCATION", "")];
        let second = vec![tok("Grande", "LOCATION", " "), tok("cresceu", "O", " ")];
        assert_eq!(
            assemble(vec![first, second], &config),
            vec![
                Segment::span("LOCATION", "Rio"),
                Segment::text(" "),
                Segment::span("LOCATION", "Grande"),
                Segment::text(" cresceu"),
            ]
        );
    }

    #[test]
    fn test_all_background_is_single_text() {
        let sentence = vec![tok("nada", "O", " "), tok("aqui", "O", " "), tok(".", "O", "")];
        assert_eq!(run(vec![sentence]), vec![Segment::text(" nada aqui.")]);
    }

    #[test]
    fn test_custom_background_symbol() {
        let config = AssemblerConfig::new("OTHER");
        let sentence = vec![tok("Lula", "PER", ""), tok("falou", "OTHER", " "), tok("O", "O", " ")];
        assert_eq!(
            assemble(vec![sentence], &config),
            vec![
                Segment::span("PER", "Lula"),
                Segment::text(" falou "),
                Segment::span("O", "O"),
            ]
        );
    }

    #[test]
    fn test_empty_token_text_never_yields_empty_span() {
        let sentence = vec![tok("", "PERSON", ""), tok("disse", "O", "")];
        assert_eq!(run(vec![sentence]), vec![Segment::text("disse")]);
    }

    #[test]
    fn test_lazy_iteration_yields_before_input_ends() {
        // Sentenças infinitas: o iterador precisa emitir sem consumir tudo.
        let sentences = std::iter::repeat_with(|| vec![tok("Lula", "PERSON", " "), tok("e", "O", " ")]);
        let first: Vec<Segment> = SpanAssembler::new(sentences, AssemblerConfig::default())
            .take(3)
            .collect();
        assert_eq!(
            first,
            vec![
                Segment::text(" "),
                Segment::span("PERSON", "Lula"),
                Segment::text(" e "),
            ]
        );
    }

    #[test]
    fn test_reconstruction_is_lossless() {
        let text = "  Dilma Rousseff visitou a Petrobras, no Rio.";
        let sentence = vec![
            tok("Dilma", "PERSON", "  "),
            tok("Rousseff", "PERSON", " "),
            tok("visitou", "O", " "),
            tok("a", "O", " "),
            tok("Petrobras", "ORGANIZATION", " "),
            tok(",", "O", ""),
            tok("no", "O", " "),
            tok("Rio", "LOCATION", " "),
            tok(".", "O", ""),
        ];
        let segments = run(vec![sentence]);
        assert_eq!(plain_text(&segments), text);
        assert_eq!(segments.iter().filter(|s| s.is_span()).count(), 3);
    }
}
