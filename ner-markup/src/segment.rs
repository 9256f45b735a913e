//! # Segmentos de Saída e o Construtor do Host
//!
//! O montador produz uma sequência de [`Segment`]s: trechos de texto puro e
//! spans rotulados. Cada span envolve exatamente um texto, nunca outra
//! estrutura. O host que recebe o resultado expõe uma API de construção no
//! estilo "abre elemento / emite texto / fecha elemento", modelada aqui pelo
//! trait [`MarkupSink`].
//!
//! ## Nome do elemento
//!
//! O nome do elemento de um span é a tag em minúsculas: `PERSON` vira
//! `<person>`. Esse mapeamento faz parte do contrato observável.

use serde::{Deserialize, Serialize};

/// Item de saída do montador de spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Texto fora de qualquer entidade.
    Text { text: String },
    /// Entidade reconhecida: a tag original e o texto que ela cobre.
    Span { tag: String, text: String },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }

    pub fn span(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Segment::Span {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Conteúdo textual, ignorando o invólucro do span.
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text { text } | Segment::Span { text, .. } => text,
        }
    }

    /// Nome do elemento que envolve o span (tag em minúsculas).
    pub fn element_name(&self) -> Option<String> {
        match self {
            Segment::Span { tag, .. } => Some(tag.to_lowercase()),
            Segment::Text { .. } => None,
        }
    }

    pub fn is_span(&self) -> bool {
        matches!(self, Segment::Span { .. })
    }
}

/// API de construção do documento do host.
pub trait MarkupSink {
    fn start_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
    fn end_element(&mut self);
}

/// Conduz um [`MarkupSink`] com os segmentos na ordem em que chegam.
pub fn emit<I, S>(segments: I, sink: &mut S)
where
    I: IntoIterator<Item = Segment>,
    S: MarkupSink + ?Sized,
{
    for segment in segments {
        match segment {
            Segment::Text { text } => sink.characters(&text),
            Segment::Span { tag, text } => {
                sink.start_element(&tag.to_lowercase());
                sink.characters(&text);
                sink.end_element();
            }
        }
    }
}

/// Concatena o conteúdo de todos os segmentos, sem os invólucros.
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(Segment::as_str).collect()
}

/// Serializa segmentos como marcação com escape (ex: `<person>Lula</person> disse`).
pub fn render_markup(segments: &[Segment]) -> String {
    let mut writer = MarkupWriter::new();
    emit(segments.iter().cloned(), &mut writer);
    writer.finish()
}

/// Sink que escreve marcação textual.
#[derive(Debug, Default)]
pub struct MarkupWriter {
    out: String,
    open: Vec<String>,
}

impl MarkupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fecha elementos pendentes e devolve o texto produzido.
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.end_element();
        }
        self.out
    }

    pub(crate) fn start_element_with(&mut self, name: &str, attributes: &[(String, String)]) {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_into(&mut self.out, value, true);
            self.out.push('"');
        }
        self.out.push('>');
        self.open.push(name.to_string());
    }

    pub(crate) fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

impl MarkupSink for MarkupWriter {
    fn start_element(&mut self, name: &str) {
        self.start_element_with(name, &[]);
    }

    fn characters(&mut self, text: &str) {
        escape_into(&mut self.out, text, false);
    }

    fn end_element(&mut self) {
        if let Some(name) = self.open.pop() {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
    }
}

pub(crate) fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_name_is_lowercased_tag() {
        assert_eq!(
            Segment::span("PERSON", "Obama").element_name().as_deref(),
            Some("person")
        );
        assert_eq!(Segment::text("foi").element_name(), None);
    }

    #[test]
    fn test_render_markup_escapes_text() {
        let segments = vec![
            Segment::span("ORGANIZATION", "AT&T"),
            Segment::text(" < Google"),
        ];
        assert_eq!(
            render_markup(&segments),
            "<organization>AT&amp;T</organization> &lt; Google"
        );
    }

    #[test]
    fn test_plain_text_ignores_wrappers() {
        let segments = vec![Segment::span("PERSON", "Barack Obama"), Segment::text(" was President")];
        assert_eq!(plain_text(&segments), "Barack Obama was President");
    }

    #[test]
    fn test_segment_json_shape() {
        let json = serde_json::to_string(&Segment::span("PERSON", "Lula")).unwrap();
        assert_eq!(json, r#"{"type":"span","tag":"PERSON","text":"Lula"}"#);
    }
}
