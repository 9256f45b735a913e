//! # Documento em Árvore
//!
//! No modo de classificação de nós, a entrada é uma árvore. O conteúdo de
//! texto é percorrido em profundidade, nó a nó, e cada nó de texto é
//! substituído no lugar pelos nós produzidos a partir dele: texto puro vira
//! nó de texto e cada span vira um elemento com o nome da tag em minúsculas.
//! Elementos, atributos e comentários passam intactos.
//!
//! O resultado é sempre um novo [`Node::Document`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::segment::{emit, MarkupSink, MarkupWriter, Segment};

/// Nó da árvore do documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Raiz de um documento em memória.
    Document {
        #[serde(default)]
        children: Vec<Node>,
    },
    Element {
        name: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl Node {
    pub fn element(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element {
            name: name.into(),
            attributes: BTreeMap::new(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    /// Concatenação de todo o texto da subárvore (comentários não contam).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text { text } => out.push_str(text),
            Node::Comment { .. } => {}
            Node::Document { children } | Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Serializa a subárvore como marcação com escape.
    pub fn to_markup(&self) -> String {
        let mut writer = MarkupWriter::new();
        self.write_markup(&mut writer);
        writer.finish()
    }

    fn write_markup(&self, writer: &mut MarkupWriter) {
        match self {
            Node::Document { children } => {
                for child in children {
                    child.write_markup(writer);
                }
            }
            Node::Element {
                name,
                attributes,
                children,
            } => {
                let attributes: Vec<(String, String)> =
                    attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                writer.start_element_with(name, &attributes);
                for child in children {
                    child.write_markup(writer);
                }
                writer.end_element();
            }
            Node::Text { text } => writer.characters(text),
            Node::Comment { text } => writer.raw(&format!("<!--{}-->", comment_body(text))),
        }
    }
}

/// Texto de comentário sem escape de entidades. `--` não pode aparecer num
/// comentário nem o texto pode terminar em `-`, então os hífens são separados.
fn comment_body(text: &str) -> String {
    let mut body = text.to_string();
    while body.contains("--") {
        body = body.replace("--", "- -");
    }
    if body.ends_with('-') {
        body.push(' ');
    }
    body
}

/// Sink que constrói uma lista de nós a partir da API de construção do host.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    /// Pilha de elementos abertos: (nome, filhos acumulados).
    stack: Vec<(String, Vec<Node>)>,
    roots: Vec<Node>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fecha elementos pendentes e devolve os nós de nível superior.
    pub fn finish(mut self) -> Vec<Node> {
        while !self.stack.is_empty() {
            self.end_element();
        }
        self.roots
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some((_, children)) => children.push(node),
            None => self.roots.push(node),
        }
    }
}

impl MarkupSink for NodeBuilder {
    fn start_element(&mut self, name: &str) {
        self.stack.push((name.to_string(), Vec::new()));
    }

    fn characters(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Node::text(text));
        }
    }

    fn end_element(&mut self) {
        if let Some((name, children)) = self.stack.pop() {
            self.push(Node::element(name, children));
        }
    }
}

/// Converte segmentos em nós (texto e elementos de entidade).
pub fn segments_to_nodes<I>(segments: I) -> Vec<Node>
where
    I: IntoIterator<Item = Segment>,
{
    let mut builder = NodeBuilder::new();
    emit(segments, &mut builder);
    builder.finish()
}

/// Percorre a árvore em profundidade substituindo cada nó de texto pelos nós
/// que `classify` produz para ele.
///
/// A primeira falha interrompe o percurso e é devolvida sem resultado parcial.
pub fn annotate<F, E>(node: &Node, classify: &mut F) -> Result<Node, E>
where
    F: FnMut(&str) -> Result<Vec<Segment>, E>,
{
    let children = match node {
        Node::Document { children } => annotate_children(children, classify)?,
        other => annotate_node(other, classify)?,
    };
    Ok(Node::Document { children })
}

fn annotate_children<F, E>(children: &[Node], classify: &mut F) -> Result<Vec<Node>, E>
where
    F: FnMut(&str) -> Result<Vec<Segment>, E>,
{
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        out.extend(annotate_node(child, classify)?);
    }
    Ok(out)
}

fn annotate_node<F, E>(node: &Node, classify: &mut F) -> Result<Vec<Node>, E>
where
    F: FnMut(&str) -> Result<Vec<Segment>, E>,
{
    Ok(match node {
        Node::Text { text } => segments_to_nodes(classify(text)?),
        Node::Element {
            name,
            attributes,
            children,
        } => vec![Node::Element {
            name: name.clone(),
            attributes: attributes.clone(),
            children: annotate_children(children, classify)?,
        }],
        Node::Document { children } => annotate_children(children, classify)?,
        Node::Comment { .. } => vec![node.clone()],
    })
}
