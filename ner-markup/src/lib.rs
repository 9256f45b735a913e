//! # ner-markup: Marcação de Entidades Nomeadas em Texto e Documentos
//!
//! Este crate recebe a saída de um classificador de sequências (sentenças de
//! tokens rotulados, com as lacunas exatas do texto original) e reconstrói a
//! entrada como uma sequência de trechos de texto e spans de entidade, pronta
//! para ser embutida de volta num documento estruturado.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui em linha reta, passo a passo:
//!
//! 1.  **Entrada**: texto bruto ou uma árvore de documento ([`document`]).
//! 2.  **Pré-tokenização** ([`segmenter`]): opcional, para idiomas sem espaços entre palavras.
//! 3.  **Classificação** ([`tagger`]): um [`SequenceClassifier`] rotula os tokens.
//!     O [`gazetteer`] traz uma implementação por listas e regras.
//! 4.  **Montagem** ([`assembler`]): a máquina de estados que produz os [`Segment`]s.
//! 5.  **Saída**: segmentos, marcação textual ou uma nova árvore anotada.
//!
//! Os classificadores carregados ficam num [`ResourceCache`] injetado no
//! [`NerService`], com carga única por identificador.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use ner_markup::{assemble, render_markup, AssemblerConfig, TaggedToken};
//!
//! // Sentença já rotulada pelo classificador
//! let sentence = vec![
//!     TaggedToken::new("Barack", "PERSON").with_before(""),
//!     TaggedToken::new("Obama", "PERSON").with_before(" "),
//!     TaggedToken::new("falou", "O").with_before(" ").with_after("."),
//! ];
//!
//! let segments = assemble(vec![sentence], &AssemblerConfig::default());
//! assert_eq!(render_markup(&segments), "<person>Barack Obama</person> falou.");
//! ```
//!
//! ## Módulos Principais
//!
//! - [`service`]: orquestrador das requisições (string, nó, lote e streaming).
//! - [`assembler`]: montador de spans.
//! - [`resource`] e [`cache`]: leitura e cache dos modelos.

pub mod assembler;
pub mod cache;
pub mod document;
pub mod error;
pub mod gazetteer;
pub mod resource;
pub mod segment;
pub mod segmenter;
pub mod service;
pub mod tagger;
pub mod tokenizer;

pub use assembler::{assemble, AssemblerConfig, SpanAssembler};
pub use cache::ResourceCache;
pub use document::{annotate, Node};
pub use error::{NerError, Result};
pub use gazetteer::{GazetteerClassifier, GazetteerModel};
pub use resource::{FsResourceStore, Resource, ResourceStore};
pub use segment::{emit, plain_text, render_markup, MarkupSink, MarkupWriter, Segment};
pub use segmenter::{DictionarySegmenter, Pretokenization, Segmenter};
pub use service::{ClassifyEvent, ClassifyRequest, GazetteerModelLoader, ModelLoader, NerService};
pub use tagger::{Sentence, SequenceClassifier, TaggedToken, BACKGROUND_TAG};
