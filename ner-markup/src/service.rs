//! # Serviço de Classificação: Orquestrador das Requisições
//!
//! O serviço conecta os colaboradores em volta do montador de spans:
//!
//! 1. Resolve o classificador pelo identificador do recurso (via cache).
//! 2. Aplica a pré-tokenização escolhida, se houver.
//! 3. Classifica o texto e monta os segmentos.
//!
//! # Modos de Uso
//! - **String**: [`NerService::classify_string`] devolve os segmentos.
//! - **Nó**: [`NerService::classify_node`] anota uma árvore de documento.
//! - **Lote**: [`NerService::classify_batch`] processa vários textos em paralelo.
//! - **Streaming**: [`NerService::classify_streaming`] envia cada segmento por
//!   um canal `mpsc` assim que o montador o produz (usado pelo WebSocket).
//!
//! Qualquer erro aborta a chamada inteira; não há resultado parcial.

use std::borrow::Cow;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assembler::{AssemblerConfig, SpanAssembler};
use crate::cache::ResourceCache;
use crate::document::{annotate, Node};
use crate::error::{NerError, Result};
use crate::gazetteer::GazetteerClassifier;
use crate::resource::{Resource, ResourceStore};
use crate::segment::Segment;
use crate::segmenter::{DictionarySegmenter, Pretokenization, Segmenter};
use crate::tagger::SequenceClassifier;

/// Parâmetros de uma requisição de classificação.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Identificador do recurso do classificador (ex: `/models/english.json`).
    pub classifier: String,
    #[serde(default)]
    pub pretokenization: Pretokenization,
}

impl ClassifyRequest {
    pub fn new(classifier: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
            pretokenization: Pretokenization::None,
        }
    }

    pub fn with_pretokenization(mut self, pretokenization: Pretokenization) -> Self {
        self.pretokenization = pretokenization;
        self
    }
}

/// Eventos emitidos durante uma classificação em streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClassifyEvent {
    /// Um segmento completo, na ordem de saída.
    Segment { index: usize, segment: Segment },
    /// Fim da classificação com todos os segmentos emitidos.
    Done {
        segments: Vec<Segment>,
        processing_ms: u64,
    },
    /// Falha irrecuperável; nenhum outro evento segue.
    Error { message: String },
}

/// Converte recursos em instâncias carregadas.
pub trait ModelLoader: Send + Sync {
    fn load_classifier(&self, resource: &Resource) -> Result<Arc<dyn SequenceClassifier>>;

    /// Carrega o segmentador a partir do diretório de dados do classificador.
    fn load_segmenter(&self, data_dir: &Path) -> Result<Arc<dyn Segmenter>>;
}

/// Carregador padrão: modelos JSON de gazetteers e segmentador por dicionário.
#[derive(Debug, Clone, Copy, Default)]
pub struct GazetteerModelLoader;

impl ModelLoader for GazetteerModelLoader {
    fn load_classifier(&self, resource: &Resource) -> Result<Arc<dyn SequenceClassifier>> {
        let classifier = GazetteerClassifier::from_slice(&resource.id, &resource.bytes)?;
        Ok(Arc::new(classifier))
    }

    fn load_segmenter(&self, data_dir: &Path) -> Result<Arc<dyn Segmenter>> {
        Ok(Arc::new(DictionarySegmenter::load(data_dir)?))
    }
}

/// Tudo que uma requisição precisa, resolvido antes de tocar no texto.
struct Prepared {
    classifier: Arc<dyn SequenceClassifier>,
    segmenter: Option<Arc<dyn Segmenter>>,
    config: AssemblerConfig,
}

impl Prepared {
    /// Monta os segmentos de um trecho, entregando cada um assim que fica pronto.
    fn for_each_segment(&self, text: &str, mut f: impl FnMut(Segment)) {
        // Sem tokens não há quem carregue o texto: ele passa intacto
        if text.trim().is_empty() {
            if !text.is_empty() {
                f(Segment::text(text));
            }
            return;
        }

        let input = match &self.segmenter {
            Some(segmenter) => Cow::Owned(segmenter.segment(text)),
            None => Cow::Borrowed(text),
        };
        let sentences = self.classifier.classify(&input);
        SpanAssembler::new(sentences, self.config.clone()).for_each(f);
    }

    fn segments(&self, text: &str) -> Vec<Segment> {
        let mut out = Vec::new();
        self.for_each_segment(text, |segment| out.push(segment));
        out
    }
}

/// O serviço NER principal.
///
/// Os caches pertencem à aplicação e podem ser compartilhados entre
/// instâncias do serviço; o serviço só lê e popula entradas.
pub struct NerService {
    store: Arc<dyn ResourceStore>,
    loader: Arc<dyn ModelLoader>,
    classifiers: Arc<ResourceCache<dyn SequenceClassifier>>,
    segmenters: Arc<ResourceCache<dyn Segmenter>>,
    close_at_sentence_end: bool,
}

impl NerService {
    /// Serviço com o carregador padrão e caches novos.
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self::with_parts(
            store,
            Arc::new(GazetteerModelLoader),
            Arc::new(ResourceCache::new()),
            Arc::new(ResourceCache::new()),
        )
    }

    pub fn with_parts(
        store: Arc<dyn ResourceStore>,
        loader: Arc<dyn ModelLoader>,
        classifiers: Arc<ResourceCache<dyn SequenceClassifier>>,
        segmenters: Arc<ResourceCache<dyn Segmenter>>,
    ) -> Self {
        Self {
            store,
            loader,
            classifiers,
            segmenters,
            close_at_sentence_end: false,
        }
    }

    /// Fecha spans no fim de cada sentença (o padrão é só no fim da entrada).
    pub fn close_at_sentence_end(mut self, enabled: bool) -> Self {
        self.close_at_sentence_end = enabled;
        self
    }

    pub fn classifiers(&self) -> &Arc<ResourceCache<dyn SequenceClassifier>> {
        &self.classifiers
    }

    /// Descarta o classificador em cache. Devolve `true` se havia um carregado.
    pub fn evict_classifier(&self, id: &str) -> bool {
        let evicted = self.classifiers.evict(id);
        if evicted {
            info!(id, "classificador removido do cache");
        }
        evicted
    }

    /// Classifica um texto e devolve os segmentos.
    pub fn classify_string(&self, req: &ClassifyRequest, text: &str) -> Result<Vec<Segment>> {
        let start = Instant::now();
        let prepared = self.prepare(req)?;
        let segments = prepared.segments(text);
        debug!(
            classifier = %req.classifier,
            chars = text.len(),
            segments = segments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "texto classificado"
        );
        Ok(segments)
    }

    /// Anota uma árvore: cada nó de texto é classificado independentemente.
    pub fn classify_node(&self, req: &ClassifyRequest, node: &Node) -> Result<Node> {
        let prepared = self.prepare(req)?;
        annotate(node, &mut |text: &str| Ok::<_, NerError>(prepared.segments(text)))
    }

    /// Classifica textos independentes em paralelo, cada um com seu próprio
    /// estado de montagem. A ordem dos resultados segue a da entrada.
    pub fn classify_batch(&self, req: &ClassifyRequest, texts: &[String]) -> Result<Vec<Vec<Segment>>> {
        let start = Instant::now();
        let prepared = self.prepare(req)?;
        let results: Vec<Vec<Segment>> = texts.par_iter().map(|text| prepared.segments(text)).collect();
        info!(
            classifier = %req.classifier,
            texts = texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lote classificado"
        );
        Ok(results)
    }

    /// Executa a classificação enviando eventos pelo canal `tx`.
    ///
    /// # Fluxo de Eventos
    /// 1. `Segment` (loop): cada segmento assim que o montador o libera.
    /// 2. `Done`: todos os segmentos e o tempo gasto.
    ///
    /// Em caso de falha ao resolver os recursos, um único `Error` é enviado.
    /// Um receptor desconectado não interrompe o processamento.
    pub fn classify_streaming(&self, req: &ClassifyRequest, text: &str, tx: mpsc::Sender<ClassifyEvent>) {
        let start = Instant::now();
        let prepared = match self.prepare(req) {
            Ok(prepared) => prepared,
            Err(err) => {
                let _ = tx.send(ClassifyEvent::Error {
                    message: err.to_string(),
                });
                return;
            }
        };

        let mut segments = Vec::new();
        prepared.for_each_segment(text, |segment| {
            let _ = tx.send(ClassifyEvent::Segment {
                index: segments.len(),
                segment: segment.clone(),
            });
            segments.push(segment);
        });

        let _ = tx.send(ClassifyEvent::Done {
            segments,
            processing_ms: start.elapsed().as_millis() as u64,
        });
    }

    fn prepare(&self, req: &ClassifyRequest) -> Result<Prepared> {
        let classifier = self.classifier(&req.classifier)?;
        let segmenter = match req.pretokenization {
            Pretokenization::None => None,
            Pretokenization::Chinese => Some(self.segmenter(&req.classifier)?),
        };
        let config = AssemblerConfig::new(classifier.background())
            .close_at_sentence_end(self.close_at_sentence_end);
        Ok(Prepared {
            classifier,
            segmenter,
            config,
        })
    }

    fn classifier(&self, id: &str) -> Result<Arc<dyn SequenceClassifier>> {
        self.classifiers.get_or_load(id, || {
            let resource = self.store.fetch(id)?;
            self.loader.load_classifier(&resource)
        })
    }

    /// O segmentador fica em cache pelo diretório de dados, não pelo classificador.
    fn segmenter(&self, classifier_id: &str) -> Result<Arc<dyn Segmenter>> {
        let data_dir = self.store.data_dir(classifier_id)?;
        let key = data_dir.to_string_lossy().into_owned();
        self.segmenters
            .get_or_load(&key, || self.loader.load_segmenter(&data_dir))
    }
}
