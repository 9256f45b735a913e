//! Servidor web Axum que expõe a marcação de entidades via HTTP e WebSocket

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use clap::Parser;
use ner_markup::{
    render_markup, ClassifyEvent, ClassifyRequest, FsResourceStore, NerError, NerService, Node, Segment,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Configuração do servidor (linha de comando ou variáveis de ambiente).
#[derive(Parser, Debug)]
#[command(name = "ner-markup-web")]
#[command(about = "Marcação de entidades nomeadas via HTTP e WebSocket")]
#[command(version)]
struct Config {
    /// Endereço de escuta
    #[arg(long, env = "NER_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Diretório base dos recursos de classificadores
    #[arg(long, env = "NER_RESOURCE_ROOT", default_value = ".")]
    resource_root: PathBuf,

    /// Filtro de log no formato do `EnvFilter`
    #[arg(long, env = "NER_LOG", default_value = "info")]
    log_filter: String,

    /// Fecha spans no fim de cada sentença
    #[arg(long, env = "NER_CLOSE_AT_SENTENCE_END")]
    close_at_sentence_end: bool,
}

/// Estado compartilhado da aplicação
struct AppState {
    service: Arc<NerService>,
}

#[derive(Deserialize)]
struct StringRequest {
    #[serde(flatten)]
    request: ClassifyRequest,
    text: String,
}

#[derive(Deserialize)]
struct NodeRequest {
    #[serde(flatten)]
    request: ClassifyRequest,
    node: Node,
}

#[derive(Deserialize)]
struct BatchRequest {
    #[serde(flatten)]
    request: ClassifyRequest,
    texts: Vec<String>,
}

#[derive(Deserialize)]
struct EvictRequest {
    classifier: String,
}

#[derive(Serialize)]
struct StringResponse {
    segments: Vec<Segment>,
    markup: String,
    processing_ms: u64,
}

#[derive(Serialize)]
struct NodeResponse {
    document: Node,
    markup: String,
}

#[derive(Serialize)]
struct BatchResponse {
    results: Vec<Vec<Segment>>,
}

#[derive(Serialize)]
struct EvictResponse {
    evicted: bool,
}

/// Erro devolvido como `{"error": ...}` com o status correspondente.
#[derive(Debug)]
enum ApiError {
    Ner(NerError),
    Internal(String),
}

impl From<NerError> for ApiError {
    fn from(err: NerError) -> Self {
        ApiError::Ner(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Ner(NerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Ner(NerError::PermissionDenied { .. }) => StatusCode::FORBIDDEN,
            ApiError::Ner(NerError::WrongResourceType { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ner(NerError::Deserialize { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ner(NerError::Io { .. }) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Ner(err) => err.to_string(),
            ApiError::Internal(message) => message.clone(),
        };
        warn!(%status, error = %message, "requisição falhou");
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let store = FsResourceStore::new(&config.resource_root);
    let service = NerService::new(Arc::new(store)).close_at_sentence_end(config.close_at_sentence_end);
    let state = Arc::new(AppState {
        service: Arc::new(service),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/classify/string", post(classify_string_handler))
        .route("/classify/node", post(classify_node_handler))
        .route("/classify/batch", post(classify_batch_handler))
        .route("/classifiers", delete(evict_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("falha ao escutar em {}", config.bind))?;
    info!(
        bind = %config.bind,
        resources = %config.resource_root.display(),
        "servidor NER iniciado"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Roda a classificação (síncrona) fora das threads do runtime.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ner_markup::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// Classificação de um texto via HTTP POST (sem streaming)
async fn classify_string_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StringRequest>,
) -> Result<Json<StringResponse>, ApiError> {
    let start = Instant::now();
    let service = Arc::clone(&state.service);
    let segments = blocking(move || service.classify_string(&req.request, &req.text)).await?;
    let markup = render_markup(&segments);

    Ok(Json(StringResponse {
        segments,
        markup,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Anota uma árvore de documento
async fn classify_node_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let document = blocking(move || service.classify_node(&req.request, &req.node)).await?;
    let markup = document.to_markup();
    Ok(Json(NodeResponse { document, markup }))
}

/// Classifica vários textos de uma vez
async fn classify_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let results = blocking(move || service.classify_batch(&req.request, &req.texts)).await?;
    Ok(Json(BatchResponse { results }))
}

/// Remove um classificador do cache (o próximo uso recarrega do disco)
async fn evict_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvictRequest>,
) -> impl IntoResponse {
    let evicted = state.service.evict_classifier(&req.classifier);
    Json(EvictResponse { evicted })
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe uma requisição, classifica e envia cada segmento assim que sai
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let req = match serde_json::from_str::<StringRequest>(&text) {
                    Ok(req) => req,
                    Err(err) => {
                        let event = ClassifyEvent::Error {
                            message: format!("requisição inválida: {err}"),
                        };
                        if send_event(&mut socket, &event).await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                info!(classifier = %req.request.classifier, chars = req.text.len(), "classificando via WebSocket");

                // O serviço é síncrono: roda numa thread bloqueante e os eventos
                // atravessam para o runtime por um canal assíncrono
                let (tx_std, rx_std) = std::sync::mpsc::channel::<ClassifyEvent>();
                let (tx_async, mut rx_async) = tokio::sync::mpsc::unbounded_channel();

                let service = Arc::clone(&state.service);
                tokio::task::spawn_blocking(move || {
                    service.classify_streaming(&req.request, &req.text, tx_std);
                });
                tokio::task::spawn_blocking(move || {
                    for event in rx_std {
                        if tx_async.send(event).is_err() {
                            break;
                        }
                    }
                });

                while let Some(event) = rx_async.recv().await {
                    if send_event(&mut socket, &event).await.is_err() {
                        return; // cliente desconectou
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ClassifyEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(err) => {
            warn!(error = %err, "evento não serializável");
            Ok(())
        }
    }
}
