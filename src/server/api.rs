use crate::agent::FaqAgent;
use crate::cli::Args;
use crate::error::{ ApiError, StoreError };
use crate::models::chat::{ ChatRequest, ChatResponse };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    extract::{ rejection::JsonRejection, State },
    http::StatusCode,
    response::IntoResponse,
    routing::{ get, post },
    Json,
    Router,
};
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ debug, error, info, warn };

#[derive(Clone)]
struct AppState {
    agent: Arc<FaqAgent>,
}

pub fn router(agent: Arc<FaqAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/db-test", get(db_test_handler))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    args: &Args,
    agent: Arc<FaqAgent>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("{}:{}", args.host, args.port).parse::<SocketAddr>()?;
    let app = router(agent);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener
            ::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;

        info!("Starting HTTP server on: http://{}", addr);
        axum::serve(listener, app).await?;
    }

    Ok(())
}

async fn home_handler() -> &'static str {
    "Hello from Chatbot Backend!"
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        json!({
            "status": "OK",
            "message": "Backend is running",
            "db_connection_setup": state.agent.db_status().to_string(),
            "llm_configured": state.agent.llm_status().to_string(),
        })
    )
}

async fn db_test_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.agent.count_faqs().await {
        Ok(count) =>
            (
                StatusCode::OK,
                Json(
                    json!({
                        "status": "OK",
                        "message": format!("DB Connection OK. Found {} FAQs.", count),
                    })
                ),
            ),
        Err(StoreError::NotConfigured) =>
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(
                    json!({
                        "status": "Error",
                        "message": "Database connection not configured properly.",
                    })
                ),
            ),
        Err(e) => {
            error!("Error during DB test query: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(
                    json!({
                        "status": "Error",
                        "message": format!("DB query failed: {}", e),
                    })
                ),
            )
        }
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        warn!("Rejected chat request body: {}", e);
        ApiError::BadRequest("Invalid request body".to_string())
    })?;
    let message = req.message.ok_or_else(||
        ApiError::BadRequest("Missing 'message' in request body".to_string())
    )?;
    debug!("Received message: {}", message);

    let reply = state.agent.answer(&message, req.conversation_id.as_deref()).await?;
    Ok(Json(ChatResponse { reply }))
}
