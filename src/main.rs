// Módulos de la aplicación
mod analysis;
mod api;
mod app_state;
mod config;
mod error;
mod knowledge;
mod models;
mod prompt;
mod vision;

use std::sync::Arc;

use crate::{
    analysis::AnalysisService, app_state::AppState, knowledge::KnowledgeBase,
    vision::OllamaVisionClient,
};
use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Base de conocimiento (inmutable) y cliente del modelo de visión
    let knowledge = Arc::new(KnowledgeBase::philippine());
    info!("Base de conocimiento cargada: {} fichas", knowledge.len());

    let vision = OllamaVisionClient::from_config(&cfg)
        .context("Error inicializando el cliente de visión")?;
    info!(
        "Modelo de visión: {} en {} (timeout {:?})",
        cfg.vision_model, cfg.ollama_base_url, cfg.vision_timeout
    );

    // 4. Estado compartido de la aplicación
    let app_state = AppState {
        config: Arc::new(cfg),
        analysis: AnalysisService::new(Arc::new(vision), knowledge),
    };

    // 5. Router de la API
    let app = api::create_router(app_state.clone()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
