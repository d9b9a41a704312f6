use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{app_state::AppState, knowledge::Table, models::AnalysisResult};

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: String) -> ApiError {
    warn!("Petición rechazada: {message}");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_bytes;
    Router::new()
        .route("/api/analyze-image", post(analyze_image_handler))
        .route("/api/knowledge/:table", get(list_knowledge_handler))
        .route("/api/knowledge/:table/:id", get(knowledge_record_handler))
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

// --- Handlers ---

/// Recibe un formulario multipart con el campo `file` (la imagen) y, de forma
/// opcional, el campo `context`. Los fallos del análisis no son errores HTTP:
/// se devuelven como el resultado de respaldo con estado 200.
#[axum::debug_handler]
async fn analyze_image_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut image = None;
    let mut context = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Formulario multipart ilegible: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("No se pudo leer la imagen: {e}")))?;
                image = Some((filename, bytes));
            }
            Some("context") => {
                context = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("No se pudo leer el contexto: {e}")))?;
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = image else {
        return Err(bad_request("Falta el campo 'file' con la imagen.".to_string()));
    };

    info!("Imagen recibida: {filename} ({} bytes)", bytes.len());
    let result = state.analysis.analyze(&bytes, &filename, &context).await;
    Ok(Json(result))
}

fn parse_table(name: &str) -> Result<Table, ApiError> {
    match name {
        "pests" => Ok(Table::Pests),
        "diseases" => Ok(Table::Diseases),
        other => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Tabla desconocida: {other}") })),
        )),
    }
}

/// Lista una tabla completa (`pests` o `diseases`) en su orden de búsqueda.
#[axum::debug_handler]
async fn list_knowledge_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let table = parse_table(&table)?;
    Ok(Json(json!(state.analysis.knowledge().entries(table))))
}

#[axum::debug_handler]
async fn knowledge_record_handler(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let table = parse_table(&table)?;
    match state.analysis.knowledge().get(table, &id) {
        Some(record) => Ok(Json(json!({ "id": id, "record": record }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No existe la ficha '{id}'") })),
        )),
    }
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let vision = state.analysis.vision();
    let reachable = vision.health_check().await;
    Json(json!({
        "status": "ok",
        "vision_model": vision.model_name(),
        "vision_reachable": reachable,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::AnalysisService, config::AppConfig, error::AnalysisError,
        knowledge::KnowledgeBase, vision::VisionModel,
    };
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt; // for oneshot

    const BOUNDARY: &str = "agri-test-boundary";

    struct FixedReply(&'static str);

    #[async_trait]
    impl VisionModel for FixedReply {
        async fn complete(&self, _image: &[u8], _prompt: &str) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn app(reply: &'static str) -> Router {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let analysis = AnalysisService::new(
            Arc::new(FixedReply(reply)),
            Arc::new(KnowledgeBase::philippine()),
        );
        create_router(AppState {
            config: Arc::new(config),
            analysis,
        })
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: image/jpeg\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/analyze-image")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn analyze_returns_matched_pest() {
        let app = app(
            r#"{"is_agricultural": true, "plant_name": "Corn", "condition": "Pest Detected", "detected_issue": "Asian corn borer", "confidence_score": 80, "natural_response": "Holes in the stalk."}"#,
        );
        let response = app
            .oneshot(multipart_request(&[
                ("context", None, "Isabela province"),
                ("file", Some("corn.jpg"), "fake-jpeg-bytes"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["plant_type"], "Corn");
        assert_eq!(body["pest_detected"], true);
        assert_eq!(body["severity"], "Moderate");
        assert_eq!(body["pest_info"]["local_name"], "Uod ng Mais");
        assert_eq!(body["recommendations"][0], "Detasseling");
        assert_eq!(body["sources"], json!([]));
    }

    #[tokio::test]
    async fn analysis_failure_is_still_200_with_fallback() {
        let app = app("The model is overloaded, sorry.");
        let response = app
            .oneshot(multipart_request(&[("file", Some("leaf.jpg"), "bytes")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["plant_type"], "Analysis Failed");
        assert_eq!(body["health_status"], "System Error");
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let app = app("{}");
        let response = app
            .oneshot(multipart_request(&[("context", None, "no image here")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn knowledge_listing_keeps_table_order() {
        let response = app("{}")
            .oneshot(
                Request::builder()
                    .uri("/api/knowledge/pests")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0]["id"], "armyworm");
        assert_eq!(entries[6]["id"], "stem_borer");
    }

    #[tokio::test]
    async fn single_record_lookup() {
        let found = app("{}")
            .oneshot(
                Request::builder()
                    .uri("/api/knowledge/diseases/rice_blast")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        let body = json_body(found).await;
        assert_eq!(body["record"]["scientific_name"], "Magnaporthe oryzae");

        let missing = app("{}")
            .oneshot(
                Request::builder()
                    .uri("/api/knowledge/pests/rice_blast")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_vision_model() {
        let response = app("{}")
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["vision_model"], "fixed");
        assert_eq!(body["vision_reachable"], true);
    }
}
