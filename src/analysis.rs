//! Análisis de una imagen agrícola.
//!
//! Flujo:
//!   1. Se construye el prompt con el contexto del usuario.
//!   2. Se llama una vez al modelo de visión.
//!   3. Se extrae el JSON de la respuesta (que puede venir rodeado de texto).
//!   4. Filtro estricto: lo no agrícola o de baja confianza se rechaza.
//!   5. Si es agrícola, se cruza el problema detectado con la base de
//!      conocimiento para obtener recomendaciones fiables.
//!
//! Cualquier fallo en 2, 3 o inesperado termina en `AnalysisResult::fallback`:
//! `analyze` nunca devuelve error. Un campo presente con `null` o con un tipo
//! imposible de convertir (p. ej. `"confidence_score": "very low"`) también
//! es un fallo: nunca se le aplica el valor por defecto.
//!
//! Además, una imagen vacía termina en el resultado de respaldo sin llegar a
//! llamar al modelo.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AnalysisError,
    knowledge::{KnowledgeBase, Table},
    models::{
        AnalysisOutcome, AnalysisReport, AnalysisResult, KnowledgeRecord, ParsedModelJson,
        Severity,
    },
    prompt::build_analysis_prompt,
    vision::VisionModel,
};

/// Por debajo de esta confianza la respuesta se trata como no agrícola.
const MIN_CONFIDENCE: f64 = 40.0;
/// Resúmenes más cortos que esto se completan con el nombre local de la ficha.
const SHORT_SUMMARY_CHARS: usize = 50;
/// Resúmenes de cultivo sano más cortos que esto se sustituyen por la plantilla.
const EMPTY_SUMMARY_CHARS: usize = 10;

impl AnalysisResult {
    /// Resultado fijo cuando el análisis no pudo completarse.
    pub fn fallback() -> Self {
        Self {
            plant_type: "Analysis Failed".to_string(),
            pest_detected: false,
            disease_detected: false,
            health_status: "System Error".to_string(),
            severity: Severity::None,
            pest_info: None,
            disease_info: None,
            recommendations: Vec::new(),
            sources: Vec::new(),
            natural_summary:
                "I'm sorry, I couldn't analyze that image clearly. Please try again with a better photo."
                    .to_string(),
        }
    }

    /// Resultado fijo para imágenes que no son de un cultivo.
    pub fn non_agricultural(natural_response: Option<String>) -> Self {
        Self {
            plant_type: "Non-Agricultural Object".to_string(),
            pest_detected: false,
            disease_detected: false,
            health_status: "Not Agricultural".to_string(),
            severity: Severity::None,
            pest_info: None,
            disease_info: None,
            recommendations: vec!["Please upload a clear photo of a crop, plant, or pest.".to_string()],
            sources: Vec::new(),
            natural_summary: natural_response.unwrap_or_else(|| {
                "I'm sorry, I couldn't recognize a plant or crop in this image.".to_string()
            }),
        }
    }
}

/// Devuelve el tramo que va desde la primera `{` hasta la última `}`.
///
/// Es una heurística voraz, no un tokenizador: si el modelo emite varios
/// bloques JSON, el tramo los abarca todos y la decodificación fallará.
pub fn extract_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Primera ficha de la tabla cuyo identificador (con espacios) o nombre local
/// aparece en el problema detectado. Se compara en mayúsculas.
pub fn match_record<'a>(
    knowledge: &'a KnowledgeBase,
    table: Table,
    detected_issue: &str,
) -> Option<&'a KnowledgeRecord> {
    let issue = detected_issue.to_uppercase();
    knowledge
        .candidates(table)
        .iter()
        .find(|(id, record)| {
            issue.contains(&id.replace('_', " ").to_uppercase())
                || issue.contains(&record.local_name.to_uppercase())
        })
        .map(|(_, record)| record)
}

/// Interpreta la respuesta cruda del modelo.
///
/// Es pura e idempotente. Falla si no hay JSON, si el JSON es inválido o si
/// algún campo presente está malformado.
pub fn parse_model_output(
    raw: &str,
    knowledge: &KnowledgeBase,
) -> Result<AnalysisReport, AnalysisError> {
    let span = extract_json_span(raw).ok_or(AnalysisError::Extraction)?;
    let data = ParsedModelJson::from_json(span)?;

    let is_agricultural = data.is_agricultural.unwrap_or(false);
    let confidence = data.confidence_score.unwrap_or(100.0);
    if !is_agricultural || confidence < MIN_CONFIDENCE {
        return Ok(AnalysisReport {
            outcome: AnalysisOutcome::Rejected,
            result: AnalysisResult::non_agricultural(data.natural_response),
        });
    }

    let plant_type = data.plant_name.unwrap_or_else(|| "Unknown Crop".to_string());
    let detected_issue = data.detected_issue.unwrap_or_default();
    let condition = data.condition.unwrap_or_else(|| "Unknown".to_string());
    let mut natural_summary = data.natural_response.unwrap_or_default();

    let condition_upper = condition.to_uppercase();
    let pest_detected = condition_upper.contains("PEST");
    let disease_detected = condition_upper.contains("DISEASE");

    let mut recommendations = vec![
        "Monitor the crop closely.".to_string(),
        "Consult your local technician.".to_string(),
    ];
    let mut pest_info = None;
    let mut disease_info = None;

    for (detected, table, slot) in [
        (pest_detected, Table::Pests, &mut pest_info),
        (disease_detected, Table::Diseases, &mut disease_info),
    ] {
        if !detected {
            continue;
        }
        if let Some(record) = match_record(knowledge, table, &detected_issue) {
            recommendations = record.control_methods.clone();
            if natural_summary.chars().count() < SHORT_SUMMARY_CHARS {
                natural_summary.push_str(&format!(" This resembles {}.", record.local_name));
            }
            *slot = Some(record.clone());
        }
    }

    if !pest_detected && !disease_detected {
        recommendations = vec![
            "Continue Good Agricultural Practices (GAP).".to_string(),
            "Regular monitoring.".to_string(),
        ];
        if condition.to_lowercase().contains("healthy")
            && natural_summary.chars().count() < EMPTY_SUMMARY_CHARS
        {
            natural_summary = format!("The {plant_type} looks healthy. Keep up the good work!");
        }
    }

    let severity = if pest_detected || disease_detected {
        Severity::Moderate
    } else {
        Severity::None
    };

    Ok(AnalysisReport {
        outcome: AnalysisOutcome::Accepted,
        result: AnalysisResult {
            plant_type,
            pest_detected,
            disease_detected,
            health_status: condition,
            severity,
            pest_info,
            disease_info,
            recommendations,
            sources: Vec::new(),
            natural_summary,
        },
    })
}

/// Servicio sin estado mutable: el modelo y la base de conocimiento se
/// comparten entre peticiones concurrentes.
#[derive(Clone)]
pub struct AnalysisService {
    vision: Arc<dyn VisionModel>,
    knowledge: Arc<KnowledgeBase>,
}

impl AnalysisService {
    pub fn new(vision: Arc<dyn VisionModel>, knowledge: Arc<KnowledgeBase>) -> Self {
        Self { vision, knowledge }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn vision(&self) -> &dyn VisionModel {
        self.vision.as_ref()
    }

    /// Punto de entrada público. Siempre devuelve un resultado bien formado.
    pub async fn analyze(&self, image: &[u8], filename: &str, context: &str) -> AnalysisResult {
        self.analyze_report(image, filename, context).await.result
    }

    /// Como `analyze`, indicando además qué rama produjo el resultado.
    pub async fn analyze_report(
        &self,
        image: &[u8],
        filename: &str,
        context: &str,
    ) -> AnalysisReport {
        let analysis_id = Uuid::new_v4();
        info!(
            %analysis_id,
            "Analizando imagen {filename} ({} bytes) con el modelo {}",
            image.len(),
            self.vision.model_name()
        );

        match self.try_analyze(analysis_id, image, context).await {
            Ok(report) => {
                if report.outcome == AnalysisOutcome::Rejected {
                    warn!(%analysis_id, "Imagen {filename} rechazada como no agrícola");
                } else {
                    info!(
                        %analysis_id,
                        "Análisis de {filename} completado: {} / {}",
                        report.result.plant_type,
                        report.result.health_status
                    );
                }
                report
            }
            Err(e) => {
                error!(%analysis_id, "Falló el análisis de la imagen {filename}: {e}");
                AnalysisReport {
                    outcome: AnalysisOutcome::Fallback,
                    result: AnalysisResult::fallback(),
                }
            }
        }
    }

    async fn try_analyze(
        &self,
        analysis_id: Uuid,
        image: &[u8],
        context: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        if image.is_empty() {
            return Err(AnalysisError::Unexpected("la imagen está vacía".to_string()));
        }

        let prompt = build_analysis_prompt(context);
        let raw = self.vision.complete(image, &prompt).await?;
        info!(%analysis_id, "Respuesta cruda del modelo de visión: {raw}");

        parse_model_output(&raw, &self.knowledge)
    }
}
