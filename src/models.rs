//! Modelos de dominio: fichas de la base de conocimiento, la respuesta cruda
//! del modelo de visión y el resultado que se devuelve al agricultor.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AnalysisError;

/// Ficha de una plaga o enfermedad de la base de conocimiento.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeRecord {
    pub scientific_name: String,
    pub local_name: String,
    pub crops_affected: Vec<String>,
    pub description: String,
    pub control_methods: Vec<String>,
}

/// Objeto JSON tal y como llega del modelo, sin interpretar.
///
/// Distingue una clave ausente (`None`) de una presente con `null`
/// (`Some(Value::Null)`), porque solo la ausencia tiene valor por defecto.
#[derive(Debug, Deserialize)]
struct RawModelJson {
    #[serde(default, deserialize_with = "present")]
    is_agricultural: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    plant_name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    detected_issue: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    condition: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    confidence_score: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    natural_response: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Objeto JSON que se le pide al modelo. Todos los campos son opcionales:
/// la ausencia se resuelve con los valores por defecto del analizador.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedModelJson {
    pub is_agricultural: Option<bool>,
    pub plant_name: Option<String>,
    pub detected_issue: Option<String>,
    pub condition: Option<String>,
    pub confidence_score: Option<f64>,
    pub natural_response: Option<String>,
}

impl ParsedModelJson {
    /// Decodifica el tramo JSON extraído de la respuesta.
    ///
    /// JSON inválido es `Decode`. Un campo presente que es `null` o que no se
    /// puede convertir a su tipo es `Unexpected`.
    pub fn from_json(span: &str) -> Result<Self, AnalysisError> {
        let raw: RawModelJson = serde_json::from_str(span)?;
        Ok(Self {
            is_agricultural: coerce_bool("is_agricultural", raw.is_agricultural)?,
            plant_name: coerce_string("plant_name", raw.plant_name)?,
            detected_issue: coerce_string("detected_issue", raw.detected_issue)?,
            condition: coerce_string("condition", raw.condition)?,
            confidence_score: coerce_number("confidence_score", raw.confidence_score)?,
            natural_response: coerce_string("natural_response", raw.natural_response)?,
        })
    }
}

fn malformed(field: &str, value: &Value) -> AnalysisError {
    AnalysisError::Unexpected(format!("el campo `{field}` tiene una forma inválida: {value}"))
}

// Los modelos pequeños a veces devuelven "true", 1 o "85%" en lugar del tipo
// pedido. Se aceptan esas formas; el resto es un registro malformado.

fn coerce_bool(field: &str, value: Option<Value>) -> Result<Option<bool>, AnalysisError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match &value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_f64() {
            Some(x) => Ok(Some(x != 0.0)),
            None => Err(malformed(field, &value)),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Ok(Some(true)),
            "false" | "no" => Ok(Some(false)),
            _ => Err(malformed(field, &value)),
        },
        _ => Err(malformed(field, &value)),
    }
}

fn coerce_number(field: &str, value: Option<Value>) -> Result<Option<f64>, AnalysisError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(x) if x.is_finite() => Ok(Some(x)),
        _ => Err(malformed(field, &value)),
    }
}

fn coerce_string(field: &str, value: Option<Value>) -> Result<Option<String>, AnalysisError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(malformed(field, &other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    None,
    Moderate,
}

/// Resultado que recibe quien llama a `analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub plant_type: String,
    pub pest_detected: bool,
    pub disease_detected: bool,
    pub health_status: String,
    pub severity: Severity,
    pub pest_info: Option<KnowledgeRecord>,
    pub disease_info: Option<KnowledgeRecord>,
    pub recommendations: Vec<String>,
    /// Reservado para citas; de momento siempre vacío.
    pub sources: Vec<String>,
    pub natural_summary: String,
}

/// Cuál de las tres ramas produjo el resultado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Accepted,
    Rejected,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub outcome: AnalysisOutcome,
    pub result: AnalysisResult,
}
