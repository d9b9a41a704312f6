//! Errores internos del análisis de imágenes.
//!
//! Ninguno de ellos llega al cliente: `AnalysisService::analyze` los registra
//! y los convierte en el resultado de respaldo.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Fallo de red, estado HTTP no exitoso o cuerpo ilegible del modelo de visión.
    #[error("error de transporte con el modelo de visión: {0}")]
    Transport(String),

    /// La respuesta no contiene ningún tramo `{ ... }`.
    #[error("no se encontró ningún objeto JSON en la respuesta del modelo")]
    Extraction,

    /// Hay un tramo con forma de JSON, pero no es JSON válido.
    #[error("JSON inválido en la respuesta del modelo: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("error inesperado durante el análisis: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
