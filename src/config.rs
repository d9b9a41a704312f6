//! Carga y gestión de configuración de la aplicación (servidor + modelo de visión).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use url::Url;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_VISION_MODEL: &str = "llava";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3322";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub max_upload_bytes: usize,

    pub ollama_base_url: String,
    pub vision_model: String,
    pub vision_timeout: Duration,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria.
    /// Las variables vacías cuentan como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_addr = get("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("MAX_UPLOAD_BYTES no es un número válido: {raw}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let base_url_raw =
            get("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        Url::parse(base_url_raw.trim())
            .map_err(|e| anyhow!("OLLAMA_BASE_URL inválida ({base_url_raw}): {e}"))?;
        let ollama_base_url = base_url_raw.trim().trim_end_matches('/').to_string();

        let vision_model =
            get("OLLAMA_VISION_MODEL").unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string());

        let timeout_secs = match get("VISION_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("VISION_TIMEOUT_SECS no es un número válido: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(anyhow!("VISION_TIMEOUT_SECS debe ser mayor que cero"));
        }

        Ok(Self {
            server_addr,
            max_upload_bytes,
            ollama_base_url,
            vision_model,
            vision_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
