//! Resolve which LLM provider serves a request.
//!
//! Order: the default active configuration with the highest priority, then any
//! active configuration by priority, then the legacy `GROK_API_KEY`.

use crm_llm::{build_provider, LlmProvider, ProviderKind, ProviderSettings};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::AiConfig;
use crate::server::AppState;

/// Model used with the `GROK_API_KEY` fallback.
pub const FALLBACK_GROK_MODEL: &str = "grok-1";

/// A ready-to-use client plus the names recorded alongside its output.
pub struct ResolvedProvider {
    pub provider: Box<dyn LlmProvider>,
    pub provider_name: String,
    pub model: String,
}

impl ResolvedProvider {
    /// `provider/model`, as stored on analyses and chat metadata.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider_name, self.model)
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Highest-priority usable configuration row.
pub async fn active_config(pool: &SqlitePool) -> Result<Option<AiConfig>, sqlx::Error> {
    let default = sqlx::query_as(
        "SELECT * FROM ai_configs \
         WHERE is_default = 1 AND is_active = 1 AND status = 'active' \
         ORDER BY priority DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    if default.is_some() {
        return Ok(default);
    }

    sqlx::query_as(
        "SELECT * FROM ai_configs \
         WHERE is_active = 1 AND status = 'active' \
         ORDER BY priority DESC, is_default DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Client settings for a stored configuration.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for an unknown provider name.
pub fn settings_for(config: &AiConfig) -> ApiResult<ProviderSettings> {
    let kind: ProviderKind = config
        .provider
        .parse()
        .map_err(|e: crm_llm::LlmError| ApiError::bad_request(e.to_string()))?;

    let mut settings = ProviderSettings::new(kind, config.model_name.clone());
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        settings = settings.with_api_key(key);
    }
    if let Some(url) = config.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        settings = settings.with_base_url(url);
    }
    Ok(settings)
}

/// Provider for the current request.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] when nothing is configured and
/// [`ApiError::Llm`] when the client cannot be built.
pub async fn resolve_provider(state: &AppState) -> ApiResult<ResolvedProvider> {
    if let Some(config) = active_config(&state.db).await? {
        debug!(config_id = config.id, provider = %config.provider, "Using stored AI configuration");
        let settings = settings_for(&config)?;
        return Ok(ResolvedProvider {
            provider: build_provider(&settings)?,
            provider_name: settings.kind.to_string(),
            model: settings.model,
        });
    }

    if let Some(key) = state.config.grok_api_key.as_deref() {
        debug!("No active AI configuration, falling back to GROK_API_KEY");
        let settings =
            ProviderSettings::new(ProviderKind::Grok, FALLBACK_GROK_MODEL).with_api_key(key);
        return Ok(ResolvedProvider {
            provider: build_provider(&settings)?,
            provider_name: ProviderKind::Grok.to_string(),
            model: FALLBACK_GROK_MODEL.to_string(),
        });
    }

    Err(ApiError::bad_request(
        "No active AI configuration. Configure a provider under AI settings.",
    ))
}
