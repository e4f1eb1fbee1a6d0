//! LLM-backed endpoints: assistant chat, sales copy and the public site chat.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use crm_llm::LlmError;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::ai_provider::resolve_provider;
use crate::assistant::actions::{detect_action, execute};
use crate::assistant::{build_chat_prompt, build_public_prompt, Language, HISTORY_WINDOW};
use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::handlers::opportunities::visible_opportunity;
use crate::models::{ChatMessage, ChatRole, Pagination, UserRole};
use crate::server::AppState;

const PROPOSAL_MAX_TOKENS: u32 = 2000;
const OPPORTUNITY_ANALYSIS_MAX_TOKENS: u32 = 1500;
const QUOTE_MAX_TOKENS: u32 = 2000;
const NEXT_STEPS_MAX_TOKENS: u32 = 1000;
const PUBLIC_CHAT_MAX_TOKENS: u32 = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/history", get(chat_history).delete(clear_chat_history))
        .route("/generate-proposal", post(generate_proposal))
        .route("/analyze-opportunity", post(analyze_opportunity))
        .route("/generate-quote", post(generate_quote))
        .route("/suggest-next-steps", post(suggest_next_steps))
        .route("/public/chat", post(public_chat))
}

fn default_chat_tokens() -> u32 {
    1000
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: String,
    context: Option<Value>,
    #[serde(default = "default_chat_tokens")]
    max_tokens: u32,
}

async fn chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<Value>> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Prompt is required"));
    }

    let stored = recent_messages(&state.db, user.id, HISTORY_WINDOW).await?;
    let full_prompt = build_chat_prompt(&user, &request.prompt, request.context.as_ref(), &stored);

    let resolved = resolve_provider(&state).await?;
    let reply = resolved
        .provider
        .complete(&full_prompt, request.max_tokens)
        .await?;

    let (final_response, action_result) = match detect_action(&reply) {
        Some(call) => {
            info!(user_id = user.id, action = call.kind.as_str(), "Executing assistant action");
            let result = execute(&state, &user, &call).await;
            (reply.replacen(&call.raw, &result, 1), Some(result))
        }
        None => (reply.clone(), None),
    };
    let action_executed = action_result.is_some();

    store_message(&state.db, user.id, ChatRole::User, &request.prompt, None).await?;
    let metadata = action_executed.then(|| {
        json!({
            "action_executed": true,
            "action_result": action_result,
            "original_response": reply,
        })
    });
    store_message(&state.db, user.id, ChatRole::Assistant, &final_response, metadata).await?;

    Ok(Json(json!({
        "response": final_response,
        "timestamp": Utc::now(),
        "action_executed": action_executed,
        "action_result": action_result,
    })))
}

/// Most recent `limit` messages, oldest first.
async fn recent_messages(
    pool: &SqlitePool,
    user_id: i64,
    limit: usize,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let mut rows: Vec<ChatMessage> = sqlx::query_as(
        "SELECT * FROM ai_chat_messages WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

async fn store_message(
    pool: &SqlitePool,
    user_id: i64,
    role: ChatRole,
    content: &str,
    metadata: Option<Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ai_chat_messages (user_id, role, content, message_metadata, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(role)
    .bind(content)
    .bind(metadata.map(SqlJson))
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

async fn chat_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let rows = sqlx::query_as(
        "SELECT * FROM ai_chat_messages WHERE user_id = ? \
         ORDER BY created_at, id LIMIT ? OFFSET ?",
    )
    .bind(user.id)
    .bind(page.limit_or(50))
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn clear_chat_history(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM ai_chat_messages WHERE user_id = ?")
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({
        "message": "Chat history cleared",
        "deleted": result.rows_affected(),
    })))
}

#[derive(Debug, Deserialize)]
struct ProposalRequest {
    opportunity_id: i64,
    company_info: String,
    requirements: String,
    budget: Option<f64>,
}

async fn generate_proposal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ProposalRequest>,
) -> ApiResult<Json<Value>> {
    visible_opportunity(&state.db, &user, request.opportunity_id).await?;

    let budget = request
        .budget
        .map_or_else(|| "A definir".to_string(), |b| format!("R$ {b:.2}"));
    let prompt = format!(
        "Você é um especialista em vendas e propostas comerciais de uma empresa de desenvolvimento de software.

Crie uma proposta comercial profissional baseada nas seguintes informações:

EMPRESA DO CLIENTE: {}

REQUISITOS DO PROJETO: {}

ORÇAMENTO ESTIMADO: {budget}

INSTRUÇÕES:
1. Estrutura profissional com introdução, escopo, benefícios, timeline e preços
2. Seja persuasivo mas realista
3. Use linguagem profissional em português
4. Termine com chamada para ação

FORMATO ESPERADO:
- Título atrativo
- Introdução personalizada
- Escopo detalhado
- Benefícios e ROI
- Timeline estimada
- Investimento
- Próximos passos",
        request.company_info, request.requirements
    );

    let proposal = complete(&state, &prompt, PROPOSAL_MAX_TOKENS).await?;
    Ok(Json(json!({
        "proposal": proposal,
        "generated_at": Utc::now(),
        "opportunity_id": request.opportunity_id,
    })))
}

#[derive(Debug, Deserialize)]
struct AnalyzeOpportunityRequest {
    opportunity_data: Value,
}

async fn analyze_opportunity(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<AnalyzeOpportunityRequest>,
) -> ApiResult<Json<Value>> {
    let prompt = format!(
        "Você é um analista de vendas experiente. Analise esta oportunidade e forneça insights estratégicos.

DADOS DA OPORTUNIDADE:
{}

FORNEÇA:
1. Avaliação da qualidade do lead (Alta/Média/Baixa)
2. Pontos fortes da oportunidade
3. Riscos identificados
4. Estratégia recomendada
5. Probabilidade de fechamento estimada
6. Próximos passos sugeridos

Seja objetivo e forneça recomendações acionáveis.",
        pretty(&request.opportunity_data)
    );

    let analysis = complete(&state, &prompt, OPPORTUNITY_ANALYSIS_MAX_TOKENS).await?;
    Ok(Json(json!({
        "analysis": analysis,
        "opportunity_data": request.opportunity_data,
        "analyzed_at": Utc::now(),
    })))
}

#[derive(Debug, Deserialize)]
struct QuoteRequest {
    project_data: Value,
    requirements: String,
    estimated_hours: i64,
}

async fn generate_quote(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<Value>> {
    let prompt = format!(
        "Você é um gerente de projetos experiente. Crie um orçamento técnico detalhado.

DADOS DO PROJETO:
{}

REQUISITOS TÉCNICOS:
{}

HORAS ESTIMADAS: {}

INSTRUÇÕES:
1. Quebre o projeto em fases/módulos
2. Estime tempo realista para cada parte
3. Inclua margens para imprevistos
4. Sugira tecnologias apropriadas

FORMATO:
- Resumo executivo
- Breakdown detalhado por fase
- Tecnologias recomendadas
- Timeline estimada
- Custos detalhados
- Riscos e mitigações",
        pretty(&request.project_data),
        request.requirements,
        request.estimated_hours
    );

    let quote = complete(&state, &prompt, QUOTE_MAX_TOKENS).await?;
    Ok(Json(json!({
        "quote": quote,
        "project_data": request.project_data,
        "estimated_hours": request.estimated_hours,
        "generated_at": Utc::now(),
    })))
}

async fn suggest_next_steps(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(opportunity_data): Json<Value>,
) -> ApiResult<Json<Value>> {
    let prompt = format!(
        "Com base nesta oportunidade, sugira os próximos passos estratégicos.

DADOS ATUAIS:
{}

CONSIDERE:
- Estágio atual do funil
- Tempo desde último contato
- Ações já realizadas
- Perfil do cliente

SUGIRA:
1. Ação imediata prioritária
2. Sequência de passos para os próximos 7 dias
3. Estratégias de follow-up
4. Possíveis objeções e como contorná-las",
        pretty(&opportunity_data)
    );

    let suggestions = complete(&state, &prompt, NEXT_STEPS_MAX_TOKENS).await?;
    Ok(Json(json!({
        "suggestions": suggestions,
        "opportunity_data": opportunity_data,
        "suggested_at": Utc::now(),
    })))
}

async fn complete(state: &AppState, prompt: &str, max_tokens: u32) -> ApiResult<String> {
    let resolved = resolve_provider(state).await?;
    Ok(resolved.provider.complete(prompt, max_tokens).await?)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[derive(Debug, Deserialize)]
struct PublicChatRequest {
    message: String,
    #[serde(default)]
    language: Option<String>,
    context: Option<Value>,
}

/// Unknown languages fall back to English.
fn parse_language(raw: Option<&str>) -> Language {
    match raw.map(|l| l.trim().to_lowercase()) {
        None => Language::Pt,
        Some(l) => serde_json::from_value(Value::String(l)).unwrap_or(Language::En),
    }
}

fn is_rate_limited(error: &LlmError) -> bool {
    if let LlmError::Api { status: 429, .. } = error {
        return true;
    }
    let text = error.to_string().to_lowercase();
    text.contains("429") || text.contains("quota") || text.contains("rate limit")
}

async fn public_chat(
    State(state): State<AppState>,
    Json(request): Json<PublicChatRequest>,
) -> ApiResult<Json<Value>> {
    let language = parse_language(request.language.as_deref());
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    if db::first_active_user_with_role(&state.db, UserRole::Admin)
        .await?
        .is_none()
    {
        return Err(ApiError::internal("System not configured"));
    }

    let prompt = build_public_prompt(language, &request.message, request.context.as_ref());
    let resolved = resolve_provider(&state).await.map_err(|e| {
        warn!(error = %e, "Public chat has no provider");
        ApiError::internal(language.error_message())
    })?;

    match resolved.provider.complete(&prompt, PUBLIC_CHAT_MAX_TOKENS).await {
        Ok(response) => Ok(Json(json!({
            "response": response,
            "timestamp": Utc::now(),
            "language": language,
        }))),
        Err(e) if is_rate_limited(&e) => {
            warn!(error = %e, "Public chat provider is rate limited");
            Err(ApiError::Unavailable(language.busy_message().to_string()))
        }
        Err(e) => {
            warn!(error = %e, "Public chat completion failed");
            Err(ApiError::internal(language.error_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language() {
        assert_eq!(parse_language(None), Language::Pt);
        assert_eq!(parse_language(Some("ES")), Language::Es);
        assert_eq!(parse_language(Some("de")), Language::En);
    }

    #[test]
    fn test_rate_limit_detection() {
        let api = LlmError::Api {
            status: 429,
            message: "slow down".into(),
        };
        assert!(is_rate_limited(&api));

        let quota = LlmError::Api {
            status: 400,
            message: "Quota exceeded for project".into(),
        };
        assert!(is_rate_limited(&quota));

        assert!(!is_rate_limited(&LlmError::Auth("missing key".into())));
    }
}
