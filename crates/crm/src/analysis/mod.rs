//! Background lead analysis.
//!
//! New leads are handed to the active LLM with a research prompt. The reply
//! is parsed into named sections plus an opportunity score and an estimated
//! deal value, then stored on the contact's single `lead_analyses` row.

pub mod parser;

use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ai_provider::resolve_provider;
use crate::db;
use crate::error::ApiResult;
use crate::models::{AnalysisStatus, Contact, LeadAnalysis, Opportunity, OpportunityStage};
use crate::server::AppState;

pub use parser::{parse_report, ParsedReport};

/// Token budget for a full report.
pub const ANALYSIS_MAX_TOKENS: u32 = 4000;

/// Probability given to follow-up opportunities when the report has no score.
pub const DEFAULT_FOLLOWUP_PROBABILITY: i64 = 50;

/// Run the analysis on the runtime without waiting for it.
pub fn spawn_lead_analysis(state: AppState, contact_id: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_lead_analysis(&state, contact_id).await {
            error!(contact_id, error = %e, "Lead analysis failed");
        }
    })
}

/// Analyse one contact and persist the outcome.
///
/// Returns `None` when the contact does not exist. A contact that already has
/// a completed analysis is left alone. Provider problems are recorded on the
/// row as status `error` rather than returned.
///
/// # Errors
///
/// Returns an error only when the database fails.
pub async fn run_lead_analysis(
    state: &AppState,
    contact_id: i64,
) -> ApiResult<Option<LeadAnalysis>> {
    let Some(contact) = db::find_contact(&state.db, contact_id).await? else {
        warn!(contact_id, "Skipping analysis for missing contact");
        return Ok(None);
    };

    if let Some(existing) = find_analysis(&state.db, contact_id).await? {
        if existing.analysis_status == AnalysisStatus::Completed {
            debug!(contact_id, "Lead already analysed");
            return Ok(Some(existing));
        }
    }

    let analysis = mark_pending(&state.db, contact_id).await?;

    let resolved = match resolve_provider(state).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(contact_id, error = %e, "No AI provider for lead analysis");
            return mark_error(&state.db, analysis.id, &e.to_string())
                .await
                .map(Some);
        }
    };

    info!(contact_id, provider = %resolved.label(), "Analysing lead");
    let prompt = build_prompt(&contact);
    let reply = match resolved.provider.complete(&prompt, ANALYSIS_MAX_TOKENS).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(contact_id, error = %e, "Provider call failed");
            return mark_error(&state.db, analysis.id, &e.to_string())
                .await
                .map(Some);
        }
    };

    let report = parse_report(&reply);
    let metadata = json!({
        "digital_presence": report.sections.digital_presence,
        "lead_profile": report.sections.lead_profile,
        "business_potential": report.sections.business_potential,
        "sources": report.sections.sources,
        "potential_value": report.potential_value,
        "full_analysis": report.full_text,
        "ai_model": resolved.model,
        "provider": resolved.provider_name,
    });

    let now = Utc::now();
    let stored: LeadAnalysis = sqlx::query_as(
        "UPDATE lead_analyses SET \
         company_info = ?, market_analysis = ?, financial_insights = ?, recommendations = ?, \
         risk_assessment = ?, opportunity_score = ?, analysis_metadata = ?, ai_model_used = ?, \
         analysis_status = ?, error_message = NULL, analyzed_at = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(report.company_summary())
    .bind(non_empty(&report.sections.market_analysis))
    .bind(non_empty(&report.sections.financial_insights))
    .bind(non_empty(&report.sections.recommendations))
    .bind(non_empty(&report.sections.risk_assessment))
    .bind(report.opportunity_score)
    .bind(Json(metadata))
    .bind(resolved.label())
    .bind(AnalysisStatus::Completed)
    .bind(now)
    .bind(now)
    .bind(analysis.id)
    .fetch_one(&state.db)
    .await?;

    info!(
        contact_id,
        score = ?stored.opportunity_score,
        potential_value = ?report.potential_value,
        "Lead analysis completed"
    );
    Ok(Some(stored))
}

pub async fn find_analysis(
    pool: &SqlitePool,
    contact_id: i64,
) -> Result<Option<LeadAnalysis>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM lead_analyses WHERE contact_id = ?")
        .bind(contact_id)
        .fetch_optional(pool)
        .await
}

async fn mark_pending(pool: &SqlitePool, contact_id: i64) -> Result<LeadAnalysis, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        "INSERT INTO lead_analyses (contact_id, analysis_status, created_at, updated_at) \
         VALUES (?, ?, ?, ?) \
         ON CONFLICT(contact_id) DO UPDATE SET \
         analysis_status = excluded.analysis_status, updated_at = excluded.updated_at \
         RETURNING *",
    )
    .bind(contact_id)
    .bind(AnalysisStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

async fn mark_error(
    pool: &SqlitePool,
    analysis_id: i64,
    message: &str,
) -> ApiResult<LeadAnalysis> {
    let row = sqlx::query_as(
        "UPDATE lead_analyses SET analysis_status = ?, error_message = ?, updated_at = ? \
         WHERE id = ? RETURNING *",
    )
    .bind(AnalysisStatus::Error)
    .bind(message)
    .bind(Utc::now())
    .bind(analysis_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

fn non_empty(section: &str) -> Option<&str> {
    (!section.is_empty()).then_some(section)
}

fn or_missing(value: Option<&str>, missing: &'static str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| missing.to_string(), ToString::to_string)
}

/// Research prompt for a contact.
#[must_use]
pub fn build_prompt(contact: &Contact) -> String {
    let company = or_missing(contact.company.as_deref(), "Não informado");
    let status = serde_json::to_value(contact.status)
        .ok()
        .and_then(|v| v.as_str().map(ToString::to_string))
        .unwrap_or_default();

    let mut extra = String::new();
    for (label, value) in [
        ("Cargo", &contact.position),
        ("Setor", &contact.industry),
        ("Tamanho da empresa", &contact.company_size),
        ("Site", &contact.website),
        ("LinkedIn", &contact.linkedin),
        ("Orçamento", &contact.budget_range),
        ("Prazo", &contact.timeline),
        ("Tipo de projeto", &contact.project_type),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            extra.push_str(&format!("- {label}: {v}\n"));
        }
    }

    let layout: String = parser::report_headers()
        .map(|h| format!("=== {h} ===\n{}\n\n", section_hint(h)))
        .collect();

    format!(
        "Você é um especialista em análise de leads e prospecção comercial. \
Sua tarefa é criar um relatório COMPLETO e ESTRUTURADO sobre este lead.

DADOS DO LEAD:
- Nome: {name}
- Email: {email}
- Telefone: {phone}
- Empresa: {company}
- Status: {status}
- Notas: {notes}
- Data de criação: {created}
{extra}
INSTRUÇÕES IMPORTANTES:
1. Pesquise tudo sobre a empresa \"{company}\": site oficial, redes sociais, faturamento \
anual estimado, número de funcionários, localização, setor, produtos e serviços, clientes \
conhecidos e notícias recentes.
2. Analise o perfil do lead: cargo, nível de decisão, urgência e orçamento estimado.
3. Avalie o potencial: score de oportunidade (0-100), probabilidade de fechamento, valor \
potencial estimado e prazo estimado para fechamento.
4. Forneça recomendações práticas e acionáveis.

RESPONDA APENAS EM TEXTO ESTRUTURADO (NÃO JSON), no seguinte formato:

{layout}Seja detalhado e use informações reais quando possível. Se não encontrar \
informações específicas, indique claramente.",
        name = contact.name,
        email = or_missing(contact.email.as_deref(), "Não informado"),
        phone = or_missing(contact.phone.as_deref(), "Não informado"),
        notes = or_missing(contact.notes.as_deref(), "Nenhuma nota"),
        created = contact.created_at.format("%d/%m/%Y"),
    )
}

fn section_hint(header: &str) -> &'static str {
    match header {
        "INFORMAÇÕES DA EMPRESA" => {
            "[Nome da empresa, setor, tamanho, localização, faturamento anual estimado, número de funcionários]"
        }
        "PRESENÇA DIGITAL" => "[Site: URL]\n[LinkedIn: URL]\n[Outras redes sociais relevantes]",
        "ANÁLISE DE MERCADO" => "[Posicionamento, concorrentes, diferenciais, tendências do setor]",
        "INSIGHTS FINANCEIROS" => "[Faturamento estimado, capacidade de investimento]",
        "PERFIL DO LEAD" => "[Cargo, nível de decisão, urgência, necessidade identificada]",
        "POTENCIAL DE NEGÓCIO" => {
            "[Score de oportunidade: X/100]\n[Valor potencial estimado: R$ X]\n\
             [Prazo estimado para fechamento: X meses]\n[Probabilidade de fechamento: X%]"
        }
        "RECOMENDAÇÕES ESTRATÉGICAS" => "[Abordagem recomendada, timing ideal, próximos passos]",
        "AVALIAÇÃO DE RISCOS" => "[Riscos identificados, pontos de atenção]",
        _ => "[Fontes utilizadas: sites, redes sociais, notícias]",
    }
}

/// Poll for a finished analysis and open a first opportunity from it.
pub fn spawn_opportunity_followup(state: AppState, contact_id: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let followup = state.config.lead_followup.clone();
        for attempt in 1..=followup.attempts {
            tokio::time::sleep(followup.interval).await;

            match find_analysis(&state.db, contact_id).await {
                Ok(Some(analysis)) if analysis.analysis_status == AnalysisStatus::Completed => {
                    match create_opportunity_from_analysis(&state.db, contact_id, &analysis).await
                    {
                        Ok(Some(opp)) => {
                            info!(contact_id, opportunity_id = opp.id, "Opened opportunity from analysis");
                        }
                        Ok(None) => debug!(contact_id, "Contact already has an opportunity"),
                        Err(e) => error!(contact_id, error = %e, "Failed to open opportunity"),
                    }
                    return;
                }
                Ok(Some(analysis)) if analysis.analysis_status == AnalysisStatus::Error => {
                    warn!(contact_id, "Analysis failed, no opportunity created");
                    return;
                }
                Ok(_) => debug!(contact_id, attempt, "Analysis not finished yet"),
                Err(e) => warn!(contact_id, attempt, error = %e, "Failed to poll analysis"),
            }
        }
        warn!(contact_id, "Gave up waiting for lead analysis");
    })
}

/// Probability for the follow-up opportunity; a missing or zero score falls
/// back to the default.
fn followup_probability(score: Option<i64>) -> i64 {
    score
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_FOLLOWUP_PROBABILITY)
}

/// Create `"{company|name} - Oportunidade"` unless the contact already has an
/// opportunity.
pub async fn create_opportunity_from_analysis(
    pool: &SqlitePool,
    contact_id: i64,
    analysis: &LeadAnalysis,
) -> Result<Option<Opportunity>, sqlx::Error> {
    let Some(contact) = db::find_contact(pool, contact_id).await? else {
        return Ok(None);
    };

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM opportunities WHERE contact_id = ? LIMIT 1")
            .bind(contact_id)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let now = Utc::now();
    let opportunity = sqlx::query_as(
        "INSERT INTO opportunities \
         (name, contact_id, value, stage, probability, owner_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(format!("{} - Oportunidade", contact.display_company()))
    .bind(contact_id)
    .bind(analysis.potential_value())
    .bind(OpportunityStage::Qualificacao)
    .bind(followup_probability(analysis.opportunity_score))
    .bind(contact.owner_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(Some(opportunity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactStatus;

    fn contact() -> Contact {
        let now = Utc::now();
        Contact {
            id: 3,
            name: "Maria Souza".into(),
            email: Some("maria@padaria.com.br".into()),
            phone: None,
            company: Some("Padaria Pão Quente".into()),
            status: ContactStatus::Lead,
            notes: None,
            project_type: None,
            budget_range: Some("10k-25k".into()),
            timeline: None,
            website: None,
            linkedin: None,
            position: None,
            industry: None,
            company_size: None,
            source: None,
            contact_metadata: None,
            owner_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_prompt_includes_lead_data_and_sections() {
        let prompt = build_prompt(&contact());
        assert!(prompt.contains("- Nome: Maria Souza"));
        assert!(prompt.contains("- Telefone: Não informado"));
        assert!(prompt.contains("- Notas: Nenhuma nota"));
        assert!(prompt.contains("- Status: lead"));
        assert!(prompt.contains("- Orçamento: 10k-25k"));
        assert!(prompt.contains("\"Padaria Pão Quente\""));
        for header in parser::report_headers() {
            assert!(prompt.contains(&format!("=== {header} ===")), "{header}");
        }
    }

    #[test]
    fn test_followup_probability() {
        assert_eq!(followup_probability(Some(82)), 82);
        assert_eq!(followup_probability(Some(0)), DEFAULT_FOLLOWUP_PROBABILITY);
        assert_eq!(followup_probability(None), DEFAULT_FOLLOWUP_PROBABILITY);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("x"), Some("x"));
    }
}
