//! CRM actions the assistant can trigger from its reply text.
//!
//! The model is told to answer with a single call such as
//! `create_contact(name="João", email="joao@acme.com")`. The first call found
//! is executed on behalf of the user and its outcome replaces the call in the
//! reply.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tracing::{info, warn};

use crate::analysis::spawn_lead_analysis;
use crate::db;
use crate::handlers::activities::insert_activity;
use crate::handlers::contacts::{insert_contact, save_contact};
use crate::handlers::opportunities::{find_opportunity, insert_opportunity, save_opportunity};
use crate::models::activity::ActivityCreate;
use crate::models::contact::{ContactCreate, ContactUpdate};
use crate::models::opportunity::{valid_probability, OpportunityCreate, OpportunityUpdate};
use crate::models::{
    ActivityStatus, ActivityType, Contact, ContactStatus, Opportunity, OpportunityStage, User,
};
use crate::server::AppState;

/// Rows returned by the list actions.
pub const LIST_LIMIT: i64 = 10;

/// Actions in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateContact,
    UpdateContact,
    CreateOpportunity,
    UpdateOpportunity,
    CreateActivity,
    ListContacts,
    ListOpportunities,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        Self::CreateContact,
        Self::UpdateContact,
        Self::CreateOpportunity,
        Self::UpdateOpportunity,
        Self::CreateActivity,
        Self::ListContacts,
        Self::ListOpportunities,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateContact => "create_contact",
            Self::UpdateContact => "update_contact",
            Self::CreateOpportunity => "create_opportunity",
            Self::UpdateOpportunity => "update_opportunity",
            Self::CreateActivity => "create_activity",
            Self::ListContacts => "list_contacts",
            Self::ListOpportunities => "list_opportunities",
        }
    }
}

static CALL_PATTERNS: LazyLock<Vec<(ActionKind, Regex)>> = LazyLock::new(|| {
    ActionKind::ALL
        .into_iter()
        .map(|kind| {
            let re = Regex::new(&format!(r"(?i){}\s*\(([^)]*)\)", kind.as_str())).unwrap();
            (kind, re)
        })
        .collect()
});

static ARG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|(\w+\.?\w*))"#).unwrap()
});

/// An action call found in a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub kind: ActionKind,
    /// Exact text of the call, replaced by the outcome.
    pub raw: String,
    pub args: Map<String, Value>,
}

/// First action call in `reply`, checking actions in [`ActionKind::ALL`] order.
#[must_use]
pub fn detect_action(reply: &str) -> Option<ActionCall> {
    CALL_PATTERNS.iter().find_map(|(kind, re)| {
        let caps = re.captures(reply)?;
        Some(ActionCall {
            kind: *kind,
            raw: caps[0].to_string(),
            args: parse_args(&caps[1]),
        })
    })
}

/// Parse `key="v", key='v', key=word` pairs.
///
/// Unquoted and quoted values alike become booleans, integers or floats when
/// they read as one.
#[must_use]
pub fn parse_args(raw: &str) -> Map<String, Value> {
    ARG_PATTERN
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (caps[1].to_string(), coerce(value))
        })
        .collect()
}

fn coerce(value: &str) -> Value {
    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    let numeric = !value.is_empty()
        && value.matches('.').count() <= 1
        && value.chars().all(|c| c.is_ascii_digit() || c == '.')
        && value.chars().any(|c| c.is_ascii_digit());
    if numeric {
        if value.contains('.') {
            if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        } else if let Ok(n) = value.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(value.to_string())
}

/// Run `call` as `user` and describe the outcome for the chat reply.
///
/// Failures are reported in the returned text.
pub async fn execute(state: &AppState, user: &User, call: &ActionCall) -> String {
    let outcome = match call.kind {
        ActionKind::CreateContact => create_contact(state, user, call).await,
        ActionKind::UpdateContact => update_contact(state, user, call).await,
        ActionKind::CreateOpportunity => create_opportunity(state, user, call).await,
        ActionKind::UpdateOpportunity => update_opportunity(state, user, call).await,
        ActionKind::CreateActivity => create_activity(state, user, call).await,
        ActionKind::ListContacts => list_contacts(state, user, call).await,
        ActionKind::ListOpportunities => list_opportunities(state, user, call).await,
    };

    match outcome {
        Ok(message) => {
            info!(action = call.kind.as_str(), user_id = user.id, "Assistant action executed");
            message
        }
        Err(message) => {
            warn!(action = call.kind.as_str(), user_id = user.id, %message, "Assistant action failed");
            message
        }
    }
}

type Outcome = Result<String, String>;

fn typed_args<T: DeserializeOwned>(call: &ActionCall) -> Result<T, String> {
    serde_json::from_value(Value::Object(call.args.clone()))
        .map_err(|e| format!("Argumentos inválidos para {}: {e}", call.kind.as_str()))
}

fn db_error(e: impl std::fmt::Display) -> String {
    format!("Erro ao executar ação: {e}")
}

/// Accepts `YYYY-MM-DD` or an ISO timestamp; anything else is ignored.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn visible_to(user: &User, owner_id: i64) -> bool {
    user.owner_scope().is_none_or(|owner| owner == owner_id)
}

#[derive(Debug, Deserialize)]
struct CreateContactArgs {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    #[serde(default)]
    status: ContactStatus,
    notes: Option<String>,
}

async fn create_contact(state: &AppState, user: &User, call: &ActionCall) -> Outcome {
    let args: CreateContactArgs = typed_args(call)?;
    if let Some(email) = args.email.as_deref() {
        if let Some(existing) = db::find_contact_by_email(&state.db, email).await.map_err(db_error)? {
            return Err(format!(
                "Contato com email {email} já existe (ID: {})",
                existing.id
            ));
        }
    }

    let contact = insert_contact(
        &state.db,
        user.id,
        ContactCreate {
            name: args.name,
            email: args.email,
            phone: args.phone,
            company: args.company,
            status: args.status,
            notes: args.notes,
            ..Default::default()
        },
    )
    .await
    .map_err(db_error)?;

    let is_lead = contact.status == ContactStatus::Lead;
    if is_lead {
        spawn_lead_analysis(state.clone(), contact.id);
    }
    Ok(format!(
        "Contato '{}' criado com sucesso{}",
        contact.name,
        if is_lead { " e análise iniciada" } else { "" }
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateContactArgs {
    contact_id: i64,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    status: Option<ContactStatus>,
    notes: Option<String>,
}

async fn update_contact(state: &AppState, user: &User, call: &ActionCall) -> Outcome {
    let args: UpdateContactArgs = typed_args(call)?;
    let mut contact = db::find_contact(&state.db, args.contact_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| format!("Contato com ID {} não encontrado", args.contact_id))?;
    if !visible_to(user, contact.owner_id) {
        return Err("Sem permissão para editar este contato".to_string());
    }

    contact.apply(ContactUpdate {
        name: args.name,
        email: args.email,
        phone: args.phone,
        company: args.company,
        status: args.status,
        notes: args.notes,
        ..Default::default()
    });
    let contact = save_contact(&state.db, &contact).await.map_err(db_error)?;
    Ok(format!("Contato '{}' atualizado com sucesso", contact.name))
}

#[derive(Debug, Deserialize)]
struct CreateOpportunityArgs {
    name: String,
    contact_id: Option<i64>,
    contact_name: Option<String>,
    value: Option<f64>,
    #[serde(default)]
    stage: OpportunityStage,
    #[serde(default = "default_probability")]
    probability: i64,
    expected_close_date: Option<String>,
    notes: Option<String>,
}

fn default_probability() -> i64 {
    50
}

async fn create_opportunity(
    state: &AppState,
    user: &User,
    call: &ActionCall,
) -> Outcome {
    let args: CreateOpportunityArgs = typed_args(call)?;
    if !valid_probability(args.probability) {
        return Err("A probabilidade deve estar entre 0 e 100".to_string());
    }

    let contact = match (args.contact_id, args.contact_name.as_deref()) {
        (Some(id), _) => db::find_contact(&state.db, id)
            .await
            .map_err(db_error)?
            .filter(|c| visible_to(user, c.owner_id))
            .ok_or_else(|| format!("Contato com ID {id} não encontrado"))?,
        (None, Some(name)) => find_or_create_contact(state, user, name).await?,
        (None, None) => {
            return Err("É necessário fornecer contact_id ou contact_name".to_string());
        }
    };

    let opportunity = insert_opportunity(
        &state.db,
        user.id,
        &OpportunityCreate {
            name: args.name,
            contact_id: contact.id,
            value: args.value,
            stage: args.stage,
            probability: args.probability,
            expected_close_date: parse_date(args.expected_close_date.as_deref()),
            notes: args.notes,
        },
    )
    .await
    .map_err(db_error)?;
    Ok(format!(
        "Oportunidade '{}' criada com sucesso para {}",
        opportunity.name, contact.name
    ))
}

async fn find_or_create_contact(state: &AppState, user: &User, name: &str) -> Result<Contact, String> {
    let found: Option<Contact> = sqlx::query_as(
        "SELECT * FROM contacts WHERE name LIKE ? ESCAPE '\\' AND (? IS NULL OR owner_id = ?) \
         ORDER BY id LIMIT 1",
    )
    .bind(db::contains_pattern(name))
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?;
    if let Some(contact) = found {
        return Ok(contact);
    }

    let contact = insert_contact(
        &state.db,
        user.id,
        ContactCreate {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
    .map_err(db_error)?;
    spawn_lead_analysis(state.clone(), contact.id);
    Ok(contact)
}

#[derive(Debug, Deserialize)]
struct UpdateOpportunityArgs {
    opportunity_id: i64,
    name: Option<String>,
    value: Option<f64>,
    stage: Option<OpportunityStage>,
    probability: Option<i64>,
    expected_close_date: Option<String>,
    notes: Option<String>,
}

async fn update_opportunity(
    state: &AppState,
    user: &User,
    call: &ActionCall,
) -> Outcome {
    let args: UpdateOpportunityArgs = typed_args(call)?;
    if args.probability.is_some_and(|p| !valid_probability(p)) {
        return Err("A probabilidade deve estar entre 0 e 100".to_string());
    }

    let mut opportunity = find_opportunity(&state.db, args.opportunity_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| format!("Oportunidade com ID {} não encontrada", args.opportunity_id))?;
    if !visible_to(user, opportunity.owner_id) {
        return Err("Sem permissão para editar esta oportunidade".to_string());
    }

    opportunity.apply(OpportunityUpdate {
        name: args.name,
        value: args.value,
        stage: args.stage,
        probability: args.probability,
        expected_close_date: parse_date(args.expected_close_date.as_deref()),
        notes: args.notes,
        ..Default::default()
    });
    let opportunity = save_opportunity(&state.db, &opportunity)
        .await
        .map_err(db_error)?;
    Ok(format!(
        "Oportunidade '{}' atualizada com sucesso",
        opportunity.name
    ))
}

#[derive(Debug, Deserialize)]
struct CreateActivityArgs {
    #[serde(rename = "type")]
    activity_type: ActivityType,
    subject: String,
    contact_id: Option<i64>,
    opportunity_id: Option<i64>,
    due_date: Option<String>,
    description: Option<String>,
}

async fn create_activity(
    state: &AppState,
    user: &User,
    call: &ActionCall,
) -> Outcome {
    let args: CreateActivityArgs = typed_args(call)?;
    let activity = insert_activity(
        &state.db,
        user.id,
        &ActivityCreate {
            activity_type: args.activity_type,
            subject: args.subject,
            description: args.description,
            due_date: parse_date(args.due_date.as_deref()),
            due_time: None,
            status: ActivityStatus::Pending,
            contact_id: args.contact_id,
            opportunity_id: args.opportunity_id,
            project_id: None,
        },
    )
    .await
    .map_err(db_error)?;
    Ok(format!("Atividade '{}' criada com sucesso", activity.subject))
}

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    search: Option<Value>,
    limit: Option<i64>,
}

impl ListArgs {
    fn search(&self) -> Option<String> {
        match self.search.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(db::contains_pattern(s)),
            Value::Number(n) => Some(db::contains_pattern(&n.to_string())),
            _ => None,
        }
    }

    fn limit(&self) -> i64 {
        self.limit.unwrap_or(LIST_LIMIT).clamp(1, LIST_LIMIT)
    }
}

async fn list_contacts(state: &AppState, user: &User, call: &ActionCall) -> Outcome {
    let args: ListArgs = typed_args(call)?;
    let pattern = args.search();
    let contacts: Vec<Contact> = sqlx::query_as(
        "SELECT * FROM contacts \
         WHERE (? IS NULL OR owner_id = ?) \
           AND (? IS NULL OR name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\' \
                OR company LIKE ? ESCAPE '\\') \
         ORDER BY id LIMIT ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(args.limit())
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    if contacts.is_empty() {
        return Ok("Nenhum contato encontrado.".to_string());
    }
    let lines: Vec<String> = contacts
        .iter()
        .map(|c| format!("- {} ({})", c.name, c.email.as_deref().unwrap_or("sem email")))
        .collect();
    Ok(format!("Contatos encontrados:\n{}", lines.join("\n")))
}

async fn list_opportunities(
    state: &AppState,
    user: &User,
    call: &ActionCall,
) -> Outcome {
    let args: ListArgs = typed_args(call)?;
    let pattern = args.search();
    let opportunities: Vec<Opportunity> = sqlx::query_as(
        "SELECT * FROM opportunities \
         WHERE (? IS NULL OR owner_id = ?) AND (? IS NULL OR name LIKE ? ESCAPE '\\') \
         ORDER BY id LIMIT ?",
    )
    .bind(user.owner_scope())
    .bind(user.owner_scope())
    .bind(&pattern)
    .bind(&pattern)
    .bind(args.limit())
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    if opportunities.is_empty() {
        return Ok("Nenhuma oportunidade encontrada.".to_string());
    }
    let lines: Vec<String> = opportunities
        .iter()
        .map(|o| {
            format!(
                "- {} (R$ {:.2}, {})",
                o.name,
                o.value.unwrap_or(0.0),
                o.stage.as_str()
            )
        })
        .collect();
    Ok(format!("Oportunidades encontradas:\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detects_call_and_args() {
        let reply = r#"Claro! create_contact(name="João Silva", email='joao@acme.com', status=lead)"#;
        let call = detect_action(reply).unwrap();
        assert_eq!(call.kind, ActionKind::CreateContact);
        assert_eq!(
            call.raw,
            r#"create_contact(name="João Silva", email='joao@acme.com', status=lead)"#
        );
        assert_eq!(call.args["name"], json!("João Silva"));
        assert_eq!(call.args["email"], json!("joao@acme.com"));
        assert_eq!(call.args["status"], json!("lead"));
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        let call = detect_action("LIST_CONTACTS()").unwrap();
        assert_eq!(call.kind, ActionKind::ListContacts);
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_detection_order_wins_over_position() {
        let reply = "list_contacts(search=\"a\") e depois create_activity(type=\"task\", subject=\"x\")";
        assert_eq!(detect_action(reply).unwrap().kind, ActionKind::CreateActivity);
    }

    #[test]
    fn test_no_action() {
        assert!(detect_action("Olá! Como posso ajudar?").is_none());
    }

    #[test]
    fn test_value_coercion() {
        let args = parse_args(r#"value=50000, probability="70", rate=0.15, active=True, stage=proposta"#);
        assert_eq!(args["value"], json!(50000));
        assert_eq!(args["probability"], json!(70));
        assert_eq!(args["rate"], json!(0.15));
        assert_eq!(args["active"], json!(true));
        assert_eq!(args["stage"], json!("proposta"));
    }

    #[test]
    fn test_coerce_edge_cases() {
        assert_eq!(coerce("1.2.3"), json!("1.2.3"));
        assert_eq!(coerce("."), json!("."));
        assert_eq!(coerce(""), json!(""));
        assert_eq!(coerce("FALSE"), json!(false));
    }

    #[test]
    fn test_typed_args() {
        let call = detect_action(r#"create_opportunity(name="Site", contact_name="Acme", value=1500)"#)
            .unwrap();
        let parsed: CreateOpportunityArgs = typed_args(&call).unwrap();
        assert_eq!(parsed.probability, 50);
        assert_eq!(parsed.stage, OpportunityStage::Qualificacao);
        assert_eq!(parsed.value, Some(1500.0));

        let bad = detect_action("update_contact(name=\"x\")").unwrap();
        let err = typed_args::<UpdateContactArgs>(&bad).unwrap_err();
        assert!(err.contains("update_contact"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2025-03-10T09:00:00")),
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
        assert_eq!(parse_date(Some("amanhã")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_list_limit_is_capped() {
        let args = ListArgs {
            search: None,
            limit: Some(50),
        };
        assert_eq!(args.limit(), LIST_LIMIT);
        let args = ListArgs {
            search: Some(json!(2024)),
            limit: None,
        };
        assert_eq!(args.search().as_deref(), Some("%2024%"));
    }
}
