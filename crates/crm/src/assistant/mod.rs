//! Prompts for the in-app assistant and the public site assistant.

pub mod actions;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, ChatRole, User};

/// Prior messages included in the chat prompt.
pub const HISTORY_WINDOW: usize = 5;

const TOOLS: &str = "FERRAMENTAS DISPONÍVEIS (você pode executar ações no sistema):

1. CRIAR CONTATO: create_contact(name, email?, phone?, company?, status?, notes?)
2. ATUALIZAR CONTATO: update_contact(contact_id, name?, email?, phone?, company?, status?, notes?)
3. CRIAR OPORTUNIDADE: create_opportunity(name, contact_id?, contact_name?, value?, stage?, probability?, expected_close_date?, notes?)
4. ATUALIZAR OPORTUNIDADE: update_opportunity(opportunity_id, name?, value?, stage?, probability?, expected_close_date?, notes?)
5. CRIAR ATIVIDADE: create_activity(type, subject, contact_id?, opportunity_id?, due_date?, description?)
6. LISTAR CONTATOS: list_contacts(search?, limit?)
7. LISTAR OPORTUNIDADES: list_opportunities(search?, limit?)

INSTRUÇÕES IMPORTANTES:
- Quando o usuário pedir para criar ou editar algo, responda APENAS com a chamada da função no formato exato:
  create_contact(name=\"Nome\", email=\"email@exemplo.com\")
  create_opportunity(name=\"Nome\", value=50000)
  create_activity(type=\"task\", subject=\"Assunto\")
  list_contacts(search=\"nome\")
- Estágios válidos: qualificacao, proposta, negociacao, fechado, perdido.
- Tipos de atividade: task, call, meeting, note. Datas no formato AAAA-MM-DD.
- Não mostre código nem explique como fazer, apenas chame a função.
- Se precisar de mais informações, pergunte ao usuário antes de executar.";

/// Chat prompt for an authenticated user.
///
/// History comes from `context.conversation_history` when the client sends
/// it, otherwise from the stored messages. Only the last
/// [`HISTORY_WINDOW`] entries are used.
#[must_use]
pub fn build_chat_prompt(
    user: &User,
    prompt: &str,
    context: Option<&Value>,
    stored_history: &[ChatMessage],
) -> String {
    let mut out = format!(
        "Você é Helena, uma assistente de CRM inteligente e amigável. \
Seu nome é Helena e você deve sempre se apresentar como Helena.
O usuário atual é {} com papel de {}.

{TOOLS}

Responda de forma natural e amigável, mas seja proativa em executar ações quando solicitado.

",
        user.name, user.role
    );

    if let Some(ctx) = context.filter(|c| !c.is_null()) {
        out.push_str(&format!("Contexto adicional: {ctx}\n\n"));
    }

    let history: Vec<(bool, String)> = match context
        .and_then(|c| c.get("conversation_history"))
        .and_then(Value::as_array)
    {
        Some(entries) => entries
            .iter()
            .map(|m| {
                let is_user = m.get("role").and_then(Value::as_str).unwrap_or("user") == "user";
                let content = m.get("content").and_then(Value::as_str).unwrap_or_default();
                (is_user, content.to_string())
            })
            .collect(),
        None => stored_history
            .iter()
            .map(|m| (m.role == ChatRole::User, m.content.clone()))
            .collect(),
    };

    if !history.is_empty() {
        out.push_str("Histórico da conversa:\n");
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for (is_user, content) in &history[start..] {
            let speaker = if *is_user { "Usuário" } else { "Assistente" };
            out.push_str(&format!("{speaker}: {content}\n"));
        }
        out.push('\n');
    }

    out.push_str(&format!("Usuário: {prompt}\n\nAssistente:"));
    out
}

/// Language of the public site assistant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Pt,
    Es,
    En,
}

impl Language {
    /// Visitor-facing message when the provider is rate limited.
    #[must_use]
    pub fn busy_message(self) -> &'static str {
        match self {
            Self::Pt => "Desculpe, nosso assistente virtual está temporariamente indisponível. \
                         Tente novamente em alguns minutos ou use o formulário de contato.",
            Self::Es => "Lo sentimos, nuestro asistente virtual no está disponible temporalmente. \
                         Intente nuevamente en unos minutos o use el formulario de contacto.",
            Self::En => "Sorry, our virtual assistant is temporarily unavailable. \
                         Please try again in a few minutes or use the contact form.",
        }
    }

    /// Visitor-facing message for any other failure.
    #[must_use]
    pub fn error_message(self) -> &'static str {
        match self {
            Self::Pt => "Desculpe, ocorreu um erro ao processar sua mensagem. \
                         Tente novamente ou use o formulário de contato.",
            Self::Es => "Lo sentimos, ocurrió un error al procesar su mensaje. \
                         Intente nuevamente o use el formulario de contacto.",
            Self::En => "Sorry, an error occurred while processing your message. \
                         Please try again or use the contact form.",
        }
    }

    fn persona(self) -> &'static str {
        match self {
            Self::Pt => "Você é Helena, assistente virtual do nosso estúdio digital. \
Criamos sites focados em conversão, plataformas SaaS, sistemas corporativos, aplicativos \
móveis e e-commerce, além de consultoria em transformação digital.

Seja amigável, profissional e prestativa. Se o visitante quiser orçamento, contato ou \
agendar uma reunião, oriente-o a preencher o formulário de contato no site.

IMPORTANTE: Você NÃO pode criar contatos, oportunidades ou executar ações no CRM. \
Apenas forneça informações e oriente o visitante.",
            Self::Es => "Eres Helena, asistente virtual de nuestro estudio digital. \
Creamos sitios web enfocados en conversión, plataformas SaaS, sistemas corporativos, \
aplicaciones móviles y e-commerce, además de consultoría en transformación digital.

Sé amigable, profesional y servicial. Si el visitante quiere un presupuesto o contacto, \
guíalo para completar el formulario de contacto en el sitio.

IMPORTANTE: NO puedes crear contactos, oportunidades ni ejecutar acciones en el CRM. \
Solo proporciona información y guía al visitante.",
            Self::En => "You are Helena, the virtual assistant of our digital studio. \
We build conversion-focused websites, SaaS platforms, corporate systems, mobile apps and \
e-commerce, plus digital transformation consulting.

Be friendly, professional and helpful. If the visitor wants a quote, contact details or a \
meeting, guide them to fill out the contact form on the website.

IMPORTANT: You CANNOT create contacts, opportunities or execute actions in the CRM. \
Only provide information and guide the visitor.",
        }
    }
}

/// Prompt for an anonymous site visitor.
#[must_use]
pub fn build_public_prompt(language: Language, message: &str, context: Option<&Value>) -> String {
    let mut out = language.persona().to_string();
    if let Some(ctx) = context.filter(|c| !c.is_null()) {
        out.push_str(&format!("\n\nContexto adicional: {ctx}"));
    }
    out.push_str(&format!("\n\nVisitante: {message}\n\nHelena:"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Utc;
    use serde_json::json;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            email: "bia@example.com".into(),
            name: "Bia".into(),
            password_hash: String::new(),
            role: UserRole::Seller,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(id: i64, role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage {
            id,
            user_id: 1,
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_chat_prompt_layout() {
        let prompt = build_chat_prompt(&user(), "Liste meus contatos", None, &[]);
        assert!(prompt.contains("O usuário atual é Bia com papel de vendedor."));
        assert!(prompt.contains("create_opportunity(name"));
        assert!(prompt.ends_with("Usuário: Liste meus contatos\n\nAssistente:"));
        assert!(!prompt.contains("Histórico"));
    }

    #[test]
    fn test_stored_history_window() {
        let history: Vec<_> = (1..=7)
            .map(|i| {
                let role = if i % 2 == 0 { ChatRole::Assistant } else { ChatRole::User };
                message(i, role, &format!("msg-{i}"))
            })
            .collect();
        let prompt = build_chat_prompt(&user(), "oi", None, &history);
        assert!(!prompt.contains("msg-2\n"));
        assert!(prompt.contains("Usuário: msg-3\n"));
        assert!(prompt.contains("Assistente: msg-6\n"));
        assert!(prompt.contains("Usuário: msg-7\n"));
    }

    #[test]
    fn test_client_history_takes_precedence() {
        let ctx = json!({
            "conversation_history": [
                {"role": "user", "content": "primeira"},
                {"role": "assistant", "content": "resposta"}
            ]
        });
        let stored = vec![message(1, ChatRole::User, "armazenada")];
        let prompt = build_chat_prompt(&user(), "oi", Some(&ctx), &stored);
        assert!(prompt.contains("Usuário: primeira\nAssistente: resposta\n"));
        assert!(!prompt.contains("Usuário: armazenada"));
    }

    #[test]
    fn test_public_prompt_language() {
        let prompt = build_public_prompt(Language::En, "Do you build apps?", None);
        assert!(prompt.starts_with("You are Helena"));
        assert!(prompt.ends_with("Visitante: Do you build apps?\n\nHelena:"));

        let lang: Language = serde_json::from_value(json!("es")).unwrap();
        assert_eq!(lang, Language::Es);
    }
}
