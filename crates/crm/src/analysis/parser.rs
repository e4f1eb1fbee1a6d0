//! Parsing of the free-text lead report returned by the model.
//!
//! The prompt asks for `=== HEADER ===` blocks, but models drift, so every
//! section is looked up with three patterns in order:
//!
//! 1. the exact `=== HEADER ===` block, ending at the next `==` line;
//! 2. the bare header followed by `:` or a newline, ending at the next
//!    line opening with three letters or `==`;
//! 3. a short keyword (`Empresa:`, `Riscos:`), same terminator.
//!
//! Score and potential value are pulled from anywhere in the text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Section keys, their report header and keyword fallbacks.
const SECTION_SPECS: &[(Section, &str, &[&str])] = &[
    (Section::CompanyInfo, "INFORMAÇÕES DA EMPRESA", &["Empresa"]),
    (Section::DigitalPresence, "PRESENÇA DIGITAL", &["Digital"]),
    (Section::MarketAnalysis, "ANÁLISE DE MERCADO", &["Mercado"]),
    (Section::FinancialInsights, "INSIGHTS FINANCEIROS", &["Financeiro"]),
    (Section::LeadProfile, "PERFIL DO LEAD", &["Perfil"]),
    (Section::BusinessPotential, "POTENCIAL DE NEGÓCIO", &["Potencial"]),
    (
        Section::Recommendations,
        "RECOMENDAÇÕES ESTRATÉGICAS",
        &["RECOMENDAÇÕES", "Recomendações"],
    ),
    (Section::RiskAssessment, "AVALIAÇÃO DE RISCOS", &["Riscos"]),
    (Section::Sources, "FONTES DE PESQUISA", &["FONTES", "Fontes"]),
];

/// Report headers in the order the prompt lists them.
pub fn report_headers() -> impl Iterator<Item = &'static str> {
    SECTION_SPECS.iter().map(|(_, header, _)| *header)
}

static SCORE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Score de oportunidade[:\s]+(\d+)").unwrap(),
        Regex::new(r"(?i)Score[:\s]+(\d+)").unwrap(),
        Regex::new(r"(?i)opportunity_score[:\s]+(\d+)").unwrap(),
        Regex::new(r"(?i)pontuação[:\s]+(\d+)").unwrap(),
    ]
});

static VALUE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Valor potencial estimado[:\s]+R\$\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)Valor estimado[:\s]+R\$\s*([\d.,]+)").unwrap(),
        Regex::new(r"(?i)potential_value[:\s]+R\$\s*([\d.,]+)").unwrap(),
        Regex::new(r"R\$\s*([\d.,]+)").unwrap(),
    ]
});

// Any line opening with three letters reads as the next heading.
static LOOSE_TERMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\n[A-ZÁÊÔÇ]{3,}|==").unwrap());

static SECTION_REGEXES: LazyLock<Vec<(Section, Vec<Regex>)>> = LazyLock::new(|| {
    SECTION_SPECS
        .iter()
        .map(|(section, header, keywords)| {
            let header = regex::escape(header);
            let mut patterns = vec![
                Regex::new(&format!(r"(?i)=== {header} ===\s*\n")).unwrap(),
                Regex::new(&format!(r"(?i){header}[:\n]+")).unwrap(),
            ];
            patterns.extend(
                keywords
                    .iter()
                    .map(|k| Regex::new(&format!(r"(?i){}[:\n]+", regex::escape(k))).unwrap()),
            );
            (*section, patterns)
        })
        .collect()
});

/// Named report sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    CompanyInfo,
    DigitalPresence,
    MarketAnalysis,
    FinancialInsights,
    LeadProfile,
    BusinessPotential,
    Recommendations,
    RiskAssessment,
    Sources,
}

/// Extracted section bodies; empty when not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub company_info: String,
    pub digital_presence: String,
    pub market_analysis: String,
    pub financial_insights: String,
    pub lead_profile: String,
    pub business_potential: String,
    pub recommendations: String,
    pub risk_assessment: String,
    pub sources: String,
}

impl Sections {
    fn slot(&mut self, section: Section) -> &mut String {
        match section {
            Section::CompanyInfo => &mut self.company_info,
            Section::DigitalPresence => &mut self.digital_presence,
            Section::MarketAnalysis => &mut self.market_analysis,
            Section::FinancialInsights => &mut self.financial_insights,
            Section::LeadProfile => &mut self.lead_profile,
            Section::BusinessPotential => &mut self.business_potential,
            Section::Recommendations => &mut self.recommendations,
            Section::RiskAssessment => &mut self.risk_assessment,
            Section::Sources => &mut self.sources,
        }
    }

    fn is_empty(&self) -> bool {
        [
            &self.company_info,
            &self.digital_presence,
            &self.market_analysis,
            &self.financial_insights,
            &self.lead_profile,
            &self.business_potential,
            &self.recommendations,
            &self.risk_assessment,
            &self.sources,
        ]
        .iter()
        .all(|s| s.is_empty())
    }
}

/// A fully parsed report.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub full_text: String,
    pub opportunity_score: Option<i64>,
    pub potential_value: Option<f64>,
    pub sections: Sections,
}

impl ParsedReport {
    /// Company summary, falling back to digital presence, then the first 500
    /// characters of the report.
    #[must_use]
    pub fn company_summary(&self) -> String {
        if !self.sections.company_info.is_empty() {
            return self.sections.company_info.clone();
        }
        if !self.sections.digital_presence.is_empty() {
            return self.sections.digital_presence.clone();
        }
        self.full_text.chars().take(500).collect()
    }
}

/// Parse a raw model reply.
#[must_use]
pub fn parse_report(raw: &str) -> ParsedReport {
    let full_text = strip_code_fence(raw);
    let mut sections = extract_sections(&full_text);
    if sections.is_empty() {
        sections.company_info.clone_from(&full_text);
    }

    ParsedReport {
        opportunity_score: extract_score(&full_text),
        potential_value: extract_potential_value(&full_text),
        sections,
        full_text,
    }
}

/// Remove a surrounding Markdown code fence, if any.
#[must_use]
pub fn strip_code_fence(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }

    let mut lines = text.lines().skip(1);
    let body: Vec<&str> = lines
        .by_ref()
        .take_while(|line| !line.trim_start().starts_with("```"))
        .collect();
    body.join("\n").trim().to_string()
}

/// First score match, clamped to 0..=100.
#[must_use]
pub fn extract_score(text: &str) -> Option<i64> {
    SCORE_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .map(|score| score.clamp(0, 100))
    })
}

/// First parseable `R$` amount. Dots are thousands separators, the comma is
/// the decimal mark.
#[must_use]
pub fn extract_potential_value(text: &str) -> Option<f64> {
    VALUE_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        parse_brl_amount(&caps[1])
    })
}

/// Parse `50.000,00` style amounts.
#[must_use]
pub fn parse_brl_amount(raw: &str) -> Option<f64> {
    raw.replace('.', "").replace(',', ".").parse().ok()
}

/// Locate every known section.
#[must_use]
pub fn extract_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    for (section, patterns) in SECTION_REGEXES.iter() {
        let body = patterns.iter().enumerate().find_map(|(i, re)| {
            let start = re.find(text)?.end();
            let rest = &text[start..];
            let end = if i == 0 {
                rest.find("\n==").unwrap_or(rest.len())
            } else {
                LOOSE_TERMINATOR.find(rest).map_or(rest.len(), |m| m.start())
            };
            Some(rest[..end].trim().to_string())
        });
        if let Some(body) = body {
            *sections.slot(*section) = body;
        }
    }
    sections
}
