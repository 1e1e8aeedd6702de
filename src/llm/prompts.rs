//! Prompts for the three request kinds sent to text-generation backends.

use crate::llm::types::{AnalysisMode, GenerationRequest, LLMValuationPayload};
use crate::ratios::RatioTable;
use crate::schema::{CompanyInfo, FinancialDataset, IndustryInfo};
use log::warn;

pub const SYSTEM_PROMPT_COMPREHENSIVE: &str = r#"
You are a financial analyst specializing in corporate valuation and M&A analysis.
You give accurate, insightful analysis grounded in the figures you are given.
"#;

pub const SYSTEM_PROMPT_STRUCTURED: &str = r#"
You are a corporate valuation engine. You receive financial statements and ratios
and answer with exactly one JSON object.

## RULES
- Output ONLY the JSON object. No introduction, no explanation, no markdown fences.
- All monetary amounts are in millions, the same unit as the input.
- Every scenario object has the numeric keys `conservative`, `base`, `optimistic`,
  with conservative <= base <= optimistic.
- Numbers are plain JSON numbers: no thousands separators, no units, no strings.
"#;

pub const SYSTEM_PROMPT_QUESTION: &str = r#"
You are an analyst specializing in corporate finance and investment analysis.
You answer objectively, based on the data provided.
"#;

const STRUCTURED_SKELETON: &str = r#"{
  "company": "<company name>",
  "ebitda_valuation": {"conservative": 0, "base": 0, "optimistic": 0},
  "dcf_valuation": {"conservative": 0, "base": 0, "optimistic": 0},
  "assumptions": {
    "ebitda_multipliers": {"conservative": 0, "base": 0, "optimistic": 0},
    "discount_rates": {"conservative": 0, "base": 0, "optimistic": 0},
    "growth_rates": {"conservative": 0, "base": 0, "optimistic": 0},
    "terminal_growth_rates": {"conservative": 0, "base": 0, "optimistic": 0}
  },
  "calculations": {
    "average_ebitda": 0,
    "ebitda_description": "<how the EBITDA value was derived>",
    "dcf_description": "<how the DCF value was derived>"
  },
  "summary": "<two or three sentence assessment>"
}"#;

const UNKNOWN: &str = "unknown";

/// Renders company data into [`GenerationRequest`]s.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    comprehensive_max_tokens: u32,
    structured_max_tokens: u32,
    question_max_tokens: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            comprehensive_max_tokens: 1500,
            structured_max_tokens: 2000,
            question_max_tokens: 800,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrative valuation and M&A suitability report.
    pub fn comprehensive(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        ratios: &RatioTable,
        industry: Option<&IndustryInfo>,
    ) -> GenerationRequest {
        let mut user = String::from(
            "Perform a valuation of the company below and analyze it from an investment or acquisition perspective.\n\n",
        );
        user.push_str(&company_section(company));
        user.push_str(&financials_section(dataset));
        user.push_str(&ratios_section(ratios));
        user.push_str(&industry_section(industry));
        user.push_str(
            "## REQUIRED STRUCTURE\n\
             1. Company overview: business model and market position.\n\
             2. Financial condition and trends across the years provided.\n\
             3. Competitiveness within its industry.\n\
             4. Value estimate:\n\
             \x20  - earnings based (PER, EBITDA multiple)\n\
             \x20  - asset based\n\
             \x20  - DCF (rough estimate)\n\
             5. Risk factors for an acquirer or investor.\n\
             6. M&A suitability and suggested approach.\n\
             7. Overall opinion, rating attractiveness as high, medium or low with reasons.\n\n\
             Write clearly for investors and corporate development teams. Combine objective use \
             of the numbers with expert judgement about the industry.\n",
        );

        GenerationRequest {
            mode: AnalysisMode::Comprehensive,
            system: SYSTEM_PROMPT_COMPREHENSIVE.trim().to_string(),
            user,
            temperature: 0.7,
            max_tokens: self.comprehensive_max_tokens,
        }
    }

    /// Scenario valuation that must come back as a single JSON object.
    pub fn structured(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        ratios: &RatioTable,
        industry: Option<&IndustryInfo>,
    ) -> GenerationRequest {
        let mut user = String::from(
            "Value the company below with two methods, each under conservative, base and optimistic scenarios:\n\
             - EBITDA multiple: EV = EBITDA x multiple.\n\
             - DCF: discounted free cash flows plus terminal value.\n\n",
        );
        user.push_str(&company_section(company));
        user.push_str(&financials_section(dataset));
        user.push_str(&ratios_section(ratios));
        user.push_str(&industry_section(industry));

        user.push_str("## OUTPUT FORMAT\n");
        user.push_str(&format!(
            "Return ONLY a JSON object shaped like this, with `company` set to \"{}\":\n{}\n\n",
            display_or_unknown(&company.name),
            STRUCTURED_SKELETON
        ));
        match LLMValuationPayload::schema_as_json() {
            Ok(schema) => {
                user.push_str("It must validate against this JSON Schema:\n");
                user.push_str(&schema);
                user.push('\n');
            }
            Err(e) => warn!("Could not render payload schema for prompt: {}", e),
        }
        user.push_str("\nDo not write anything before or after the JSON object.\n");

        GenerationRequest {
            mode: AnalysisMode::Structured,
            system: SYSTEM_PROMPT_STRUCTURED.trim().to_string(),
            user,
            temperature: 0.2,
            max_tokens: self.structured_max_tokens,
        }
    }

    /// Free-form question about the company's figures.
    pub fn question(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        question: &str,
    ) -> GenerationRequest {
        let mut user = format!(
            "Here are the financial figures of {}:\n\n",
            display_or_unknown(&company.name)
        );
        user.push_str(&financials_section(dataset));
        user.push_str("Based on the information above, answer the following question:\n\n");
        user.push_str(question.trim());
        user.push_str("\n\nAnswer clearly and ground the answer in the data.\n");

        GenerationRequest {
            mode: AnalysisMode::Question,
            system: SYSTEM_PROMPT_QUESTION.trim().to_string(),
            user,
            temperature: 0.5,
            max_tokens: self.question_max_tokens,
        }
    }
}

fn display_or_unknown(value: &Option<String>) -> &str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
}

fn company_section(company: &CompanyInfo) -> String {
    format!(
        "## COMPANY\nName: {}\nIndustry code: {}\nBusiness area: {}\n\n",
        display_or_unknown(&company.name),
        display_or_unknown(&company.industry_code),
        display_or_unknown(&company.business_area),
    )
}

fn financials_section(dataset: &FinancialDataset) -> String {
    let rows = serde_json::to_string_pretty(&dataset.year_summaries()).unwrap_or_else(|e| {
        warn!("Could not serialize financial rows for prompt: {}", e);
        "[]".to_string()
    });
    format!("## FINANCIAL STATEMENTS (millions)\n{}\n\n", rows)
}

fn ratios_section(ratios: &RatioTable) -> String {
    let rows = serde_json::to_string_pretty(&ratios.rows()).unwrap_or_else(|e| {
        warn!("Could not serialize ratio rows for prompt: {}", e);
        "[]".to_string()
    });
    format!(
        "## FINANCIAL RATIOS (\"-\" = not computable)\n{}\n\n",
        rows
    )
}

fn industry_section(industry: Option<&IndustryInfo>) -> String {
    let Some(industry) = industry else {
        return String::new();
    };
    let number = |value: Option<f64>| {
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    format!(
        "## INDUSTRY BENCHMARKS\nSector: {}\nPeer average PER: {}\nPeer average PBR: {}\n\n",
        display_or_unknown(&industry.sector),
        number(industry.avg_per),
        number(industry.avg_pbr),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratios::RatioEngine;

    fn sample() -> (CompanyInfo, FinancialDataset) {
        let company = CompanyInfo::new("00126380", "Samsung Electronics")
            .with_industry("264", "Semiconductors and electronic components");
        let dataset = FinancialDataset::from_json(
            r#"{"years": [2022, 2023], "revenue": [302231, 258935], "net_income": [55654, 15487],
                "operating_profit": [43376, 6566], "equity": [345186, 363677],
                "assets": [448424, 455905], "liabilities": [93674, 92228]}"#,
        )
        .unwrap();
        (company, dataset)
    }

    #[test]
    fn test_structured_prompt_contains_data_and_schema() {
        let (company, dataset) = sample();
        let ratios = RatioEngine::ratios(&dataset);
        let industry = IndustryInfo {
            sector: Some("Semiconductors".to_string()),
            avg_per: Some(15.2),
            avg_pbr: Some(1.8),
        };
        let request = PromptBuilder::new().structured(&company, &dataset, &ratios, Some(&industry));

        assert_eq!(request.mode, AnalysisMode::Structured);
        assert!(request.user.contains("Samsung Electronics"));
        assert!(request.user.contains("302231"));
        assert!(request.user.contains("-14.33%"));
        assert!(request.user.contains("Peer average PER: 15.2"));
        assert!(request.user.contains("\"dcf_valuation\""));
        assert!(request.user.contains("$schema") || request.user.contains("\"properties\""));
        assert!(request.system.contains("Output ONLY the JSON object"));
    }

    #[test]
    fn test_missing_company_fields_render_as_unknown() {
        let (_, dataset) = sample();
        let ratios = RatioEngine::ratios(&dataset);
        let request =
            PromptBuilder::new().comprehensive(&CompanyInfo::default(), &dataset, &ratios, None);

        assert!(request.user.contains("Name: unknown"));
        assert!(!request.user.contains("INDUSTRY BENCHMARKS"));
        assert_eq!(request.max_tokens, 1500);
    }

    #[test]
    fn test_question_prompt_embeds_question() {
        let (company, dataset) = sample();
        let request =
            PromptBuilder::new().question(&company, &dataset, "  Is the 2023 margin drop structural? ");
        assert_eq!(request.mode, AnalysisMode::Question);
        assert!(request.user.contains("Is the 2023 margin drop structural?"));
        assert!(request.user.contains("FINANCIAL STATEMENTS"));
        assert!(!request.user.contains("FINANCIAL RATIOS"));
    }
}
