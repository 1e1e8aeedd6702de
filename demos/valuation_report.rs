use dotenv::dotenv;
use financial_valuation::llm::{AnalysisEvent, LLMValuationOrchestrator};
use financial_valuation::*;
use serde_json::json;
use tokio::sync::mpsc;

fn sample_payloads() -> Vec<Option<serde_json::Value>> {
    let year = |assets: &str, liabilities: &str, equity: &str, revenue: &str, op: &str, net: &str| {
        json!({
            "status": "000",
            "list": [
                {"account_id": "ifrs-full_Assets", "account_nm": "Total assets", "sj_div": "BS", "thstrm_amount": assets},
                {"account_id": "ifrs-full_CurrentAssets", "account_nm": "Current assets", "sj_div": "BS", "thstrm_amount": "310,000,000,000"},
                {"account_id": "ifrs-full_Liabilities", "account_nm": "Total liabilities", "sj_div": "BS", "thstrm_amount": liabilities},
                {"account_id": "ifrs-full_Equity", "account_nm": "Total equity", "sj_div": "BS", "thstrm_amount": equity},
                {"account_id": "ifrs-full_Revenue", "account_nm": "Revenue", "sj_div": "IS", "thstrm_amount": revenue},
                {"account_id": "dart_OperatingIncomeLoss", "account_nm": "Operating profit", "sj_div": "IS", "thstrm_amount": op},
                {"account_id": "ifrs-full_ProfitLoss", "account_nm": "Net income", "sj_div": "IS", "thstrm_amount": net},
                {"account_id": "ifrs-full_CashFlowsFromUsedInOperatingActivities", "sj_div": "CF", "thstrm_amount": "95,000,000,000"}
            ]
        })
    };

    vec![
        Some(year(
            "820,000,000,000",
            "410,000,000,000",
            "410,000,000,000",
            "1,020,000,000,000",
            "88,000,000,000",
            "61,000,000,000",
        )),
        // The source had nothing for this year.
        Some(json!({"status": "013", "message": "no data"})),
        Some(year(
            "905,000,000,000",
            "430,000,000,000",
            "475,000,000,000",
            "1,187,000,000,000",
            "97,500,000,000",
            "70,200,000,000",
        )),
    ]
}

fn print_report(report: &FinancialReport) {
    println!("📊 Financial statements (millions)\n");
    println!(
        "{:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Year", "Assets", "Equity", "Revenue", "Op. profit", "Net income"
    );
    for row in report.dataset.year_summaries() {
        println!(
            "{:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
            row.year,
            format_thousands(row.assets as f64),
            format_thousands(row.equity as f64),
            format_thousands(row.revenue as f64),
            format_thousands(row.operating_profit as f64),
            format_thousands(row.net_income as f64),
        );
    }

    println!("\n📈 Ratios\n");
    for row in report.ratios.rows() {
        println!(
            "{}: growth {:>8} | op. margin {:>8} | ROE {:>8} | debt ratio {:>8}",
            row.year, row.revenue_growth, row.operating_margin, row.roe, row.debt_ratio
        );
    }

    println!("\n💰 Valuation\n");
    for method in &report.valuation.methods {
        println!("  {:<24} {:>12}", method.label, method.display_value());
    }
    let headline = report.headline();
    println!(
        "  Range: {} ~ {} (midpoint {})",
        headline.low, headline.high, headline.midpoint
    );

    if !report.issues.is_empty() {
        println!("\n⚠️  Data issues");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Sample figures are labelled with the latest three filed years.
    let years = YearRange::default_trailing().years();
    let payloads: Vec<Option<StatementPayload>> = sample_payloads()
        .into_iter()
        .map(|value| value.and_then(|v| serde_json::from_value(v).ok()))
        .collect();

    let report = build_report(&payloads, &years, &ValuationConfig::default());
    print_report(&report);

    let config = BackendConfig::from_env()?;
    let (tx, mut rx) = mpsc::channel(32);
    let orchestrator = LLMValuationOrchestrator::from_config(&config).with_progress(tx);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AnalysisEvent::PromptBuilt { mode } => println!("📝 Prompt built ({:?})", mode),
                AnalysisEvent::BackendInvoked { backend } => println!("🤖 Asking {}...", backend),
                AnalysisEvent::CacheHit => println!("♻️  Reusing cached result"),
                AnalysisEvent::Parsed => println!("✅ Response parsed"),
                AnalysisEvent::ParseFailed { reason } => println!("❌ Unparseable response: {}", reason),
                AnalysisEvent::ProviderFailed { reason } => println!("❌ Backend failed: {}", reason),
                AnalysisEvent::AuthFailed { backend } => println!("🔑 No credential for {}", backend),
            }
        }
    });

    let company = CompanyInfo::new("00999999", "ACME Industrial")
        .with_industry("C29", "Industrial machinery");
    let industry = IndustryInfo {
        sector: Some("Industrial machinery".to_string()),
        avg_per: Some(12.8),
        avg_pbr: Some(1.1),
    };

    println!("\n🧠 Scenario valuation via {}\n", orchestrator.backend_name());
    match orchestrator
        .analyze_company_value(&company, &report.dataset, Some(&industry))
        .await
    {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            println!(
                "\nBase case average: {}",
                format_thousands(payload.base_average())
            );
        }
        Err(AnalysisError::Auth { backend }) => {
            println!(
                "Skipping: set OPENAI_API_KEY or VALUATION_BACKEND=ollama to enable the {} backend.",
                backend
            );
        }
        Err(e) => {
            println!("Generative valuation failed: {}", e);
            if let Some(raw) = e.raw_response() {
                println!("--- raw response ---\n{}", raw);
            }
        }
    }

    Ok(())
}
