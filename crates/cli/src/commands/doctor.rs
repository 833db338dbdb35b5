//! `macrosage doctor` — Diagnose configuration and storage health.

use macrosage_config::AppConfig;
use macrosage_memory::SqliteStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 MacroSage Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            Some(config)
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            issues += 1;
            None
        }
    };

    if let Some(config) = &config {
        println!(
            "  ℹ️  Model: {} via {}",
            config.llm.model, config.llm.base_url
        );

        if config.has_llm_key() {
            println!("  ✅ LLM API key configured");
        } else {
            println!("  ⚠️  No LLM API key — set MACROSAGE_API_KEY or OPENAI_API_KEY");
            issues += 1;
        }

        if config.upstream.fred_api_key.is_some() {
            println!("  ✅ FRED API key configured");
        } else {
            println!("  ⚠️  No FRED API key — indicator tools will fail (set FRED_API_KEY)");
            issues += 1;
        }

        if config.upstream.news_api_key.is_some() {
            println!("  ✅ News API key configured");
        } else {
            println!("  ⚠️  No news API key — the news tool will fail (set NEWS_API_KEY)");
            issues += 1;
        }

        match SqliteStore::new(&config.database.path).await {
            Ok(_) => println!("  ✅ Database reachable at {}", config.database.path),
            Err(e) => {
                println!("  ❌ Database unavailable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
