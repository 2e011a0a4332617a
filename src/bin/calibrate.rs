use chrono::{TimeZone, Utc};
use signalbot::replay::{CalibrationReport, MarketScenario, ReplayDriver, SyntheticCandleGenerator};
use signalbot::strategy::{ConfluenceConfig, ConfluenceScorer};
use signalbot::{Result, Settings};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("signalbot=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          SIGNALBOT SCENARIO CALIBRATION               ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let settings = Settings::default();
    let scorer = ConfluenceScorer::new(ConfluenceConfig::from_settings(&settings));
    let driver = ReplayDriver::new(scorer, settings.engine.history_capacity);

    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend"),
        (MarketScenario::Downtrend, "📉 Downtrend"),
        (MarketScenario::Sideways, "↔️  Sideways"),
        (MarketScenario::Volatile, "⚡ Volatile"),
    ];
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().ok_or("bad start time")?;

    let mut results = Vec::new();
    for (scenario, name) in scenarios {
        let candles = SyntheticCandleGenerator::new(42).generate("SYNTH", scenario, 1440, start);
        let labeled = driver.replay_labeled("SYNTH", candles);
        results.push((name, CalibrationReport::from_signals(&labeled)));
    }

    print_summary(&results);

    Ok(())
}

fn print_summary(results: &[(&str, CalibrationReport)]) {
    println!(
        "\n{:<20} {:>8} {:>8} {:>8}",
        "Scenario", "Signals", "Labeled", "Win%"
    );
    println!("{}", "─".repeat(48));

    for (name, report) in results {
        println!(
            "{:<20} {:>8} {:>8} {:>8.1}",
            name, report.total_signals, report.labeled_signals, report.overall.win_rate
        );
    }

    println!("\n📊 Win rate by probability bucket:");
    for (name, report) in results {
        let buckets: Vec<String> = report
            .by_probability_bucket
            .iter()
            .map(|(bucket, stats)| format!("{} {:.0}% ({})", bucket, stats.win_rate, stats.count))
            .collect();
        println!("   {:<20} {}", name, buckets.join(" | "));
    }

    println!("\n═══════════════════════════════════════════════════════\n");
}
