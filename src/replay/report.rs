use super::driver::LabeledSignal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bounds (inclusive) of the probability buckets
const BUCKETS: [(f64, &str); 6] = [
    (50.0, "<50"),
    (60.0, "50-60"),
    (70.0, "60-70"),
    (80.0, "70-80"),
    (90.0, "80-90"),
    (100.0, "90-100"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
}

impl BucketStats {
    fn record(&mut self, won: bool) {
        self.count += 1;
        if won {
            self.wins += 1;
        }
        self.win_rate = self.wins as f64 / self.count as f64 * 100.0;
    }
}

/// Win rates of labeled signals, for calibrating the probability score
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub total_signals: usize,
    pub labeled_signals: usize,
    pub overall: BucketStats,
    pub by_confluences: BTreeMap<u8, BucketStats>,
    pub by_probability_bucket: BTreeMap<String, BucketStats>,
}

impl CalibrationReport {
    /// Unlabeled signals count toward `total_signals` only
    pub fn from_signals(signals: &[LabeledSignal]) -> Self {
        let mut report = Self {
            total_signals: signals.len(),
            ..Default::default()
        };

        for labeled in signals {
            let won = match labeled.won {
                Some(w) => w,
                None => continue,
            };

            report.labeled_signals += 1;
            report.overall.record(won);
            report
                .by_confluences
                .entry(labeled.signal.confluence_count)
                .or_default()
                .record(won);
            report
                .by_probability_bucket
                .entry(probability_bucket(labeled.signal.probability).to_string())
                .or_default()
                .record(won);
        }

        report
    }
}

/// Right-inclusive bucket label: 50.0 is "<50", 50.01 is "50-60"
pub fn probability_bucket(probability: f64) -> &'static str {
    BUCKETS
        .iter()
        .find(|(upper, _)| probability <= *upper)
        .map(|(_, label)| *label)
        .unwrap_or("90-100")
}
