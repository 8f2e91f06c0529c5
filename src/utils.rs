use crate::schema::Granularity;
use chrono::{Datelike, Days, Months, NaiveDate};

/// Next period boundary after `date`. Month steps clamp to the last day of
/// shorter months (Jan 31 -> Feb 29 -> Mar 29).
pub fn advance(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Week => date.checked_add_days(Days::new(7)),
        Granularity::Month => date.checked_add_months(Months::new(1)),
    }
}

pub fn period_label(index: usize, start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Week => format!("Week {} ({})", index + 1, start.format("%Y-%m-%d")),
        Granularity::Month => start.format("%b %Y").to_string(),
    }
}

/// Unique within one partition: consecutive starts never share a day (weeks)
/// or a calendar month (months).
pub fn period_id(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Week => format!("week-{}", start.format("%Y-%m-%d")),
        Granularity::Month => format!("month-{}-{:02}", start.year(), start.month()),
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scales weights so they sum to 1.0. All-zero input is returned unchanged.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / sum).collect()
}

pub fn weights_to_percentages(weights: &[f64]) -> Vec<f64> {
    normalize_weights(weights)
        .into_iter()
        .map(|w| w * 100.0)
        .collect()
}

/// Lower-cases and drops underscores, hyphens and whitespace so that
/// `PO Number`, `po_number` and `po-number` compare equal.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !(c.is_whitespace() || *c == '_' || *c == '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trailing run of ASCII digits, e.g. `PO-2024-075` -> 75.
/// Values too large for `u64` saturate.
pub fn trailing_number(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_end();
    let digits: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

/// First vocabulary entry found (case-insensitively) inside `text`.
pub fn match_keyword<'a>(text: &str, vocabulary: &'a [String]) -> Option<&'a str> {
    let haystack = text.to_lowercase();
    vocabulary
        .iter()
        .find(|word| haystack.contains(&word.to_lowercase()))
        .map(|word| word.as_str())
}

pub fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sq_diff: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (sq_diff / n).sqrt())
}
