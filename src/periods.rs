use crate::schema::{Granularity, Period};
use crate::utils::{advance, period_id, period_label};
use chrono::NaiveDate;
use log::debug;

/// Splits `[start, end)` into contiguous periods of the given granularity.
///
/// Returns an empty vector when `start >= end`. The last period is clamped so
/// that its `end` is exactly `end`. Amounts and percentages start at zero.
pub fn partition(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Vec<Period> {
    let mut periods = Vec::new();
    if start >= end {
        debug!(
            "Empty partition: start {} is not before end {}",
            start, end
        );
        return periods;
    }

    let mut current = start;
    while current < end {
        // Stepping past the calendar's range can only happen at the far end,
        // so the remainder of the range becomes one final period.
        let next = advance(current, granularity).unwrap_or(end);
        let period_end = next.min(end);
        let index = periods.len();

        periods.push(Period {
            id: period_id(current, granularity),
            start: current,
            end: period_end,
            label: period_label(index, current, granularity),
            amount: 0.0,
            percentage: 0.0,
        });

        current = period_end;
    }

    debug!(
        "Partitioned {}..{} into {} {:?} periods",
        start,
        end,
        periods.len(),
        granularity
    );
    periods
}
