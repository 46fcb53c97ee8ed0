//! Seeded synthetic price series for benches and smoke coverage.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Floor for generated prices; a random walk must never cross zero.
const MIN_PRICE: f64 = 0.01;

/// The next `count` weekdays starting at `start` (inclusive if a weekday).
pub fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut date = start;
    while out.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(date);
        }
        date = date.succ_opt().expect("date range exhausted");
    }
    out
}

/// Deterministic multiplicative random walk over the given dates.
///
/// Same seed, same dates, same parameters — same series, on any platform.
pub fn random_walk(
    seed: u64,
    dates: &[NaiveDate],
    start_price: f64,
    daily_vol: f64,
) -> Vec<(NaiveDate, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start_price;
    dates
        .iter()
        .map(|&date| {
            let step = 1.0 + daily_vol * (rng.gen::<f64>() * 2.0 - 1.0);
            price = (price * step).max(MIN_PRICE);
            (date, price)
        })
        .collect()
}
