//! Calendar weeks and the deterministic weekly mission selection
//!
//! A week is identified by the ISO date (`YYYY-MM-DD`) of its Monday in UTC.
//! The selection is a seeded shuffle keyed by that string, so every instance
//! and every visitor sees the same missions for the same week.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Week key for the week containing `date` (UTC)
pub fn week_key(date: DateTime<Utc>) -> String {
    monday_of(date.date_naive()).format("%Y-%m-%d").to_string()
}

/// Week key for the current UTC week
pub fn current_week_key() -> String {
    week_key(Utc::now())
}

fn monday_of(day: NaiveDate) -> NaiveDate {
    let offset = day.weekday().num_days_from_monday();
    day - Duration::days(i64::from(offset))
}

/// First `count` items of the shuffle seeded by `week_key`
pub fn weekly_selection<T: Clone>(items: &[T], week_key: &str, count: usize) -> Vec<T> {
    let mut shuffled = seeded_shuffle(items, &format!("week:{}", week_key));
    shuffled.truncate(count);
    shuffled
}

/// Fisher-Yates shuffle driven by xorshift32 seeded from an FNV-1a hash
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
    let mut out = items.to_vec();
    let mut rng = XorShift32::new(fnv1a_utf16(seed));

    for i in (1..out.len()).rev() {
        // next_unit() can return exactly 1.0, clamp to stay in bounds
        let j = ((rng.next_unit() * (i + 1) as f64).floor() as usize).min(i);
        out.swap(i, j);
    }
    out
}

/// FNV-1a (32-bit) over UTF-16 code units, matching the browser-side hash
fn fnv1a_utf16(s: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for unit in s.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_unit(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        f64::from(x) / f64::from(u32::MAX)
    }
}
