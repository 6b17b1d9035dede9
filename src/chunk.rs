//! Chunk-size estimation for date-windowed photo loading.
//!
//! A container only tells us its date range and how many photos it holds. From
//! that we pick a window size (in days or months) that should return roughly
//! `target` photos per request, assuming photos are spread evenly. Sparse,
//! long-lived containers are paged by month; denser ones by day.

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;

use crate::model::Container;

/// Photos per request the estimation aims for when nothing else is configured.
pub const DEFAULT_TARGET_BATCH: u32 = 200;

const MIN_DAYS: u32 = 3;
const MAX_DAYS: u32 = 15;
const MIN_MONTHS: u32 = 1;
const MAX_MONTHS: u32 = 2;
const FALLBACK_MONTHS: u32 = 3;

/// Below this many photos per day a long container is paged by month.
const SPARSE_DENSITY_PER_DAY: f64 = 2.0;
/// Month paging only applies to containers spanning more than this many months.
const LONG_SPAN_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkMode {
    Days,
    Months,
}

/// Window size used to page through one container. Computed once per loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkStrategy {
    pub mode: ChunkMode,
    pub size: u32,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::months(FALLBACK_MONTHS)
    }
}

impl ChunkStrategy {
    pub fn days(size: u32) -> Self {
        Self {
            mode: ChunkMode::Days,
            size: size.max(1),
        }
    }

    pub fn months(size: u32) -> Self {
        Self {
            mode: ChunkMode::Months,
            size: size.max(1),
        }
    }

    /// Estimate a window size that keeps each fetch near `target` photos.
    pub fn estimate(container: &Container, target: u32) -> Self {
        let (min, max) = match (container.min_date, container.max_date) {
            (Some(min), Some(max)) if container.number_of_photos > 0 => (min, max),
            _ => return Self::default(),
        };

        let target = f64::from(target.max(1));
        let photos = container.number_of_photos as f64;

        let total_days = days_between(min, max).max(1) as f64;
        let total_months = months_spanned(min, max).max(1);

        let density_per_day = photos / total_days;
        let density_per_month = photos / f64::from(total_months);

        if density_per_day < SPARSE_DENSITY_PER_DAY && total_months > LONG_SPAN_MONTHS {
            Self::months(clamp_ceil(target / density_per_month, MIN_MONTHS, MAX_MONTHS))
        } else {
            Self::days(clamp_ceil(target / density_per_day, MIN_DAYS, MAX_DAYS))
        }
    }

    /// Move `date` one chunk earlier, saturating at the earliest representable date.
    pub fn step_back(&self, date: NaiveDate) -> NaiveDate {
        let moved = match self.mode {
            ChunkMode::Days => date.checked_sub_days(Days::new(u64::from(self.size))),
            ChunkMode::Months => date.checked_sub_months(Months::new(self.size)),
        };
        moved.unwrap_or(NaiveDate::MIN)
    }

    /// Move `date` one chunk later, saturating at the latest representable date.
    pub fn step_forward(&self, date: NaiveDate) -> NaiveDate {
        let moved = match self.mode {
            ChunkMode::Days => date.checked_add_days(Days::new(u64::from(self.size))),
            ChunkMode::Months => date.checked_add_months(Months::new(self.size)),
        };
        moved.unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mode, self.size) {
            (ChunkMode::Days, 1) => write!(f, "1 jour"),
            (ChunkMode::Days, n) => write!(f, "{} jours", n),
            (ChunkMode::Months, n) => write!(f, "{} mois", n),
        }
    }
}

fn days_between(min: NaiveDate, max: NaiveDate) -> i64 {
    (max - min).num_days().abs()
}

/// Inclusive count of calendar months touched by `[min, max]`.
fn months_spanned(min: NaiveDate, max: NaiveDate) -> u32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let months = (max.year() - min.year()) * 12 + max.month() as i32 - min.month() as i32 + 1;
    months.max(1) as u32
}

fn clamp_ceil(value: f64, lo: u32, hi: u32) -> u32 {
    if !value.is_finite() {
        return hi;
    }
    (value.ceil().max(0.0) as u32).clamp(lo, hi)
}
