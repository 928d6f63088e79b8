//! Data alignment and transformation pipeline

pub mod aggregate;
pub mod calendar;
pub mod composite;
pub mod config;
pub mod fallback;
pub mod log;
pub mod series;
pub mod transform;

// Re-export main types for cleaner imports
pub use aggregate::ApiResponse;
pub use calendar::MergedRow;
pub use series::{MonthKey, Series, SeriesFetcher, SeriesResult, TimePoint};
pub use transform::{ChartRow, Denominator, TimeRange, TransformParams};
