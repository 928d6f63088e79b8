pub mod fred;
pub mod util;
pub mod yahoo_finance;

pub use fred::FredSeriesProvider;
pub use yahoo_finance::YahooSeriesProvider;
