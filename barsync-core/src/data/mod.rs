//! Market data acquisition.

pub mod binance;
pub mod provider;

pub use binance::BinanceProvider;
pub use provider::{DataError, FetchRequest, Interval, MarketDataProvider, RawBar};
