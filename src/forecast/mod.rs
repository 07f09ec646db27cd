//! Heuristic procurement forecasts.
//!
//! Four independent generators share the read-only month bucketing in
//! [`bucketing`]. Every generator is a pure function of its inputs and an
//! explicit `as_of` date.

pub mod bucketing;
pub mod demand;
pub mod pricing;
pub mod stock_out;
pub mod summary;
pub mod vendor_risk;

pub use demand::forecast_demand;
pub use pricing::forecast_pricing;
pub use stock_out::forecast_stock_out;
pub use summary::summarize;
pub use vendor_risk::forecast_vendor_risk;
