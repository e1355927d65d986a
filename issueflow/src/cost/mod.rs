//! Operational cost attribution over stored issue records

/// Cost rows and the attributor that produces them
pub mod attributor;
/// Income weights and hourly rates
pub mod rates;

pub use attributor::{CostAttributor, CostRow, WorkItemKind, WorkItemLabels, COST_COLUMNS};
pub use rates::{hourly_rate, MemoryRateDirectory, RateDirectory, DEFAULT_RATE_DIVISOR};
