pub mod energy;
pub mod summary;

pub use energy::{EnergyService, ReadingSettings};
pub use summary::{SummaryEngine, SummaryReport, Tariff};
