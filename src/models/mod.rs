pub mod energy;

pub use energy::{EnergyData, HealthCheck, HealthStatus, RegisterListing, SummaryQuery};
