pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod meter;
pub mod models;
pub mod routes;
pub mod services;

pub use cache::ResultCache;
pub use config::Config;
pub use error::{AppError, Result};
pub use meter::{MeterApi, MeterClient, RegisterMap};
pub use services::EnergyService;
