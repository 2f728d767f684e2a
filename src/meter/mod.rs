//! eGauge meter access: the register XML format and the authenticated HTTP client.

pub mod client;
pub mod parser;

use indexmap::IndexMap;

pub use client::{Endpoint, FetchError, MeterApi, MeterClient};
pub use parser::{parse_registers, parse_registers_with_report, ParseReport};

/// Register name to interpreted value, in the order the meter listed them.
pub type RegisterMap = IndexMap<String, f64>;
