#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use egauge_api::meter::{Endpoint, FetchError, MeterApi, RegisterMap};

pub const GRID: &str = "Main Incomer";

pub fn registers(pairs: &[(&str, f64)]) -> RegisterMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Scripted stand-in for the meter that counts every read.
pub struct FakeMeter {
    instant: Mutex<Result<RegisterMap, FetchError>>,
    totals: Mutex<VecDeque<Result<RegisterMap, FetchError>>>,
    totals_fallback: Mutex<Result<RegisterMap, FetchError>>,
    raw: Mutex<Result<String, FetchError>>,
    probe: Mutex<Result<(), FetchError>>,
    totals_reads: AtomicUsize,
    instant_reads: AtomicUsize,
}

impl FakeMeter {
    pub fn new() -> Self {
        Self {
            instant: Mutex::new(Ok(RegisterMap::new())),
            totals: Mutex::new(VecDeque::new()),
            totals_fallback: Mutex::new(Ok(registers(&[(GRID, 0.0)]))),
            raw: Mutex::new(Ok(String::new())),
            probe: Mutex::new(Ok(())),
            totals_reads: AtomicUsize::new(0),
            instant_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_instant(self, result: Result<RegisterMap, FetchError>) -> Self {
        *self.instant.lock().unwrap() = result;
        self
    }

    /// Queue totals responses; once drained, reads return the fallback.
    pub fn with_totals(self, results: Vec<Result<RegisterMap, FetchError>>) -> Self {
        self.totals.lock().unwrap().extend(results);
        self
    }

    pub fn with_totals_fallback(self, result: Result<RegisterMap, FetchError>) -> Self {
        *self.totals_fallback.lock().unwrap() = result;
        self
    }

    pub fn with_raw(self, result: Result<String, FetchError>) -> Self {
        *self.raw.lock().unwrap() = result;
        self
    }

    pub fn with_probe(self, result: Result<(), FetchError>) -> Self {
        *self.probe.lock().unwrap() = result;
        self
    }

    pub fn totals_reads(&self) -> usize {
        self.totals_reads.load(Ordering::SeqCst)
    }

    pub fn instant_reads(&self) -> usize {
        self.instant_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeterApi for FakeMeter {
    async fn read_registers(&self, endpoint: Endpoint) -> Result<RegisterMap, FetchError> {
        match endpoint {
            Endpoint::Instantaneous => {
                self.instant_reads.fetch_add(1, Ordering::SeqCst);
                self.instant.lock().unwrap().clone()
            }
            Endpoint::Totals => {
                self.totals_reads.fetch_add(1, Ordering::SeqCst);
                let scripted = self.totals.lock().unwrap().pop_front();
                scripted.unwrap_or_else(|| self.totals_fallback.lock().unwrap().clone())
            }
        }
    }

    async fn raw_document(&self, _endpoint: Endpoint) -> Result<String, FetchError> {
        self.raw.lock().unwrap().clone()
    }

    async fn probe(&self) -> Result<(), FetchError> {
        self.probe.lock().unwrap().clone()
    }
}
