//! Hourly rate lookup

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Default divisor turning an income weight into an hourly rate
pub const DEFAULT_RATE_DIVISOR: u32 = 200;

/// Looks up the income weight of a person
pub trait RateDirectory: Send + Sync {
    /// The income weight of `person`, if known
    fn income_weight(&self, person: &str) -> Option<Decimal>;
}

/// Rate directory held in memory, matched case-insensitively
#[derive(Debug, Clone, Default)]
pub struct MemoryRateDirectory {
    weights: HashMap<String, Decimal>,
}

impl MemoryRateDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the income weight of `person`
    pub fn insert(&mut self, person: &str, weight: Decimal) {
        self.weights.insert(person.trim().to_lowercase(), weight);
    }

    /// Number of known people
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no one is known
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl From<&HashMap<String, Decimal>> for MemoryRateDirectory {
    fn from(table: &HashMap<String, Decimal>) -> Self {
        let mut directory = Self::new();
        for (person, weight) in table {
            directory.insert(person, *weight);
        }
        directory
    }
}

impl RateDirectory for MemoryRateDirectory {
    fn income_weight(&self, person: &str) -> Option<Decimal> {
        self.weights.get(&person.trim().to_lowercase()).copied()
    }
}

/// Hourly rate for an income weight; zero when the divisor is zero
pub fn hourly_rate(income_weight: Decimal, divisor: Decimal) -> Decimal {
    if divisor.is_zero() {
        return Decimal::ZERO;
    }
    income_weight / divisor
}
