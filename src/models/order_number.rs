use std::fmt;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the random suffix appended to generated order numbers.
const RANDOM_SUFFIX_LEN: usize = 6;

/// Derivative marker on an order number. Splitting an order produces a
/// completed (`-C`) and a pending-remainder (`-P`) derivative; returns derived
/// from an order carry `-R`. The remote supplier system only ever knows the
/// base number, so the variant is stripped before any cross-system call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderVariant {
    None,
    Completed,
    Pending,
    Return,
}

impl OrderVariant {
    fn suffix(&self) -> &'static str {
        match self {
            OrderVariant::None => "",
            OrderVariant::Completed => "-C",
            OrderVariant::Pending => "-P",
            OrderVariant::Return => "-R",
        }
    }
}

/// Structured order identity. The suffixed string form exists only at the
/// external-interface boundary; internally orders are correlated by base.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNumber {
    pub base: String,
    pub variant: OrderVariant,
}

impl OrderNumber {
    pub fn new(base: impl Into<String>, variant: OrderVariant) -> Self {
        Self {
            base: base.into(),
            variant,
        }
    }

    /// Generates a fresh human-readable order number: UTC date plus a random
    /// alphanumeric suffix. Uniqueness is enforced by the caller against the
    /// store, retrying with a new suffix on collision.
    pub fn generate() -> Self {
        let date = Utc::now().format("%Y%m%d");
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LEN)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect();

        Self {
            base: format!("{}-{}", date, suffix),
            variant: OrderVariant::None,
        }
    }

    /// Parses a possibly-suffixed external order number into its structured
    /// form. Unrecognized trailing segments stay part of the base.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        for variant in [
            OrderVariant::Completed,
            OrderVariant::Pending,
            OrderVariant::Return,
        ] {
            if let Some(base) = raw.strip_suffix(variant.suffix()) {
                return Self {
                    base: base.to_string(),
                    variant,
                };
            }
        }
        Self {
            base: raw.to_string(),
            variant: OrderVariant::None,
        }
    }

    /// The identity the remote supplier system recognizes.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn with_variant(&self, variant: OrderVariant) -> Self {
        Self {
            base: self.base.clone(),
            variant,
        }
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.variant.suffix())
    }
}
