use anyhow::{bail, Context, Result};
use low_analysis::ZeroPricePolicy;
use naver_client::DEFAULT_CONCURRENCY;
use std::env;

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub concurrency: usize,         // 4
    pub lookback_days: i64,         // 366
    pub exclude_patterns: Vec<String>,
    pub fill_zero_prices: bool,     // false
    pub fetch_metadata: bool,       // true
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            concurrency: get("SCAN_CONCURRENCY")
                .unwrap_or_else(|| DEFAULT_CONCURRENCY.to_string())
                .trim()
                .parse()
                .context("SCAN_CONCURRENCY must be a positive integer")?,
            lookback_days: get("SCAN_LOOKBACK_DAYS")
                .unwrap_or_else(|| "366".to_string())
                .trim()
                .parse()
                .context("SCAN_LOOKBACK_DAYS must be a whole number of days")?,
            exclude_patterns: get("SCAN_EXCLUDE_PATTERNS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            fill_zero_prices: get("SCAN_FILL_ZERO_PRICES")
                .unwrap_or_else(|| "false".to_string())
                .trim()
                .parse()
                .context("SCAN_FILL_ZERO_PRICES must be true or false")?,
            fetch_metadata: true,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.lookback_days < 1 {
            bail!("Lookback must be at least 1 day, got {}", self.lookback_days);
        }
        Ok(())
    }

    /// Command-line values take precedence over the environment
    pub fn merge_cli(mut self, cli: &Cli) -> Result<Self> {
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if cli.fill_zero_prices {
            self.fill_zero_prices = true;
        }
        if cli.skip_metadata {
            self.fetch_metadata = false;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn zero_price_policy(&self) -> ZeroPricePolicy {
        if self.fill_zero_prices {
            ZeroPricePolicy::SubstituteClose
        } else {
            ZeroPricePolicy::Keep
        }
    }
}
