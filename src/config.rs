use crate::engine::FlagThresholds;
use std::fmt;
use std::str::FromStr;

/// How a missing average payment ratio is filled before the low-pay rule runs.
///
/// The batch and serving paths historically disagreed here, so the policy is
/// explicit. `AssumePaid` (1.0) means a missing ratio never raises
/// `flag_low_pay_ratio`; `AssumeUnpaid` (0.0) always raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPaymentRatio {
    #[default]
    AssumePaid,
    AssumeUnpaid,
}

impl MissingPaymentRatio {
    pub fn fill_value(self) -> f64 {
        match self {
            MissingPaymentRatio::AssumePaid => 1.0,
            MissingPaymentRatio::AssumeUnpaid => 0.0,
        }
    }
}

impl FromStr for MissingPaymentRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paid" | "assume_paid" | "1" | "1.0" => Ok(MissingPaymentRatio::AssumePaid),
            "unpaid" | "assume_unpaid" | "0" | "0.0" => Ok(MissingPaymentRatio::AssumeUnpaid),
            other => Err(format!(
                "invalid payment ratio fill '{}': expected paid (1.0) or unpaid (0.0)",
                other
            )),
        }
    }
}

impl fmt::Display for MissingPaymentRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPaymentRatio::AssumePaid => f.write_str("paid"),
            MissingPaymentRatio::AssumeUnpaid => f.write_str("unpaid"),
        }
    }
}

/// Settings for the flag engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub payment_ratio_fill: MissingPaymentRatio,
    pub thresholds: FlagThresholds,
}

impl EngineConfig {
    /// Reads `RISK_PAYMENT_RATIO_FILL`; unset means the default policy.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let payment_ratio_fill = match std::env::var("RISK_PAYMENT_RATIO_FILL") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse::<MissingPaymentRatio>()
                .map_err(|e| anyhow::anyhow!("RISK_PAYMENT_RATIO_FILL: {}", e))?,
            _ => MissingPaymentRatio::default(),
        };

        Ok(Self {
            payment_ratio_fill,
            thresholds: FlagThresholds::default(),
        })
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub engine: EngineConfig,
}

fn env_or<T: FromStr>(name: &str, default: T, hint: &str) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be {}", name, hint)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: env_or("PORT", 5000, "a valid number between 1-65535")?,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024, "a byte count")
                .and_then(|bytes: usize| {
                    if bytes == 0 {
                        anyhow::bail!("MAX_UPLOAD_BYTES cannot be zero");
                    }
                    Ok(bytes)
                })?,
            rate_limit_per_second: env_or("RATE_LIMIT_PER_SECOND", 10, "a positive integer")
                .and_then(|rate: u64| {
                    if rate == 0 {
                        anyhow::bail!("RATE_LIMIT_PER_SECOND cannot be zero");
                    }
                    Ok(rate)
                })?,
            rate_limit_burst: env_or("RATE_LIMIT_BURST", 20, "a positive integer").and_then(
                |burst: u32| {
                    if burst == 0 {
                        anyhow::bail!("RATE_LIMIT_BURST cannot be zero");
                    }
                    Ok(burst)
                },
            )?,
            engine: EngineConfig::from_env()?,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Max upload size: {} bytes", config.max_upload_bytes);
        tracing::debug!(
            "Rate limit: {}/s, burst {}",
            config.rate_limit_per_second,
            config.rate_limit_burst
        );
        tracing::info!(
            "Missing payment ratio policy: {}",
            config.engine.payment_ratio_fill
        );

        Ok(config)
    }
}
