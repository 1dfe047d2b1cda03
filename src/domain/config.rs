//! Typed configuration built from a `ConfigPort`.
//!
//! Every key is optional; missing keys take the defaults below. Loading
//! validates the section first.

use std::time::Duration;

use crate::domain::backtest::BacktestConfig;
use crate::domain::candle_buffer::{DEFAULT_CAPACITY, DEFAULT_MIN_READY};
use crate::domain::config_validation::{
    validate_backtest_config, validate_scorer_config, validate_stream_config,
};
use crate::domain::error::ConfluenceError;
use crate::domain::pipeline::{DEFAULT_STRENGTH_EPSILON, PipelineConfig};
use crate::domain::scorer::{CategoryWeights, ScorerConfig, VoteThresholds};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_URL: &str = "wss://contract.mexc.com/edge";
pub const DEFAULT_INTERVAL: &str = "Min15";
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Events queued per callback before new ones are dropped.
pub const DEFAULT_CALLBACK_QUEUE: usize = 256;

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Consecutive failed attempts before the pipeline gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): base * 2^(attempt - 1),
    /// capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    pub interval: String,
    pub symbols: Vec<String>,
    pub reconnect: ReconnectPolicy,
    pub callback_queue: usize,
    pub pipeline: PipelineConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            url: DEFAULT_URL.to_string(),
            interval: DEFAULT_INTERVAL.to_string(),
            symbols: Vec::new(),
            reconnect: ReconnectPolicy::default(),
            callback_queue: DEFAULT_CALLBACK_QUEUE,
            pipeline: PipelineConfig::default(),
        }
    }
}

pub fn load_scorer_config(config: &dyn ConfigPort) -> Result<ScorerConfig, ConfluenceError> {
    validate_scorer_config(config)?;
    let d = ScorerConfig::default();
    let w = CategoryWeights::default();
    let t = VoteThresholds::default();
    let get = |key: &str, default: f64| config.get_double("scorer", key, default);

    Ok(ScorerConfig {
        use_price_action: config.get_bool("scorer", "use_price_action", d.use_price_action),
        buy_threshold: get("buy_threshold", d.buy_threshold),
        sell_threshold: get("sell_threshold", d.sell_threshold),
        max_possible_score: get("max_possible_score", d.max_possible_score),
        obv_lookback: get_usize(config, "scorer", "obv_lookback", d.obv_lookback)?,
        weights: CategoryWeights {
            trend: get("weight_trend", w.trend),
            momentum: get("weight_momentum", w.momentum),
            volume: get("weight_volume", w.volume),
            volatility: get("weight_volatility", w.volatility),
            price_action: get("weight_price_action", w.price_action),
        },
        thresholds: VoteThresholds {
            rsi_overbought: get("rsi_overbought", t.rsi_overbought),
            rsi_oversold: get("rsi_oversold", t.rsi_oversold),
            rsi_midline: get("rsi_midline", t.rsi_midline),
            adx_strong: get("adx_strong", t.adx_strong),
            willr_overbought: get("willr_overbought", t.willr_overbought),
            willr_oversold: get("willr_oversold", t.willr_oversold),
            cci_overbought: get("cci_overbought", t.cci_overbought),
            cci_oversold: get("cci_oversold", t.cci_oversold),
            mfi_overbought: get("mfi_overbought", t.mfi_overbought),
            mfi_oversold: get("mfi_oversold", t.mfi_oversold),
        },
    })
}

/// Buffer and dedup settings from `[stream]` plus the `[scorer]` section.
pub fn load_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, ConfluenceError> {
    validate_stream_config(config)?;
    Ok(PipelineConfig {
        capacity: get_usize(config, "stream", "capacity", DEFAULT_CAPACITY)?,
        min_ready: get_usize(config, "stream", "min_ready", DEFAULT_MIN_READY)?,
        strength_epsilon: config.get_double("stream", "strength_epsilon", DEFAULT_STRENGTH_EPSILON),
        scorer: load_scorer_config(config)?,
    })
}

pub fn load_stream_config(config: &dyn ConfigPort) -> Result<StreamConfig, ConfluenceError> {
    let pipeline = load_pipeline_config(config)?;
    let base_ms = get_u64(config, "reconnect_base_ms", DEFAULT_RECONNECT_BASE_MS)?;
    let max_ms = get_u64(config, "reconnect_max_ms", DEFAULT_RECONNECT_MAX_MS)?;
    let max_attempts = get_u64(
        config,
        "max_reconnect_attempts",
        u64::from(DEFAULT_MAX_RECONNECT_ATTEMPTS),
    )?;

    Ok(StreamConfig {
        url: config
            .get_string("stream", "url")
            .unwrap_or_else(|| DEFAULT_URL.to_string()),
        interval: config
            .get_string("stream", "interval")
            .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
        symbols: config.get_list("stream", "symbols"),
        reconnect: ReconnectPolicy {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
            max_attempts: u32::try_from(max_attempts).map_err(|_| {
                ConfluenceError::invalid("stream", "max_reconnect_attempts", "value too large")
            })?,
        },
        callback_queue: get_usize(config, "stream", "callback_queue", DEFAULT_CALLBACK_QUEUE)?,
        pipeline,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, ConfluenceError> {
    validate_backtest_config(config)?;
    let d = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_balance: config.get_double("backtest", "initial_balance", d.initial_balance),
        transaction_fee: config.get_double("backtest", "transaction_fee", d.transaction_fee),
    })
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, ConfluenceError> {
    let raw = config.get_int(section, key, default as i64);
    usize::try_from(raw)
        .map_err(|_| ConfluenceError::invalid(section, key, format!("{} is not a valid count", raw)))
}

fn get_u64(config: &dyn ConfigPort, key: &str, default: u64) -> Result<u64, ConfluenceError> {
    let raw = config.get_int("stream", key, default as i64);
    u64::try_from(raw)
        .map_err(|_| ConfluenceError::invalid("stream", key, format!("{} must be non-negative", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn defaults_from_empty_config() {
        let config = FileConfigAdapter::from_string("").unwrap();
        let stream = load_stream_config(&config).unwrap();
        assert_eq!(stream, StreamConfig::default());
        let backtest = load_backtest_config(&config).unwrap();
        assert_eq!(backtest, BacktestConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = FileConfigAdapter::from_string(
            "[stream]\nurl = ws://localhost:9000\ninterval = Min1\n\
             symbols = BTC_USDT, ETH_USDT,,SOL_USDT\ncapacity = 300\n\
             min_ready = 60\nmax_reconnect_attempts = 3\ncallback_queue = 16\n\
             [scorer]\nuse_price_action = false\nrsi_overbought = 80\n\
             weight_trend = 0.5\nobv_lookback = 8\n\
             [backtest]\ninitial_balance = 2500\ntransaction_fee = 0\n",
        )
        .unwrap();
        let stream = load_stream_config(&config).unwrap();
        assert_eq!(stream.url, "ws://localhost:9000");
        assert_eq!(stream.interval, "Min1");
        assert_eq!(stream.symbols, vec!["BTC_USDT", "ETH_USDT", "SOL_USDT"]);
        assert_eq!(stream.pipeline.capacity, 300);
        assert_eq!(stream.pipeline.min_ready, 60);
        assert_eq!(stream.reconnect.max_attempts, 3);
        assert_eq!(stream.callback_queue, 16);
        assert!(!stream.pipeline.scorer.use_price_action);
        assert_eq!(stream.pipeline.scorer.thresholds.rsi_overbought, 80.0);
        assert_eq!(stream.pipeline.scorer.weights.trend, 0.5);
        assert_eq!(stream.pipeline.scorer.obv_lookback, 8);

        let backtest = load_backtest_config(&config).unwrap();
        assert_eq!(backtest.initial_balance, 2500.0);
        assert_eq!(backtest.transaction_fee, 0.0);
    }

    #[test]
    fn invalid_section_fails_to_load() {
        let config = FileConfigAdapter::from_string("[stream]\nmin_ready = 0\n").unwrap();
        assert!(matches!(
            load_stream_config(&config),
            Err(ConfluenceError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_millis(1_000),
            max_attempts: 5,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(200), Duration::from_millis(1_000));
    }
}
