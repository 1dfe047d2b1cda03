//! Configuration validation.
//!
//! Each section is checked against the raw `ConfigPort` values before any
//! typed config is built, so errors name the offending INI key.

use crate::domain::config::{
    DEFAULT_CALLBACK_QUEUE, DEFAULT_INTERVAL, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_MAX_MS,
};
use crate::domain::candle_buffer::{DEFAULT_CAPACITY, DEFAULT_MIN_READY};
use crate::domain::error::ConfluenceError;
use crate::domain::pipeline::DEFAULT_STRENGTH_EPSILON;
use crate::domain::scorer::{CategoryWeights, ScorerConfig, VoteThresholds};
use crate::ports::config_port::ConfigPort;

pub fn validate_stream_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    validate_buffer(config)?;
    validate_strength_epsilon(config)?;
    validate_backoff(config)?;
    validate_interval(config)?;
    validate_callback_queue(config)?;
    Ok(())
}

pub fn validate_scorer_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    validate_thresholds(config)?;
    validate_weights(config)?;
    validate_vote_thresholds(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let balance = config.get_double("backtest", "initial_balance", 10_000.0);
    if balance.is_nan() || balance <= 0.0 {
        return Err(ConfluenceError::invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    let fee = config.get_double("backtest", "transaction_fee", 0.001);
    if !(0.0..1.0).contains(&fee) {
        return Err(ConfluenceError::invalid(
            "backtest",
            "transaction_fee",
            "transaction_fee must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_buffer(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let capacity = config.get_int("stream", "capacity", DEFAULT_CAPACITY as i64);
    let min_ready = config.get_int("stream", "min_ready", DEFAULT_MIN_READY as i64);
    if min_ready < 2 {
        return Err(ConfluenceError::invalid(
            "stream",
            "min_ready",
            "min_ready must be at least 2",
        ));
    }
    if capacity < min_ready {
        return Err(ConfluenceError::invalid(
            "stream",
            "capacity",
            format!("capacity {} is below min_ready {}", capacity, min_ready),
        ));
    }
    Ok(())
}

fn validate_strength_epsilon(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let epsilon = config.get_double("stream", "strength_epsilon", DEFAULT_STRENGTH_EPSILON);
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(ConfluenceError::invalid(
            "stream",
            "strength_epsilon",
            "strength_epsilon must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_backoff(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let base = config.get_int("stream", "reconnect_base_ms", DEFAULT_RECONNECT_BASE_MS as i64);
    let max = config.get_int("stream", "reconnect_max_ms", DEFAULT_RECONNECT_MAX_MS as i64);
    if base < 0 {
        return Err(ConfluenceError::invalid(
            "stream",
            "reconnect_base_ms",
            "reconnect_base_ms must be non-negative",
        ));
    }
    if base > max {
        return Err(ConfluenceError::invalid(
            "stream",
            "reconnect_base_ms",
            "reconnect_base_ms must not exceed reconnect_max_ms",
        ));
    }
    if config.get_int("stream", "max_reconnect_attempts", 10) < 0 {
        return Err(ConfluenceError::invalid(
            "stream",
            "max_reconnect_attempts",
            "max_reconnect_attempts must be non-negative",
        ));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let interval = config
        .get_string("stream", "interval")
        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());
    if interval.trim().is_empty() {
        return Err(ConfluenceError::invalid(
            "stream",
            "interval",
            "interval must not be empty",
        ));
    }
    Ok(())
}

fn validate_callback_queue(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let queue = config.get_int("stream", "callback_queue", DEFAULT_CALLBACK_QUEUE as i64);
    if queue < 1 {
        return Err(ConfluenceError::invalid(
            "stream",
            "callback_queue",
            "callback_queue must be at least 1",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let defaults = ScorerConfig::default();
    let buy = config.get_double("scorer", "buy_threshold", defaults.buy_threshold);
    let sell = config.get_double("scorer", "sell_threshold", defaults.sell_threshold);
    if buy <= sell {
        return Err(ConfluenceError::invalid(
            "scorer",
            "buy_threshold",
            "buy_threshold must exceed sell_threshold",
        ));
    }
    let max_score = config.get_double("scorer", "max_possible_score", defaults.max_possible_score);
    if max_score.is_nan() || max_score <= 0.0 {
        return Err(ConfluenceError::invalid(
            "scorer",
            "max_possible_score",
            "max_possible_score must be positive",
        ));
    }
    if config.get_int("scorer", "obv_lookback", defaults.obv_lookback as i64) < 1 {
        return Err(ConfluenceError::invalid(
            "scorer",
            "obv_lookback",
            "obv_lookback must be at least 1",
        ));
    }
    Ok(())
}

fn validate_weights(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let defaults = CategoryWeights::default();
    let weights = [
        ("weight_trend", defaults.trend),
        ("weight_momentum", defaults.momentum),
        ("weight_volume", defaults.volume),
        ("weight_volatility", defaults.volatility),
        ("weight_price_action", defaults.price_action),
    ];
    let mut total = 0.0;
    for (key, default) in weights {
        let value = config.get_double("scorer", key, default);
        if value < 0.0 {
            return Err(ConfluenceError::invalid(
                "scorer",
                key,
                format!("{} must be non-negative", key),
            ));
        }
        total += value;
    }
    if total == 0.0 {
        return Err(ConfluenceError::invalid(
            "scorer",
            "weight_trend",
            "category weights must not all be zero",
        ));
    }
    Ok(())
}

fn validate_vote_thresholds(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let d = VoteThresholds::default();
    let pairs = [
        ("rsi_oversold", d.rsi_oversold, "rsi_overbought", d.rsi_overbought),
        ("willr_oversold", d.willr_oversold, "willr_overbought", d.willr_overbought),
        ("cci_oversold", d.cci_oversold, "cci_overbought", d.cci_overbought),
        ("mfi_oversold", d.mfi_oversold, "mfi_overbought", d.mfi_overbought),
    ];
    for (low_key, low_default, high_key, high_default) in pairs {
        let low = config.get_double("scorer", low_key, low_default);
        let high = config.get_double("scorer", high_key, high_default);
        if low >= high {
            return Err(ConfluenceError::invalid(
                "scorer",
                low_key,
                format!("{} must be below {}", low_key, high_key),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<(), ConfluenceError>, expected_key: &str) {
        match result {
            Err(ConfluenceError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {}, got {:?}", expected_key, other),
        }
    }

    #[test]
    fn empty_config_is_valid() {
        let config = adapter("");
        assert!(validate_stream_config(&config).is_ok());
        assert!(validate_scorer_config(&config).is_ok());
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn capacity_below_min_ready_rejected() {
        let config = adapter("[stream]\ncapacity = 40\nmin_ready = 50\n");
        assert_invalid(validate_stream_config(&config), "capacity");
    }

    #[test]
    fn tiny_min_ready_rejected() {
        let config = adapter("[stream]\nmin_ready = 1\n");
        assert_invalid(validate_stream_config(&config), "min_ready");
    }

    #[test]
    fn backoff_base_above_max_rejected() {
        let config = adapter("[stream]\nreconnect_base_ms = 5000\nreconnect_max_ms = 1000\n");
        assert_invalid(validate_stream_config(&config), "reconnect_base_ms");
    }

    #[test]
    fn empty_callback_queue_rejected() {
        let config = adapter("[stream]\ncallback_queue = 0\n");
        assert_invalid(validate_stream_config(&config), "callback_queue");
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let config = adapter("[scorer]\nbuy_threshold = -1\nsell_threshold = 1\n");
        assert_invalid(validate_scorer_config(&config), "buy_threshold");
    }

    #[test]
    fn negative_weight_rejected() {
        let config = adapter("[scorer]\nweight_volume = -0.2\n");
        assert_invalid(validate_scorer_config(&config), "weight_volume");
    }

    #[test]
    fn zero_weights_rejected() {
        let config = adapter(
            "[scorer]\nweight_trend = 0\nweight_momentum = 0\nweight_volume = 0\n\
             weight_volatility = 0\nweight_price_action = 0\n",
        );
        assert_invalid(validate_scorer_config(&config), "weight_trend");
    }

    #[test]
    fn non_positive_max_score_rejected() {
        let config = adapter("[scorer]\nmax_possible_score = 0\n");
        assert_invalid(validate_scorer_config(&config), "max_possible_score");
    }

    #[test]
    fn crossed_rsi_levels_rejected() {
        let config = adapter("[scorer]\nrsi_oversold = 75\n");
        assert_invalid(validate_scorer_config(&config), "rsi_oversold");
    }

    #[test]
    fn fee_out_of_range_rejected() {
        let config = adapter("[backtest]\ntransaction_fee = 1.5\n");
        assert_invalid(validate_backtest_config(&config), "transaction_fee");
    }

    #[test]
    fn non_positive_balance_rejected() {
        let config = adapter("[backtest]\ninitial_balance = 0\n");
        assert_invalid(validate_backtest_config(&config), "initial_balance");
    }
}
