pub mod candle_source;
pub mod config_port;
pub mod feed_port;
