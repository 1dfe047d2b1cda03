//! Live candle feed port.
//!
//! A connector opens one subscription per symbol; the connection yields
//! completed candles in arrival order.

use async_trait::async_trait;

use crate::domain::candle::Candle;
use crate::domain::error::ConfluenceError;

#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Box<dyn FeedConnection>, ConfluenceError>;
}

#[async_trait]
pub trait FeedConnection: Send {
    /// Next completed candle.
    ///
    /// `Ok(None)` means the server closed the stream.
    /// `Err(MalformedMessage)` reports a dropped message; the connection is
    /// still usable. Any other error means the connection is gone.
    async fn next_candle(&mut self) -> Result<Option<Candle>, ConfluenceError>;

    /// Close the underlying transport. Safe to call more than once.
    async fn close(&mut self);
}
