use crate::{error::DataError, event::ExchangeId, exchange::WsMessage};
use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};
use tokio_tungstenite::tungstenite::Error as WsError;

/// Default idle budget for an exchange connection with no heartbeat of its own.
///
/// Connectors with a [`PingInterval`](crate::exchange::PingInterval) widen this to cover at
/// least two round trips, see [`Connector::idle_budget`](crate::exchange::Connector::idle_budget).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Idle watchdog over the read half of one exchange connection.
///
/// Every frame, including transport `Ping`/`Pong`, proves the exchange is alive and restarts
/// the budget. Once the budget elapses with nothing read, the watchdog yields a single
/// [`DataError::ReadTimeout`] naming the exchange and then ends. Socket errors are mapped to
/// [`DataError::Socket`] so the session handles one error type.
#[derive(Debug)]
pub struct IdleWatchdog<S> {
    exchange: ExchangeId,
    frames: S,
    budget: Duration,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl<S> IdleWatchdog<S> {
    pub fn new(exchange: ExchangeId, frames: S, budget: Duration) -> Self {
        Self {
            exchange,
            frames,
            budget,
            deadline: Box::pin(tokio::time::sleep(budget)),
            expired: false,
        }
    }
}

impl<S> Stream for IdleWatchdog<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    type Item = Result<WsMessage, DataError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.expired {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.frames).poll_next(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                let next_deadline = Instant::now() + self.budget;
                self.deadline.as_mut().reset(next_deadline);
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(error))) => Poll::Ready(Some(Err(DataError::from(error)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    self.expired = true;
                    Poll::Ready(Some(Err(DataError::ReadTimeout {
                        exchange: self.exchange,
                        timeout: self.budget,
                    })))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
