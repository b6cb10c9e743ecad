use bytes::Bytes;
use futures_core::Stream;
use log::error;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Relays at most `remaining` bytes of `inner`, then ends.
///
/// Bytes past the limit are dropped silently. An inner error is logged and
/// ends the stream, since the response head has already been sent.
pub struct BoundedBody<S> {
  inner: S,
  remaining: u64,
  done: bool,
}

impl<S> BoundedBody<S> {
  pub fn new(inner: S, limit: u64) -> Self {
    BoundedBody {
      inner,
      remaining: limit,
      done: false,
    }
  }
}

impl<S, E> Stream for BoundedBody<S>
where
  S: Stream<Item = Result<Bytes, E>> + Unpin,
  E: Display,
{
  type Item = Result<Bytes, E>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();

    loop {
      if this.done || this.remaining == 0 {
        this.done = true;
        return Poll::Ready(None);
      }

      match Pin::new(&mut this.inner).poll_next(cx) {
        Poll::Pending => return Poll::Pending,
        Poll::Ready(None) => {
          this.done = true;
          return Poll::Ready(None);
        }
        Poll::Ready(Some(Err(err))) => {
          error!("failed to copy response body: {}", err);
          this.done = true;
          return Poll::Ready(None);
        }
        Poll::Ready(Some(Ok(mut chunk))) => {
          if chunk.is_empty() {
            continue;
          }
          if chunk.len() as u64 > this.remaining {
            chunk.truncate(this.remaining as usize);
          }
          this.remaining -= chunk.len() as u64;
          return Poll::Ready(Some(Ok(chunk)));
        }
      }
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    if self.done || self.remaining == 0 {
      (0, Some(0))
    } else {
      (0, self.inner.size_hint().1)
    }
  }
}
