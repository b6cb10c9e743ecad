use actix_web::dev::Extensions;
use actix_web::rt::net::TcpStream;
use log::warn;
use socket2::SockRef;
use std::any::Any;
use std::future::pending;

/// Second handle on a caller's socket, used only to notice the caller leaving.
///
/// The h1 dispatcher keeps polling a handler after the peer half-closes, so a
/// pending fetch has to watch the socket itself.
pub struct CallerLiveness {
  stream: TcpStream,
}

impl CallerLiveness {
  pub fn from_connection(conn: &dyn Any) -> Option<Self> {
    let stream = conn.downcast_ref::<TcpStream>()?;

    let watcher = SockRef::from(stream)
      .try_clone()
      .and_then(|socket| {
        let std_stream: std::net::TcpStream = socket.into();
        std_stream.set_nonblocking(true)?;
        TcpStream::from_std(std_stream)
      });

    match watcher {
      Ok(stream) => Some(CallerLiveness { stream }),
      Err(err) => {
        warn!("Unable to watch caller connection: {}", err);
        None
      }
    }
  }

  /// Resolves once the caller has closed or reset its end.
  ///
  /// Pipelined bytes from a live caller mean it is still there; the watch then
  /// never resolves.
  pub async fn closed(&self) {
    let mut buf = [0u8; 1];
    match self.stream.peek(&mut buf).await {
      Ok(0) | Err(_) => {}
      Ok(_) => pending::<()>().await,
    }
  }
}

/// `HttpServer::on_connect` hook storing a [`CallerLiveness`] per connection.
pub fn watch_connection(conn: &dyn Any, ext: &mut Extensions) {
  if let Some(liveness) = CallerLiveness::from_connection(conn) {
    ext.insert(liveness);
  }
}
