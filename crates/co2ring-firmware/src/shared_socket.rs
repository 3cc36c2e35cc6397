//! Shared TCP socket handle
//!
//! The MQTT client takes ownership of its transport, but the broker link
//! still has to abort and reconnect the same socket when the session drops.
//! Both sides hold a [`SharedSocket`] pointing at one mutex-guarded socket.

use embassy_net::tcp::{Error, TcpSocket};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_io_async::{ErrorType, Read, Write};

/// Async socket handle backed by an Embassy [`Mutex`].
///
/// Each I/O call locks the socket for its duration only, so the lock is
/// never held between client operations.
///
/// # Example
///
/// ```ignore
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
/// use embassy_sync::mutex::Mutex;
///
/// let socket = Mutex::<NoopRawMutex, _>::new(TcpSocket::new(stack, rx, tx));
///
/// let transport = SharedSocket::new(&socket);
/// let control = &socket;
/// ```
pub struct SharedSocket<'a, M: RawMutex> {
    socket: &'a Mutex<M, TcpSocket<'a>>,
}

impl<'a, M: RawMutex> SharedSocket<'a, M> {
    #[inline]
    pub const fn new(socket: &'a Mutex<M, TcpSocket<'a>>) -> Self {
        Self { socket }
    }
}

impl<M: RawMutex> ErrorType for SharedSocket<'_, M> {
    type Error = Error;
}

impl<M: RawMutex> Read for SharedSocket<'_, M> {
    #[inline]
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut socket = self.socket.lock().await;
        socket.read(buf).await
    }
}

impl<M: RawMutex> Write for SharedSocket<'_, M> {
    #[inline]
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut socket = self.socket.lock().await;
        socket.write(buf).await
    }

    #[inline]
    async fn flush(&mut self) -> Result<(), Self::Error> {
        let mut socket = self.socket.lock().await;
        socket.flush().await
    }
}
