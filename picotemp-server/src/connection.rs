//! Single-threaded HTTP responder serving the current reading.
//!
//! Connections are handled strictly one after another. The read buffer, the
//! response header and the body buffer are allocated once and reset at the
//! top of every iteration, so steady-state serving does not allocate.

use std::fmt::Write as _;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{Instrument, Span, debug, error, info, info_span, trace, warn};

use picotemp_common::JSON_CONTENT_TYPE;

use crate::error::{Result, ServerError};
use crate::indicator::{Delivery, EventSender, RequestEvent};
use crate::thermometer::Thermometer;

/// Pending connections the listener queues before refusing new ones.
pub const MAX_CONNECTIONS: u32 = 3;

/// Size of the reusable request buffer.
pub const BUFFER_SIZE: usize = 2030;

/// Deadline covering the whole read + write exchange.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause after a failed accept.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

const HEADER_CAPACITY: usize = 128;
const BODY_CAPACITY: usize = 128;

/// Create the listening socket with a backlog of [`MAX_CONNECTIONS`].
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let bind_error = |source: io::Error| ServerError::Bind { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;

    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(addr).map_err(bind_error)?;
    socket.listen(MAX_CONNECTIONS).map_err(bind_error)
}

/// Source of incoming connections.
pub trait Acceptor: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Fixed-size buffer holding the bytes of one request.
#[derive(Debug)]
pub struct RequestBuffer {
    data: Box<[u8]>,
    filled: usize,
}

impl RequestBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size].into_boxed_slice(),
            filled: 0,
        }
    }

    /// Forget the previous request, keeping the allocation.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    fn unfilled(&mut self) -> &mut [u8] {
        &mut self.data[self.filled..]
    }

    fn advance(&mut self, n: usize) {
        self.filled = (self.filled + n).min(self.data.len());
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.data.len()
    }

    /// True once the blank line ending the request headers has arrived.
    pub fn headers_complete(&self) -> bool {
        self.filled().windows(4).any(|w| w == b"\r\n\r\n")
    }

    /// First line of the request, for logging.
    pub fn request_line(&self) -> &str {
        let data = self.filled();
        let end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(data.len());
        std::str::from_utf8(&data[..end]).unwrap_or("<non-utf8>")
    }
}

/// Reusable HTTP/1.1 response header.
#[derive(Debug)]
pub struct ResponseHeader {
    status: u16,
    content_type: Option<&'static str>,
    content_length: Option<usize>,
    connection_close: bool,
    buf: String,
}

impl ResponseHeader {
    pub fn new() -> Self {
        Self {
            status: 200,
            content_type: None,
            content_length: None,
            connection_close: false,
            buf: String::with_capacity(HEADER_CAPACITY),
        }
    }

    /// Back to a bare `200 OK`, keeping the allocation.
    pub fn reset(&mut self) {
        self.status = 200;
        self.content_type = None;
        self.content_length = None;
        self.connection_close = false;
        self.buf.clear();
    }

    pub fn set_status_code(&mut self, status: u16) {
        self.status = status;
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.content_type = Some(content_type);
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.content_length = Some(length);
    }

    pub fn set_connection_close(&mut self) {
        self.connection_close = true;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Render the header block, terminated by the blank line.
    pub fn header(&mut self) -> &[u8] {
        self.buf.clear();
        write!(
            self.buf,
            "HTTP/1.1 {} {}\r\n",
            self.status,
            reason_phrase(self.status)
        )
        .ok();
        if let Some(content_type) = self.content_type {
            write!(self.buf, "Content-Type: {}\r\n", content_type).ok();
        }
        if let Some(length) = self.content_length {
            write!(self.buf, "Content-Length: {}\r\n", length).ok();
        }
        if self.connection_close {
            self.buf.push_str("Connection: close\r\n");
        }
        self.buf.push_str("\r\n");
        self.buf.as_bytes()
    }
}

impl Default for ResponseHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Accept loop answering every connection with the current reading.
pub struct ConnectionLoop<T, L = TcpListener> {
    listener: L,
    thermometer: T,
    events: EventSender,
    request: RequestBuffer,
    header: ResponseHeader,
    body: Vec<u8>,
    span: Span,
}

impl<T: Thermometer, L: Acceptor> ConnectionLoop<T, L> {
    pub fn new(listener: L, thermometer: T, events: EventSender) -> Self {
        Self {
            listener,
            thermometer,
            events,
            request: RequestBuffer::new(BUFFER_SIZE),
            header: ResponseHeader::new(),
            body: Vec::with_capacity(BODY_CAPACITY),
            span: info_span!("connection_loop"),
        }
    }

    /// Log inside `span` instead of the default `connection_loop` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections forever. Errors are logged and never end the loop.
    pub async fn run(mut self) {
        let span = self.span.clone();
        async move {
            loop {
                match self.serve_one().await {
                    Ok(delivery) => trace!(?delivery, "Exchange complete"),
                    Err(e @ ServerError::Accept(_)) => {
                        error!(error = %e, "Listener accept failed");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                    Err(e) => warn!(error = %e, "Connection failed"),
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Accept one connection, answer it and report the request to the
    /// indicator.
    pub async fn serve_one(&mut self) -> Result<Delivery> {
        self.request.reset();
        self.header.reset();
        self.body.clear();

        let (mut stream, remote) = self.listener.accept().await.map_err(ServerError::Accept)?;
        info!(%remote, "New connection");

        match tokio::time::timeout(CONNECTION_TIMEOUT, self.exchange(&mut stream)).await {
            Ok(result) => result?,
            Err(_) => return Err(ServerError::Timeout),
        }
        drop(stream);

        Ok(self.events.notify(RequestEvent::default()))
    }

    async fn exchange(&mut self, stream: &mut L::Stream) -> Result<()> {
        self.read_request(stream).await?;
        self.build_response();

        stream.write_all(self.header.header()).await?;
        stream.write_all(&self.body).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn read_request(&mut self, stream: &mut L::Stream) -> Result<()> {
        while !self.request.is_full() && !self.request.headers_complete() {
            let n = stream.read(self.request.unfilled()).await?;
            if n == 0 {
                break;
            }
            self.request.advance(n);
        }
        debug!(request = self.request.request_line(), "Request received");
        Ok(())
    }

    fn build_response(&mut self) {
        self.header.set_connection_close();
        match self.render_body() {
            Ok(()) => {
                self.header.set_content_type(JSON_CONTENT_TYPE);
                self.header.set_content_length(self.body.len());
            }
            Err(e) => {
                error!(error = %e, "Temperature response failed");
                self.body.clear();
                self.header.set_status_code(500);
                self.header.set_content_length(0);
            }
        }
    }

    fn render_body(&mut self) -> Result<()> {
        let reading = self.thermometer.read()?;
        info!(celsius = reading.celsius(), "Got temperature request");
        picotemp_common::encode_into(&reading, &mut self.body).map_err(ServerError::Encode)
    }
}
