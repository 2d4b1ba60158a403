use crate::config::Config;
use crate::resolver::{Resolver, Response};
use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;

/// Bounds applied to the single request line of a connection.
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub max_line_length: usize,
    pub timeout: Option<Duration>,
}

impl ReadLimits {
    pub fn from_config(config: &Config) -> Self {
        let timeout = match config.read_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ReadLimits {
            max_line_length: config.max_line_length,
            timeout,
        }
    }
}

impl Default for ReadLimits {
    fn default() -> Self {
        ReadLimits::from_config(&Config::default())
    }
}

pub struct Server {
    listener: TcpListener,
    resolver: Arc<Resolver>,
    limits: ReadLimits,
}

impl Server {
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .with_context(|| format!("cannot listen on {}", config.listen))?;
        log::info!("Listening on {}", config.listen);

        let resolver = Resolver::new(config.fallback().map(str::to_string));
        match resolver.fallback() {
            Some(fallback) => log::info!("Unresolvable addresses fall back to {fallback}"),
            None => log::info!("No fallback address configured"),
        }
        Ok(Server {
            listener,
            resolver: Arc::new(resolver),
            limits: ReadLimits::from_config(config),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` completes. Each connection is
    /// served by its own task; accept failures are logged and skipped.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("Connection from {peer}");
                        let resolver = Arc::clone(&self.resolver);
                        let limits = self.limits;
                        tokio::spawn(async move {
                            match handle_connection(stream, &resolver, limits).await {
                                Ok(response) if !response.is_success() => {
                                    log::debug!("Answered {peer} with '{response}'");
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    log::debug!("Connection from {peer} ended with error: {e}");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Failed to accept connection: {e}");
                    }
                },
                result = &mut shutdown => {
                    if let Err(e) = result {
                        log::error!("Failed to listen for shutdown signal: {e}");
                    }
                    log::info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// Serve one connection: read one line, write one response, close.
///
/// The returned error only reports a failed write; the response decision
/// itself never fails.
pub async fn handle_connection<S>(
    stream: S,
    resolver: &Resolver,
    limits: ReadLimits,
) -> std::io::Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);

    let read = read_request_line(&mut reader, limits.max_line_length);
    let line = match limits.timeout {
        Some(deadline) => tokio::time::timeout(deadline, read)
            .await
            .unwrap_or_else(|_| {
                log::debug!("Timed out waiting for request line");
                None
            }),
        None => read.await,
    };

    let response = match line {
        Some(line) => resolver.respond(&line),
        None => Response::ReadError,
    };

    let mut stream = reader.into_inner();
    stream.write_all(response.to_line().as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(response)
}

/// Read a newline-terminated line of at most `max_len` bytes (terminator
/// included). Returns `None` on I/O error, EOF before the newline, an
/// over-long line, or invalid UTF-8.
async fn read_request_line<R>(reader: &mut R, max_len: usize) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(max_len as u64);
    match limited.read_until(b'\n', &mut buf).await {
        Ok(_) if buf.last() == Some(&b'\n') => String::from_utf8(buf).ok(),
        Ok(n) => {
            log::debug!("Request line unterminated after {n} bytes");
            None
        }
        Err(e) => {
            log::debug!("Failed to read request line: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn exchange(request: &[u8], resolver: &Resolver, limits: ReadLimits) -> String {
        let (mut client, server) = duplex(4096);
        client.write_all(request).await.unwrap();
        let handler = tokio::spawn({
            let resolver = resolver.clone();
            async move { handle_connection(server, &resolver, limits).await }
        });
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        handler.await.unwrap().unwrap();
        out
    }

    #[tokio::test]
    async fn test_decodes_srs_request() {
        let out = exchange(
            b"get SRS0=abc123=12345=example.com=damian\n",
            &Resolver::default(),
            ReadLimits::default(),
        )
        .await;
        assert_eq!(out, "200 damian@example.com\n");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let out = exchange(b"put something\n", &Resolver::default(), ReadLimits::default()).await;
        assert_eq!(out, "500 invalid request\n");
    }

    #[tokio::test]
    async fn test_missing_newline_is_read_error() {
        let (mut client, server) = duplex(4096);
        client.write_all(b"get user@example.com").await.unwrap();
        client.shutdown().await.unwrap();
        let response = handle_connection(server, &Resolver::default(), ReadLimits::default())
            .await
            .unwrap();
        assert_eq!(response, Response::ReadError);
    }

    #[tokio::test]
    async fn test_overlong_line_is_read_error() {
        let limits = ReadLimits {
            max_line_length: 32,
            timeout: None,
        };
        let mut request = b"get ".to_vec();
        request.extend(std::iter::repeat(b'a').take(64));
        request.extend_from_slice(b"@example.com\n");
        let out = exchange(&request, &Resolver::default(), limits).await;
        assert_eq!(out, "500 read error\n");
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let (_client, server) = duplex(64);
        let limits = ReadLimits {
            max_line_length: 1024,
            timeout: Some(Duration::from_millis(50)),
        };
        let response = handle_connection(server, &Resolver::default(), limits)
            .await
            .unwrap();
        assert_eq!(response, Response::ReadError);
    }

    #[tokio::test]
    async fn test_crlf_terminated_request() {
        let out = exchange(
            b"get user@example.com\r\n",
            &Resolver::default(),
            ReadLimits::default(),
        )
        .await;
        assert_eq!(out, "200 user@example.com\n");
    }
}
