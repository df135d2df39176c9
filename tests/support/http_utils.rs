use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A request as it arrived on the wire at a test server.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl RawRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub head: String,
    pub body: String,
}

pub async fn read_until_double_crlf<S>(stream: &mut S) -> Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        let bytes = stream.read(&mut byte).await?;
        if bytes == 0 {
            break;
        }
        buffer.extend_from_slice(&byte);
        if buffer.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buffer).context("invalid UTF-8 request head")
}

/// Reads one request with a `Content-Length` framed body. Returns `None` when
/// the peer closed the connection before sending anything.
pub async fn read_request<S>(stream: &mut S) -> Result<Option<RawRequest>>
where
    S: AsyncRead + Unpin,
{
    let head = read_until_double_crlf(stream).await?;
    if head.is_empty() {
        return Ok(None);
    }
    let mut request = RawRequest {
        head,
        body: Vec::new(),
    };
    let length = request
        .header("content-length")
        .map(str::parse::<usize>)
        .transpose()
        .context("invalid content-length")?
        .unwrap_or(0);
    request.body = vec![0u8; length];
    stream.read_exact(&mut request.body).await?;
    Ok(Some(request))
}

/// Sends a single HTTP/1.1 request with `Connection: close` and reads the
/// whole response.
pub async fn send_request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: &str,
) -> Result<HttpResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut raw = Vec::new();
    timeout(StdDuration::from_secs(10), stream.read_to_end(&mut raw))
        .await
        .map_err(|_| anyhow!("timed out waiting for response"))??;
    parse_response(&String::from_utf8_lossy(&raw))
}

pub fn parse_response(raw: &str) -> Result<HttpResponse> {
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow!("incomplete response: {raw:?}"))?;
    let status = head
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow!("missing status code in response line"))?
        .parse::<u16>()
        .map_err(|err| anyhow!("invalid status code: {err}"))?;
    let chunked = head
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked");
    let body = if chunked {
        decode_chunked(body)?
    } else {
        body.to_string()
    };
    Ok(HttpResponse {
        status,
        head: head.to_string(),
        body,
    })
}

fn decode_chunked(mut input: &str) -> Result<String> {
    let mut out = String::new();
    loop {
        let (size, rest) = input
            .split_once("\r\n")
            .ok_or_else(|| anyhow!("truncated chunk size"))?;
        let size = usize::from_str_radix(size.trim(), 16).context("invalid chunk size")?;
        if size == 0 {
            return Ok(out);
        }
        let chunk = rest
            .get(..size)
            .ok_or_else(|| anyhow!("truncated chunk"))?;
        out.push_str(chunk);
        input = rest
            .get(size + 2..)
            .ok_or_else(|| anyhow!("missing chunk terminator"))?;
    }
}
