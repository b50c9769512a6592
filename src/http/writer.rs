use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a response into its wire form.
///
/// ```text
/// HTTP/1.1 <code>\r\n
/// <Name>: <Value>\r\n        (each header, in map order)
/// Content-Length: <n>\r\n    (always synthesized from the body)
/// \r\n
/// <body>
/// ```
///
/// A `Content-Length` set by the handler is dropped in favour of the
/// synthesized one.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + resp.body.len());

    // Status line
    buf.extend_from_slice(format!("{} {}\r\n", HTTP_VERSION, resp.status.as_u16()).as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        if k.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(format!("Content-Length: {}\r\n", resp.body.len()).as_bytes());

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// Pending outbound bytes of one response.
#[derive(Debug)]
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    /// Consumes the response; it is serialized exactly once.
    pub fn new(response: Response) -> Self {
        Self {
            buffer: serialize_response(&response),
            written: 0,
        }
    }

    /// Bytes not yet accepted by the socket.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
