//! Newline delimited JSON-RPC over stdin and stdout
//!
//! Stdout carries nothing but responses, one JSON value per line. The whole
//! process is a single session.

use rmcp::model::ErrorCode;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::protocol::ProtocolServer;
use crate::{
    errors::{EnvelopeError, McpError, ServerError},
    jsonrpc::{JsonRpcMessage, JsonRpcResponse, Reply},
};

/// Serve the process' stdin and stdout until EOF or cancellation
pub async fn serve_stdio(
    server: ProtocolServer,
    cancellation_token: CancellationToken,
) -> Result<(), ServerError> {
    serve_lines(
        server,
        tokio::io::stdin(),
        tokio::io::stdout(),
        cancellation_token,
    )
    .await
}

pub(crate) async fn serve_lines<R, W>(
    mut server: ProtocolServer,
    reader: R,
    mut writer: W,
    cancellation_token: CancellationToken,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match JsonRpcMessage::from_slice(line.as_bytes()) {
            Ok(message) => match server.dispatch(message).await {
                Reply::Response(response) => response,
                Reply::Acknowledged => continue,
            },
            Err(EnvelopeError::Parse) => JsonRpcResponse::parse_error(),
            Err(error @ EnvelopeError::InvalidRequest) => JsonRpcResponse::error(
                Value::Null,
                McpError::new(ErrorCode::INVALID_REQUEST, error.to_string(), None),
            ),
        };

        let mut bytes = serde_json::to_vec(&response).map_err(std::io::Error::from)?;
        bytes.push(b'\n');
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    Ok(())
}
