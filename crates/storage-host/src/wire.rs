//! Wire codec: bincode objects framed by an 8-byte little-endian length.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{Hash, Transaction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HostError, HostResult};

/// Sent to the renter when a proposal is accepted.
pub const ACCEPT_CONTRACT_RESPONSE: &str = "accept";

/// Sent to the renter when the host faults internally.
pub const HOST_TROUBLE_RESPONSE: &str = "host is having trouble - sorry!";

/// First message of every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostRequest {
    NegotiateContract(Transaction),
    RetrieveFile(Hash),
}

pub async fn write_object<W, T>(writer: &mut W, object: &T) -> HostResult<()>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize + Sync + ?Sized,
{
    let payload = bincode::serialize(object).map_err(HostError::protocol)?;
    writer
        .write_all(&(payload.len() as u64).to_le_bytes())
        .await
        .map_err(HostError::protocol)?;
    writer.write_all(&payload).await.map_err(HostError::protocol)?;
    writer.flush().await.map_err(HostError::protocol)
}

pub async fn read_object<R, T>(reader: &mut R, max_size: u64) -> HostResult<T>
where
    R: AsyncRead + Unpin + Send,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 8];
    reader
        .read_exact(&mut prefix)
        .await
        .map_err(HostError::protocol)?;
    let len = u64::from_le_bytes(prefix);
    if len > max_size {
        return Err(HostError::protocol(format!(
            "message of {} bytes exceeds limit of {}",
            len, max_size
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(HostError::protocol)?;
    bincode::deserialize(&payload).map_err(HostError::protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_over_duplex() {
        let (mut client, mut host) = tokio::io::duplex(1024);
        let request = HostRequest::RetrieveFile([3u8; 32]);
        write_object(&mut client, &request).await.unwrap();

        let received: HostRequest = read_object(&mut host, 1024).await.unwrap();
        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_oversized_message_refused() {
        let (mut client, mut host) = tokio::io::duplex(4096);
        write_object(&mut client, &vec![0u8; 2000]).await.unwrap();

        let result: HostResult<Vec<u8>> = read_object(&mut host, 100).await;
        assert!(matches!(result, Err(HostError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_protocol_error() {
        let (mut client, mut host) = tokio::io::duplex(64);
        client.write_all(&[5, 0, 0]).await.unwrap();
        drop(client);

        let result: HostResult<String> = read_object(&mut host, 100).await;
        assert!(matches!(result, Err(HostError::Protocol { .. })));
    }
}
