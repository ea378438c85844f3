use std::io::{ErrorKind, Read};
use std::sync::Arc;

use shared_types::Hash;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::core::{blocking, StorageHost};
use crate::error::{HostError, HostResult};
use crate::ports::outbound::{ConsensusGateway, FileStore, Wallet};

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

impl<W, C, S> StorageHost<W, C, S>
where
    W: Wallet,
    C: ConsensusGateway,
    S: FileStore + 'static,
{
    /// Stream the file stored under `root` to `conn`. No state is changed,
    /// whatever the outcome.
    pub(super) async fn run_retrieval<T>(&self, conn: &mut T, root: Hash) -> HostResult<u64>
    where
        T: AsyncWrite + Unpin + Send,
    {
        let location = self.state.read().file_location(&root).cloned();
        let Some(location) = location else {
            debug!("[host] retrieval of unknown root {}", hex::encode(root));
            return Err(HostError::UnknownFile { root });
        };

        let store = Arc::clone(&self.store);
        let mut reader = blocking(move || Ok(store.open(&location)?)).await?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut sent = 0u64;
        loop {
            let (returned, chunk, n) = blocking(move || {
                let n = read_chunk(&mut reader, &mut buf)?;
                Ok((reader, buf, n))
            })
            .await?;
            reader = returned;
            buf = chunk;
            if n == 0 {
                break;
            }
            if let Err(e) = conn.write_all(&buf[..n]).await {
                warn!(
                    "[host] download of {} interrupted after {} bytes: {}",
                    hex::encode(root),
                    sent,
                    e
                );
                return Err(HostError::protocol(e));
            }
            sent += n as u64;
        }
        conn.flush().await.map_err(HostError::protocol)?;
        debug!("[host] sent {} bytes of {}", sent, hex::encode(root));
        Ok(sent)
    }
}

/// One read from `reader`, retried on interruption. Zero means end of file.
fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> HostResult<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HostError::storage(e)),
        }
    }
}
