//! Renter listener.
//!
//! One task per connection. The first framed object selects the session
//! type; the host then owns the connection until the session ends.

use std::net::SocketAddr;
use std::sync::Arc;

use storage_host::wire::read_object;
use storage_host::{HostRequest, HostResult, NegotiationOutcome, StorageHostApi};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Accept renter connections until `shutdown` flips.
pub async fn serve<H>(
    listener: TcpListener,
    host: Arc<H>,
    max_message_size: u64,
    mut shutdown: watch::Receiver<bool>,
) where
    H: StorageHostApi + 'static,
{
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let host = Arc::clone(&host);
                        tokio::spawn(async move {
                            let mut stream = stream;
                            handle_connection(host.as_ref(), &mut stream, peer, max_message_size)
                                .await;
                        });
                    }
                    Err(e) => warn!("[host] accept failed: {}", e),
                }
            }
            _ = shutdown.changed() => {
                info!("[host] listener shutting down");
                break;
            }
        }
    }
}

/// Run a single renter session.
pub async fn handle_connection<H, S>(
    host: &H,
    conn: &mut S,
    peer: SocketAddr,
    max_message_size: u64,
) where
    H: StorageHostApi,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if let Err(e) = dispatch(host, conn, peer, max_message_size).await {
        warn!("[host] session with {} failed: {}", peer, e);
    }
}

async fn dispatch<H, S>(
    host: &H,
    conn: &mut S,
    peer: SocketAddr,
    max_message_size: u64,
) -> HostResult<()>
where
    H: StorageHostApi,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let request: HostRequest = read_object(conn, max_message_size).await?;
    match request {
        HostRequest::NegotiateContract(proposal) => {
            match host.negotiate_contract(conn, proposal).await? {
                NegotiationOutcome::Accepted { contract_id } => {
                    debug!("[host] session with {} ended with contract {}", peer, contract_id)
                }
                NegotiationOutcome::Rejected { reason } => {
                    debug!("[host] rejected proposal from {}: {}", peer, reason)
                }
            }
        }
        HostRequest::RetrieveFile(root) => {
            host.retrieve_file(conn, root).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{FileContract, Transaction, EMPTY_ADDRESS};
    use std::io::Cursor;
    use storage_host::adapters::{
        dev_spend_conditions, InMemoryConsensus, InMemoryFileStore, InMemoryWallet,
    };
    use storage_host::wire::write_object;
    use storage_host::{
        calculate_segments, reader_merkle_root, HostConfig, HostSettings, StorageHost,
        ACCEPT_CONTRACT_RESPONSE,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    type Host = StorageHost<InMemoryWallet, InMemoryConsensus, InMemoryFileStore>;

    const LIMIT: u64 = 1 << 20;

    fn host() -> Arc<Host> {
        let settings = HostSettings {
            net_address: "127.0.0.1:0".into(),
            total_storage: 1 << 20,
            min_filesize: 1,
            max_filesize: 1 << 16,
            min_duration: 10,
            max_duration: 1000,
            min_challenge_window: 5,
            max_challenge_window: 100,
            min_tolerance: 1,
            price: 1,
            burn: 1,
            coin_address: [0xcc; 32],
        };
        Arc::new(StorageHost::new(
            HostConfig::default(),
            settings,
            Arc::new(InMemoryWallet::new(dev_spend_conditions(b"srv"), &[1 << 40])),
            Arc::new(InMemoryConsensus::at_height(10)),
            Arc::new(InMemoryFileStore::new()),
        ))
    }

    async fn start(host: Arc<Host>) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(serve(listener, host, LIMIT, rx));
        (addr, tx)
    }

    #[tokio::test]
    async fn test_tcp_upload_and_download() {
        let host = host();
        let (addr, _shutdown) = start(Arc::clone(&host)).await;

        let data = vec![0x5a; 3000];
        let root = reader_merkle_root(&mut Cursor::new(&data), calculate_segments(3000)).unwrap();
        let proposal = Transaction {
            file_contracts: vec![FileContract {
                file_size: 3000,
                file_merkle_root: root,
                start: 30,
                end: 130,
                challenge_window: 10,
                tolerance: 1,
                valid_proof_address: [0xcc; 32],
                valid_proof_payout: 30_000,
                missed_proof_address: EMPTY_ADDRESS,
                missed_proof_payout: 0,
                contract_fund: 600_000,
            }],
            ..Default::default()
        };

        let mut conn = TcpStream::connect(addr).await.unwrap();
        write_object(&mut conn, &HostRequest::NegotiateContract(proposal))
            .await
            .unwrap();
        let response: String = read_object(&mut conn, LIMIT).await.unwrap();
        assert_eq!(response, ACCEPT_CONTRACT_RESPONSE);
        conn.write_all(&data).await.unwrap();
        // host closes the session once the contract is registered
        let mut rest = Vec::new();
        conn.read_to_end(&mut rest).await.unwrap();
        assert_eq!(host.space_remaining(), (1 << 20) - 3000);

        let mut conn = TcpStream::connect(addr).await.unwrap();
        write_object(&mut conn, &HostRequest::RetrieveFile(root))
            .await
            .unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_oversized_request_closes_session() {
        let host = host();
        let (addr, _shutdown) = start(Arc::clone(&host)).await;

        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(&(LIMIT + 1).to_le_bytes()).await.unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert_eq!(host.space_remaining(), 1 << 20);
    }

    #[tokio::test]
    async fn test_listener_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(serve(listener, host(), LIMIT, rx));
        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
