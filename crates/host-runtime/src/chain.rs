//! Chain-update driver.
//!
//! Updates are applied strictly one at a time. The development chain only
//! mints the next block after the host has finished with the previous one,
//! so the consensus height never moves under a maintenance pass.

use std::sync::Arc;
use std::time::Duration;

use shared_types::ChainUpdate;
use storage_host::adapters::InMemoryConsensus;
use storage_host::{MaintenanceReport, ReclaimReport, StorageHostApi};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// What one update did to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub maintenance: MaintenanceReport,
    pub reclaimed: Option<ReclaimReport>,
}

/// Run proof maintenance for `update`, then reclaim expired contracts at the
/// new height when `reclaim` is set. Runs on the blocking pool since proofs
/// read file data.
pub async fn apply_update<H>(
    host: Arc<H>,
    update: ChainUpdate,
    reclaim: bool,
) -> anyhow::Result<UpdateSummary>
where
    H: StorageHostApi + 'static,
{
    let summary = tokio::task::spawn_blocking(move || {
        let maintenance = host.process_chain_update(&update);
        let reclaimed = reclaim.then(|| host.reclaim_expired(update.final_height()));
        UpdateSummary {
            maintenance,
            reclaimed,
        }
    })
    .await?;
    Ok(summary)
}

/// Mint one development block per `interval` and feed it to the host.
pub async fn run_dev_chain<H>(
    host: Arc<H>,
    consensus: Arc<InMemoryConsensus>,
    interval: Duration,
    reclaim: bool,
    mut shutdown: watch::Receiver<bool>,
) where
    H: StorageHostApi + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let update = consensus.advance(1);
                let height = update.final_height();
                match apply_update(Arc::clone(&host), update, reclaim).await {
                    Ok(summary) => log_summary(height, &summary),
                    Err(e) => error!("[host] maintenance task at height {} failed: {}", height, e),
                }
            }
            _ = shutdown.changed() => {
                info!("[host] chain driver shutting down");
                break;
            }
        }
    }
}

fn log_summary(height: u64, summary: &UpdateSummary) {
    let m = &summary.maintenance;
    if m.proofs_built > 0 || m.proofs_failed > 0 {
        info!(
            "[host] height {}: {} proofs built, {} failed, txn {}",
            height,
            m.proofs_built,
            m.proofs_failed,
            m.submitted.map(hex::encode).unwrap_or_else(|| "none".into())
        );
    } else {
        debug!("[host] height {}: nothing to prove", height);
    }
    if let Some(r) = &summary.reclaimed {
        if r.contracts_expired > 0 {
            info!(
                "[host] reclaimed {} contracts, {} files, {} bytes",
                r.contracts_expired, r.files_deleted, r.space_returned
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{FileContract, Transaction, EMPTY_ADDRESS};
    use std::io::Cursor;
    use storage_host::adapters::{dev_spend_conditions, InMemoryFileStore, InMemoryWallet};
    use storage_host::wire::read_object;
    use storage_host::{
        calculate_segments, reader_merkle_root, HostConfig, HostSettings, NegotiationOutcome,
        StorageHost, ACCEPT_CONTRACT_RESPONSE,
    };
    use tokio::io::{duplex, AsyncWriteExt};

    type Host = StorageHost<InMemoryWallet, InMemoryConsensus, InMemoryFileStore>;

    fn settings() -> HostSettings {
        HostSettings {
            net_address: "127.0.0.1:0".into(),
            total_storage: 10_000,
            min_filesize: 1,
            max_filesize: 5_000,
            min_duration: 5,
            max_duration: 1_000,
            min_challenge_window: 5,
            max_challenge_window: 100,
            min_tolerance: 1,
            price: 1,
            burn: 1,
            coin_address: [0xcc; 32],
        }
    }

    #[tokio::test]
    async fn test_apply_update_without_contracts_is_quiet() {
        let consensus = Arc::new(InMemoryConsensus::at_height(5));
        let host: Arc<Host> = Arc::new(StorageHost::new(
            HostConfig::default(),
            settings(),
            Arc::new(InMemoryWallet::new(dev_spend_conditions(b"c"), &[1_000])),
            Arc::clone(&consensus),
            Arc::new(InMemoryFileStore::new()),
        ));

        let summary = apply_update(host, consensus.advance(3), true).await.unwrap();
        assert_eq!(summary.maintenance, MaintenanceReport::default());
        assert_eq!(summary.reclaimed, Some(ReclaimReport::default()));
    }

    #[tokio::test]
    async fn test_apply_update_proves_negotiated_contract() {
        let consensus = Arc::new(InMemoryConsensus::at_height(5));
        let host: Arc<Host> = Arc::new(StorageHost::new(
            HostConfig::default(),
            settings(),
            Arc::new(InMemoryWallet::new(dev_spend_conditions(b"c"), &[1_000_000])),
            Arc::clone(&consensus),
            Arc::new(InMemoryFileStore::new()),
        ));

        let data = vec![3u8; 100];
        let root = reader_merkle_root(&mut Cursor::new(&data), calculate_segments(100)).unwrap();
        let proposal = Transaction {
            file_contracts: vec![FileContract {
                file_size: 100,
                file_merkle_root: root,
                start: 10,
                end: 30,
                challenge_window: 5,
                tolerance: 1,
                valid_proof_address: [0xcc; 32],
                valid_proof_payout: 500,
                missed_proof_address: EMPTY_ADDRESS,
                missed_proof_payout: 0,
                contract_fund: 4_000,
            }],
            ..Default::default()
        };

        let (mut client, mut server) = duplex(1024);
        let renter = tokio::spawn(async move {
            let response: String = read_object(&mut client, 1 << 16).await.unwrap();
            assert_eq!(response, ACCEPT_CONTRACT_RESPONSE);
            client.write_all(&data).await.unwrap();
        });
        let outcome = host.negotiate_contract(&mut server, proposal).await.unwrap();
        assert!(matches!(outcome, NegotiationOutcome::Accepted { .. }));
        renter.await.unwrap();

        // first proof due at start + reorg depth = 16; the walk covers 5..=16
        let summary = apply_update(Arc::clone(&host), consensus.advance(12), false)
            .await
            .unwrap();
        assert_eq!(summary.maintenance.proofs_built, 1);
        assert!(summary.maintenance.submitted.is_some());
        assert_eq!(summary.reclaimed, None);
    }
}
