//! Negotiation sessions: validate, accept, receive the upload, verify it,
//! register the file and schedule its first proof.
//!
//! The state lock is only taken in the synchronous helpers below, never
//! across a network transfer. File-store calls run on the blocking pool.

use std::io::Write;
use std::sync::Arc;

use shared_types::{FileContract, FileContractId, Hash, Transaction, SEGMENT_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error, info, warn};

use super::core::{blocking, StorageHost};
use crate::domain::{
    calculate_segments, reader_merkle_root, required_collateral, validate_contract,
    ContractEntry, FileRegistration, MerkleError, StorageLocation,
};
use crate::error::{HostError, HostResult, IntegrityFault};
use crate::ports::inbound::NegotiationOutcome;
use crate::ports::outbound::{ConsensusGateway, FileStore, Wallet};
use crate::wire::{write_object, ACCEPT_CONTRACT_RESPONSE, HOST_TROUBLE_RESPONSE};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

impl<W, C, S> StorageHost<W, C, S>
where
    W: Wallet,
    C: ConsensusGateway,
    S: FileStore + 'static,
{
    /// Validate `proposal` and, if acceptable, fund and sign the host's
    /// collateral. The returned transaction has passed consensus checks.
    pub fn consider_contract(&self, proposal: Transaction) -> HostResult<Transaction> {
        let (settings, space_remaining) = {
            let state = self.state.read();
            (state.settings.clone(), state.space_remaining)
        };
        let height = self.consensus.height();
        let contract = validate_contract(&proposal, &settings, space_remaining, height)?.clone();

        let mut txn = proposal;
        let first_host_input = txn.inputs.len();
        let collateral = required_collateral(&settings, &contract);
        self.wallet.fund_transaction(collateral, &mut txn)?;
        self.sign_inputs_from(&mut txn, first_host_input)?;
        self.consensus.valid_transaction(&txn)?;
        Ok(txn)
    }

    pub(super) async fn run_negotiation<T>(
        &self,
        conn: &mut T,
        proposal: Transaction,
    ) -> HostResult<NegotiationOutcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let txn = match self.consider_contract(proposal) {
            Ok(txn) => txn,
            Err(HostError::Rejected(reason)) => {
                debug!("[host] rejected contract proposal: {}", reason);
                let reason = reason.to_string();
                write_object(conn, &reason).await?;
                return Ok(NegotiationOutcome::Rejected { reason });
            }
            Err(err) => {
                error!("[host] failed to complete contract proposal: {}", err);
                write_object(conn, HOST_TROUBLE_RESPONSE).await?;
                return Err(err);
            }
        };
        write_object(conn, ACCEPT_CONTRACT_RESPONSE).await?;

        let contract = txn
            .file_contracts
            .first()
            .cloned()
            .ok_or_else(|| HostError::internal("accepted transaction lost its contract"))?;
        let contract_id = txn.file_contract_id(0)?;

        let location = self.state.write().allocate_location();
        if let Err(err) = self.receive_upload(conn, &location, contract.file_size).await {
            warn!("[host] upload for contract {} failed: {}", contract_id, err);
            self.discard(&location);
            return Err(err);
        }
        if let Err(err) = self.verify_upload(&location, &contract).await {
            warn!("[host] upload for contract {} rejected: {}", contract_id, err);
            self.discard(&location);
            return Err(err);
        }

        self.register_contract(txn, contract_id, contract, location)?;
        Ok(NegotiationOutcome::Accepted { contract_id })
    }

    /// Copy exactly `size` bytes from `conn` into `location`.
    async fn receive_upload<R>(
        &self,
        conn: &mut R,
        location: &StorageLocation,
        size: u64,
    ) -> HostResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let store = Arc::clone(&self.store);
        let target = location.clone();
        let mut file = blocking(move || Ok(store.create(&target)?)).await?;
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut received = 0u64;
        while received < size {
            let want = (size - received).min(buf.len() as u64) as usize;
            let n = conn
                .read(&mut buf[..want])
                .await
                .map_err(HostError::protocol)?;
            if n == 0 {
                return Err(IntegrityFault::ShortUpload {
                    expected: size,
                    received,
                }
                .into());
            }
            (file, buf) = blocking(move || {
                file.write_all(&buf[..n]).map_err(HostError::storage)?;
                Ok((file, buf))
            })
            .await?;
            received += n as u64;
        }
        blocking(move || file.flush().map_err(HostError::storage)).await
    }

    /// Recompute the upload's Merkle root and check the upload deadline.
    async fn verify_upload(
        &self,
        location: &StorageLocation,
        contract: &FileContract,
    ) -> HostResult<()> {
        let store = Arc::clone(&self.store);
        let target = location.clone();
        let size = contract.file_size;
        let computed = blocking(move || {
            let mut reader = store.open(&target)?;
            upload_merkle_root(&mut reader, size)
        })
        .await?;
        if computed != contract.file_merkle_root {
            return Err(IntegrityFault::MerkleRootMismatch {
                expected: contract.file_merkle_root,
                computed,
            }
            .into());
        }

        let height = self.consensus.height();
        let deadline = contract
            .start
            .saturating_sub(self.config.upload_deadline_blocks);
        if height >= deadline {
            return Err(IntegrityFault::LateUpload {
                height,
                start: contract.start,
            }
            .into());
        }
        Ok(())
    }

    /// Record the file, submit the contract, and schedule the first proof.
    /// Any failure leaves the state as it was before the upload.
    pub(super) fn register_contract(
        &self,
        txn: Transaction,
        contract_id: FileContractId,
        contract: FileContract,
        location: StorageLocation,
    ) -> HostResult<()> {
        let root: Hash = contract.file_merkle_root;
        let registration = {
            let mut state = self.state.write();
            if state.schedule.is_tracked(&contract_id) {
                Err(HostError::Schedule {
                    reason: format!("contract {} is already scheduled", contract_id),
                })
            } else {
                state
                    .register_file(root, location.clone(), contract.file_size)
                    .map_err(HostError::from)
            }
        };
        match registration {
            Ok(FileRegistration::Stored) => {}
            Ok(FileRegistration::Duplicate { existing }) => {
                debug!(
                    "[host] root {} already stored at {}, dropping duplicate upload",
                    hex::encode(root),
                    existing
                );
                self.discard(&location);
            }
            Err(err) => {
                debug!("[host] cannot register contract {}: {}", contract_id, err);
                self.discard(&location);
                return Err(err);
            }
        }

        if let Err(err) = self.consensus.accept_transaction(txn) {
            error!(
                "[host] contract {} was not accepted by consensus: {}",
                contract_id, err
            );
            self.rollback_registration(&root);
            return Err(err.into());
        }

        let first_proof = contract.start.saturating_add(self.config.reorg_depth);
        let entry = ContractEntry::new(contract_id, contract);
        let scheduled = self
            .state
            .write()
            .schedule
            .schedule_forward(first_proof, entry);
        if let Err(e) = scheduled {
            error!(
                "[host] High priority: submitted contract {} could not be scheduled: {}",
                contract_id, e
            );
            self.rollback_registration(&root);
            return Err(HostError::Schedule {
                reason: e.to_string(),
            });
        }

        info!(
            "[host] accepted contract {} for root {}, first proof due at height {}",
            contract_id,
            hex::encode(root),
            first_proof
        );
        Ok(())
    }

    /// Drop one reference to `root`, deleting the file if it was the last.
    fn rollback_registration(&self, root: &Hash) {
        let released = self.state.write().release_file(root);
        if let Some(released) = released {
            self.discard(&released.location);
        }
    }
}

/// Merkle root of an uploaded file of `file_size` bytes. A file shorter than
/// its declared size is an integrity fault, not a storage one.
pub(super) fn upload_merkle_root<R>(reader: &mut R, file_size: u64) -> HostResult<Hash>
where
    R: std::io::Read,
{
    reader_merkle_root(reader, calculate_segments(file_size)).map_err(|err| match err {
        MerkleError::UnexpectedEof { segment, .. } => IntegrityFault::ShortUpload {
            expected: file_size,
            received: segment.saturating_mul(SEGMENT_SIZE as u64),
        }
        .into(),
        other => other.into(),
    })
}
