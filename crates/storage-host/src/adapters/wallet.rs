//! In-memory wallet for testing and development.
//!
//! Holds a list of unspent outputs (change is spendable at once) and "signs"
//! by hashing the transaction id with the input index. Signatures are only
//! meaningful to `InMemoryConsensus`.

use parking_lot::Mutex;
use shared_types::{
    hash_bytes, CoveredFields, Currency, Hash, Input, Output, OutputId, SpendConditions,
    Transaction, TransactionSignature,
};

use crate::ports::outbound::{Wallet, WalletError};

struct Outputs {
    unspent: Vec<(OutputId, Currency)>,
    created: u64,
}

impl Outputs {
    fn next_id(&mut self) -> OutputId {
        let id = hash_bytes(&self.created.to_le_bytes());
        self.created += 1;
        id
    }
}

pub struct InMemoryWallet {
    spend_conditions: SpendConditions,
    outputs: Mutex<Outputs>,
}

impl InMemoryWallet {
    /// Wallet owning one output per entry of `balances`.
    pub fn new(spend_conditions: SpendConditions, balances: &[Currency]) -> Self {
        let mut outputs = Outputs {
            unspent: Vec::with_capacity(balances.len()),
            created: 0,
        };
        for value in balances {
            let id = outputs.next_id();
            outputs.unspent.push((id, *value));
        }
        Self {
            spend_conditions,
            outputs: Mutex::new(outputs),
        }
    }

    /// Sum of unspent outputs, including unconfirmed change.
    pub fn balance(&self) -> Currency {
        self.outputs.lock().unspent.iter().map(|(_, value)| *value).sum()
    }

    /// Signature the wallet produces for `input_index` of a transaction with
    /// id `txn_id`.
    pub fn expected_signature(txn_id: &Hash, input_index: u64) -> [u8; 64] {
        let mut preimage = txn_id.to_vec();
        preimage.extend_from_slice(&input_index.to_le_bytes());
        let first = hash_bytes(&preimage);
        let second = hash_bytes(&first);
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&first);
        signature[32..].copy_from_slice(&second);
        signature
    }
}

impl Wallet for InMemoryWallet {
    fn fund_transaction(&self, amount: Currency, txn: &mut Transaction) -> Result<(), WalletError> {
        if amount == 0 {
            return Ok(());
        }
        let mut outputs = self.outputs.lock();

        let mut selected = 0usize;
        let mut total: Currency = 0;
        for (_, value) in outputs.unspent.iter() {
            if total >= amount {
                break;
            }
            total = total.saturating_add(*value);
            selected += 1;
        }
        if total < amount {
            return Err(WalletError::InsufficientFunds {
                needed: amount,
                available: total,
            });
        }

        let change_address = self
            .spend_conditions
            .coin_address()
            .map_err(|e| WalletError::Signing {
                reason: e.to_string(),
            })?;
        for (output_id, _) in outputs.unspent.drain(..selected) {
            txn.inputs.push(Input {
                output_id,
                spend_conditions: self.spend_conditions.clone(),
            });
        }
        if total > amount {
            let change = total - amount;
            txn.outputs.push(Output {
                value: change,
                spend_hash: change_address,
            });
            let id = outputs.next_id();
            outputs.unspent.push((id, change));
        }
        Ok(())
    }

    fn sign_transaction(
        &self,
        txn: &mut Transaction,
        covered_fields: CoveredFields,
        input_index: usize,
    ) -> Result<(), WalletError> {
        if input_index >= txn.inputs.len() {
            return Err(WalletError::NoSuchInput { index: input_index });
        }
        let id = txn.id().map_err(|e| WalletError::Signing {
            reason: e.to_string(),
        })?;
        txn.signatures.push(TransactionSignature {
            input_index: input_index as u64,
            covered_fields,
            signature: Self::expected_signature(&id, input_index as u64),
        });
        Ok(())
    }

    fn spend_conditions(&self) -> SpendConditions {
        self.spend_conditions.clone()
    }
}

/// Spend conditions for a single development key.
pub fn dev_spend_conditions(seed: &[u8]) -> SpendConditions {
    SpendConditions {
        time_lock: 0,
        num_signatures: 1,
        public_keys: vec![hash_bytes(seed)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_selects_outputs_and_returns_change() {
        let wallet = InMemoryWallet::new(dev_spend_conditions(b"host"), &[40, 40, 40]);
        let mut txn = Transaction::default();

        wallet.fund_transaction(50, &mut txn).unwrap();
        assert_eq!(txn.inputs.len(), 2);
        assert_eq!(txn.outputs.len(), 1);
        assert_eq!(txn.outputs[0].value, 30);
        // one untouched output plus the change
        assert_eq!(wallet.balance(), 70);
    }

    #[test]
    fn test_insufficient_funds_leaves_wallet_untouched() {
        let wallet = InMemoryWallet::new(dev_spend_conditions(b"host"), &[5]);
        let mut txn = Transaction::default();
        assert_eq!(
            wallet.fund_transaction(6, &mut txn),
            Err(WalletError::InsufficientFunds {
                needed: 6,
                available: 5
            })
        );
        assert!(txn.inputs.is_empty());
        assert_eq!(wallet.balance(), 5);
    }

    #[test]
    fn test_sign_requires_existing_input() {
        let wallet = InMemoryWallet::new(dev_spend_conditions(b"host"), &[5]);
        let mut txn = Transaction::default();
        assert_eq!(
            wallet.sign_transaction(&mut txn, CoveredFields::whole_transaction(), 0),
            Err(WalletError::NoSuchInput { index: 0 })
        );

        wallet.fund_transaction(5, &mut txn).unwrap();
        wallet
            .sign_transaction(&mut txn, CoveredFields::whole_transaction(), 0)
            .unwrap();
        let id = txn.id().unwrap();
        assert_eq!(
            txn.signatures[0].signature,
            InMemoryWallet::expected_signature(&id, 0)
        );
    }
}
