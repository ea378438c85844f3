//! Contract Validator
//!
//! Pure policy checks over a proposed contract transaction. The first failing
//! rule decides the rejection reason; nothing is mutated here. Funding and
//! signing the host's collateral happens in the service once this passes.

use shared_types::{BlockHeight, Currency, FileContract, Transaction, EMPTY_ADDRESS};

use super::settings::HostSettings;
use crate::error::RejectionReason;

/// Check `txn` against host policy at `height`. Returns the single contract
/// on success.
pub fn validate_contract<'a>(
    txn: &'a Transaction,
    settings: &HostSettings,
    space_remaining: i64,
    height: BlockHeight,
) -> Result<&'a FileContract, RejectionReason> {
    let contract = match txn.file_contracts.as_slice() {
        [contract] => contract,
        other => {
            return Err(RejectionReason::WrongContractCount { count: other.len() });
        }
    };
    let size = contract.file_size;

    if size < settings.min_filesize || size > settings.max_filesize {
        return Err(RejectionReason::FileSizeOutOfBounds {
            size,
            min: settings.min_filesize,
            max: settings.max_filesize,
        });
    }

    if space_remaining < 0 || size > space_remaining as u64 {
        return Err(RejectionReason::InsufficientCapacity {
            size,
            remaining: space_remaining,
        });
    }

    let contract_duration = contract
        .duration()
        .ok_or(RejectionReason::InvalidContractPeriod {
            start: contract.start,
            end: contract.end,
        })?;

    let duration_out_of_bounds = |duration| RejectionReason::DurationOutOfBounds {
        duration,
        min: settings.min_duration,
        max: settings.max_duration,
    };
    let full_duration = contract
        .end
        .checked_sub(height)
        .ok_or_else(|| duration_out_of_bounds(0))?;
    if full_duration < settings.min_duration || full_duration > settings.max_duration {
        return Err(duration_out_of_bounds(full_duration));
    }

    let window = contract.challenge_window;
    if window < settings.min_challenge_window || window > settings.max_challenge_window {
        return Err(RejectionReason::ChallengeWindowOutOfBounds {
            window,
            min: settings.min_challenge_window,
            max: settings.max_challenge_window,
        });
    }

    if contract.tolerance < settings.min_tolerance {
        return Err(RejectionReason::ToleranceTooLow {
            tolerance: contract.tolerance,
            min: settings.min_tolerance,
        });
    }

    if contract.valid_proof_address != settings.coin_address {
        return Err(RejectionReason::WrongPayoutAddress);
    }

    let required_payout = per_window(settings.price, size, window);
    if contract.valid_proof_payout < required_payout {
        return Err(RejectionReason::ValidPayoutTooLow {
            payout: contract.valid_proof_payout,
            required: required_payout,
        });
    }

    if contract.missed_proof_address != EMPTY_ADDRESS {
        return Err(RejectionReason::MissedPayoutNotBurned);
    }

    let max_burn = per_window(settings.burn, size, window);
    if contract.missed_proof_payout > max_burn {
        return Err(RejectionReason::MissedPayoutTooHigh {
            payout: contract.missed_proof_payout,
            max: max_burn,
        });
    }

    let required_fund = settings
        .burn
        .saturating_add(settings.price)
        .saturating_mul(size)
        .saturating_mul(contract_duration);
    if contract.contract_fund < required_fund {
        return Err(RejectionReason::ContractFundTooLow {
            fund: contract.contract_fund,
            required: required_fund,
        });
    }

    Ok(contract)
}

/// Collateral the host adds: `burn * file_size * (end - start)`.
pub fn required_collateral(settings: &HostSettings, contract: &FileContract) -> Currency {
    settings
        .burn
        .saturating_mul(contract.file_size)
        .saturating_mul(contract.duration().unwrap_or(0))
}

fn per_window(rate: Currency, size: u64, window: BlockHeight) -> Currency {
    rate.saturating_mul(size).saturating_mul(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::CoinAddress;

    const HEIGHT: BlockHeight = 40;
    const HOST_ADDRESS: CoinAddress = [0xaa; 32];

    fn settings() -> HostSettings {
        HostSettings {
            min_filesize: 1,
            max_filesize: 1000,
            price: 1,
            burn: 1,
            min_duration: 10,
            max_duration: 1000,
            min_challenge_window: 5,
            max_challenge_window: 100,
            min_tolerance: 1,
            coin_address: HOST_ADDRESS,
            total_storage: 1 << 20,
            ..Default::default()
        }
    }

    fn proposal() -> FileContract {
        FileContract {
            file_size: 500,
            start: HEIGHT + 20,
            end: HEIGHT + 120,
            challenge_window: 10,
            tolerance: 2,
            valid_proof_address: HOST_ADDRESS,
            valid_proof_payout: 5000,
            missed_proof_address: EMPTY_ADDRESS,
            missed_proof_payout: 0,
            contract_fund: 100_000,
            ..Default::default()
        }
    }

    fn check(contract: FileContract) -> Result<FileContract, RejectionReason> {
        let txn = Transaction {
            file_contracts: vec![contract],
            ..Default::default()
        };
        validate_contract(&txn, &settings(), 1 << 20, HEIGHT).cloned()
    }

    #[test]
    fn test_reference_proposal_is_accepted() {
        assert_eq!(check(proposal()), Ok(proposal()));
    }

    #[test]
    fn test_contract_count() {
        let txn = Transaction {
            file_contracts: vec![proposal(), proposal()],
            ..Default::default()
        };
        let err = validate_contract(&txn, &settings(), 1 << 20, HEIGHT).unwrap_err();
        assert_eq!(err, RejectionReason::WrongContractCount { count: 2 });
        assert!(err.to_string().contains("must have exactly one contract"));

        let empty = Transaction::default();
        assert_eq!(
            validate_contract(&empty, &settings(), 1 << 20, HEIGHT),
            Err(RejectionReason::WrongContractCount { count: 0 })
        );
    }

    #[test]
    fn test_file_size_bounds() {
        for size in [0, 1001] {
            let err = check(FileContract {
                file_size: size,
                ..proposal()
            })
            .unwrap_err();
            assert!(matches!(err, RejectionReason::FileSizeOutOfBounds { .. }));
        }
    }

    #[test]
    fn test_capacity() {
        let txn = Transaction {
            file_contracts: vec![proposal()],
            ..Default::default()
        };
        assert_eq!(
            validate_contract(&txn, &settings(), 499, HEIGHT),
            Err(RejectionReason::InsufficientCapacity {
                size: 500,
                remaining: 499
            })
        );
        assert!(matches!(
            validate_contract(&txn, &settings(), -5, HEIGHT),
            Err(RejectionReason::InsufficientCapacity { .. })
        ));
        assert!(validate_contract(&txn, &settings(), 500, HEIGHT).is_ok());
    }

    #[test]
    fn test_duration_measured_from_current_height() {
        // end - height = 9 < min_duration even though end - start = 10
        let err = check(FileContract {
            start: HEIGHT - 1,
            end: HEIGHT + 9,
            ..proposal()
        })
        .unwrap_err();
        assert_eq!(
            err,
            RejectionReason::DurationOutOfBounds {
                duration: 9,
                min: 10,
                max: 1000
            }
        );

        let err = check(FileContract {
            end: HEIGHT + 1001,
            ..proposal()
        })
        .unwrap_err();
        assert!(matches!(err, RejectionReason::DurationOutOfBounds { .. }));
    }

    #[test]
    fn test_empty_period_rejected() {
        let err = check(FileContract {
            start: HEIGHT + 120,
            end: HEIGHT + 120,
            ..proposal()
        })
        .unwrap_err();
        assert!(matches!(err, RejectionReason::InvalidContractPeriod { .. }));
    }

    #[test]
    fn test_window_and_tolerance() {
        for window in [4, 101] {
            let err = check(FileContract {
                challenge_window: window,
                ..proposal()
            })
            .unwrap_err();
            assert!(matches!(
                err,
                RejectionReason::ChallengeWindowOutOfBounds { .. }
            ));
        }
        let err = check(FileContract {
            tolerance: 0,
            ..proposal()
        })
        .unwrap_err();
        assert_eq!(
            err,
            RejectionReason::ToleranceTooLow {
                tolerance: 0,
                min: 1
            }
        );
    }

    #[test]
    fn test_payout_rules() {
        assert_eq!(
            check(FileContract {
                valid_proof_address: [1u8; 32],
                ..proposal()
            }),
            Err(RejectionReason::WrongPayoutAddress)
        );
        assert_eq!(
            check(FileContract {
                valid_proof_payout: 4999,
                ..proposal()
            }),
            Err(RejectionReason::ValidPayoutTooLow {
                payout: 4999,
                required: 5000
            })
        );
        assert_eq!(
            check(FileContract {
                missed_proof_address: HOST_ADDRESS,
                ..proposal()
            }),
            Err(RejectionReason::MissedPayoutNotBurned)
        );
        assert_eq!(
            check(FileContract {
                missed_proof_payout: 5001,
                ..proposal()
            }),
            Err(RejectionReason::MissedPayoutTooHigh {
                payout: 5001,
                max: 5000
            })
        );
    }

    #[test]
    fn test_fund_covers_declared_duration() {
        // (burn + price) * 500 * (end - start = 100)
        assert_eq!(
            check(FileContract {
                contract_fund: 99_999,
                ..proposal()
            }),
            Err(RejectionReason::ContractFundTooLow {
                fund: 99_999,
                required: 100_000
            })
        );
    }

    #[test]
    fn test_required_collateral() {
        assert_eq!(required_collateral(&settings(), &proposal()), 500 * 100);
    }
}
