//! Host state aggregate: settings, capacity, stored files, proof schedule.
//!
//! Lives behind one `RwLock` owned by the service.

use std::collections::HashMap;
use std::fmt;

use shared_types::Hash;

use super::schedule::ProofSchedule;
use super::settings::HostSettings;
use crate::error::RejectionReason;

/// Opaque name of a stored file, derived from the index counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageLocation(String);

impl StorageLocation {
    pub fn from_index(index: u64) -> Self {
        Self(index.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file held for one or more contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub location: StorageLocation,
    pub size: u64,
    /// Active contracts referencing this root.
    pub contracts: u32,
}

/// Outcome of registering an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRegistration {
    /// New root; capacity was charged.
    Stored,
    /// Root already stored at `existing`; the fresh upload is redundant.
    Duplicate { existing: StorageLocation },
}

/// A file no contract references any more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedFile {
    pub location: StorageLocation,
    pub size: u64,
}

#[derive(Debug)]
pub struct HostState {
    pub settings: HostSettings,
    pub space_remaining: i64,
    pub files: HashMap<Hash, StoredFile>,
    pub index: u64,
    pub schedule: ProofSchedule,
}

impl HostState {
    pub fn new(settings: HostSettings) -> Self {
        Self {
            space_remaining: settings.total_storage,
            settings,
            files: HashMap::new(),
            index: 0,
            schedule: ProofSchedule::new(),
        }
    }

    /// Replace settings wholesale; capacity moves by the change in total
    /// storage.
    pub fn replace_settings(&mut self, settings: HostSettings) {
        let delta = settings
            .total_storage
            .saturating_sub(self.settings.total_storage);
        self.space_remaining = self.space_remaining.saturating_add(delta);
        self.settings = settings;
    }

    /// Reserve the next storage location.
    pub fn allocate_location(&mut self) -> StorageLocation {
        let location = StorageLocation::from_index(self.index);
        self.index += 1;
        location
    }

    pub fn file_location(&self, root: &Hash) -> Option<&StorageLocation> {
        self.files.get(root).map(|file| &file.location)
    }

    /// Map `root` to `location`, charging capacity for new roots.
    pub fn register_file(
        &mut self,
        root: Hash,
        location: StorageLocation,
        size: u64,
    ) -> Result<FileRegistration, RejectionReason> {
        if let Some(file) = self.files.get_mut(&root) {
            file.contracts += 1;
            return Ok(FileRegistration::Duplicate {
                existing: file.location.clone(),
            });
        }

        let charge = i64::try_from(size).unwrap_or(i64::MAX);
        if self.space_remaining < charge {
            return Err(RejectionReason::InsufficientCapacity {
                size,
                remaining: self.space_remaining,
            });
        }
        self.space_remaining -= charge;
        self.files.insert(
            root,
            StoredFile {
                location,
                size,
                contracts: 1,
            },
        );
        Ok(FileRegistration::Stored)
    }

    /// Drop one contract reference. Once none remain the mapping is removed,
    /// capacity is returned, and the caller must delete the file.
    pub fn release_file(&mut self, root: &Hash) -> Option<ReleasedFile> {
        let file = self.files.get_mut(root)?;
        file.contracts = file.contracts.saturating_sub(1);
        if file.contracts > 0 {
            return None;
        }
        let file = self.files.remove(root)?;
        self.space_remaining = self
            .space_remaining
            .saturating_add(i64::try_from(file.size).unwrap_or(i64::MAX));
        Some(ReleasedFile {
            location: file.location,
            size: file.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(total: i64) -> HostState {
        HostState::new(HostSettings {
            total_storage: total,
            ..Default::default()
        })
    }

    #[test]
    fn test_settings_change_moves_capacity_by_delta() {
        let mut state = state(1000);
        state.space_remaining = 400;

        state.replace_settings(HostSettings {
            total_storage: 1500,
            ..Default::default()
        });
        assert_eq!(state.space_remaining, 900);

        state.replace_settings(HostSettings {
            total_storage: 0,
            ..Default::default()
        });
        assert_eq!(state.space_remaining, -600);
    }

    #[test]
    fn test_locations_are_sequential() {
        let mut state = state(0);
        assert_eq!(state.allocate_location().as_str(), "0");
        assert_eq!(state.allocate_location().as_str(), "1");
        assert_eq!(state.index, 2);
    }

    #[test]
    fn test_register_and_release() {
        let mut state = state(1000);
        let root = [7u8; 32];
        let first = state.allocate_location();

        assert_eq!(
            state.register_file(root, first.clone(), 600),
            Ok(FileRegistration::Stored)
        );
        assert_eq!(state.space_remaining, 400);

        let second = state.allocate_location();
        assert_eq!(
            state.register_file(root, second, 600),
            Ok(FileRegistration::Duplicate {
                existing: first.clone()
            })
        );
        assert_eq!(state.space_remaining, 400);

        assert_eq!(state.release_file(&root), None);
        assert_eq!(
            state.release_file(&root),
            Some(ReleasedFile {
                location: first,
                size: 600
            })
        );
        assert_eq!(state.space_remaining, 1000);
        assert!(state.file_location(&root).is_none());
    }

    #[test]
    fn test_register_rechecks_capacity() {
        let mut state = state(100);
        let location = state.allocate_location();
        assert!(matches!(
            state.register_file([1u8; 32], location, 101),
            Err(RejectionReason::InsufficientCapacity { .. })
        ));
        assert!(state.files.is_empty());
    }
}
