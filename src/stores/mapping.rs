//! The port for learned bank mappings.

use crate::{
    database_id::UserId,
    models::{BankMapping, NewBankMapping},
    Error,
};

/// Handles the storage of learned per-institution parse configurations.
pub trait MappingStore {
    /// Look up a mapping by schema fingerprint.
    ///
    /// The lookup is two-tiered: a mapping owned by `user_id` wins over a
    /// global template with the same fingerprint. Returns `Ok(None)` when
    /// neither exists.
    fn get_mapping_by_fingerprint(
        &self,
        fingerprint: &str,
        user_id: UserId,
    ) -> Result<Option<BankMapping>, Error>;

    /// Persist a new mapping.
    ///
    /// # Errors
    /// Returns [Error::DuplicateMapping] when a mapping with the same
    /// fingerprint and owner already exists.
    fn create_mapping(&self, mapping: NewBankMapping) -> Result<BankMapping, Error>;

    /// Rewrite an existing mapping's mutable fields and bump `updated_at`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] when no mapping has the given ID.
    fn update_mapping(&self, mapping: &BankMapping) -> Result<(), Error>;

    /// List a user's mappings, including the global templates, newest first.
    fn list_mappings_for_user(&self, user_id: UserId) -> Result<Vec<BankMapping>, Error>;
}
