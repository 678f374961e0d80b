//! The port for account currency lookup.
//!
//! Accounts themselves are managed elsewhere; the import pipeline only ever
//! needs to know which currency an account is denominated in.

use crate::{
    database_id::{AccountId, UserId},
    Error,
};

/// Resolves account currencies for imports targeting a specific account.
pub trait AccountStore {
    /// Look up the ISO 4217 currency code of the user's account.
    ///
    /// Returns `Ok(None)` when the account does not exist (or belongs to a
    /// different user); a storage failure is an `Err`. The two cases are
    /// deliberately distinct so callers can tell "bad account id" apart from
    /// "database down".
    fn get_account_currency(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Option<String>, Error>;
}
