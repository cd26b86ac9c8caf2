use serde::Serialize;
use tracing::info;

use crate::accounts::directory::{AccountStore, FichaStore};
use crate::errors::{AppError, AppResult};
use crate::faces::enrollment::run_face_removal_with;
use crate::faces::store::EncodingStore;

#[derive(Debug, Clone, Serialize)]
pub struct AccountDeletionOutcome {
    pub account_id: String,
    pub removed_encodings: Vec<String>,
}

/// Removes an account together with its face encodings and ficha
/// memberships. Encodings are removed before the account record.
pub fn delete_account<D, S>(directory: &D, store: &S, id: &str) -> AppResult<AccountDeletionOutcome>
where
    D: AccountStore + FichaStore,
    S: EncodingStore,
{
    if directory.find_account(id)?.is_none() {
        return Err(AppError::NotFound {
            kind: "account",
            id: id.to_string(),
        });
    }

    let removal = run_face_removal_with(id, store)?;
    directory.remove_member(id)?;
    directory.delete_account(id)?;
    info!(
        account = %id,
        encodings = removal.removed_ids.len(),
        "deleted account"
    );

    Ok(AccountDeletionOutcome {
        account_id: id.to_string(),
        removed_encodings: removal.removed_ids,
    })
}
