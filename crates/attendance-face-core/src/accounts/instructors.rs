use serde::Deserialize;
use tracing::info;

use crate::accounts::directory::{Account, AccountStore, AccountSummary, FichaStore, Role};
use crate::accounts::password::{hash_password, PasswordPolicy, UserAttributes};
use crate::accounts::{require_field, validate_email};
use crate::errors::{AppError, AppResult};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructorRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub fichas: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial update. `fichas: None` keeps the current memberships while
/// `Some(vec![])` clears them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstructorPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub fichas: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub fn create_instructor<D>(
    directory: &D,
    policy: &PasswordPolicy,
    request: &InstructorRequest,
) -> AppResult<AccountSummary>
where
    D: AccountStore + FichaStore,
{
    require_field("username", &request.username)?;
    require_field("first_name", &request.first_name)?;
    require_field("last_name", &request.last_name)?;
    validate_email("email", &request.email)?;
    ensure_fichas_exist(directory, &request.fichas)?;

    let mut account = Account::new(
        Role::Instructor,
        request.username.trim(),
        request.email.trim(),
        request.first_name.trim(),
        request.last_name.trim(),
    );
    account.is_active = request.is_active;
    if let Some(password) = request.password.as_deref() {
        policy.check("password", password, &UserAttributes::from(&account))?;
        account.password_hash = Some(hash_password(password)?);
    }

    let account = directory.create_account(account)?;
    if let Err(err) = directory.set_instructor_fichas(&account.id, &request.fichas) {
        directory.delete_account(&account.id)?;
        return Err(err);
    }
    info!(account = %account.id, fichas = request.fichas.len(), "created instructor");

    let fichas = directory.fichas_for(&account.id)?;
    Ok(AccountSummary::new(&account, fichas))
}

pub fn update_instructor<D>(
    directory: &D,
    policy: &PasswordPolicy,
    id: &str,
    patch: &InstructorPatch,
) -> AppResult<AccountSummary>
where
    D: AccountStore + FichaStore,
{
    let mut account = match directory.find_account(id)? {
        Some(account) if account.role == Role::Instructor => account,
        _ => {
            return Err(AppError::NotFound {
                kind: "instructor",
                id: id.to_string(),
            })
        }
    };

    if let Some(username) = patch.username.as_deref() {
        require_field("username", username)?;
        account.username = username.trim().to_string();
    }
    if let Some(email) = patch.email.as_deref() {
        validate_email("email", email)?;
        account.email = email.trim().to_string();
    }
    if let Some(first_name) = patch.first_name.as_deref() {
        require_field("first_name", first_name)?;
        account.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = patch.last_name.as_deref() {
        require_field("last_name", last_name)?;
        account.last_name = last_name.trim().to_string();
    }
    if let Some(is_active) = patch.is_active {
        account.is_active = is_active;
    }
    if let Some(password) = patch.password.as_deref() {
        policy.check("password", password, &UserAttributes::from(&account))?;
        account.password_hash = Some(hash_password(password)?);
    }
    if let Some(fichas) = patch.fichas.as_deref() {
        ensure_fichas_exist(directory, fichas)?;
    }

    directory.update_account(&account)?;
    if let Some(fichas) = patch.fichas.as_deref() {
        directory.set_instructor_fichas(&account.id, fichas)?;
    }
    info!(account = %account.id, "updated instructor");

    let fichas = directory.fichas_for(&account.id)?;
    Ok(AccountSummary::new(&account, fichas))
}

fn ensure_fichas_exist<D: FichaStore>(directory: &D, numeros: &[String]) -> AppResult<()> {
    let mut missing = Vec::new();
    for numero in numeros {
        if directory.find_ficha(numero)?.is_none() {
            missing.push(format!("ficha {numero} does not exist"));
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            field: "fichas".to_string(),
            messages: missing,
        })
    }
}
