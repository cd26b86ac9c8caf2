use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::accounts::directory::{Account, AccountStore};
use crate::errors::{AppError, AppResult};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "111111",
    "abc123",
    "admin123",
    "contrasena",
    "contraseña",
    "dragon",
    "football",
    "iloveyou",
    "letmein",
    "monkey",
    "password",
    "password1",
    "qwerty",
    "qwerty123",
    "sunshine",
    "welcome",
];

/// Identity fields a password must not resemble.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl<'a> From<&'a Account> for UserAttributes<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            username: &account.username,
            email: &account.email,
            first_name: &account.first_name,
            last_name: &account.last_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Every rule the password breaks, in a fixed order.
    pub fn violations(&self, password: &str, attributes: &UserAttributes<'_>) -> Vec<String> {
        let mut messages = Vec::new();
        let lowered = password.to_lowercase();

        if let Some(name) = similar_attribute(&lowered, attributes) {
            messages.push(format!("the password is too similar to the {name}"));
        }
        if password.chars().count() < self.min_length {
            messages.push(format!(
                "this password is too short; it must contain at least {} characters",
                self.min_length
            ));
        }
        if COMMON_PASSWORDS.contains(&lowered.trim()) {
            messages.push("this password is too common".to_string());
        }
        if !password.is_empty() && password.chars().all(|ch| ch.is_ascii_digit()) {
            messages.push("this password is entirely numeric".to_string());
        }

        messages
    }

    pub fn check(&self, field: &str, password: &str, attributes: &UserAttributes<'_>) -> AppResult<()> {
        let messages = self.violations(password, attributes);
        if messages.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation {
                field: field.to_string(),
                messages,
            })
        }
    }
}

fn similar_attribute(lowered: &str, attributes: &UserAttributes<'_>) -> Option<&'static str> {
    let email_local = attributes.email.split('@').next().unwrap_or_default();
    let candidates = [
        ("username", attributes.username),
        ("email address", attributes.email),
        ("email address", email_local),
        ("first name", attributes.first_name),
        ("last name", attributes.last_name),
    ];

    candidates.into_iter().find_map(|(name, value)| {
        let value = value.trim().to_lowercase();
        if value.chars().count() < 3 || lowered.chars().count() < 3 {
            return None;
        }
        (lowered.contains(&value) || value.contains(lowered)).then_some(name)
    })
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::PasswordHash(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::PasswordHash(format!("invalid password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn passwords_match(field: &str, password: &str, confirmation: &str) -> AppResult<()> {
    if password != confirmation {
        return Err(AppError::validation(field, "the two password fields didn't match"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

/// Changes the password of `acting`, the account making the request.
pub fn change_password<A: AccountStore>(
    store: &A,
    policy: &PasswordPolicy,
    acting: &Account,
    change: &PasswordChange,
) -> AppResult<Account> {
    let old_matches = match acting.password_hash.as_deref() {
        Some(hash) => verify_password(&change.old_password, hash)?,
        None => false,
    };
    if !old_matches {
        return Err(AppError::validation(
            "old_password",
            "your old password was entered incorrectly",
        ));
    }

    passwords_match("new_password", &change.new_password, &change.new_password2)?;
    policy.check(
        "new_password",
        &change.new_password,
        &UserAttributes::from(acting),
    )?;

    let mut updated = acting.clone();
    updated.password_hash = Some(hash_password(&change.new_password)?);
    store.update_account(&updated)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::directory::{JsonDirectory, Role};
    use tempfile::TempDir;

    fn attributes() -> UserAttributes<'static> {
        UserAttributes {
            username: "jperez",
            email: "juan.perez@sena.edu.co",
            first_name: "Juan",
            last_name: "Perez",
        }
    }

    #[test]
    fn strong_password_passes() {
        let policy = PasswordPolicy::default();
        assert!(policy.violations("Tr3boles-azules", &attributes()).is_empty());
    }

    #[test]
    fn weak_password_collects_every_violation() {
        let policy = PasswordPolicy::default();
        let messages = policy.violations("123456", &attributes());
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("too short")));
        assert!(messages.iter().any(|m| m.contains("too common")));
        assert!(messages.iter().any(|m| m.contains("entirely numeric")));
    }

    #[test]
    fn password_resembling_identity_is_rejected() {
        let policy = PasswordPolicy::default();
        let err = policy
            .check("password", "jperez2024!", &attributes())
            .unwrap_err();
        match err {
            AppError::Validation { field, messages } => {
                assert_eq!(field, "password");
                assert!(messages[0].contains("username"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Tr3boles-azules").unwrap();
        assert!(verify_password("Tr3boles-azules", &hash).unwrap());
        assert!(!verify_password("otra-clave-123", &hash).unwrap());
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(AppError::PasswordHash(_))
        ));
    }

    fn account_with_password(dir: &JsonDirectory, password: &str) -> Account {
        let mut account = Account::new(Role::Student, "jperez", "juan.perez@sena.edu.co", "Juan", "Perez");
        account.password_hash = Some(hash_password(password).unwrap());
        dir.create_account(account).unwrap()
    }

    #[test]
    fn change_password_requires_the_old_password() {
        let tmp = TempDir::new().unwrap();
        let dir = JsonDirectory::new(tmp.path());
        let account = account_with_password(&dir, "Tr3boles-azules");

        let change = PasswordChange {
            old_password: "wrong-one".into(),
            new_password: "Nuevo-camino-77".into(),
            new_password2: "Nuevo-camino-77".into(),
        };
        let err = change_password(&dir, &PasswordPolicy::default(), &account, &change).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "old_password"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn change_password_rejects_mismatched_confirmation() {
        let tmp = TempDir::new().unwrap();
        let dir = JsonDirectory::new(tmp.path());
        let account = account_with_password(&dir, "Tr3boles-azules");

        let change = PasswordChange {
            old_password: "Tr3boles-azules".into(),
            new_password: "Nuevo-camino-77".into(),
            new_password2: "Nuevo-camino-78".into(),
        };
        let err = change_password(&dir, &PasswordPolicy::default(), &account, &change).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "new_password"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn change_password_persists_new_hash() {
        let tmp = TempDir::new().unwrap();
        let dir = JsonDirectory::new(tmp.path());
        let account = account_with_password(&dir, "Tr3boles-azules");

        let change = PasswordChange {
            old_password: "Tr3boles-azules".into(),
            new_password: "Nuevo-camino-77".into(),
            new_password2: "Nuevo-camino-77".into(),
        };
        change_password(&dir, &PasswordPolicy::default(), &account, &change).unwrap();

        let stored = dir.find_account(&account.id).unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert!(verify_password("Nuevo-camino-77", &hash).unwrap());
    }
}
