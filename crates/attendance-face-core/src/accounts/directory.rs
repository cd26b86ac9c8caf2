use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::faces::store::{write_atomically, WriteLock};

const DIRECTORY_FILE: &str = "directory.json";
const DIRECTORY_LOCK_FILE: &str = "directory.lock";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub student_id: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub created_at: String,
}

impl Account {
    pub fn new(role: Role, username: &str, email: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
            student_id: None,
            is_active: true,
            password_hash: None,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Public view of an account, without credentials.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub student_id: Option<String>,
    pub is_active: bool,
    pub fichas: Vec<String>,
}

impl AccountSummary {
    pub fn new(account: &Account, fichas: Vec<String>) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            student_id: account.student_id.clone(),
            is_active: account.is_active,
            fichas,
        }
    }
}

/// A training group ("ficha") with its enrolled students and instructors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Ficha {
    pub numero_ficha: String,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub instructors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetToken {
    pub token: Uuid,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
}

pub trait AccountStore {
    fn find_account(&self, id: &str) -> AppResult<Option<Account>>;
    fn find_by_username(&self, username: &str) -> AppResult<Option<Account>>;
    fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    fn create_account(&self, account: Account) -> AppResult<Account>;
    fn update_account(&self, account: &Account) -> AppResult<()>;
    fn delete_account(&self, id: &str) -> AppResult<bool>;
}

pub trait FichaStore {
    fn find_ficha(&self, numero_ficha: &str) -> AppResult<Option<Ficha>>;
    fn create_ficha(&self, numero_ficha: &str) -> AppResult<Ficha>;
    fn add_student(&self, numero_ficha: &str, account_id: &str) -> AppResult<()>;
    /// Replaces the instructor's memberships with exactly `numeros`.
    fn set_instructor_fichas(&self, account_id: &str, numeros: &[String]) -> AppResult<()>;
    fn fichas_for(&self, account_id: &str) -> AppResult<Vec<String>>;
    fn remove_member(&self, account_id: &str) -> AppResult<()>;
}

pub trait ResetTokenStore {
    fn issue_token(&self, account_id: &str) -> AppResult<ResetToken>;
    fn find_token(&self, token: &Uuid) -> AppResult<Option<ResetToken>>;
    fn consume_token(&self, token: &Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DirectoryData {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    fichas: Vec<Ficha>,
    #[serde(default)]
    reset_tokens: Vec<ResetToken>,
}

/// Accounts, fichas and reset tokens in a single `directory.json`, rewritten
/// atomically on every change. Changes are serialized across processes by
/// `directory.lock` next to the file.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonDirectory {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(DIRECTORY_FILE),
            lock_path: dir.join(DIRECTORY_LOCK_FILE),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AppResult<DirectoryData> {
        if !self.path.exists() {
            return Ok(DirectoryData::default());
        }
        let data = fs::read(&self.path).map_err(|source| AppError::StoreRead {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|err| AppError::InvalidStore {
            path: self.path.clone(),
            message: format!("invalid directory contents: {err}"),
        })
    }

    fn modify<R>(&self, change: impl FnOnce(&mut DirectoryData) -> AppResult<R>) -> AppResult<R> {
        let _guard = WriteLock::acquire(&self.lock_path, self.lock_timeout)?;
        let mut data = self.load()?;
        let result = change(&mut data)?;
        let payload = serde_json::to_vec_pretty(&data)?;
        write_atomically(&self.path, &payload)?;
        Ok(result)
    }
}

impl AccountStore for JsonDirectory {
    fn find_account(&self, id: &str) -> AppResult<Option<Account>> {
        Ok(self.load()?.accounts.into_iter().find(|entry| entry.id == id))
    }

    fn find_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        Ok(self
            .load()?
            .accounts
            .into_iter()
            .find(|entry| entry.username == username))
    }

    fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self
            .load()?
            .accounts
            .into_iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email)))
    }

    fn create_account(&self, account: Account) -> AppResult<Account> {
        self.modify(|data| {
            if data
                .accounts
                .iter()
                .any(|entry| entry.username == account.username)
            {
                return Err(AppError::validation(
                    "username",
                    "a user with that username already exists",
                ));
            }
            data.accounts.push(account.clone());
            Ok(account)
        })
    }

    fn update_account(&self, account: &Account) -> AppResult<()> {
        self.modify(|data| {
            if data
                .accounts
                .iter()
                .any(|entry| entry.id != account.id && entry.username == account.username)
            {
                return Err(AppError::validation(
                    "username",
                    "a user with that username already exists",
                ));
            }
            let slot = data
                .accounts
                .iter_mut()
                .find(|entry| entry.id == account.id)
                .ok_or_else(|| AppError::NotFound {
                    kind: "account",
                    id: account.id.clone(),
                })?;
            *slot = account.clone();
            Ok(())
        })
    }

    fn delete_account(&self, id: &str) -> AppResult<bool> {
        self.modify(|data| {
            let before = data.accounts.len();
            data.accounts.retain(|entry| entry.id != id);
            data.reset_tokens.retain(|entry| entry.account_id != id);
            Ok(data.accounts.len() != before)
        })
    }
}

impl FichaStore for JsonDirectory {
    fn find_ficha(&self, numero_ficha: &str) -> AppResult<Option<Ficha>> {
        Ok(self
            .load()?
            .fichas
            .into_iter()
            .find(|entry| entry.numero_ficha == numero_ficha))
    }

    fn create_ficha(&self, numero_ficha: &str) -> AppResult<Ficha> {
        self.modify(|data| {
            if data
                .fichas
                .iter()
                .any(|entry| entry.numero_ficha == numero_ficha)
            {
                return Err(AppError::validation(
                    "numero_ficha",
                    "a ficha with that number already exists",
                ));
            }
            let ficha = Ficha {
                numero_ficha: numero_ficha.to_string(),
                ..Ficha::default()
            };
            data.fichas.push(ficha.clone());
            Ok(ficha)
        })
    }

    fn add_student(&self, numero_ficha: &str, account_id: &str) -> AppResult<()> {
        self.modify(|data| {
            let ficha = data
                .fichas
                .iter_mut()
                .find(|entry| entry.numero_ficha == numero_ficha)
                .ok_or_else(|| AppError::NotFound {
                    kind: "ficha",
                    id: numero_ficha.to_string(),
                })?;
            if !ficha.students.iter().any(|id| id == account_id) {
                ficha.students.push(account_id.to_string());
            }
            Ok(())
        })
    }

    fn set_instructor_fichas(&self, account_id: &str, numeros: &[String]) -> AppResult<()> {
        self.modify(|data| {
            if let Some(missing) = numeros
                .iter()
                .find(|numero| !data.fichas.iter().any(|entry| &entry.numero_ficha == *numero))
            {
                return Err(AppError::NotFound {
                    kind: "ficha",
                    id: missing.clone(),
                });
            }
            for ficha in data.fichas.iter_mut() {
                let wanted = numeros.contains(&ficha.numero_ficha);
                let present = ficha.instructors.iter().any(|id| id == account_id);
                if wanted && !present {
                    ficha.instructors.push(account_id.to_string());
                } else if !wanted && present {
                    ficha.instructors.retain(|id| id != account_id);
                }
            }
            Ok(())
        })
    }

    fn fichas_for(&self, account_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .load()?
            .fichas
            .into_iter()
            .filter(|entry| {
                entry.students.iter().any(|id| id == account_id)
                    || entry.instructors.iter().any(|id| id == account_id)
            })
            .map(|entry| entry.numero_ficha)
            .collect())
    }

    fn remove_member(&self, account_id: &str) -> AppResult<()> {
        self.modify(|data| {
            for ficha in data.fichas.iter_mut() {
                ficha.students.retain(|id| id != account_id);
                ficha.instructors.retain(|id| id != account_id);
            }
            Ok(())
        })
    }
}

impl ResetTokenStore for JsonDirectory {
    fn issue_token(&self, account_id: &str) -> AppResult<ResetToken> {
        self.modify(|data| {
            let token = ResetToken {
                token: Uuid::new_v4(),
                account_id: account_id.to_string(),
                created_at: Utc::now(),
            };
            data.reset_tokens.push(token.clone());
            Ok(token)
        })
    }

    fn find_token(&self, token: &Uuid) -> AppResult<Option<ResetToken>> {
        Ok(self
            .load()?
            .reset_tokens
            .into_iter()
            .find(|entry| &entry.token == token))
    }

    fn consume_token(&self, token: &Uuid) -> AppResult<()> {
        self.modify(|data| {
            data.reset_tokens.retain(|entry| &entry.token != token);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn directory(tmp: &TempDir) -> JsonDirectory {
        JsonDirectory::new(tmp.path())
    }

    fn student(username: &str) -> Account {
        Account::new(Role::Student, username, &format!("{username}@example.com"), "Ana", "Ruiz")
    }

    #[test]
    fn accounts_persist_across_instances() {
        let tmp = TempDir::new().unwrap();
        let created = directory(&tmp).create_account(student("ana")).unwrap();

        let reopened = directory(&tmp);
        assert_eq!(reopened.find_account(&created.id).unwrap(), Some(created.clone()));
        assert_eq!(
            reopened.find_by_email("ANA@example.com").unwrap(),
            Some(created)
        );
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp);
        dir.create_account(student("ana")).unwrap();

        let err = dir.create_account(student("ana")).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "username"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn instructor_fichas_are_replaced_not_merged() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp);
        for numero in ["100", "200", "300"] {
            dir.create_ficha(numero).unwrap();
        }

        dir.set_instructor_fichas("inst", &["100".into(), "200".into()])
            .unwrap();
        dir.set_instructor_fichas("inst", &["200".into(), "300".into()])
            .unwrap();
        assert_eq!(
            dir.fichas_for("inst").unwrap(),
            vec!["200".to_string(), "300".to_string()]
        );
    }

    #[test]
    fn unknown_ficha_leaves_memberships_untouched() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp);
        dir.create_ficha("100").unwrap();
        dir.set_instructor_fichas("inst", &["100".into()]).unwrap();

        let err = dir
            .set_instructor_fichas("inst", &["999".into()])
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "ficha", .. }));
        assert_eq!(dir.fichas_for("inst").unwrap(), vec!["100".to_string()]);
    }

    #[test]
    fn concurrent_writers_do_not_lose_accounts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();

        let handles: Vec<_> = (0..16)
            .map(|idx| {
                let root = root.clone();
                std::thread::spawn(move || {
                    JsonDirectory::new(&root)
                        .with_lock_timeout(Duration::from_secs(30))
                        .create_account(student(&format!("user{idx}")))
                        .unwrap()
                })
            })
            .collect();
        let created: Vec<Account> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let dir = directory(&tmp);
        for account in &created {
            assert_eq!(dir.find_account(&account.id).unwrap().as_ref(), Some(account));
        }
        assert!(!dir.lock_path.exists());
    }

    #[test]
    fn concurrent_duplicate_usernames_admit_one_winner() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || {
                    JsonDirectory::new(&root)
                        .with_lock_timeout(Duration::from_secs(30))
                        .create_account(student("ana"))
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn held_lock_times_out_writes() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp).with_lock_timeout(Duration::from_millis(50));
        let _held = WriteLock::acquire(&dir.lock_path, Duration::from_millis(50)).unwrap();

        let err = dir.create_account(student("ana")).unwrap_err();
        assert!(matches!(err, AppError::StoreLocked { .. }));
        assert!(dir.find_by_username("ana").unwrap().is_none());
    }

    #[test]
    fn reset_tokens_can_be_consumed_once() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp);
        let token = dir.issue_token("acct").unwrap();

        assert_eq!(dir.find_token(&token.token).unwrap(), Some(token.clone()));
        dir.consume_token(&token.token).unwrap();
        assert!(dir.find_token(&token.token).unwrap().is_none());
    }

    #[test]
    fn deleting_an_account_drops_its_tokens() {
        let tmp = TempDir::new().unwrap();
        let dir = directory(&tmp);
        let account = dir.create_account(student("ana")).unwrap();
        let token = dir.issue_token(&account.id).unwrap();

        assert!(dir.delete_account(&account.id).unwrap());
        assert!(dir.find_token(&token.token).unwrap().is_none());
        assert!(!dir.delete_account(&account.id).unwrap());
    }
}
