use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use chrono::{SecondsFormat, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::faces::codec::{decode_vector, encode_vector, CodecError};
use crate::faces::extractor::FaceImage;

const DEFAULT_STORE_DIR: &str = "/var/lib/attendance/faces";
pub const STORE_DIR_ENV: &str = "ATTENDANCE_STORE_DIR";
pub const STORE_KEY_ENV: &str = "ATTENDANCE_STORE_KEY";
const RECORDS_FILE: &str = "encodings.json";
const IMAGES_DIR: &str = "images";
const LOCK_FILE: &str = "encodings.lock";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);
const STORE_VERSION: u32 = 1;
const STORE_ALGORITHM: &str = "AES-256-GCM";
const STORE_NONCE_LEN: usize = 12;
pub const STORE_KEY_BYTES: usize = 32;

/// One enrolled face bound to an account. The encoding is kept in its
/// serialized form; see [`FaceEncoding::decoded`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceEncoding {
    pub id: String,
    pub owner: String,
    /// Records whose stored encoding is not a string keep an empty one here,
    /// which never decodes.
    #[serde(default, deserialize_with = "lenient_encoding")]
    pub encoding: String,
    pub reference_image: String,
    pub created_at: String,
}

impl FaceEncoding {
    pub fn decoded(&self) -> Result<Vec<f64>, CodecError> {
        decode_vector(&self.encoding)
    }
}

fn lenient_encoding<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(encoded)) => Ok(encoded),
        _ => Ok(String::new()),
    }
}

/// Storage for enrolled encodings.
///
/// Writers must hold the guard returned by [`EncodingStore::lock_writes`]
/// across their read-check-write sequence; `insert` and `remove_owner` do not
/// take it themselves.
pub trait EncodingStore {
    fn list_all(&self) -> AppResult<Vec<FaceEncoding>>;
    fn insert(
        &self,
        owner: &str,
        encoding: &[f64],
        reference_image: &FaceImage,
    ) -> AppResult<FaceEncoding>;
    fn remove_owner(&self, owner: &str) -> AppResult<Vec<String>>;
    fn lock_writes(&self) -> AppResult<WriteLock>;
}

/// Exclusive write access to a store. Released on drop.
#[derive(Debug)]
pub struct WriteLock {
    path: Option<PathBuf>,
}

impl WriteLock {
    /// For stores whose writes are already serialized by other means.
    pub fn unguarded() -> Self {
        Self { path: None }
    }

    pub fn acquire(path: &Path, timeout: Duration) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let guard = Self {
                        path: Some(path.to_path_buf()),
                    };
                    writeln!(file, "{}", std::process::id())
                        .and_then(|_| file.flush())
                        .map_err(|source| AppError::StoreWrite {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    debug!(path = %path.display(), "acquired store write lock");
                    return Ok(guard);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let holder = lock_holder(path);
                    if let Some(pid) = holder {
                        // Re-read so a lock just reclaimed by another waiter survives.
                        if !is_pid_running(pid) && lock_holder(path) == Some(pid) {
                            warn!(path = %path.display(), pid, "removing stale store write lock");
                            match fs::remove_file(path) {
                                Ok(()) => continue,
                                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                                Err(source) => {
                                    return Err(AppError::StoreWrite {
                                        path: path.to_path_buf(),
                                        source,
                                    })
                                }
                            }
                        }
                    }
                    if started.elapsed() >= timeout {
                        return Err(AppError::StoreLocked {
                            path: path.to_path_buf(),
                            waited_ms: started.elapsed().as_millis(),
                            holder,
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(AppError::StoreWrite {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    pub fn is_guarded(&self) -> bool {
        self.path.is_some()
    }
}

/// PID recorded in a lock file. `None` while the holder has not written it yet.
fn lock_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|contents| contents.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

#[cfg(target_os = "linux")]
fn is_pid_running(pid: u32) -> bool {
    let stat_path = Path::new("/proc").join(pid.to_string()).join("stat");
    match fs::read_to_string(stat_path) {
        Ok(contents) => proc_stat_state(&contents) != Some('Z'),
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}

// Without a cheap liveness probe every holder counts as alive.
#[cfg(not(target_os = "linux"))]
fn is_pid_running(_pid: u32) -> bool {
    true
}

#[cfg(target_os = "linux")]
fn proc_stat_state(stat: &str) -> Option<char> {
    let end = stat.rfind(')')?;
    stat.get(end + 1..)?.trim_start().chars().next()
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}

/// `encodings.json` plus `images/<id>.<ext>` under one directory, optionally
/// AES-256-GCM sealed.
#[derive(Debug, Clone)]
pub struct FilesystemEncodingStore {
    dir: PathBuf,
    key: Option<Vec<u8>>,
    lock_timeout: Duration,
}

impl FilesystemEncodingStore {
    pub fn new(dir: impl Into<PathBuf>, key: Option<Vec<u8>>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            key,
            lock_timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn image_path(&self, reference_image: &str) -> PathBuf {
        self.dir.join(IMAGES_DIR).join(reference_image)
    }

    pub fn read_reference_image(&self, record: &FaceEncoding) -> AppResult<Vec<u8>> {
        let path = self.image_path(&record.reference_image);
        let data = fs::read(&path).map_err(|source| AppError::StoreRead {
            path: path.clone(),
            source,
        })?;
        match self.key.as_deref() {
            Some(key) => unseal(&path, &data, Some(key)),
            None => Ok(data),
        }
    }

    fn load_records(&self) -> AppResult<Vec<FaceEncoding>> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&path).map_err(|source| AppError::StoreRead {
            path: path.clone(),
            source,
        })?;

        let plaintext = if serde_json::from_slice::<SealedPayload>(&data).is_ok() {
            unseal(&path, &data, self.key.as_deref())?
        } else {
            data
        };

        serde_json::from_slice(&plaintext).map_err(|err| AppError::InvalidStore {
            path: path.clone(),
            message: format!("invalid encoding store contents: {err}"),
        })
    }

    fn save_records(&self, records: &[FaceEncoding]) -> AppResult<()> {
        let plaintext = serde_json::to_vec_pretty(records)?;
        let payload = match self.key.as_deref() {
            Some(key) => seal(&plaintext, key)?,
            None => plaintext,
        };
        write_atomically(&self.records_path(), &payload)
    }
}

impl EncodingStore for FilesystemEncodingStore {
    fn list_all(&self) -> AppResult<Vec<FaceEncoding>> {
        self.load_records()
    }

    fn insert(
        &self,
        owner: &str,
        encoding: &[f64],
        reference_image: &FaceImage,
    ) -> AppResult<FaceEncoding> {
        let mut records = self.load_records()?;

        let id = Uuid::new_v4().to_string();
        let image_name = format!("{id}.{}", reference_image.extension());
        let image_path = self.image_path(&image_name);
        let image_payload = match self.key.as_deref() {
            Some(key) => seal(&reference_image.bytes, key)?,
            None => reference_image.bytes.clone(),
        };
        write_atomically(&image_path, &image_payload)?;

        let record = FaceEncoding {
            id,
            owner: owner.to_string(),
            encoding: encode_vector(encoding),
            reference_image: image_name,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        records.push(record.clone());

        if let Err(err) = self.save_records(&records) {
            let _ = fs::remove_file(&image_path);
            return Err(err);
        }

        debug!(
            id = %record.id,
            store = %self.records_path().display(),
            "stored face encoding"
        );
        Ok(record)
    }

    fn remove_owner(&self, owner: &str) -> AppResult<Vec<String>> {
        let records = self.load_records()?;
        let (removed, retained): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|entry| entry.owner == owner);
        if removed.is_empty() {
            return Ok(Vec::new());
        }

        self.save_records(&retained)?;
        for entry in &removed {
            let path = self.image_path(&entry.reference_image);
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != io::ErrorKind::NotFound {
                    return Err(AppError::StoreWrite { path, source: err });
                }
            }
        }

        Ok(removed.into_iter().map(|entry| entry.id).collect())
    }

    fn lock_writes(&self) -> AppResult<WriteLock> {
        WriteLock::acquire(&self.lock_path(), self.lock_timeout)
    }
}

pub trait StoreDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvStoreDirResolver;

impl StoreDirResolver for EnvStoreDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            dir.to_path_buf()
        } else if let Ok(env_value) = env::var(STORE_DIR_ENV) {
            PathBuf::from(env_value)
        } else {
            PathBuf::from(DEFAULT_STORE_DIR)
        }
    }
}

/// Reads the optional base64 store key from `$ATTENDANCE_STORE_KEY`.
pub fn store_key_from_env() -> AppResult<Option<Vec<u8>>> {
    match env::var(STORE_KEY_ENV) {
        Ok(value) if !value.trim().is_empty() => parse_store_key(&value).map(Some),
        _ => Ok(None),
    }
}

pub fn parse_store_key(value: &str) -> AppResult<Vec<u8>> {
    let bytes = general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|err| AppError::InvalidKey(format!("not valid base64: {err}")))?;
    if bytes.len() != STORE_KEY_BYTES {
        return Err(AppError::InvalidKey(format!(
            "expected {STORE_KEY_BYTES} bytes but found {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

pub(crate) fn write_atomically(path: &Path, payload: &[u8]) -> AppResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::StoreWrite {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            writer
                .write_all(payload)
                .and_then(|_| writer.flush())
                .map_err(|source| AppError::StoreWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        file.sync_all().map_err(|source| AppError::StoreWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let file = tmp.persist(path).map_err(|err| AppError::StoreWrite {
        path: path.to_path_buf(),
        source: err.error,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file
            .metadata()
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?
            .permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)
            .map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }
    #[cfg(not(unix))]
    drop(file);

    Ok(())
}

#[derive(Serialize, Deserialize)]
struct SealedPayload {
    version: u32,
    algorithm: String,
    nonce: String,
    ciphertext: String,
}

fn seal(plaintext: &[u8], key: &[u8]) -> AppResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    let mut nonce = [0u8; STORE_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|err| AppError::Encryption(format!("failed to encrypt payload: {err}")))?;
    let wrapper = SealedPayload {
        version: STORE_VERSION,
        algorithm: STORE_ALGORITHM.to_string(),
        nonce: general_purpose::STANDARD.encode(nonce),
        ciphertext: general_purpose::STANDARD.encode(ciphertext),
    };
    serde_json::to_vec_pretty(&wrapper).map_err(AppError::from)
}

fn unseal(path: &Path, data: &[u8], key: Option<&[u8]>) -> AppResult<Vec<u8>> {
    let wrapper: SealedPayload =
        serde_json::from_slice(data).map_err(|err| AppError::InvalidStore {
            path: path.to_path_buf(),
            message: format!("invalid sealed payload: {err}"),
        })?;
    if wrapper.algorithm != STORE_ALGORITHM {
        return Err(AppError::Encryption(format!(
            "unsupported store algorithm '{}'",
            wrapper.algorithm
        )));
    }
    if wrapper.version != STORE_VERSION {
        return Err(AppError::Encryption(format!(
            "unsupported store version {}",
            wrapper.version
        )));
    }

    let key_bytes = key.ok_or_else(|| AppError::EncryptedStoreRequiresKey {
        path: path.to_path_buf(),
        env: STORE_KEY_ENV,
    })?;

    let nonce_bytes = general_purpose::STANDARD
        .decode(wrapper.nonce.trim())
        .map_err(|err| AppError::Encryption(format!("invalid nonce encoding: {err}")))?;
    if nonce_bytes.len() != STORE_NONCE_LEN {
        return Err(AppError::Encryption(format!(
            "expected nonce of {} bytes but found {}",
            STORE_NONCE_LEN,
            nonce_bytes.len()
        )));
    }

    let ciphertext = general_purpose::STANDARD
        .decode(wrapper.ciphertext.trim())
        .map_err(|err| AppError::Encryption(format!("invalid ciphertext encoding: {err}")))?;

    let cipher = Aes256Gcm::new_from_slice(key_bytes)
        .map_err(|_| AppError::Encryption("invalid AES-GCM key length".into()))?;
    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|err| AppError::Encryption(format!("failed to decrypt payload: {err}")))
}
