use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult, EnrollmentError};
use crate::faces::comparer::{closest_match, compare_faces};
use crate::faces::extractor::{extract_encoding, ExtractError, FaceEncoder, FaceImage};
use crate::faces::store::{EncodingStore, FaceEncoding};

/// Extracts one encoding per image, in order, failing on the first image that
/// does not hold exactly one face. Nothing is returned for a partial batch.
pub fn validate_batch<E: FaceEncoder>(
    encoder: &E,
    images: &[FaceImage],
) -> AppResult<Vec<Vec<f64>>> {
    if images.is_empty() {
        return Err(EnrollmentError::EmptyBatch.into());
    }

    let mut encodings = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let encoding = extract_encoding(encoder, image).map_err(|err| match err {
            ExtractError::FaceCount(faces_found) => AppError::Enrollment(
                EnrollmentError::AmbiguousFace { index, faces_found },
            ),
            ExtractError::Decode(source) => {
                AppError::Enrollment(EnrollmentError::UnreadableImage {
                    index,
                    message: source.to_string(),
                })
            }
            ExtractError::Backend(inner) => *inner,
        })?;
        encodings.push(encoding);
    }

    Ok(encodings)
}

/// Fails with [`EnrollmentError::DuplicateFace`] when any candidate is within
/// `tolerance` of a stored encoding. Stored records that do not decode are
/// skipped.
pub fn check_duplicates(
    candidates: &[Vec<f64>],
    existing: &[FaceEncoding],
    tolerance: f64,
) -> Result<(), EnrollmentError> {
    let known = decodable_encodings(existing);
    if known.is_empty() {
        return Ok(());
    }

    for (index, candidate) in candidates.iter().enumerate() {
        if let Some((_, distance)) = closest_match(&known, candidate) {
            debug!(candidate = index, distance, "nearest enrolled face");
        }
        if compare_faces(&known, candidate, tolerance).contains(&true) {
            return Err(EnrollmentError::DuplicateFace);
        }
    }

    Ok(())
}

fn decodable_encodings(existing: &[FaceEncoding]) -> Vec<Vec<f64>> {
    existing
        .iter()
        .filter_map(|record| match record.decoded() {
            Ok(values) => Some(values),
            Err(err) => {
                warn!(record = %record.id, error = %err, "skipping undecodable face encoding");
                None
            }
        })
        .collect()
}

/// Persists the first candidate with the first image as its reference. Callers
/// must have run [`validate_batch`] and [`check_duplicates`] on this batch.
pub fn enroll<S: EncodingStore>(
    store: &S,
    owner: &str,
    candidates: &[Vec<f64>],
    images: &[FaceImage],
) -> AppResult<FaceEncoding> {
    let (Some(encoding), Some(image)) = (candidates.first(), images.first()) else {
        return Err(EnrollmentError::EmptyBatch.into());
    };
    store.insert(owner, encoding, image)
}

/// [`enroll`] behind the store's write lock, re-running the duplicate check
/// against a fresh snapshot so concurrent registrations of the same face
/// cannot both pass.
pub fn enroll_unique<S: EncodingStore>(
    store: &S,
    owner: &str,
    candidates: &[Vec<f64>],
    images: &[FaceImage],
    tolerance: f64,
) -> AppResult<FaceEncoding> {
    let _guard = store.lock_writes()?;
    let existing = store.list_all()?;
    check_duplicates(candidates, &existing, tolerance)?;
    let record = enroll(store, owner, candidates, images)?;
    info!(owner, record = %record.id, "enrolled face encoding");
    Ok(record)
}

#[derive(Debug, Clone)]
pub struct FaceEnrollmentConfig {
    pub owner: String,
    pub images: Vec<PathBuf>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrollmentRecord {
    pub id: String,
    pub owner: String,
    pub reference_image: String,
    pub created_at: String,
}

impl From<&FaceEncoding> for EnrollmentRecord {
    fn from(record: &FaceEncoding) -> Self {
        Self {
            id: record.id.clone(),
            owner: record.owner.clone(),
            reference_image: record.reference_image.clone(),
            created_at: record.created_at.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FaceEnrollmentOutcome {
    pub owner: String,
    pub record: EnrollmentRecord,
    pub images_checked: usize,
    pub logs: Vec<String>,
}

pub fn run_face_enrollment_with<E, S>(
    config: &FaceEnrollmentConfig,
    encoder: &E,
    store: &S,
) -> AppResult<FaceEnrollmentOutcome>
where
    E: FaceEncoder,
    S: EncodingStore,
{
    validate_owner(&config.owner)?;

    let mut logs = Vec::new();
    let images = load_images(&config.images)?;
    logs.push(format!("Loaded {} image(s)", images.len()));

    let candidates = validate_batch(encoder, &images)?;
    logs.push(format!(
        "Extracted {} encoding(s), one face per image",
        candidates.len()
    ));

    let existing = store.list_all()?;
    check_duplicates(&candidates, &existing, config.tolerance)?;
    logs.push(format!(
        "No match among {} enrolled encoding(s)",
        existing.len()
    ));

    let record = enroll_unique(store, &config.owner, &candidates, &images, config.tolerance)?;
    logs.push(format!(
        "Enrolled encoding {} for owner {}",
        record.id, config.owner
    ));

    Ok(FaceEnrollmentOutcome {
        owner: config.owner.clone(),
        record: EnrollmentRecord::from(&record),
        images_checked: images.len(),
        logs,
    })
}

#[derive(Debug, Clone)]
pub struct DuplicateCheckConfig {
    pub images: Vec<PathBuf>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheckOutcome {
    pub images_checked: usize,
    pub enrolled_compared: usize,
    #[serde(skip)]
    pub logs: Vec<String>,
}

/// Validation and duplicate check without writing anything. Rejections come
/// back as errors exactly as they would during enrollment.
pub fn run_duplicate_check_with<E, S>(
    config: &DuplicateCheckConfig,
    encoder: &E,
    store: &S,
) -> AppResult<DuplicateCheckOutcome>
where
    E: FaceEncoder,
    S: EncodingStore,
{
    let images = load_images(&config.images)?;
    let candidates = validate_batch(encoder, &images)?;
    let existing = store.list_all()?;
    check_duplicates(&candidates, &existing, config.tolerance)?;

    let enrolled_compared = existing
        .iter()
        .filter(|record| record.decoded().is_ok())
        .count();
    let logs = vec![
        format!("Validated {} image(s)", images.len()),
        format!("Compared against {enrolled_compared} enrolled encoding(s); no match"),
    ];

    Ok(DuplicateCheckOutcome {
        images_checked: images.len(),
        enrolled_compared,
        logs,
    })
}

#[derive(Debug)]
pub struct FaceRemovalOutcome {
    pub owner: String,
    pub removed_ids: Vec<String>,
    pub logs: Vec<String>,
}

pub fn run_face_removal_with<S: EncodingStore>(
    owner: &str,
    store: &S,
) -> AppResult<FaceRemovalOutcome> {
    validate_owner(owner)?;
    let _guard = store.lock_writes()?;
    let removed_ids = store.remove_owner(owner)?;
    let logs = vec![format!(
        "Removed {} encoding(s) for owner {owner}",
        removed_ids.len()
    )];
    Ok(FaceRemovalOutcome {
        owner: owner.to_string(),
        removed_ids,
        logs,
    })
}

pub fn load_images(paths: &[PathBuf]) -> AppResult<Vec<FaceImage>> {
    paths.iter().map(|path| FaceImage::from_path(path)).collect()
}

pub fn validate_owner(owner: &str) -> AppResult<()> {
    if owner.is_empty() {
        return Err(AppError::validation("owner", "owner id cannot be empty"));
    }

    if !owner
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(AppError::validation(
            "owner",
            "use ASCII letters, numbers, '-' or '_' only",
        ));
    }

    Ok(())
}
