use std::path::PathBuf;

use attendance_config::ResolvedConfig;
use attendance_face_core::faces::{
    run_duplicate_check_with, run_face_enrollment_with, run_face_extraction_with,
    run_face_removal_with, store_key_from_env, DlibEncoder, DuplicateCheckConfig,
    DuplicateCheckOutcome, EncodingStore, EnrollmentRecord, FaceEnrollmentConfig,
    FaceEnrollmentOutcome, FaceExtractionOutcome, FaceRemovalOutcome, FilesystemEncodingStore,
};
use serde::Serialize;
use tracing::debug;

use crate::cli::{
    FaceCheckArgs, FaceEnrollArgs, FaceExtractArgs, FaceListArgs, FaceRemoveArgs, ModelArgs,
    StoreArgs,
};
use crate::config::{load_config, match_tolerance, model_config, resolve_store_dir};
use crate::errors::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct FaceListing {
    pub store_dir: PathBuf,
    pub records: Vec<EnrollmentRecord>,
}

pub fn open_store(args: &StoreArgs, config: &ResolvedConfig) -> AppResult<FilesystemEncodingStore> {
    let dir = resolve_store_dir(args.store_dir.as_deref(), config);
    let key = store_key_from_env()?;
    debug!(
        store = %dir.display(),
        encrypted = key.is_some(),
        "opening encoding store"
    );
    Ok(FilesystemEncodingStore::new(dir, key, config.lock_timeout))
}

pub fn load_encoder(args: &ModelArgs, config: &ResolvedConfig) -> AppResult<DlibEncoder> {
    DlibEncoder::from_config(&model_config(args, config))
}

pub fn run_face_extraction(args: &FaceExtractArgs) -> AppResult<FaceExtractionOutcome> {
    let config = load_config()?;
    let encoder = load_encoder(&args.models, &config)?;
    run_face_extraction_with(&args.image, &encoder)
}

pub fn run_duplicate_check(args: &FaceCheckArgs) -> AppResult<DuplicateCheckOutcome> {
    let config = load_config()?;
    let store = open_store(&args.store, &config)?;
    let encoder = load_encoder(&args.models, &config)?;
    let check = DuplicateCheckConfig {
        images: args.images.clone(),
        tolerance: match_tolerance(&config),
    };
    run_duplicate_check_with(&check, &encoder, &store)
}

pub fn run_face_enrollment(args: &FaceEnrollArgs) -> AppResult<FaceEnrollmentOutcome> {
    let config = load_config()?;
    let store = open_store(&args.store, &config)?;
    let encoder = load_encoder(&args.models, &config)?;
    let enrollment = FaceEnrollmentConfig {
        owner: args.owner.clone(),
        images: args.images.clone(),
        tolerance: match_tolerance(&config),
    };
    run_face_enrollment_with(&enrollment, &encoder, &store)
}

pub fn run_face_listing(args: &FaceListArgs) -> AppResult<FaceListing> {
    let config = load_config()?;
    let store = open_store(&args.store, &config)?;
    let records = store
        .list_all()?
        .iter()
        .filter(|record| {
            args.owner
                .as_deref()
                .map_or(true, |owner| record.owner == owner)
        })
        .map(EnrollmentRecord::from)
        .collect();
    Ok(FaceListing {
        store_dir: store.dir().to_path_buf(),
        records,
    })
}

pub fn run_face_removal(args: &FaceRemoveArgs) -> AppResult<FaceRemovalOutcome> {
    let config = load_config()?;
    let store = open_store(&args.store, &config)?;
    run_face_removal_with(&args.owner, &store)
}
