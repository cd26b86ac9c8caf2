pub mod codec;
pub mod comparer;
pub mod enrollment;
pub mod extractor;
pub mod store;

pub use codec::{decode_vector, encode_vector, CodecError, ENCODING_DIMENSION};

pub use comparer::{closest_match, compare_faces, face_distance, DEFAULT_MATCH_TOLERANCE};

pub use enrollment::{
    check_duplicates, enroll, enroll_unique, load_images, run_duplicate_check_with,
    run_face_enrollment_with, run_face_removal_with, validate_batch, validate_owner,
    DuplicateCheckConfig, DuplicateCheckOutcome, EnrollmentRecord, FaceEnrollmentConfig,
    FaceEnrollmentOutcome, FaceRemovalOutcome,
};

pub use extractor::{
    ensure_usable_encoding, extract_encoding, run_face_extraction_with, BoundingBox,
    DetectedFace, DlibEncoder, EnvModelPathResolver, ExtractError, FaceEncoder,
    FaceExtractionOutcome, FaceExtractionSummary, FaceImage, FaceModelConfig, FaceModelPaths,
    ModelPathResolver,
};

pub use store::{
    parse_store_key, store_key_from_env, EncodingStore, EnvStoreDirResolver, FaceEncoding,
    FilesystemEncodingStore, StoreDirResolver, WriteLock, STORE_DIR_ENV, STORE_KEY_ENV,
};
