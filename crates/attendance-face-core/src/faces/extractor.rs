use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dlib_face_recognition::{
    FaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait, ImageMatrix,
    LandmarkPredictor, LandmarkPredictorTrait,
};
use image::{ImageError, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::codec::ENCODING_DIMENSION;

const LANDMARK_ENV: &str = "DLIB_LANDMARK_MODEL";
const ENCODER_ENV: &str = "DLIB_ENCODER_MODEL";

/// A submitted image: the raw file bytes plus the name it was uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FaceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = fs::read(path).map_err(|_| AppError::MissingInput {
            path: path.to_path_buf(),
        })?;
        Ok(Self::new(path.display().to_string(), bytes))
    }

    pub fn decode(&self) -> Result<RgbImage, ImageError> {
        image::load_from_memory(&self.bytes).map(|image| image.to_rgb8())
    }

    /// File extension matching the detected container format, `bin` when the
    /// format cannot be guessed.
    pub fn extension(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaceModelConfig {
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
}

#[derive(Debug, Clone)]
pub struct FaceModelPaths {
    pub landmark: PathBuf,
    pub encoder: PathBuf,
}

pub trait ModelPathResolver {
    fn resolve(&self, config: &FaceModelConfig) -> AppResult<FaceModelPaths>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModelPathResolver;

impl ModelPathResolver for EnvModelPathResolver {
    fn resolve(&self, config: &FaceModelConfig) -> AppResult<FaceModelPaths> {
        let landmark = config
            .landmark_model
            .clone()
            .or_else(|| env::var(LANDMARK_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "landmark predictor",
                flag: "--landmark-model",
                env: LANDMARK_ENV,
            })?;

        let encoder = config
            .encoder_model
            .clone()
            .or_else(|| env::var(ENCODER_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "face encoding network",
                flag: "--encoder-model",
                env: ENCODER_ENV,
            })?;

        Ok(FaceModelPaths { landmark, encoder })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    pub encoding: Vec<f64>,
}

/// Face detector plus encoder. Returns every face found, in detection order.
pub trait FaceEncoder {
    fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<DetectedFace>>;
}

impl<T: FaceEncoder + ?Sized> FaceEncoder for &T {
    fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<DetectedFace>> {
        (**self).encode_faces(image)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("expected exactly one face, found {0}")]
    FaceCount(usize),

    #[error("image could not be decoded: {0}")]
    Decode(#[source] ImageError),

    #[error(transparent)]
    Backend(Box<AppError>),
}

impl From<AppError> for ExtractError {
    fn from(err: AppError) -> Self {
        ExtractError::Backend(Box::new(err))
    }
}

/// Encoding of the single face in `image`. Zero or several faces are the same
/// failure since there is no way to tell which face is the registrant's.
pub fn extract_encoding<E: FaceEncoder>(
    encoder: &E,
    image: &FaceImage,
) -> Result<Vec<f64>, ExtractError> {
    let rgb = image.decode().map_err(ExtractError::Decode)?;
    let mut faces = encoder.encode_faces(&rgb)?;
    debug!(image = %image.name, faces = faces.len(), "encoded image");
    if faces.len() != 1 {
        return Err(ExtractError::FaceCount(faces.len()));
    }

    let face = faces.remove(0);
    ensure_usable_encoding(&face.encoding)?;
    Ok(face.encoding)
}

pub fn ensure_usable_encoding(encoding: &[f64]) -> AppResult<()> {
    if encoding.len() != ENCODING_DIMENSION {
        return Err(AppError::EncoderOutput(format!(
            "expected {ENCODING_DIMENSION} values, found {}",
            encoding.len()
        )));
    }
    if let Some(idx) = encoding.iter().position(|value| !value.is_finite()) {
        return Err(AppError::EncoderOutput(format!(
            "value at position {idx} is not finite"
        )));
    }

    let magnitude = encoding
        .iter()
        .map(|value| value * value)
        .sum::<f64>()
        .sqrt();
    if magnitude <= f64::EPSILON {
        return Err(AppError::EncoderOutput("zero-magnitude encoding".into()));
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceExtractionSummary {
    pub image_path: String,
    pub width: u32,
    pub height: u32,
    pub num_faces: usize,
    pub faces: Vec<DetectedFace>,
}

#[derive(Debug)]
pub struct FaceExtractionOutcome {
    pub summary: FaceExtractionSummary,
    pub logs: Vec<String>,
}

/// Runs the encoder over one image file and reports every detected face,
/// without the exactly-one-face rule enrollment applies.
pub fn run_face_extraction_with<E: FaceEncoder>(
    image_path: &Path,
    encoder: &E,
) -> AppResult<FaceExtractionOutcome> {
    let mut logs = Vec::new();

    if !image_path.exists() {
        return Err(AppError::MissingInput {
            path: image_path.to_path_buf(),
        });
    }

    let image = FaceImage::from_path(image_path)?;
    let rgb = image.decode().map_err(|source| AppError::ImageDecode {
        name: image.name.clone(),
        source,
    })?;
    logs.push(format!(
        "Loaded image {} ({}x{})",
        image_path.display(),
        rgb.width(),
        rgb.height()
    ));

    let faces = encoder.encode_faces(&rgb)?;
    logs.push(format!("Detected {} face(s)", faces.len()));
    if let Some(first) = faces.first() {
        logs.push(format!("Encoding vector length: {}", first.encoding.len()));
    }

    Ok(FaceExtractionOutcome {
        summary: FaceExtractionSummary {
            image_path: image_path.display().to_string(),
            width: rgb.width(),
            height: rgb.height(),
            num_faces: faces.len(),
            faces,
        },
        logs,
    })
}

pub struct DlibEncoder {
    detector: FaceDetector,
    predictor: LandmarkPredictor,
    encoder: FaceEncoderNetwork,
    jitters: u32,
}

impl DlibEncoder {
    pub fn from_config(config: &FaceModelConfig) -> AppResult<Self> {
        let models = EnvModelPathResolver.resolve(config)?;
        Self::new(&models, config.jitters)
    }

    pub fn new(models: &FaceModelPaths, jitters: u32) -> AppResult<Self> {
        debug!(path = %models.landmark.display(), "loading landmark model");
        let predictor =
            LandmarkPredictor::open(&models.landmark).map_err(|message| AppError::ModelLoad {
                path: models.landmark.clone(),
                message,
            })?;
        debug!(path = %models.encoder.display(), "loading encoder model");
        let encoder =
            FaceEncoderNetwork::open(&models.encoder).map_err(|message| AppError::ModelLoad {
                path: models.encoder.clone(),
                message,
            })?;
        let detector = FaceDetector::new();

        Ok(Self {
            detector,
            predictor,
            encoder,
            jitters: jitters.max(1),
        })
    }
}

impl FaceEncoder for DlibEncoder {
    fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<DetectedFace>> {
        let matrix = ImageMatrix::from_image(image);
        let locations = self.detector.face_locations(&matrix);

        let mut landmarks = Vec::with_capacity(locations.len());
        for rect in locations.iter() {
            landmarks.push(self.predictor.face_landmarks(&matrix, rect));
        }

        let encodings = self
            .encoder
            .get_face_encodings(&matrix, &landmarks, self.jitters);

        let mut faces = Vec::with_capacity(locations.len());
        for (rect, encoding) in locations.iter().zip(encodings.iter()) {
            faces.push(DetectedFace {
                bounding_box: BoundingBox {
                    left: rect.left,
                    top: rect.top,
                    right: rect.right,
                    bottom: rect.bottom,
                },
                encoding: encoding.as_ref().to_vec(),
            });
        }

        Ok(faces)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Cursor;

    use image::{ImageOutputFormat, Rgb};

    use super::*;

    /// Encoder stub keyed on the red channel of the top-left pixel: the value
    /// selects which canned face list is returned.
    pub struct PixelKeyedEncoder {
        pub faces_by_key: Vec<Vec<DetectedFace>>,
    }

    impl FaceEncoder for PixelKeyedEncoder {
        fn encode_faces(&self, image: &RgbImage) -> AppResult<Vec<DetectedFace>> {
            let key = image.get_pixel(0, 0)[0] as usize;
            Ok(self.faces_by_key.get(key).cloned().unwrap_or_default())
        }
    }

    pub fn png_image(name: &str, key: u8) -> FaceImage {
        let buffer = RgbImage::from_pixel(2, 2, Rgb([key, 0, 0]));
        let mut bytes = Cursor::new(Vec::new());
        buffer
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .expect("png encoding");
        FaceImage::new(name, bytes.into_inner())
    }

    pub fn face(encoding: Vec<f64>) -> DetectedFace {
        DetectedFace {
            bounding_box: BoundingBox {
                left: 0,
                top: 0,
                right: 1,
                bottom: 1,
            },
            encoding,
        }
    }

    /// A unit-scale encoding pointing mostly along `axis`.
    pub fn encoding_along(axis: usize) -> Vec<f64> {
        let mut values = vec![0.01; ENCODING_DIMENSION];
        values[axis % ENCODING_DIMENSION] = 1.0;
        values
    }
}
