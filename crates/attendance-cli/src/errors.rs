pub use attendance_face_core::errors::{AppError, AppResult, EnrollmentError};
