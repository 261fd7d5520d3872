pub mod application;
pub mod document;
pub mod user;

pub use application::{Application, ApplicationCreate, ApplicationStatus, ApplicationStep, ApplicationUpdate, StepUpdate};
pub use document::{Document, DocumentStats, DocumentStatus, DocumentType, DocumentUpdate};
pub use user::{Gender, PassportType, ProfileType, UserProfile, UserResponse, UserUpdate};
