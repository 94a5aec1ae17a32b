pub mod add_existing;
pub mod remove;

pub use add_existing::{
    AddExistingImagesCommand, AddExistingImagesError, AddExistingImagesResponse, ImageSelection,
    IngestStatus, RejectReason, RejectedImage,
};
pub use remove::{
    BlockedImage, DiskFailure, RemoveImagesCommand, RemoveImagesError, RemoveImagesResponse,
};
