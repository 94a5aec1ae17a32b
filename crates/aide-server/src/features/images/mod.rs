pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{
    AddExistingImagesCommand, AddExistingImagesError, AddExistingImagesResponse, BlockedImage,
    DiskFailure, ImageSelection, IngestStatus, RejectReason, RejectedImage, RemoveImagesCommand,
    RemoveImagesError, RemoveImagesResponse,
};

pub use queries::{
    GetImageExtensionsQuery, GetImageMimeTypesQuery, ListImagesError, ListImagesQuery,
    ListImagesResponse, ScanImagesError, ScanImagesQuery, ScanImagesResponse,
    SupportedFormatsResponse,
};

pub use routes::{formats_routes, images_routes};
