pub mod formats;
pub mod list;
pub mod scan;

pub use formats::{GetImageExtensionsQuery, GetImageMimeTypesQuery, SupportedFormatsResponse};
pub use list::{ListImagesError, ListImagesQuery, ListImagesResponse};
pub use scan::{ScanImagesError, ScanImagesQuery, ScanImagesResponse};
