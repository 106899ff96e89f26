//! Remote media assets: the storage provider seam, the Cloudinary client,
//! and the best-effort upload/delete service the API handlers go through.

pub mod assets;
pub mod cloudinary;
pub mod public_id;
pub mod store;
pub mod temp;

pub use assets::MediaAssets;
pub use cloudinary::{CloudinaryConfig, CloudinaryStore};
pub use public_id::{AssetRef, asset_ref_from_url};
pub use store::{MediaStore, ResourceKind, UploadedAsset};
pub use temp::TempFile;
