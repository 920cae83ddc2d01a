//! Infrastructure layer: persistence gateway, image host client, job queue.

pub mod jobs;
pub mod media;
pub mod store;

pub use media::{HttpImageStore, ImageStore, InMemoryImageStore, MediaError};
pub use store::{
    BrandQuery, BrandStore, InMemoryBrandStore, Page, SortField, SortOrder, StoreError,
};
