//! `brandhub-brands`: brand domain model and validation rules.

pub mod brand;

pub use brand::{Brand, BrandDraft, BrandType, NAME_MAX_LEN, NAME_MIN_LEN};
