//! Persistence gateway for brand records.
//!
//! `BrandStore` is the seam between the service layer and whatever durable
//! document store backs it. The in-memory implementation ships as the
//! dev/test substrate; a database-backed implementation slots in behind the
//! same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use brandhub_brands::{Brand, BrandType};
use brandhub_core::{BrandId, DomainError};

/// Fields the caller may sort a listing by. Anything else is rejected at
/// parse time with a message naming the allowed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    CreatedAt,
}

impl SortField {
    pub const ALLOWED: &'static [&'static str] = &["name", "createdAt"];
}

impl Default for SortField {
    fn default() -> Self {
        Self::Name
    }
}

impl core::str::FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortField::Name),
            "createdAt" => Ok(SortField::CreatedAt),
            other => Err(DomainError::validation(
                "sortBy",
                format!(
                    "invalid sort field '{other}'; allowed fields are: {}",
                    SortField::ALLOWED.join(", ")
                ),
            )),
        }
    }
}

/// Sort direction. Listings default to descending (newest/highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

impl core::str::FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accepts the numeric mongo-style values as well as the words.
        match s {
            "asc" | "1" => Ok(SortOrder::Asc),
            "desc" | "-1" => Ok(SortOrder::Desc),
            other => Err(DomainError::validation(
                "order",
                format!("invalid sort order '{other}'; use asc or desc"),
            )),
        }
    }
}

/// Listing filter + pagination parameters.
#[derive(Debug, Clone, Default)]
pub struct BrandQuery {
    /// Case-insensitive substring match on the brand name.
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub brand_type: Option<BrandType>,
    /// 1-based page number; zero is treated as the first page.
    pub page: u32,
    pub per_page: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl BrandQuery {
    pub const DEFAULT_PER_PAGE: u32 = 7;

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> u32 {
        if self.per_page == 0 {
            Self::DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }

    pub fn skip(&self) -> usize {
        // Widen before multiplying; u32::MAX page/perPage is a valid request.
        (self.page() as usize - 1).saturating_mul(self.per_page() as usize)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Persistence gateway error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("brand not found: {0}")]
    NotFound(BrandId),
    #[error("a brand named '{0}' already exists")]
    DuplicateName(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Store abstraction over a single brand collection.
pub trait BrandStore: Send + Sync {
    fn find_by_id(&self, id: BrandId) -> Result<Option<Brand>, StoreError>;

    /// Exact-name lookup, used for the uniqueness pre-check.
    fn find_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError>;

    /// Insert a new record. Fails with `DuplicateName` if the name is taken.
    fn insert(&self, brand: Brand) -> Result<Brand, StoreError>;

    /// Replace an existing record (single-document read-modify-write).
    fn update(&self, brand: &Brand) -> Result<Brand, StoreError>;

    /// Remove a record, returning it.
    fn delete(&self, id: BrandId) -> Result<Brand, StoreError>;

    /// Filter, sort, and paginate the collection.
    fn paginate(&self, query: &BrandQuery) -> Result<Page<Brand>, StoreError>;
}

impl<S> BrandStore for Arc<S>
where
    S: BrandStore + ?Sized,
{
    fn find_by_id(&self, id: BrandId) -> Result<Option<Brand>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        (**self).find_by_name(name)
    }

    fn insert(&self, brand: Brand) -> Result<Brand, StoreError> {
        (**self).insert(brand)
    }

    fn update(&self, brand: &Brand) -> Result<Brand, StoreError> {
        (**self).update(brand)
    }

    fn delete(&self, id: BrandId) -> Result<Brand, StoreError> {
        (**self).delete(id)
    }

    fn paginate(&self, query: &BrandQuery) -> Result<Page<Brand>, StoreError> {
        (**self).paginate(query)
    }
}

/// In-memory brand store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBrandStore {
    inner: RwLock<HashMap<BrandId, Brand>>,
}

impl InMemoryBrandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<BrandId, Brand>>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<BrandId, Brand>>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

impl BrandStore for InMemoryBrandStore {
    fn find_by_id(&self, id: BrandId) -> Result<Option<Brand>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        Ok(self.read()?.values().find(|b| b.name == name).cloned())
    }

    fn insert(&self, brand: Brand) -> Result<Brand, StoreError> {
        let mut map = self.write()?;
        if map.values().any(|b| b.name == brand.name) {
            return Err(StoreError::DuplicateName(brand.name));
        }
        map.insert(brand.id, brand.clone());
        Ok(brand)
    }

    fn update(&self, brand: &Brand) -> Result<Brand, StoreError> {
        let mut map = self.write()?;
        if !map.contains_key(&brand.id) {
            return Err(StoreError::NotFound(brand.id));
        }
        if map
            .values()
            .any(|b| b.id != brand.id && b.name == brand.name)
        {
            return Err(StoreError::DuplicateName(brand.name.clone()));
        }
        map.insert(brand.id, brand.clone());
        Ok(brand.clone())
    }

    fn delete(&self, id: BrandId) -> Result<Brand, StoreError> {
        self.write()?.remove(&id).ok_or(StoreError::NotFound(id))
    }

    fn paginate(&self, query: &BrandQuery) -> Result<Page<Brand>, StoreError> {
        let map = self.read()?;

        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matches: Vec<Brand> = map
            .values()
            .filter(|b| {
                needle
                    .as_deref()
                    .map_or(true, |n| b.name.to_lowercase().contains(n))
                    && query.is_active.map_or(true, |a| b.is_active == a)
                    && query.brand_type.map_or(true, |t| b.brand_type == t)
            })
            .cloned()
            .collect();

        match query.sort_by {
            SortField::Name => matches.sort_by(|a, b| a.name.cmp(&b.name)),
            SortField::CreatedAt => {
                matches.sort_by_key(|b| (b.created_at, *b.id.as_uuid()));
            }
        }
        if query.order == SortOrder::Desc {
            matches.reverse();
        }

        let total_items = matches.len();
        let per_page = query.per_page() as usize;
        let total_pages = total_items.div_ceil(per_page);
        let items: Vec<Brand> = matches
            .into_iter()
            .skip(query.skip())
            .take(per_page)
            .collect();

        Ok(Page {
            items,
            total_items,
            total_pages,
        })
    }
}
