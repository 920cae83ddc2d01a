use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brandhub_core::{BrandId, DomainError, DomainResult};

/// Bounds for a brand name.
pub const NAME_MIN_LEN: usize = 1;
pub const NAME_MAX_LEN: usize = 90;

/// What a brand applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandType {
    Vehicle,
    Product,
}

impl BrandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrandType::Vehicle => "vehicle",
            BrandType::Product => "product",
        }
    }

    /// All declared variants, in the order they are reported to clients.
    pub fn variants() -> &'static [&'static str] {
        &["vehicle", "product"]
    }
}

impl core::str::FromStr for BrandType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle" => Ok(BrandType::Vehicle),
            "product" => Ok(BrandType::Product),
            _ => Err(DomainError::validation(
                "type",
                format!(
                    "type must be one of: {}",
                    BrandType::variants().join(", ")
                ),
            )),
        }
    }
}

impl core::fmt::Display for BrandType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A brand record.
///
/// `icon` starts empty and is written asynchronously by the icon upload
/// worker after the record has already been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub icon: String,
    pub is_active: bool,
    #[serde(rename = "type")]
    pub brand_type: BrandType,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Brand {
    /// Materialize a new brand from a validated draft. Icon is always empty
    /// at creation time.
    pub fn create(draft: BrandDraft) -> DomainResult<Self> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: BrandId::new(),
            name: draft.name,
            icon: String::new(),
            is_active: draft.is_active.unwrap_or(true),
            brand_type: draft.brand_type,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply the mutable fields of a draft to an existing brand.
    ///
    /// Icon is untouched here; only the queue worker writes it.
    pub fn apply(&mut self, draft: BrandDraft) -> DomainResult<()> {
        draft.validate()?;
        self.name = draft.name;
        self.brand_type = draft.brand_type;
        if let Some(active) = draft.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_icon(&self) -> bool {
        !self.icon.is_empty()
    }
}

/// Incoming brand fields, prior to validation. Used for both creation and
/// update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub brand_type: BrandType,
    pub is_active: Option<bool>,
}

impl BrandDraft {
    pub fn new(name: impl Into<String>, brand_type: BrandType) -> Self {
        Self {
            name: name.into(),
            brand_type,
            is_active: None,
        }
    }

    /// Check the field-level rules. Uniqueness is a store concern and is
    /// checked at the persistence boundary.
    pub fn validate(&self) -> DomainResult<()> {
        validate_name(&self.name)
    }
}

/// Letters (including Spanish accented vowels and n-tilde/u-umlaut),
/// digits, and spaces.
fn is_allowed_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == ' '
        || matches!(
            c,
            'á' | 'é' | 'í' | 'ó' | 'ú' | 'Á' | 'É' | 'Í' | 'Ó' | 'Ú' | 'ñ' | 'Ñ' | 'ü' | 'Ü'
        )
}

fn validate_name(name: &str) -> DomainResult<()> {
    let len = name.chars().count();
    if len < NAME_MIN_LEN {
        return Err(DomainError::validation(
            "name",
            "the brand name must not be empty",
        ));
    }
    if len > NAME_MAX_LEN {
        return Err(DomainError::validation(
            "name",
            format!(
                "the brand name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
            ),
        ));
    }
    if !name.chars().all(is_allowed_name_char) {
        return Err(DomainError::validation(
            "name",
            "the brand name may only contain letters and numbers",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn create_defaults_icon_empty_and_active_true() {
        let brand = Brand::create(BrandDraft::new("Toyota", BrandType::Vehicle)).unwrap();
        assert_eq!(brand.icon, "");
        assert!(brand.is_active);
        assert!(!brand.has_icon());
    }

    #[test]
    fn create_respects_explicit_is_active() {
        let mut draft = BrandDraft::new("Sony", BrandType::Product);
        draft.is_active = Some(false);
        let brand = Brand::create(draft).unwrap();
        assert!(!brand.is_active);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Brand::create(BrandDraft::new("", BrandType::Vehicle)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "a".repeat(NAME_MAX_LEN + 1);
        assert!(Brand::create(BrandDraft::new(name, BrandType::Vehicle)).is_err());
    }

    #[test]
    fn punctuation_in_name_is_rejected() {
        for bad in ["Brand!", "a/b", "x\ty", "名前"] {
            assert!(
                Brand::create(BrandDraft::new(bad, BrandType::Product)).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn spanish_accents_are_allowed_other_diacritics_are_not() {
        assert!(Brand::create(BrandDraft::new("Peñafiel 2000", BrandType::Product)).is_ok());
        assert!(Brand::create(BrandDraft::new("Citroën", BrandType::Vehicle)).is_err());
    }

    #[test]
    fn apply_updates_fields_but_not_icon() {
        let mut brand = Brand::create(BrandDraft::new("Old", BrandType::Vehicle)).unwrap();
        brand.icon = "https://img.example/old.png".to_string();

        let mut draft = BrandDraft::new("New", BrandType::Product);
        draft.is_active = Some(false);
        brand.apply(draft).unwrap();

        assert_eq!(brand.name, "New");
        assert_eq!(brand.brand_type, BrandType::Product);
        assert!(!brand.is_active);
        assert_eq!(brand.icon, "https://img.example/old.png");
    }

    #[test]
    fn brand_type_parses_declared_variants_only() {
        assert_eq!("vehicle".parse::<BrandType>().unwrap(), BrandType::Vehicle);
        assert_eq!("product".parse::<BrandType>().unwrap(), BrandType::Product);
        let err = "boat".parse::<BrandType>().unwrap_err();
        assert!(err.to_string().contains("vehicle, product"));
    }

    #[test]
    fn brand_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&BrandType::Vehicle).unwrap(),
            "\"vehicle\""
        );
    }

    proptest! {
        #[test]
        fn names_within_charset_and_bounds_validate(
            name in "[a-zA-Z0-9áéíóúÁÉÍÓÚñÑüÜ ]{1,90}"
        ) {
            prop_assert!(validate_name(&name).is_ok());
        }

        #[test]
        fn validation_never_panics(name in ".*") {
            let _ = validate_name(&name);
        }
    }
}
