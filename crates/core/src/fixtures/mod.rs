//! Fixtures
//!
//! YAML fixture sets used by tests, the CLI and local runs. A set named `name`
//! is spread over three files under the base path:
//!
//! - `reference/{name}.yml`: company, stores, catalog and holidays
//! - `promotions/{name}.yml`: promotion snapshots keyed by a short name
//! - `bills/{name}.yml`: bills, and optionally customer facts, keyed the same way

use std::{collections::BTreeMap, fs, path::PathBuf};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    bill::Bill,
    compiler::{CompileError, Compiler},
    ids::PromotionId,
    promotions::Promotion,
    reference::{CustomerFacts, ReferenceData},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// No reference data loaded yet
    #[error("No reference data loaded yet")]
    NoReference,

    /// Promotion not found
    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),

    /// Bill not found
    #[error("Bill not found: {0}")]
    BillNotFound(String),

    /// Promotion belongs to another company
    #[error("Promotion {0} belongs to another company")]
    CompanyMismatch(String),

    /// Bill currency differs from the company currency
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// The company currency is not usable by the compiler
    #[error("Failed to build compiler: {0}")]
    Compiler(#[from] CompileError),
}

#[derive(Debug, Deserialize)]
struct PromotionsFixture {
    promotions: BTreeMap<String, Promotion>,
}

#[derive(Debug, Deserialize)]
struct BillsFixture {
    bills: BTreeMap<String, Bill>,

    #[serde(default)]
    customers: BTreeMap<String, CustomerFacts>,
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    reference: Option<ReferenceData>,

    /// Promotions in key order
    promotions: Vec<Promotion>,

    /// String key -> promotion id
    promotion_keys: FxHashMap<String, PromotionId>,

    bills: FxHashMap<String, Bill>,
    customers: FxHashMap<String, CustomerFacts>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            reference: None,
            promotions: Vec::new(),
            promotion_keys: FxHashMap::default(),
            bills: FxHashMap::default(),
            customers: FxHashMap::default(),
        }
    }

    fn read(&self, category: &str, name: &str) -> Result<String, FixtureError> {
        let file_path = self.base_path.join(category).join(format!("{name}.yml"));

        Ok(fs::read_to_string(file_path)?)
    }

    /// Load reference data from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_reference(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("reference", name)?;
        let reference: ReferenceData = serde_norway::from_str(&contents)?;

        self.reference = Some(reference);

        Ok(self)
    }

    /// Load promotions from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a promotion
    /// belongs to a company other than the loaded reference company.
    pub fn load_promotions(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("promotions", name)?;
        let fixture: PromotionsFixture = serde_norway::from_str(&contents)?;

        for (key, promotion) in fixture.promotions {
            if let Some(reference) = &self.reference
                && promotion.company_id != reference.company.id
            {
                return Err(FixtureError::CompanyMismatch(promotion.code));
            }

            self.promotion_keys.insert(key, promotion.id);
            self.promotions.retain(|existing| existing.id != promotion.id);
            self.promotions.push(promotion);
        }

        Ok(self)
    }

    /// Load bills and customer facts from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a bill is
    /// in a currency other than the loaded reference company's.
    pub fn load_bills(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("bills", name)?;
        let fixture: BillsFixture = serde_norway::from_str(&contents)?;

        for (key, bill) in fixture.bills {
            if let Some(reference) = &self.reference
                && !bill.currency.eq_ignore_ascii_case(&reference.company.currency)
            {
                return Err(FixtureError::CurrencyMismatch(
                    reference.company.currency.clone(),
                    bill.currency,
                ));
            }

            self.bills.insert(key, bill);
        }

        self.customers.extend(fixture.customers);

        Ok(self)
    }

    /// Load a complete fixture set (reference data, promotions and bills with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_set_at("./fixtures", name)
    }

    /// Load a complete fixture set from a custom base path
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set_at(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::with_base_path(base_path);

        fixture
            .load_reference(name)?
            .load_promotions(name)?
            .load_bills(name)?;

        Ok(fixture)
    }

    /// Get the reference data
    ///
    /// # Errors
    ///
    /// Returns an error if no reference data has been loaded.
    pub fn reference(&self) -> Result<&ReferenceData, FixtureError> {
        self.reference.as_ref().ok_or(FixtureError::NoReference)
    }

    /// Build a compiler for the company currency
    ///
    /// # Errors
    ///
    /// Returns an error if no reference data has been loaded or the currency is unknown.
    pub fn compiler(&self) -> Result<Compiler, FixtureError> {
        Ok(Compiler::new(&self.reference()?.company.currency)?)
    }

    /// Get all promotions, in key order
    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    /// Get a promotion id by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the promotion is not found.
    pub fn promotion_id(&self, key: &str) -> Result<PromotionId, FixtureError> {
        self.promotion_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::PromotionNotFound(key.to_string()))
    }

    /// Get a promotion by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the promotion is not found.
    pub fn promotion(&self, key: &str) -> Result<&Promotion, FixtureError> {
        let id = self.promotion_id(key)?;

        self.promotions
            .iter()
            .find(|promotion| promotion.id == id)
            .ok_or_else(|| FixtureError::PromotionNotFound(key.to_string()))
    }

    /// Get a bill by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the bill is not found.
    pub fn bill(&self, key: &str) -> Result<&Bill, FixtureError> {
        self.bills
            .get(key)
            .ok_or_else(|| FixtureError::BillNotFound(key.to_string()))
    }

    /// Get customer facts by their string key
    pub fn customer(&self, key: &str) -> Option<&CustomerFacts> {
        self.customers.get(key)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{env, path::Path};

    use testresult::TestResult;

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    fn scratch_dir(label: &str) -> TestResult<PathBuf> {
        let unique = format!(
            "edge-promo-fixtures-{label}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_nanos()
        );

        Ok(env::temp_dir().join(unique))
    }

    const REFERENCE: &str = "
company:
  id: 00000000-0000-0000-0000-0000000000c1
  name: Nusantara Kuliner
  currency: IDR
stores:
  - id: 00000000-0000-0000-0000-000000000501
    company_id: 00000000-0000-0000-0000-0000000000c1
    brand_id: 00000000-0000-0000-0000-0000000000b1
    code: AYM-SUDIRMAN
";

    #[test]
    fn fixture_loads_the_nusantara_set() -> TestResult {
        let fixture = Fixture::from_set("nusantara")?;
        let reference = fixture.reference()?;

        assert_eq!(reference.company.currency, "IDR");
        assert_eq!(reference.active_stores().count(), 3);
        assert!(!reference.catalog.is_empty());

        assert_eq!(fixture.promotion("save20")?.code, "SAVE20");
        assert_eq!(fixture.bill("member_lunch")?.lines.len(), 2);
        assert!(fixture.customer("returning_member").is_some());
        assert_eq!(fixture.compiler()?.currency().iso_alpha_code, "IDR");

        Ok(())
    }

    #[test]
    fn fixture_promotion_not_found_returns_error() {
        let fixture = Fixture::new();
        let result = fixture.promotion("missing");

        assert!(matches!(result, Err(FixtureError::PromotionNotFound(_))));
    }

    #[test]
    fn fixture_bill_not_found_returns_error() {
        let fixture = Fixture::new();

        assert!(matches!(
            fixture.bill("missing"),
            Err(FixtureError::BillNotFound(_))
        ));
    }

    #[test]
    fn fixture_without_reference_has_no_compiler() {
        let fixture = Fixture::new();

        assert!(matches!(fixture.compiler(), Err(FixtureError::NoReference)));
    }

    #[test]
    fn fixture_rejects_promotions_of_another_company() -> TestResult {
        let base_path = scratch_dir("company")?;

        write_fixture(&base_path, "reference", "set", REFERENCE)?;
        write_fixture(
            &base_path,
            "promotions",
            "set",
            "
promotions:
  foreign:
    id: 00000000-0000-0000-0000-000000000001
    company_id: 00000000-0000-0000-0000-0000000000c2
    code: FOREIGN
    name: Foreign
    promo_type: amount_discount
    discount_amount: 5000
    start_date: 2026-01-01
    end_date: 2026-12-31
",
        )?;

        let mut fixture = Fixture::with_base_path(&base_path);
        fixture.load_reference("set")?;

        let result = fixture.load_promotions("set");

        assert!(matches!(result, Err(FixtureError::CompanyMismatch(code)) if code == "FOREIGN"));

        Ok(())
    }

    #[test]
    fn fixture_rejects_bills_in_another_currency() -> TestResult {
        let base_path = scratch_dir("currency")?;

        write_fixture(&base_path, "reference", "set", REFERENCE)?;
        write_fixture(
            &base_path,
            "bills",
            "set",
            "
bills:
  dollars:
    store_id: 00000000-0000-0000-0000-000000000501
    brand_id: 00000000-0000-0000-0000-0000000000b1
    currency: USD
    channel: dine_in
    local_time: \"2026-03-14T12:00:00\"
",
        )?;

        let mut fixture = Fixture::with_base_path(&base_path);
        fixture.load_reference("set")?;

        let result = fixture.load_bills("set");

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }
}
