//! Reference data
//!
//! Read-only facts the compiler and evaluator consume but never own: the
//! company's stores, the product catalog, holidays, and what is known about the
//! customer and the usage counters at evaluation time.

use std::collections::BTreeSet;

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{BrandId, CategoryId, CompanyId, ProductId, PromotionId, StoreId};

/// A company (tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Company id
    pub id: CompanyId,

    /// Display name
    pub name: String,

    /// ISO-4217 currency code used by every store of the company
    pub currency: String,
}

/// A store (outlet) of one brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Store id
    pub id: StoreId,

    /// Owning company
    pub company_id: CompanyId,

    /// Brand the store trades as
    pub brand_id: BrandId,

    /// Short code, e.g. `AYM-SUDIRMAN`
    pub code: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Inactive stores are skipped by company compilation
    #[serde(default = "active")]
    pub is_active: bool,
}

const fn active() -> bool {
    true
}

/// What the catalog knows about a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Product category
    #[serde(default)]
    pub category_id: Option<CategoryId>,

    /// Brand selling the product
    #[serde(default)]
    pub brand_id: Option<BrandId>,
}

/// Product catalog snapshot.
///
/// May lag behind the bill: unknown products simply have no category or brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    products: FxHashMap<ProductId, CatalogEntry>,
}

impl Catalog {
    /// Register or replace a product.
    pub fn insert(&mut self, product: ProductId, entry: CatalogEntry) -> &mut Self {
        self.products.insert(product, entry);

        self
    }

    /// Category of `product`, if known.
    pub fn category_of(&self, product: ProductId) -> Option<CategoryId> {
        self.products
            .get(&product)
            .and_then(|entry| entry.category_id)
    }

    /// Brand of `product`, if known.
    pub fn brand_of(&self, product: ProductId) -> Option<BrandId> {
        self.products.get(&product).and_then(|entry| entry.brand_id)
    }

    /// Number of known products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Public holidays, as store-local dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidayCalendar(BTreeSet<Date>);

impl HolidayCalendar {
    /// Create a calendar from a set of dates.
    pub fn new(dates: impl IntoIterator<Item = Date>) -> Self {
        Self(dates.into_iter().collect())
    }

    /// Whether `date` is a holiday.
    pub fn is_holiday(&self, date: Date) -> bool {
        self.0.contains(&date)
    }
}

/// Everything the batch compilers need to know about a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// The company
    pub company: Company,

    /// All stores of the company, active or not
    #[serde(default)]
    pub stores: Vec<Store>,

    /// Product catalog
    #[serde(default)]
    pub catalog: Catalog,

    /// Holiday calendar
    #[serde(default)]
    pub holidays: HolidayCalendar,
}

impl ReferenceData {
    /// Look up a store by id.
    pub fn store(&self, id: StoreId) -> Option<&Store> {
        self.stores.iter().find(|store| store.id == id)
    }

    /// Active stores of the company.
    pub fn active_stores(&self) -> impl Iterator<Item = &Store> {
        self.stores
            .iter()
            .filter(|store| store.is_active && store.company_id == self.company.id)
    }
}

/// CRM facts about the customer on the bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFacts {
    /// Orders placed at any brand before this bill
    #[serde(default)]
    pub total_orders: u32,

    /// Orders placed per brand before this bill
    #[serde(default)]
    pub brand_orders: FxHashMap<BrandId, u32>,

    /// Days since the previous order; `None` if there was none
    #[serde(default)]
    pub days_since_last_order: Option<u32>,

    /// Flagged as returning after a lapse
    #[serde(default)]
    pub is_comeback: bool,

    /// Spend recorded per brand in the current cross-brand period, minor units
    #[serde(default)]
    pub brand_spend: FxHashMap<BrandId, i64>,
}

impl CustomerFacts {
    /// Whether the bill is the customer's first order anywhere.
    pub fn is_first_order(&self) -> bool {
        self.total_orders == 0
    }

    /// Whether the bill is the customer's first order at `brand`.
    pub fn is_first_order_at(&self, brand: BrandId) -> bool {
        self.brand_orders.get(&brand).copied().unwrap_or_default() == 0
    }

    /// Whether the customer has not ordered for at least `threshold` days.
    pub fn is_inactive(&self, threshold: u32) -> bool {
        self.days_since_last_order
            .is_some_and(|days| days >= threshold)
    }

    /// Prior spend recorded at `brand`.
    pub fn spend_at(&self, brand: BrandId) -> i64 {
        self.brand_spend.get(&brand).copied().unwrap_or_default()
    }
}

/// Fresh usage counts of one promotion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionUsage {
    /// Uses across every store
    pub total: u32,

    /// Uses today
    #[serde(default)]
    pub today: u32,

    /// Uses by the customer on the bill
    #[serde(default)]
    pub by_customer: u32,
}

/// Usage counts read from the ledger just before evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageFacts {
    promotions: FxHashMap<PromotionId, PromotionUsage>,
}

impl UsageFacts {
    /// Record the counts of a promotion.
    pub fn insert(&mut self, promotion: PromotionId, usage: PromotionUsage) -> &mut Self {
        self.promotions.insert(promotion, usage);

        self
    }

    /// Counts of a promotion, if the ledger was consulted for it.
    pub fn get(&self, promotion: PromotionId) -> Option<PromotionUsage> {
        self.promotions.get(&promotion).copied()
    }
}
