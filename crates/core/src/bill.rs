//! Bills
//!
//! The terminal-side snapshot a promotion is evaluated against.

use std::collections::BTreeSet;

use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};

use crate::{
    discounts::{DiscountError, checked_sum, line_amount},
    ids::{BrandId, MemberId, ProductId, PromotionId, StoreId},
    reference::Catalog,
};

/// One bill line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    /// Product sold
    pub product_id: ProductId,

    /// Brand of the line on food-court receipts
    #[serde(default)]
    pub brand_id: Option<BrandId>,

    /// Units
    pub quantity: u32,

    /// Unit price, minor units
    pub unit_price: i64,
}

impl BillLine {
    /// `quantity × unit_price`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the amount does not fit.
    pub fn amount(&self) -> Result<i64, DiscountError> {
        line_amount(self.unit_price, self.quantity)
    }
}

/// Member identified on the bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillMember {
    /// Member id
    pub id: MemberId,

    /// Loyalty tier, e.g. `gold`
    #[serde(default)]
    pub tier: Option<String>,
}

/// Bill snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    /// Store ringing the bill
    pub store_id: StoreId,

    /// Brand of the store
    pub brand_id: BrandId,

    /// ISO-4217 currency code
    pub currency: String,

    /// Sales channel, e.g. `dine_in`
    pub channel: String,

    /// Store-local date and time
    pub local_time: DateTime,

    /// Identified member
    #[serde(default)]
    pub member: Option<BillMember>,

    /// Payment method, once chosen
    #[serde(default)]
    pub payment_method: Option<String>,

    /// Lines
    #[serde(default)]
    pub lines: Vec<BillLine>,

    /// Voucher or manual codes entered by the cashier
    #[serde(default)]
    pub requested_promotions: BTreeSet<String>,
}

impl Bill {
    /// Σ quantity × unit price over every line.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the sum does not fit.
    pub fn subtotal(&self) -> Result<i64, DiscountError> {
        let amounts = self
            .lines
            .iter()
            .map(BillLine::amount)
            .collect::<Result<Vec<_>, _>>()?;

        checked_sum(amounts)
    }

    /// Brand a line was sold by: the line's own brand, then the catalog's,
    /// then the bill's.
    pub fn line_brand(&self, line: &BillLine, catalog: &Catalog) -> BrandId {
        line.brand_id
            .or_else(|| catalog.brand_of(line.product_id))
            .unwrap_or(self.brand_id)
    }

    /// Whether the cashier requested the promotion by id or code.
    pub fn requests(&self, id: PromotionId, code: &str) -> bool {
        let id = id.to_string();

        self.requested_promotions
            .iter()
            .any(|requested| *requested == id || requested.eq_ignore_ascii_case(code))
    }

    /// Member tier, lower-cased.
    pub fn member_tier(&self) -> Option<String> {
        self.member
            .as_ref()
            .and_then(|member| member.tier.as_deref())
            .map(|tier| tier.trim().to_ascii_lowercase())
    }
}
