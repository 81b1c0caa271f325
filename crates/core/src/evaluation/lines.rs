//! Eligible lines
//!
//! The subset of a bill a promotion's targeting selects, plus the unit-price
//! helpers the rule formulas share.

use smallvec::SmallVec;

use crate::{
    bill::{Bill, BillLine},
    discounts::{DiscountError, checked_sum},
    evaluation::result::LineIndices,
    ids::{CategoryId, ProductId},
    promotions::{ApplyTo, facets::Targeting},
    reference::Catalog,
};

/// Lines selected by targeting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibleLines {
    /// Indices into the bill's lines
    pub indices: LineIndices,

    /// Σ quantity × unit price of the selected lines
    pub subtotal: i64,

    /// Σ quantity of the selected lines
    pub quantity: u32,
}

impl EligibleLines {
    /// Select the lines `targeting` applies to.
    ///
    /// Bill-scoped targeting selects every line. A product missing from the
    /// catalog has no category, so it never matches category targeting.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the subtotal does not fit.
    pub fn select(
        targeting: &Targeting,
        bill: &Bill,
        catalog: &Catalog,
    ) -> Result<Self, DiscountError> {
        let indices: LineIndices = bill
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                targeting.apply_to.is_bill_scoped() || is_targeted(targeting, line, catalog)
            })
            .map(|(index, _)| index)
            .collect();

        Self::from_indices(bill, indices)
    }

    /// Every line of the bill.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the subtotal does not fit.
    pub fn all(bill: &Bill) -> Result<Self, DiscountError> {
        Self::from_indices(bill, (0..bill.lines.len()).collect())
    }

    fn from_indices(bill: &Bill, indices: LineIndices) -> Result<Self, DiscountError> {
        let mut amounts: SmallVec<[i64; 8]> = SmallVec::new();
        let mut quantity = 0_u32;

        for line in indices.iter().filter_map(|index| bill.lines.get(*index)) {
            amounts.push(line.amount()?);
            quantity = quantity.saturating_add(line.quantity);
        }

        Ok(Self {
            indices,
            subtotal: checked_sum(amounts)?,
            quantity,
        })
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of distinct lines selected.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Selected lines with their index.
    pub fn iter<'b>(&'b self, bill: &'b Bill) -> impl Iterator<Item = (usize, &'b BillLine)> + 'b {
        self.indices
            .iter()
            .filter_map(move |index| bill.lines.get(*index).map(|line| (*index, line)))
    }

    /// Selected lines of `product`.
    pub fn of_product<'b>(
        &'b self,
        bill: &'b Bill,
        product: ProductId,
    ) -> impl Iterator<Item = (usize, &'b BillLine)> + 'b {
        self.iter(bill)
            .filter(move |(_, line)| line.product_id == product)
    }

    /// Selected lines whose product is in `category`.
    pub fn of_category<'b>(
        &'b self,
        bill: &'b Bill,
        catalog: &'b Catalog,
        category: CategoryId,
    ) -> impl Iterator<Item = (usize, &'b BillLine)> + 'b {
        self.iter(bill)
            .filter(move |(_, line)| catalog.category_of(line.product_id) == Some(category))
    }

    /// Units of `product` among the selected lines.
    pub fn quantity_of(&self, bill: &Bill, product: ProductId) -> u32 {
        self.of_product(bill, product)
            .fold(0_u32, |total, (_, line)| total.saturating_add(line.quantity))
    }

    /// Cheapest unit price of `product` among the selected lines.
    pub fn cheapest_unit_of(&self, bill: &Bill, product: ProductId) -> Option<i64> {
        self.of_product(bill, product)
            .filter(|(_, line)| line.quantity > 0)
            .map(|(_, line)| line.unit_price)
            .min()
    }
}

fn is_targeted(targeting: &Targeting, line: &BillLine, catalog: &Catalog) -> bool {
    let category = catalog.category_of(line.product_id);

    let excluded = targeting.exclude_products.contains(&line.product_id)
        || category.is_some_and(|category| targeting.exclude_categories.contains(&category));

    if excluded || line.quantity == 0 {
        return false;
    }

    match targeting.apply_to {
        ApplyTo::All | ApplyTo::Bill | ApplyTo::Payment => true,
        ApplyTo::Category => {
            category.is_some_and(|category| targeting.categories.contains(&category))
        }
        ApplyTo::Product => targeting.products.contains(&line.product_id),
    }
}

/// Unit prices as runs of `(price, units)`, most expensive first.
///
/// Lets grouping formulas walk large quantities without expanding every unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitRuns {
    runs: SmallVec<[(i64, u32); 8]>,
}

impl UnitRuns {
    /// Collect runs from lines.
    pub fn from_lines<'b>(lines: impl IntoIterator<Item = &'b BillLine>) -> Self {
        let mut runs: SmallVec<[(i64, u32); 8]> = lines
            .into_iter()
            .filter(|line| line.quantity > 0)
            .map(|line| (line.unit_price, line.quantity))
            .collect();

        runs.sort_by(|a, b| b.0.cmp(&a.0));

        Self { runs }
    }

    /// Units left.
    pub fn units(&self) -> u64 {
        self.runs.iter().map(|(_, units)| u64::from(*units)).sum()
    }

    /// Price of the most expensive unit left.
    pub fn peek(&self) -> Option<i64> {
        self.runs.first().map(|(price, _)| *price)
    }

    /// Remove the `count` most expensive units and return their total.
    ///
    /// Returns `Ok(None)` and leaves the runs untouched when fewer than `count`
    /// units are left.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Overflow`] if the total does not fit.
    pub fn take(&mut self, count: u32) -> Result<Option<i64>, DiscountError> {
        if self.units() < u64::from(count) {
            return Ok(None);
        }

        let mut remaining = count;
        let mut total = 0_i64;

        while remaining > 0 {
            let Some((price, units)) = self.runs.first_mut() else {
                break;
            };

            let taken = (*units).min(remaining);

            total = price
                .checked_mul(i64::from(taken))
                .and_then(|amount| total.checked_add(amount))
                .ok_or(DiscountError::Overflow)?;

            *units -= taken;
            remaining -= taken;

            if *units == 0 {
                self.runs.remove(0);
            }
        }

        Ok(Some(total))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use jiff::civil::date;
    use testresult::TestResult;

    use super::*;
    use crate::{
        ids::{BrandId, StoreId},
        reference::CatalogEntry,
    };

    const BURGER: ProductId = ProductId::from_u128(1);
    const FRIES: ProductId = ProductId::from_u128(2);
    const UNKNOWN: ProductId = ProductId::from_u128(3);
    const MAINS: CategoryId = CategoryId::from_u128(100);
    const SIDES: CategoryId = CategoryId::from_u128(200);

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog
            .insert(
                BURGER,
                CatalogEntry {
                    category_id: Some(MAINS),
                    brand_id: None,
                },
            )
            .insert(
                FRIES,
                CatalogEntry {
                    category_id: Some(SIDES),
                    brand_id: None,
                },
            );

        catalog
    }

    fn bill() -> Bill {
        let line = |product_id, quantity, unit_price| BillLine {
            product_id,
            brand_id: None,
            quantity,
            unit_price,
        };

        Bill {
            store_id: StoreId::from_u128(1),
            brand_id: BrandId::from_u128(1),
            currency: "IDR".to_string(),
            channel: "dine_in".to_string(),
            local_time: date(2026, 3, 14).at(12, 0, 0, 0),
            member: None,
            payment_method: None,
            lines: vec![
                line(BURGER, 2, 40_000),
                line(FRIES, 1, 15_000),
                line(UNKNOWN, 1, 9_000),
            ],
            requested_promotions: BTreeSet::new(),
        }
    }

    fn targeting(apply_to: ApplyTo) -> Targeting {
        Targeting {
            apply_to,
            categories: BTreeSet::new(),
            products: BTreeSet::new(),
            exclude_categories: BTreeSet::new(),
            exclude_products: BTreeSet::new(),
        }
    }

    #[test]
    fn category_targeting_skips_unknown_products() -> TestResult {
        let mut targeting = targeting(ApplyTo::Category);
        targeting.categories.insert(MAINS);

        let lines = EligibleLines::select(&targeting, &bill(), &catalog())?;

        assert_eq!(lines.indices.as_slice(), &[0]);
        assert_eq!(lines.subtotal, 80_000);
        assert_eq!(lines.quantity, 2);

        Ok(())
    }

    #[test]
    fn all_targeting_honours_exclusions() -> TestResult {
        let mut targeting = targeting(ApplyTo::All);
        targeting.exclude_categories.insert(SIDES);

        let lines = EligibleLines::select(&targeting, &bill(), &catalog())?;

        assert_eq!(lines.indices.as_slice(), &[0, 2]);
        assert_eq!(lines.subtotal, 89_000);

        Ok(())
    }

    #[test]
    fn bill_targeting_selects_everything() -> TestResult {
        let mut targeting = targeting(ApplyTo::Bill);
        targeting.exclude_products.insert(BURGER);

        let lines = EligibleLines::select(&targeting, &bill(), &catalog())?;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines.subtotal, 104_000);

        Ok(())
    }

    #[test]
    fn unit_runs_take_most_expensive_first() -> TestResult {
        let bill = bill();
        let mut runs = UnitRuns::from_lines(&bill.lines);

        assert_eq!(runs.units(), 4);
        assert_eq!(runs.take(3)?, Some(95_000));
        assert_eq!(runs.peek(), Some(9_000));
        assert_eq!(runs.take(2)?, None);
        assert_eq!(runs.take(1)?, Some(9_000));

        Ok(())
    }
}
