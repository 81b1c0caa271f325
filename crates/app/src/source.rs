//! Promotion Source
//!
//! Where the service reads the company snapshot from. Terminals and the CLI
//! run against YAML fixture sets; a back-office deployment would put a
//! database-backed implementation behind the same trait.

use std::path::PathBuf;

use async_trait::async_trait;
use edge_promo::{
    bill::Bill,
    fixtures::{Fixture, FixtureError},
    promotions::Promotion,
    reference::{CustomerFacts, ReferenceData},
};
use mockall::automock;
use thiserror::Error;
use tracing::info;

/// Errors raised while reading from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Fixture files could not be read or parsed
    #[error("failed to load fixtures")]
    Fixture(#[source] FixtureError),

    /// The blocking load task panicked or was cancelled
    #[error("fixture load task failed")]
    Join(#[source] tokio::task::JoinError),

    /// A bill key that the source does not know
    #[error("bill not found: {0}")]
    BillNotFound(String),

    /// A customer key that the source does not know
    #[error("customer not found: {0}")]
    CustomerNotFound(String),
}

impl From<FixtureError> for SourceError {
    fn from(error: FixtureError) -> Self {
        match error {
            FixtureError::BillNotFound(key) => Self::BillNotFound(key),
            other => Self::Fixture(other),
        }
    }
}

/// Read access to one company's promotions and reference data.
#[automock]
#[async_trait]
pub trait PromotionSource: Send + Sync {
    /// Company, stores, catalog and holidays.
    async fn reference_data(&self) -> Result<ReferenceData, SourceError>;

    /// Every promotion of the company, active or not.
    async fn promotions(&self) -> Result<Vec<Promotion>, SourceError>;

    /// A bill snapshot by key.
    async fn bill(&self, key: &str) -> Result<Bill, SourceError>;

    /// Customer facts by key.
    async fn customer(&self, key: &str) -> Result<CustomerFacts, SourceError>;
}

/// [`PromotionSource`] backed by a YAML fixture set.
#[derive(Debug)]
pub struct FixtureSource {
    fixture: Fixture,
}

impl FixtureSource {
    /// Load the fixture set `name` from `base_path` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fixture`] if any of the set's files cannot be read
    /// or disagree with the reference data.
    pub async fn load(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, SourceError> {
        let base_path = base_path.into();
        let set = name.to_string();

        let fixture = tokio::task::spawn_blocking(move || Fixture::from_set_at(base_path, &set))
            .await
            .map_err(SourceError::Join)??;

        info!(
            set = name,
            promotions = fixture.promotions().len(),
            "loaded fixture set"
        );

        Ok(Self { fixture })
    }

    /// Wrap an already loaded fixture.
    pub fn from_fixture(fixture: Fixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl PromotionSource for FixtureSource {
    async fn reference_data(&self) -> Result<ReferenceData, SourceError> {
        Ok(self.fixture.reference()?.clone())
    }

    async fn promotions(&self) -> Result<Vec<Promotion>, SourceError> {
        Ok(self.fixture.promotions().to_vec())
    }

    async fn bill(&self, key: &str) -> Result<Bill, SourceError> {
        Ok(self.fixture.bill(key)?.clone())
    }

    async fn customer(&self, key: &str) -> Result<CustomerFacts, SourceError> {
        self.fixture
            .customer(key)
            .cloned()
            .ok_or_else(|| SourceError::CustomerNotFound(key.to_string()))
    }
}
