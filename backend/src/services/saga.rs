//! Compensating two-step writes
//!
//! The ledger store has no transaction spanning calls, so a sale is recorded
//! as a saga: insert the sale, then decrement its batch. If the second step
//! fails, the first is undone before the error is returned. No sale survives
//! without its decrement.

use async_trait::async_trait;
use shared::{Sale, StockLevel};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, StoreError};

/// One forward action of a saga together with its undo
#[async_trait]
pub trait SagaStep: Send + Sync {
    type Output: Send + Sync;

    fn name(&self) -> &'static str;

    async fn execute(&self) -> AppResult<Self::Output>;

    /// Undo a successful `execute`
    async fn compensate(&self, output: &Self::Output) -> AppResult<()>;

    /// Error to surface when `compensate` itself fails
    fn compensation_failed(&self, _output: &Self::Output, cause: AppError) -> AppError {
        AppError::Internal(format!("{} could not be undone: {}", self.name(), cause))
    }
}

/// Run `first` then `second`; if `second` fails, compensate `first` and return
/// `second`'s error. A failed compensation replaces it with the step's
/// `compensation_failed` error.
pub async fn run_pair<A, B>(first: &A, second: &B) -> AppResult<(A::Output, B::Output)>
where
    A: SagaStep,
    B: SagaStep,
{
    let first_out = first.execute().await?;

    match second.execute().await {
        Ok(second_out) => Ok((first_out, second_out)),
        Err(err) => {
            tracing::warn!(
                failed_step = second.name(),
                undo_step = first.name(),
                error = %err,
                "Saga step failed, compensating"
            );
            match first.compensate(&first_out).await {
                Ok(()) => Err(err),
                Err(cause) => Err(first.compensation_failed(&first_out, cause)),
            }
        }
    }
}

/// Insert a sale row; undone by deleting it
pub struct RecordSale<'a> {
    store: &'a dyn LedgerStore,
    sale: Sale,
}

impl<'a> RecordSale<'a> {
    pub fn new(store: &'a dyn LedgerStore, sale: Sale) -> Self {
        Self { store, sale }
    }
}

#[async_trait]
impl SagaStep for RecordSale<'_> {
    type Output = Sale;

    fn name(&self) -> &'static str {
        "record_sale"
    }

    async fn execute(&self) -> AppResult<Sale> {
        self.store
            .insert_sale(&self.sale)
            .await
            .map_err(|err| match err {
                StoreError::ForeignKeyViolation(_) => AppError::NotFound("Product or batch".into()),
                other => other.into(),
            })?;
        Ok(self.sale.clone())
    }

    async fn compensate(&self, sale: &Sale) -> AppResult<()> {
        // Zero rows means the sale is already gone, which is the goal.
        self.store.delete_sale(sale.owner_id, sale.id).await?;
        tracing::info!(sale_id = %sale.id, batch_id = %sale.batch_id, "Sale rolled back");
        Ok(())
    }

    fn compensation_failed(&self, sale: &Sale, cause: AppError) -> AppError {
        tracing::error!(
            sale_id = %sale.id,
            batch_id = %sale.batch_id,
            owner_id = %sale.owner_id,
            error = %cause,
            "Orphaned sale: batch was not decremented and the sale could not be deleted"
        );
        AppError::CompensationFailure {
            sale_id: sale.id,
            cause: cause.to_string(),
        }
    }
}

/// Conditionally write a batch's new stock level
///
/// Only lands if the batch still holds `expected_remaining` boxes; otherwise
/// another sale got there first.
pub struct DecrementBatch<'a> {
    store: &'a dyn LedgerStore,
    owner: Uuid,
    batch_id: Uuid,
    expected_remaining: i32,
    level: StockLevel,
}

impl<'a> DecrementBatch<'a> {
    pub fn new(
        store: &'a dyn LedgerStore,
        owner: Uuid,
        batch_id: Uuid,
        expected_remaining: i32,
        level: StockLevel,
    ) -> Self {
        Self {
            store,
            owner,
            batch_id,
            expected_remaining,
            level,
        }
    }
}

#[async_trait]
impl SagaStep for DecrementBatch<'_> {
    type Output = StockLevel;

    fn name(&self) -> &'static str {
        "decrement_batch"
    }

    async fn execute(&self) -> AppResult<StockLevel> {
        let updated = self
            .store
            .update_batch_stock(
                self.owner,
                self.batch_id,
                self.expected_remaining,
                &self.level,
            )
            .await?;

        if updated == 0 {
            return Err(AppError::ConcurrentModification(self.batch_id));
        }
        Ok(self.level)
    }

    // Last step of the saga; nothing runs after it that could fail.
    async fn compensate(&self, _level: &StockLevel) -> AppResult<()> {
        Ok(())
    }
}
