//! Identifiers for engine records.
//!
//! Each record kind gets its own UUID newtype so a run id cannot stand in
//! for an account id. Ids are UUID v7, so sorting by id follows creation
//! order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

typed_id!(AccountId, "Chart of accounts node.");
typed_id!(TransactionId, "Posted transaction header.");
typed_id!(JournalEntryId, "Single journal line.");
typed_id!(BranchId, "Branch.");
typed_id!(DimensionId, "Dimension definition.");
typed_id!(DimensionValueId, "Value within a dimension.");
typed_id!(AssignmentId, "Dimension assignment on a journal line.");
typed_id!(ReconciliationRunId, "Reconciliation run.");
typed_id!(ReconciliationItemId, "Statement line within a run.");
typed_id!(AdjustmentId, "Reconciliation adjustment.");
typed_id!(ProductionOrderId, "Production order.");
typed_id!(InvoiceLineId, "Sales invoice line.");
typed_id!(CogsAllocationId, "COGS allocation of one order to one invoice line.");
