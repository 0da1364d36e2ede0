//! Repository traits for metadata operations.

pub mod ledger;
pub mod records;

pub use ledger::LedgerRepo;
pub use records::RecordRepo;

use softdel_core::RelationVariant;

/// SQL predicate selecting a relation variant. Undeclared status columns are
/// NULL and count as `false`.
pub(crate) fn variant_predicate(variant: RelationVariant) -> &'static str {
    match variant {
        RelationVariant::Active => {
            "COALESCE(deleted, FALSE) = FALSE AND COALESCE(archived, FALSE) = FALSE"
        }
        RelationVariant::Deleted => {
            "COALESCE(deleted, FALSE) = TRUE AND COALESCE(archived, FALSE) = FALSE"
        }
        RelationVariant::Archived => {
            "COALESCE(deleted, FALSE) = FALSE AND COALESCE(archived, FALSE) = TRUE"
        }
        RelationVariant::All => "1 = 1",
    }
}
