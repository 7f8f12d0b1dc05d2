//! Row references, links and the structures that consolidate them.

pub mod disjoint;
pub mod link_set;
pub mod prune;
pub mod row_link;
pub mod row_ref;

pub use disjoint::{AtomicDisjointSet, DisjointSet, RefSpace};
pub use link_set::LinkSet;
pub use prune::{best_unique_links, eliminate_internal_links, missing_singles};
pub use row_link::RowLink;
pub use row_ref::RowRef;
