//! Alignment engine and the elementwise operators built on it

pub mod align;
pub mod arithmetic;

pub use align::{align, reindex_positions, AlignmentPlan, FillPolicy, JoinKind};
pub use arithmetic::{arith_columns, compare_columns, ArithOp, CompareOp};
