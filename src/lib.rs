//! tabrs: labelled tables with hierarchical indexes, alignment-aware
//! arithmetic, split-apply-combine grouping, reshaping and time resampling.

pub mod column;
pub mod config;
pub mod error;
pub mod groupby;
pub mod index;
pub mod ops;
pub mod reshape;
pub mod series;
pub mod table;
pub mod temporal;
pub mod value;

// Re-export commonly used types
pub use column::{BitMask, Column, ColumnData};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use groupby::{
    AggFunc, AggSpec, GroupKey, GroupOptions, Grouping, SeriesGroupBy, TableGroupBy,
};
pub use index::{Index, MultiIndex, TableIndex};
pub use ops::{AlignmentPlan, ArithOp, CompareOp, FillPolicy, JoinKind};
pub use reshape::{MeltOptions, Stacked};
pub use series::Series;
pub use table::Table;
pub use temporal::{EwmOptions, Frequency, Origin, Side, Window};
pub use value::{DType, Label, Value};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
