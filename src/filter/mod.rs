pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod query_params;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use filter_where::{Condition, FilterWhere};
pub use error::FilterError;
