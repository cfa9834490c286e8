pub mod cell_key;
pub mod selection;

pub use cell_key::{sort_cell_keys, CellKey, ParseCellKeyError};
pub use selection::{shifted_bound, Rect};
