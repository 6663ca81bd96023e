//! Data types for the editable worksheet model.

mod cell;
mod sheet;
mod workbook;

pub use cell::*;
pub use sheet::*;
pub use workbook::*;
