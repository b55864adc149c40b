//! Parsers for the densely packed text columns of the map-extract rows.

pub mod adm_path;
pub mod alternate_names;
pub mod decompound;
pub mod postal;

pub use adm_path::{parse_is_in_adm, populate_adm_names, populate_adm_names_from_adm};
pub use alternate_names::{parse_alternate_names, populate_alternate_names};
pub use postal::{best_zip_code, is_unwanted_zip_code, split_postal};
