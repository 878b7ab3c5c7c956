/// Data layer: STAR parsing, iteration collation, class selection.
///
/// Architecture:
/// ```text
///  run_it001_model.star  run_ct5_it003_model.star  ...
///        │
///        ▼
///   ┌──────────┐
///   │ collate   │  glob + iteration key → ordered Vec<CollatedFile>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  star     │  one named table per file → ParsedTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ JobDataCube   │  iteration × class × column
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  selected classes → visible indices
///   └──────────┘
/// ```

pub mod collate;
pub mod cube;
pub mod filter;
pub mod model;
pub mod star;
