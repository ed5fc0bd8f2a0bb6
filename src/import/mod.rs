//! Employee spreadsheet import: row validation and the conflict-aware merge
//! into the current employee set.

pub mod merge;
pub mod rows;

pub use merge::{
    find_conflicts, merge_import_rows, ConflictDecision, ConflictScan, ImportConflict,
    MergeOutcome, MergeSummary,
};
pub use rows::{
    export_rows, parse_employee_rows, template_row, EmployeeImportRow, ParsedRows, RowError,
    EMPLOYEE_IMPORT_HEADERS,
};
