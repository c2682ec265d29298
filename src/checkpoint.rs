//! Save and restore of the trade/exit flag columns around a destructive pass.
//!
//! Only the columns in [`FLAG_COLUMNS`] travel. Entry/exit index and price
//! columns stay as they are in the destination table.

use crate::error::{HarnessError, Result};
use crate::table::{FLAG_COLUMNS, WorkingTable};

fn copy_flag_columns(from: &WorkingTable, to: &mut WorkingTable) -> Result<()> {
    from.validate()?;
    to.validate()?;
    if from.len() != to.len() {
        return Err(HarnessError::SchemaMismatch(format!(
            "cannot copy flag columns between tables of {} and {} rows",
            from.len(),
            to.len()
        )));
    }
    for column in FLAG_COLUMNS {
        to.flag_mut(column).clone_from_slice(from.flag(column));
    }
    Ok(())
}

/// Copy the flag columns of `working` into `saved`.
pub fn save(working: &WorkingTable, saved: &mut WorkingTable) -> Result<()> {
    copy_flag_columns(working, saved)
}

/// Revert the flag columns of `working` to what `saved` holds.
pub fn restore(saved: &WorkingTable, working: &mut WorkingTable) -> Result<()> {
    copy_flag_columns(saved, working)
}
