// export/confirm.rs
// Asking whether tables pulled in by the closure may be included

use crate::db::models::TableSet;
use crate::error::ExportError;
use dialoguer::{theme::ColorfulTheme, Confirm};

pub trait ClosureConfirmation {
    /// `true` to export `added` alongside the selection, `false` to abandon the export.
    fn confirm_added_tables(&mut self, added: &TableSet) -> Result<bool, ExportError>;
}

/// Non-interactive runs: added tables are always included.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoInclude;

impl ClosureConfirmation for AutoInclude {
    fn confirm_added_tables(&mut self, added: &TableSet) -> Result<bool, ExportError> {
        tracing::info!(tables = %added, "Including referenced tables");
        Ok(true)
    }
}

/// Terminal prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptConfirmation;

impl ClosureConfirmation for PromptConfirmation {
    fn confirm_added_tables(&mut self, added: &TableSet) -> Result<bool, ExportError> {
        println!();
        println!("The selected tables reference {} table(s) that were not selected:", added.len());
        for table in added {
            println!("  - {}", table);
        }
        println!();
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Include them in the export?")
            .default(true)
            .interact()
            .map_err(|e| ExportError::Confirmation(e.to_string()))
    }
}

impl<C: ClosureConfirmation + ?Sized> ClosureConfirmation for Box<C> {
    fn confirm_added_tables(&mut self, added: &TableSet) -> Result<bool, ExportError> {
        (**self).confirm_added_tables(added)
    }
}
