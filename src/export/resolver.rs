// export/resolver.rs
// Expands an export set into its foreign-key closure

use crate::db::accessors::MetadataProvider;
use crate::db::models::TableSet;
use crate::error::ExportError;

/// Result of [`resolve`]: the closed export set and the tables closure pulled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: TableSet,
    pub added: TableSet,
}

/// Follows outgoing foreign keys from `export_list` until no new tables appear.
///
/// Order is the export list followed by added tables in discovery order. Targets unknown to
/// the provider are kept; they fail later when their metadata is needed. Each table is
/// queried once, so cycles and self-references terminate.
pub async fn resolve<P>(provider: &mut P, export_list: &TableSet) -> Result<Resolution, ExportError>
where
    P: MetadataProvider + ?Sized,
{
    let mut resolved = export_list.clone();
    let mut added = TableSet::new();
    let mut frontier: Vec<String> = export_list.iter().cloned().collect();
    let mut round = 0;

    while !frontier.is_empty() {
        round += 1;
        let mut new_tables = Vec::new();
        for table in &frontier {
            for referenced in provider.referenced_tables(table).await?.iter() {
                if resolved.insert(referenced.clone()) {
                    tracing::debug!(table = %table, referenced = %referenced, "Added referenced table");
                    added.insert(referenced.clone());
                    new_tables.push(referenced.clone());
                }
            }
        }
        tracing::trace!(round, discovered = new_tables.len(), "Closure round finished");
        frontier = new_tables;
    }

    Ok(Resolution { resolved, added })
}
