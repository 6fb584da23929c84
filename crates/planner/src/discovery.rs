use crate::error::PlanError;
use chrono::{DateTime, Utc};
use connectors::adapter::SourceAdapter;
use model::core::identifiers::ObjectKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One migratable object with the lightweight metadata the selection UI
/// shows next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<i64>,
}

/// The discovery document: every object eligible for migration, grouped by
/// kind. Feeds the orchestrator in memory and is serialized as
/// `discovery_result.json` for the external UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub schema: String,
    pub discovered_at: DateTime<Utc>,
    pub tables: Vec<DiscoveredObject>,
    pub views: Vec<DiscoveredObject>,
    pub sequences: Vec<DiscoveredObject>,
    pub procedures: Vec<DiscoveredObject>,
    pub functions: Vec<DiscoveredObject>,
    pub triggers: Vec<DiscoveredObject>,
    pub packages: Vec<DiscoveredObject>,
}

impl DiscoveryDocument {
    pub fn total_objects(&self) -> usize {
        self.tables.len()
            + self.views.len()
            + self.sequences.len()
            + self.procedures.len()
            + self.functions.len()
            + self.triggers.len()
            + self.packages.len()
    }
}

/// Enumerates everything the source schema offers for migration.
pub async fn discover(source: &dyn SourceAdapter) -> Result<DiscoveryDocument, PlanError> {
    let schema = source.schema();
    info!(schema = %schema, "discovering migratable objects");

    let mut tables = Vec::new();
    for name in source.list_tables().await? {
        let stats = source.table_stats(&name).await.unwrap_or_default();
        tables.push(DiscoveredObject {
            name,
            kind: ObjectKind::Table,
            row_count: Some(stats.row_count),
            byte_size: Some(stats.byte_size),
            current_value: None,
        });
    }

    let sequences = source
        .list_sequences()
        .await?
        .into_iter()
        .map(|seq| DiscoveredObject {
            name: seq.name,
            kind: ObjectKind::Sequence,
            row_count: None,
            byte_size: None,
            current_value: Some(seq.last_number),
        })
        .collect();

    let document = DiscoveryDocument {
        schema,
        discovered_at: Utc::now(),
        tables,
        views: plain(source.list_views().await?, ObjectKind::View),
        sequences,
        procedures: plain(source.list_procedures().await?, ObjectKind::Procedure),
        functions: plain(source.list_functions().await?, ObjectKind::Function),
        triggers: plain(source.list_triggers().await?, ObjectKind::Trigger),
        packages: plain(source.list_packages().await?, ObjectKind::Package),
    };

    info!(total = document.total_objects(), "discovery complete");
    Ok(document)
}

fn plain(names: Vec<String>, kind: ObjectKind) -> Vec<DiscoveredObject> {
    names
        .into_iter()
        .map(|name| DiscoveredObject {
            name,
            kind,
            row_count: None,
            byte_size: None,
            current_value: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::mock::MockSource;
    use model::core::value::{RowData, Value};

    #[tokio::test]
    async fn discovery_covers_every_kind() {
        let source = MockSource::new("HR")
            .with_table("EMP", "CREATE TABLE EMP (ID NUMBER)")
            .with_rows(
                "EMP",
                vec![RowData::new(vec!["ID".into()], vec![Value::Int(1)])],
            )
            .with_view("V_EMP", "CREATE VIEW V_EMP AS SELECT * FROM EMP")
            .with_sequence("EMP_SEQ", 42)
            .with_sequence("ISEQ$$_123", 7)
            .with_procedure("P1", "CREATE PROCEDURE P1 AS BEGIN NULL; END;")
            .with_package("PKG", "PACKAGE PKG IS END;", "PACKAGE BODY PKG IS END;");

        let doc = discover(&source).await.unwrap();
        assert_eq!(doc.schema, "HR");
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].row_count, Some(1));
        assert_eq!(doc.views.len(), 1);
        // The system sequence never surfaces.
        assert_eq!(doc.sequences.len(), 1);
        assert_eq!(doc.sequences[0].current_value, Some(42));
        assert_eq!(doc.procedures.len(), 1);
        assert_eq!(doc.packages.len(), 1);

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"EMP_SEQ\""));
    }
}
