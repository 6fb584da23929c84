use model::{
    core::identifiers::QualifiedName,
    migration::fk::{ForeignKeyDef, ReferentialAction},
};
use plsql_syntax::fk::{FkClause, strip_foreign_keys};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Holds every foreign key stripped from table DDL during translation and
/// re-emits them as ALTER TABLE statements once all selected tables exist.
/// Lives for exactly one run.
pub struct FkManager {
    default_schema: String,
    /// keyed by lowercased `schema.table` of the owning table.
    store: BTreeMap<String, Vec<ForeignKeyDef>>,
}

impl FkManager {
    pub fn new(default_schema: &str) -> Self {
        FkManager {
            default_schema: default_schema.to_string(),
            store: BTreeMap::new(),
        }
    }

    /// Strips FK clauses from a table's DDL, stores their definitions, and
    /// returns the DDL without them. Clauses failing validation are logged
    /// and dropped rather than failing the table.
    pub fn strip_table_ddl(&mut self, table: &QualifiedName, ddl: &str) -> String {
        let stripped = strip_foreign_keys(ddl);
        if stripped.clauses.is_empty() {
            return stripped.ddl;
        }

        let mut defs = Vec::with_capacity(stripped.clauses.len());
        for clause in stripped.clauses {
            let def = self.to_definition(table, clause);
            match def.validate() {
                Ok(()) => {
                    debug!(constraint = %def.constraint_name, table = %table, "stored stripped FK");
                    defs.push(def);
                }
                Err(err) => {
                    warn!(table = %table, error = %err, "dropping invalid FK clause");
                }
            }
        }
        self.store.entry(key(table)).or_default().extend(defs);
        stripped.ddl
    }

    fn to_definition(&self, table: &QualifiedName, clause: FkClause) -> ForeignKeyDef {
        ForeignKeyDef {
            constraint_name: clause.constraint_name,
            source_table: table.clone(),
            source_columns: clause.columns,
            referenced_table: QualifiedName::parse(&clause.referenced, &self.default_schema),
            referenced_columns: clause.referenced_columns,
            on_delete: clause.on_delete.as_deref().and_then(parse_action),
            on_update: clause.on_update.as_deref().and_then(parse_action),
        }
    }

    pub fn stripped_count(&self, table: &QualifiedName) -> usize {
        self.store.get(&key(table)).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.store.values().all(Vec::is_empty)
    }

    /// All stored definitions in application order:
    /// 1. FKs whose referenced table has no outgoing FKs of its own,
    /// 2. the general population,
    /// 3. self-referencing FKs last.
    pub fn ordered_definitions(&self) -> Vec<&ForeignKeyDef> {
        let tables_with_outgoing: HashSet<String> = self
            .store
            .iter()
            .filter(|(_, defs)| !defs.is_empty())
            .map(|(table, _)| table.clone())
            .collect();

        let mut leaves = Vec::new();
        let mut general = Vec::new();
        let mut self_refs = Vec::new();

        for def in self.store.values().flatten() {
            if def.is_self_referencing() {
                self_refs.push(def);
            } else if !tables_with_outgoing.contains(&key(&def.referenced_table)) {
                leaves.push(def);
            } else {
                general.push(def);
            }
        }

        leaves
            .into_iter()
            .chain(general)
            .chain(self_refs)
            .collect()
    }

    /// Renders the audit script persisted before execution. Each statement
    /// is its own batch so one failure cannot mask the rest.
    pub fn build_script(&self) -> String {
        let mut out = String::from("-- Foreign keys stripped during table translation,\n-- reapplied after all selected tables exist.\n\n");
        for def in self.ordered_definitions() {
            out.push_str(&def.to_alter_statement());
            out.push_str("\nGO\n");
        }
        out
    }
}

fn key(table: &QualifiedName) -> String {
    table.to_string().to_lowercase()
}

fn parse_action(raw: &str) -> Option<ReferentialAction> {
    match raw.to_uppercase().as_str() {
        "CASCADE" => Some(ReferentialAction::Cascade),
        "SET NULL" => Some(ReferentialAction::SetNull),
        "SET DEFAULT" => Some(ReferentialAction::SetDefault),
        "NO ACTION" => Some(ReferentialAction::NoAction),
        other => {
            warn!(action = other, "unrecognized referential action");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPLOYEES_DDL: &str = r#"
CREATE TABLE [dbo].[EMPLOYEES] (
    EMP_ID INT NOT NULL PRIMARY KEY,
    DEPT_ID INT,
    MGR_ID INT,
    CONSTRAINT FK_EMP_DEPT FOREIGN KEY (DEPT_ID) REFERENCES DEPARTMENTS (DEPT_ID),
    CONSTRAINT FK_EMP_MGR FOREIGN KEY (MGR_ID) REFERENCES EMPLOYEES (EMP_ID)
)
"#;

    fn employees() -> QualifiedName {
        QualifiedName::new("dbo", "EMPLOYEES")
    }

    #[test]
    fn created_table_contains_neither_constraint() {
        let mut manager = FkManager::new("dbo");
        let cleaned = manager.strip_table_ddl(&employees(), EMPLOYEES_DDL);
        assert!(!cleaned.to_uppercase().contains("FOREIGN KEY"));
        assert_eq!(manager.stripped_count(&employees()), 2);
    }

    #[test]
    fn self_referencing_fk_is_emitted_last() {
        let mut manager = FkManager::new("dbo");
        manager.strip_table_ddl(&employees(), EMPLOYEES_DDL);

        let ordered = manager.ordered_definitions();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].constraint_name, "FK_EMP_DEPT");
        assert_eq!(ordered[1].constraint_name, "FK_EMP_MGR");
        assert!(ordered[1].is_self_referencing());
    }

    #[test]
    fn leaf_references_come_first() {
        let mut manager = FkManager::new("dbo");
        // ORDERS -> EMPLOYEES (which has its own FKs), ORDERS -> STATUS (a leaf).
        manager.strip_table_ddl(&employees(), EMPLOYEES_DDL);
        manager.strip_table_ddl(
            &QualifiedName::new("dbo", "ORDERS"),
            "CREATE TABLE ORDERS (ID INT, EMP_ID INT, STATUS_ID INT, \
             CONSTRAINT FK_ORD_EMP FOREIGN KEY (EMP_ID) REFERENCES EMPLOYEES (EMP_ID), \
             CONSTRAINT FK_ORD_STATUS FOREIGN KEY (STATUS_ID) REFERENCES STATUS (ID))",
        );

        let ordered: Vec<&str> = manager
            .ordered_definitions()
            .iter()
            .map(|d| d.constraint_name.as_str())
            .collect();

        let leaf_pos = ordered.iter().position(|n| *n == "FK_ORD_STATUS").unwrap();
        let general_pos = ordered.iter().position(|n| *n == "FK_ORD_EMP").unwrap();
        let self_pos = ordered.iter().position(|n| *n == "FK_EMP_MGR").unwrap();
        assert!(leaf_pos < general_pos);
        assert!(general_pos < self_pos);
    }

    #[test]
    fn script_round_trips_names_and_columns() {
        let mut manager = FkManager::new("dbo");
        manager.strip_table_ddl(
            &employees(),
            "CREATE TABLE EMPLOYEES (A INT, B INT, \
             CONSTRAINT FK_AB FOREIGN KEY (A, B) REFERENCES [dbo].[PAIR] (X, Y) ON DELETE CASCADE)",
        );

        let script = manager.build_script();
        assert!(script.contains(
            "ALTER TABLE [dbo].[EMPLOYEES] ADD CONSTRAINT [FK_AB] FOREIGN KEY ([A], [B]) \
             REFERENCES [dbo].[PAIR] ([X], [Y]) ON DELETE CASCADE;"
        ));
        assert!(script.contains("GO"));
    }

    #[test]
    fn unqualified_reference_gets_default_schema() {
        let mut manager = FkManager::new("dbo");
        manager.strip_table_ddl(
            &employees(),
            "CREATE TABLE X (A INT, CONSTRAINT FK FOREIGN KEY (A) REFERENCES DEPARTMENTS (ID))",
        );
        let defs = manager.ordered_definitions();
        assert_eq!(defs[0].referenced_table.schema, "dbo");
        assert_eq!(defs[0].referenced_table.name, "DEPARTMENTS");
    }
}
