use crate::run_migration;
use connectors::mock::{MockSource, MockTarget};
use engine_core::settings::RunSettings;
use model::{
    core::{
        identifiers::ObjectKind,
        value::{ColumnMetadata, RowData, Value},
    },
    migration::{
        object::ObjectStatus,
        selection::{ConflictStrategy, MigrationSelection},
    },
};
use std::sync::Arc;
use translator::providers::scripted::ScriptedModel;

fn column(name: &str, identity: bool) -> ColumnMetadata {
    ColumnMetadata {
        name: name.to_string(),
        data_type: "int".into(),
        nullable: false,
        is_identity: identity,
        is_lob: false,
    }
}

fn selection() -> MigrationSelection {
    MigrationSelection::default()
}

/// Scenario: a sequence feeding one simple-PK trigger becomes an IDENTITY
/// column; the trigger is skipped and the data load is wrapped in
/// IDENTITY_INSERT with a reseed at the end.
#[tokio::test]
async fn simple_pk_sequence_becomes_identity() {
    let source = MockSource::new("HR")
        .with_table(
            "EMP",
            "CREATE TABLE \"HR\".\"EMP\" (\n    EMP_ID NUMBER NOT NULL PRIMARY KEY,\n    ENAME VARCHAR2(50)\n)",
        )
        .with_sequence("EMP_SEQ", 0)
        .with_trigger(
            "EMP_BI",
            "CREATE OR REPLACE TRIGGER emp_bi\nBEFORE INSERT ON emp\nFOR EACH ROW\nBEGIN\n  :NEW.emp_id := emp_seq.NEXTVAL;\nEND;",
        )
        .with_rows(
            "EMP",
            vec![
                RowData::new(
                    vec!["EMP_ID".into(), "ENAME".into()],
                    vec![Value::Int(1), Value::Text("KING".into())],
                ),
                RowData::new(
                    vec!["EMP_ID".into(), "ENAME".into()],
                    vec![Value::Int(2), Value::Text("SCOTT".into())],
                ),
            ],
        );

    let target = Arc::new(MockTarget::new());
    target.set_columns("dbo", "EMP", vec![column("EMP_ID", true), column("ENAME", false)]);

    let mut selection = selection();
    selection.tables.insert("EMP".into());
    selection.triggers.insert("EMP_BI".into());
    selection.sequences.insert("EMP_SEQ".into());
    selection.include_data.insert("EMP".into(), true);

    let (report, _memory) =
        run_migration(source, target.clone(), selection, RunSettings::default(), None).await;

    // The created table carries the IDENTITY column seeded past the
    // sequence's high-water mark.
    let executed = target.executed();
    let create = executed
        .iter()
        .find(|s| s.contains("CREATE TABLE [dbo].[EMP]"))
        .expect("table must be created");
    assert!(create.contains("EMP_ID INT IDENTITY(1,1) NOT NULL PRIMARY KEY"));

    // The trigger never reaches the target.
    assert!(!executed.iter().any(|s| s.to_uppercase().contains("CREATE TRIGGER")));
    let trigger_result = report
        .objects
        .iter()
        .find(|o| o.id.qualified.name == "EMP_BI")
        .expect("trigger result recorded");
    assert_eq!(trigger_result.status, ObjectStatus::Skipped);

    // Copy wrapped in IDENTITY_INSERT, reseeded afterwards.
    assert!(executed.iter().any(|s| s.contains("SET IDENTITY_INSERT [dbo].[EMP] ON")));
    assert!(executed.iter().any(|s| s.contains("SET IDENTITY_INSERT [dbo].[EMP] OFF")));
    assert!(executed.iter().any(|s| s.contains("DBCC CHECKIDENT")));
    assert_eq!(report.copies.len(), 1);
    assert_eq!(report.copies[0].rows_written, 2);

    // IDENTITY strategy emits no sequence DDL.
    assert!(!executed.iter().any(|s| s.to_uppercase().contains("CREATE SEQUENCE")));
}

/// Scenario: foreign keys are stripped from CREATE TABLE, applied after all
/// tables exist, and the self-referencing constraint goes last.
#[tokio::test]
async fn two_phase_fk_with_self_reference() {
    let source = MockSource::new("HR")
        .with_table(
            "DEPARTMENTS",
            "CREATE TABLE DEPARTMENTS (\n    DEPT_ID NUMBER(9) NOT NULL PRIMARY KEY,\n    DNAME VARCHAR2(30)\n)",
        )
        .with_table(
            "EMPLOYEES",
            "CREATE TABLE EMPLOYEES (\n    EMP_ID NUMBER(9) NOT NULL PRIMARY KEY,\n    DEPT_ID NUMBER(9),\n    MGR_ID NUMBER(9),\n    CONSTRAINT FK_EMP_DEPT FOREIGN KEY (DEPT_ID) REFERENCES DEPARTMENTS (DEPT_ID),\n    CONSTRAINT FK_EMP_MGR FOREIGN KEY (MGR_ID) REFERENCES EMPLOYEES (EMP_ID)\n)",
        );

    let target = Arc::new(MockTarget::new());
    let mut selection = selection();
    selection.tables.insert("DEPARTMENTS".into());
    selection.tables.insert("EMPLOYEES".into());

    let (report, _memory) =
        run_migration(source, target.clone(), selection, RunSettings::default(), None).await;

    let executed = target.executed();
    let creates: Vec<&String> = executed
        .iter()
        .filter(|s| s.contains("CREATE TABLE"))
        .collect();
    assert_eq!(creates.len(), 2);
    assert!(creates.iter().all(|s| !s.to_uppercase().contains("FOREIGN KEY")));

    // Both constraints come back as ALTER TABLE, self-reference last.
    let alters: Vec<&String> = executed
        .iter()
        .filter(|s| s.starts_with("ALTER TABLE"))
        .collect();
    assert_eq!(alters.len(), 2);
    assert!(alters[0].contains("FK_EMP_DEPT"));
    assert!(alters[1].contains("FK_EMP_MGR"));

    // Every create precedes every alter.
    let last_create = executed
        .iter()
        .rposition(|s| s.contains("CREATE TABLE"))
        .unwrap();
    let first_alter = executed
        .iter()
        .position(|s| s.starts_with("ALTER TABLE"))
        .unwrap();
    assert!(last_create < first_alter);

    assert_eq!(report.foreign_keys.len(), 2);
    assert!(report.foreign_keys.iter().all(|fk| fk.applied));

    // Stripped count equals applied count plus reported failures.
    assert_eq!(
        report.foreign_keys.iter().filter(|fk| fk.applied).count()
            + report.foreign_keys.iter().filter(|fk| !fk.applied).count(),
        2
    );
}

/// Scenario: an Oracle package with three overloads of `process` and a
/// private helper decomposes into four standalone units with mangled
/// names; internal calls use the new names.
#[tokio::test]
async fn package_decomposition_with_overloads() {
    let spec = r#"
CREATE OR REPLACE PACKAGE PKG_X IS
  PROCEDURE process(p_id NUMBER);
  PROCEDURE process(p_name VARCHAR2);
  PROCEDURE process(p_id NUMBER, p_date DATE);
END PKG_X;
"#;
    let body = r#"
CREATE OR REPLACE PACKAGE BODY PKG_X IS
  PROCEDURE audit(p_msg VARCHAR2) IS
  BEGIN
    NULL;
  END audit;

  PROCEDURE process(p_id NUMBER) IS
  BEGIN
    audit('by id');
  END;

  PROCEDURE process(p_name VARCHAR2) IS
  BEGIN
    audit('by name');
  END;

  PROCEDURE process(p_id NUMBER, p_date DATE) IS
  BEGIN
    process(p_id);
  END;
END PKG_X;
"#;
    let source = MockSource::new("HR").with_package("PKG_X", spec, body);
    let target = Arc::new(MockTarget::new());

    // The model answers with ready T-SQL per unit; payloads already carry
    // the rewritten member calls.
    let model = Arc::new(ScriptedModel::new());
    for name in [
        "PKG_X__internal_audit",
        "PKG_X_process_v0",
        "PKG_X_process_v1",
        "PKG_X_process_v2",
    ] {
        model.respond(
            &format!("[dbo].[{name}]"),
            &format!("CREATE PROCEDURE [dbo].[{name}] AS\nBEGIN\n    SELECT 1 AS placeholder;\nEND"),
        );
    }

    let mut selection = selection();
    selection.packages.insert("PKG_X".into());

    let (report, _memory) = run_migration(
        source,
        target.clone(),
        selection,
        RunSettings::default(),
        Some(model.clone()),
    )
    .await;

    for name in [
        "PKG_X_process_v0",
        "PKG_X_process_v1",
        "PKG_X_process_v2",
        "PKG_X__internal_audit",
    ] {
        assert!(
            report
                .objects
                .iter()
                .any(|o| o.id.qualified.name == name
                    && o.status == ObjectStatus::Deployed
                    && o.id.kind == ObjectKind::PackageMember),
            "unit {name} must deploy"
        );
    }

    // The two-argument overload's internal call was rewritten by arity
    // before the payload reached the model.
    let payloads = model.calls();
    let v2_payload = payloads
        .iter()
        .find(|p| p.contains("[dbo].[PKG_X_process_v2]"))
        .expect("v2 payload");
    assert!(v2_payload.contains("PKG_X_process_v0(p_id)"));

    let v0_payload = payloads
        .iter()
        .find(|p| p.contains("[dbo].[PKG_X_process_v0]"))
        .expect("v0 payload");
    assert!(v0_payload.contains("PKG_X__internal_audit('by id')"));
}

/// Scenario: a view using MINUS fails on the first deploy, the analyzer
/// classifies SYNTAX and names MINUS, the re-translation emits EXCEPT and
/// the second deploy succeeds. The error→fix pair lands in shared memory.
#[tokio::test]
async fn minus_view_repairs_to_except() {
    let source = MockSource::new("HR").with_view(
        "V_DIFF",
        "CREATE OR REPLACE VIEW v_diff AS SELECT a FROM t1 MINUS SELECT a FROM t2",
    );
    let target = Arc::new(MockTarget::new());
    target.fail_matching("V_DIFF", "Incorrect syntax near the keyword 'MINUS'.", 1);

    let mut selection = selection();
    selection.views.insert("V_DIFF".into());

    let (report, memory) =
        run_migration(source, target.clone(), selection, RunSettings::default(), None).await;

    assert_eq!(report.totals.deployed, 1);
    let view = &report.objects[0];
    assert_eq!(view.status, ObjectStatus::Deployed);
    assert_eq!(view.attempts, 1);

    let executed = target.executed();
    assert!(executed.iter().any(|s| s.contains("EXCEPT")));

    let solutions = memory
        .ranked_solutions("Incorrect syntax near the keyword 'MINUS'.", 3)
        .await;
    assert!(!solutions.is_empty(), "the fix must be memorized");
}

/// Scenario: three mutually dependent procedures deploy across dependency
/// cycles; CREATE OR ALTER placeholders break the cycle on the second pass.
#[tokio::test]
async fn dependency_cycle_resolves_in_two_passes() {
    let source = MockSource::new("HR")
        .with_procedure("P1", "CREATE OR REPLACE PROCEDURE p1 AS BEGIN EXEC dbo.P2; END;")
        .with_procedure("P2", "CREATE OR REPLACE PROCEDURE p2 AS BEGIN EXEC dbo.P3; END;")
        .with_procedure("P3", "CREATE OR REPLACE PROCEDURE p3 AS BEGIN EXEC dbo.P1; END;");

    let target = Arc::new(MockTarget::new());
    // First attempts fail on the not-yet-deployed callee.
    target.fail_matching("[dbo].[P1]", "Could not find stored procedure 'dbo.P2'.", 1);
    target.fail_matching("[dbo].[P2]", "Could not find stored procedure 'dbo.P3'.", 1);

    let mut selection = selection();
    selection.procedures.insert("P1".into());
    selection.procedures.insert("P2".into());
    selection.procedures.insert("P3".into());

    let mut settings = RunSettings::default();
    settings.conflict_strategy = Some(ConflictStrategy::CreateOrAlter);

    let (report, _memory) = run_migration(source, target.clone(), selection, settings, None).await;

    assert_eq!(report.totals.deployed, 3, "all three procedures deploy");
    assert!(report.unresolved_dependencies.is_empty());
    for name in ["P1", "P2", "P3"] {
        assert!(target.has_object("dbo", name));
    }

    let executed = target.executed();
    assert!(
        executed
            .iter()
            .any(|s| s.contains("CREATE OR ALTER PROCEDURE [dbo].[P1]")),
        "placeholder semantics require CREATE OR ALTER"
    );
}

/// Scenario: CLOB rows arrive as materialized strings and the copy reports
/// the authoritative row count, never the driver's -1.
#[tokio::test]
async fn lob_copy_reports_authoritative_counts() {
    let rows: Vec<RowData> = (1..=5)
        .map(|i| {
            RowData::new(
                vec!["ID".into(), "BODY".into()],
                vec![Value::Int(i), Value::Text(format!("document body {i}"))],
            )
        })
        .collect();
    let source = MockSource::new("HR")
        .with_table(
            "STG_DOCS",
            "CREATE TABLE STG_DOCS (\n    ID NUMBER(9) NOT NULL PRIMARY KEY,\n    BODY CLOB\n)",
        )
        .with_rows("STG_DOCS", rows);

    let target = Arc::new(MockTarget::new());
    target.set_columns(
        "dbo",
        "STG_DOCS",
        vec![column("ID", false), column("BODY", false)],
    );

    let mut selection = selection();
    selection.tables.insert("STG_DOCS".into());
    selection.include_data.insert("STG_DOCS".into(), true);

    let (report, _memory) =
        run_migration(source, target.clone(), selection, RunSettings::default(), None).await;

    assert_eq!(report.copies.len(), 1);
    assert_eq!(report.copies[0].rows_written, 5);
    assert!(report.copy_failures.is_empty());

    // Values reached the driver as concrete text, not locators.
    for row in target.inserted_rows("dbo", "STG_DOCS") {
        assert!(matches!(row.get("BODY"), Some(Value::Text(_))));
    }

    // The copy engine trusts @@ROWCOUNT; read and written totals agree.
    assert!(report.copies.iter().all(|c| c.rows_written == c.rows_read));
}
