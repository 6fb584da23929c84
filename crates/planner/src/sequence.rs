use connectors::adapter::SequenceInfo;
use model::{
    core::identifiers::QualifiedName,
    migration::sequence::{
        SequenceReference, SequenceStrategy, SequenceUsage, UsageSite,
    },
};
use plsql_syntax::{
    sequence::{CallKind, scan_sequence_calls},
    trigger::classify_trigger,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use tracing::debug;

/// A sequence that becomes an IDENTITY column: which table, which column,
/// and the seed the column starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPlan {
    pub sequence: QualifiedName,
    pub table: QualifiedName,
    pub column: String,
    pub seed: i64,
    /// The simple-PK trigger made redundant by the conversion.
    pub skipped_trigger: String,
}

/// Correlates sequences with the trigger/procedure/function bodies that use
/// them and assigns each exactly one migration strategy.
pub struct SequenceAnalyzer {
    default_schema: String,
    usages: BTreeMap<QualifiedName, SequenceUsage>,
    identity_plans: Vec<IdentityPlan>,
    finalized: bool,
}

impl SequenceAnalyzer {
    pub fn new(default_schema: &str) -> Self {
        SequenceAnalyzer {
            default_schema: default_schema.to_uppercase(),
            usages: BTreeMap::new(),
            identity_plans: Vec::new(),
            finalized: false,
        }
    }

    /// Step 1: register every user sequence before any body is inspected.
    pub fn register_sequence(&mut self, info: &SequenceInfo) {
        let key = QualifiedName::new(&info.schema, &info.name);
        self.usages
            .entry(key.clone())
            .or_insert_with(|| SequenceUsage::new(key, info.last_number));
    }

    /// Step 2/3 for triggers: attribute usages and classify the trigger.
    pub fn inspect_trigger(&mut self, trigger_name: &str, ddl: &str) {
        let shape = classify_trigger(ddl);
        let calls = scan_sequence_calls(ddl);
        let trigger = QualifiedName::parse(trigger_name, &self.default_schema);
        let table = shape
            .table
            .as_deref()
            .map(|t| QualifiedName::parse(t, &self.default_schema));

        for (key, usage) in self.usages.iter_mut() {
            let (nextval, currval) = count_calls(&calls, key);
            if nextval == 0 && currval == 0 {
                continue;
            }
            usage.references.push(SequenceReference {
                site: UsageSite::Trigger,
                object: trigger.clone(),
                nextval_count: nextval,
                currval_count: currval,
            });
            if let Some(table) = &table {
                usage.associated_tables.insert(table.to_string());
            }
            if shape.is_simple_pk {
                if let (Some(table), Some(assignment)) = (&table, &shape.assignment) {
                    usage
                        .pk_columns
                        .push((table.to_string(), assignment.column.clone()));
                }
            } else {
                usage.all_triggers_simple = false;
            }
            debug!(sequence = %key, trigger = %trigger, simple = shape.is_simple_pk, "trigger usage");
        }
    }

    /// Step 2 for procedure and function bodies.
    pub fn inspect_code(&mut self, site: UsageSite, object_name: &str, body: &str) {
        let calls = scan_sequence_calls(body);
        let object = QualifiedName::parse(object_name, &self.default_schema);
        for (key, usage) in self.usages.iter_mut() {
            let (nextval, currval) = count_calls(&calls, key);
            if nextval == 0 && currval == 0 {
                continue;
            }
            usage.references.push(SequenceReference {
                site,
                object: object.clone(),
                nextval_count: nextval,
                currval_count: currval,
            });
        }
    }

    /// Step 4: the decision table, evaluated in order, first match wins.
    /// After this every registered sequence has exactly one strategy and
    /// the strategy is never recomputed.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        for usage in self.usages.values_mut() {
            let strategy = decide(usage);
            usage.strategy = Some(strategy);

            if strategy == SequenceStrategy::IdentityColumn
                && let Some((table, column)) = usage.pk_columns.first()
                && let Some(trigger_ref) = usage.trigger_references().next()
            {
                self.identity_plans.push(IdentityPlan {
                    sequence: usage.sequence.clone(),
                    table: QualifiedName::parse(table, "dbo"),
                    column: column.clone(),
                    seed: usage.current_value + 1,
                    skipped_trigger: trigger_ref.object.to_string(),
                });
            }
        }
        self.finalized = true;
    }

    pub fn strategy(&self, schema: &str, sequence: &str) -> Option<SequenceStrategy> {
        self.usages
            .get(&QualifiedName::new(schema, sequence))
            .and_then(|u| u.strategy)
    }

    pub fn usages(&self) -> impl Iterator<Item = &SequenceUsage> {
        self.usages.values()
    }

    pub fn identity_plans(&self) -> &[IdentityPlan] {
        &self.identity_plans
    }

    /// Trigger names (fully qualified) that IDENTITY conversion replaces.
    pub fn skipped_triggers(&self) -> BTreeSet<String> {
        self.identity_plans
            .iter()
            .map(|p| p.skipped_trigger.clone())
            .collect()
    }

    /// Renders `sequence_migration_plan.txt`.
    pub fn report(&self) -> String {
        let mut out = String::from("SEQUENCE MIGRATION PLAN\n=======================\n\n");
        for usage in self.usages.values() {
            let strategy = usage
                .strategy
                .map(|s| s.to_string())
                .unwrap_or_else(|| "UNANALYZED".to_string());
            let _ = writeln!(out, "{}  ->  {strategy}", usage.sequence);
            let _ = writeln!(
                out,
                "    current value: {}, NEXTVAL refs: {}, CURRVAL refs: {}",
                usage.current_value,
                usage.nextval_total(),
                usage.currval_total()
            );
            if !usage.associated_tables.is_empty() {
                let tables: Vec<&str> =
                    usage.associated_tables.iter().map(|s| s.as_str()).collect();
                let _ = writeln!(out, "    tables: {}", tables.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

fn count_calls(
    calls: &[plsql_syntax::sequence::SequenceCall],
    sequence: &QualifiedName,
) -> (usize, usize) {
    let mut nextval = 0;
    let mut currval = 0;
    for call in calls {
        let name_matches = call.sequence.eq_ignore_ascii_case(&sequence.name);
        let schema_matches = call
            .schema
            .as_ref()
            .is_none_or(|s| s.eq_ignore_ascii_case(&sequence.schema));
        if name_matches && schema_matches {
            match call.kind {
                CallKind::NextVal => nextval += 1,
                CallKind::CurrVal => currval += 1,
            }
        }
    }
    (nextval, currval)
}

/// The per-sequence decision table from the analysis contract.
fn decide(usage: &SequenceUsage) -> SequenceStrategy {
    let has_code_use =
        usage.used_in(UsageSite::Procedure) || usage.used_in(UsageSite::Function);
    let trigger_count = usage.trigger_references().count();

    if usage.associated_tables.len() == 1
        && trigger_count == 1
        && usage.all_triggers_simple
        && !has_code_use
    {
        return SequenceStrategy::IdentityColumn;
    }
    if usage.associated_tables.len() > 1 {
        return SequenceStrategy::SharedSequence;
    }
    if has_code_use {
        return SequenceStrategy::SqlServerSequence;
    }
    if usage.currval_total() > 0 {
        return SequenceStrategy::ManualReview;
    }
    if usage.nextval_total() > 0 && !usage.all_triggers_simple {
        return SequenceStrategy::SqlServerSequence;
    }
    SequenceStrategy::ManualReview
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(name: &str, value: i64) -> SequenceInfo {
        SequenceInfo {
            schema: "HR".into(),
            name: name.into(),
            last_number: value,
        }
    }

    const SIMPLE_TRIGGER: &str = r#"
CREATE OR REPLACE TRIGGER emp_bi
BEFORE INSERT ON emp FOR EACH ROW
BEGIN
  :NEW.emp_id := emp_seq.NEXTVAL;
END;
"#;

    #[test]
    fn lone_simple_trigger_becomes_identity() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("EMP_SEQ", 41));
        analyzer.inspect_trigger("EMP_BI", SIMPLE_TRIGGER);
        analyzer.finalize();

        assert_eq!(
            analyzer.strategy("HR", "EMP_SEQ"),
            Some(SequenceStrategy::IdentityColumn)
        );
        let plans = analyzer.identity_plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].column, "EMP_ID");
        assert_eq!(plans[0].seed, 42);
        assert!(analyzer.skipped_triggers().contains("HR.EMP_BI"));
    }

    #[test]
    fn procedure_use_forces_sql_server_sequence() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("EMP_SEQ", 0));
        analyzer.inspect_trigger("EMP_BI", SIMPLE_TRIGGER);
        analyzer.inspect_code(
            UsageSite::Procedure,
            "NEW_EMP",
            "BEGIN SELECT emp_seq.NEXTVAL INTO v_id FROM dual; END;",
        );
        analyzer.finalize();

        assert_eq!(
            analyzer.strategy("HR", "EMP_SEQ"),
            Some(SequenceStrategy::SqlServerSequence)
        );
        assert!(analyzer.identity_plans().is_empty());
    }

    #[test]
    fn two_tables_share_the_sequence() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("ID_SEQ", 9));
        analyzer.inspect_trigger(
            "A_BI",
            "CREATE TRIGGER a_bi BEFORE INSERT ON a FOR EACH ROW BEGIN :NEW.id := id_seq.NEXTVAL; END;",
        );
        analyzer.inspect_trigger(
            "B_BI",
            "CREATE TRIGGER b_bi BEFORE INSERT ON b FOR EACH ROW BEGIN :NEW.id := id_seq.NEXTVAL; END;",
        );
        analyzer.finalize();

        assert_eq!(
            analyzer.strategy("HR", "ID_SEQ"),
            Some(SequenceStrategy::SharedSequence)
        );
    }

    #[test]
    fn currval_only_requires_manual_review() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("AUDIT_SEQ", 0));
        analyzer.inspect_trigger(
            "AUD_TRG",
            "CREATE TRIGGER aud_trg BEFORE INSERT ON logs FOR EACH ROW BEGIN :NEW.batch_id := audit_seq.CURRVAL; SELECT 1 INTO x FROM dual; END;",
        );
        analyzer.finalize();

        assert_eq!(
            analyzer.strategy("HR", "AUDIT_SEQ"),
            Some(SequenceStrategy::ManualReview)
        );
    }

    #[test]
    fn nextval_in_complex_trigger_becomes_sequence() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("EMP_SEQ", 0));
        analyzer.inspect_trigger(
            "EMP_BI",
            r#"
CREATE TRIGGER emp_bi BEFORE INSERT ON emp FOR EACH ROW
BEGIN
  :NEW.emp_id := emp_seq.NEXTVAL;
  INSERT INTO emp_audit VALUES (:NEW.emp_id);
END;
"#,
        );
        analyzer.finalize();

        assert_eq!(
            analyzer.strategy("HR", "EMP_SEQ"),
            Some(SequenceStrategy::SqlServerSequence)
        );
    }

    #[test]
    fn unused_sequence_goes_to_manual_review() {
        let mut analyzer = SequenceAnalyzer::new("HR");
        analyzer.register_sequence(&seq("ORPHAN_SEQ", 5));
        analyzer.finalize();
        assert_eq!(
            analyzer.strategy("HR", "ORPHAN_SEQ"),
            Some(SequenceStrategy::ManualReview)
        );
    }

    #[test]
    fn analysis_is_deterministic() {
        let build = || {
            let mut analyzer = SequenceAnalyzer::new("HR");
            analyzer.register_sequence(&seq("EMP_SEQ", 41));
            analyzer.register_sequence(&seq("ID_SEQ", 1));
            analyzer.inspect_trigger("EMP_BI", SIMPLE_TRIGGER);
            analyzer.finalize();
            analyzer.report()
        };
        assert_eq!(build(), build());
    }
}
