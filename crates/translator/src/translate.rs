use crate::{
    error::TranslateError,
    providers::LanguageModel,
    rules, sanitize,
};
use engine_core::memory::SharedMemory;
use model::{
    core::identifiers::ObjectKind,
    migration::selection::ConflictStrategy,
};
use model::core::identifiers::QualifiedName;
use planner::{fk_manager::FkManager, identity::inject_identity, sequence::IdentityPlan};
use std::sync::Arc;
use tracing::{debug, warn};

const TRANSLATE_SYSTEM_PROMPT: &str = "\
You are a database migration assistant converting Oracle PL/SQL to \
Microsoft SQL Server T-SQL. Return only the converted T-SQL, with no \
commentary. Use bracket-quoted identifiers, keep the object name you are \
given, and never emit Oracle-only constructs (VARCHAR2, NVL, SYSDATE, \
DUAL, ROWNUM, MINUS, :NEW/:OLD, DECODE, packages). Use standalone GO \
lines between batches only when strictly required.";

/// Extra context carried into a re-translation after a deploy failure.
#[derive(Debug, Clone, Default)]
pub struct RepairHints {
    pub root_cause: String,
    pub fix_strategy: String,
    pub confidence: String,
    pub prior_errors: Vec<String>,
    pub memory_solutions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationRequest<'a> {
    pub object_name: &'a str,
    pub kind: ObjectKind,
    pub source_text: &'a str,
    pub repair: Option<&'a RepairHints>,
}

/// Converts Oracle object text to T-SQL. The rule engine is the primary
/// backend for tables, views and sequences; PL/SQL code objects go to the
/// language model when one is configured, with a lexical pass as the
/// fallback. Stateless between calls apart from reading SharedMemory.
pub struct Translator {
    llm: Option<Arc<dyn LanguageModel>>,
    memory: Arc<SharedMemory>,
    default_schema: String,
    conflict_strategy: Option<ConflictStrategy>,
}

impl Translator {
    pub fn new(
        memory: Arc<SharedMemory>,
        default_schema: &str,
        conflict_strategy: Option<ConflictStrategy>,
    ) -> Self {
        Translator {
            llm: None,
            memory,
            default_schema: default_schema.to_string(),
            conflict_strategy,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    fn qualified(&self, name: &str) -> String {
        QualifiedName::new(&self.default_schema, name).bracketed()
    }

    fn or_alter(&self) -> bool {
        matches!(
            self.conflict_strategy,
            Some(ConflictStrategy::CreateOrAlter)
        )
    }

    /// Translates a non-table object. Tables go through `translate_table`
    /// so the FK manager and identity converter see them.
    pub async fn translate(
        &self,
        request: &TranslationRequest<'_>,
    ) -> Result<String, TranslateError> {
        let target = match request.kind {
            ObjectKind::Table => {
                return Err(TranslateError::NoBackend {
                    kind: "TABLE (use translate_table)".into(),
                    object: request.object_name.to_string(),
                });
            }
            ObjectKind::View => {
                let converted = rules::apply_sql_rules(request.source_text);
                rules::retarget_create_header(
                    &converted,
                    &self.qualified(request.object_name),
                    self.or_alter(),
                )
            }
            ObjectKind::Sequence => {
                let converted = rules::convert_sequence_ddl(request.source_text);
                rules::retarget_create_header(
                    &converted,
                    &self.qualified(request.object_name),
                    false,
                )
            }
            ObjectKind::Procedure
            | ObjectKind::Function
            | ObjectKind::Trigger
            | ObjectKind::Package
            | ObjectKind::PackageMember => self.translate_code(request).await?,
        };

        let finished = target.trim().to_string();
        if finished.is_empty() {
            return Err(TranslateError::EmptyOutput(request.object_name.to_string()));
        }
        Ok(finished)
    }

    /// Table DDL path: rule conversion, header retargeting, FK stripping,
    /// IDENTITY injection when a conversion plan covers this table.
    pub async fn translate_table(
        &self,
        request: &TranslationRequest<'_>,
        fk_manager: &mut FkManager,
        identity: Option<&IdentityPlan>,
    ) -> Result<String, TranslateError> {
        let converted = rules::convert_table_ddl(request.source_text);
        let retargeted = rules::retarget_create_header(
            &converted,
            &self.qualified(request.object_name),
            false,
        );
        let table = QualifiedName::new(&self.default_schema, request.object_name);
        let stripped = fk_manager.strip_table_ddl(&table, &retargeted);

        let finished = match identity {
            Some(plan) => inject_identity(&stripped, plan),
            None => stripped,
        };
        let finished = finished.trim().to_string();
        if finished.is_empty() {
            return Err(TranslateError::EmptyOutput(request.object_name.to_string()));
        }
        Ok(finished)
    }

    async fn translate_code(
        &self,
        request: &TranslationRequest<'_>,
    ) -> Result<String, TranslateError> {
        let Some(llm) = &self.llm else {
            debug!(object = request.object_name, "no language model, using lexical pass");
            let converted = rules::lexical_code_pass(request.source_text);
            return Ok(rules::retarget_create_header(
                &converted,
                &self.qualified(request.object_name),
                self.or_alter(),
            ));
        };

        let payload = self.build_payload(request).await;
        let response = llm.complete(TRANSLATE_SYSTEM_PROMPT, &payload).await?;
        let sql = sanitize::extract_sql(&response);

        // The model's output still goes through the mechanical passes so a
        // stray Oracle token cannot reach the target.
        let scrubbed = rules::lexical_code_pass(&sql);
        let leftovers = sanitize::find_oracle_tokens(&scrubbed);
        if !leftovers.is_empty() {
            warn!(
                object = request.object_name,
                tokens = ?leftovers,
                "translation retains source-dialect tokens after scrubbing"
            );
        }
        Ok(rules::retarget_create_header(
            &scrubbed,
            &self.qualified(request.object_name),
            self.or_alter(),
        ))
    }

    async fn build_payload(&self, request: &TranslationRequest<'_>) -> String {
        let mut payload = format!(
            "Convert this Oracle {} to T-SQL. Target object name: {}.\n\n{}\n",
            request.kind,
            self.qualified(request.object_name),
            request.source_text
        );

        if let Some(hints) = request.repair {
            payload.push_str("\nA previous attempt failed to deploy. Repair context:\n");
            if !hints.root_cause.is_empty() {
                payload.push_str(&format!(
                    "Root cause ({} confidence): {}\n",
                    hints.confidence, hints.root_cause
                ));
            }
            if !hints.fix_strategy.is_empty() {
                payload.push_str(&format!("Fix strategy: {}\n", hints.fix_strategy));
            }
            for (idx, error) in hints.prior_errors.iter().enumerate() {
                payload.push_str(&format!("Attempt {} error: {}\n", idx + 1, error));
            }
            for solution in &hints.memory_solutions {
                payload.push_str(&format!("Known fix for similar errors: {solution}\n"));
            }
        } else if let Some(hints) = self.memory_hints(request).await {
            payload.push_str(&hints);
        }

        payload
    }

    /// First-attempt hint: identity columns recorded for the object, so
    /// code referencing them is generated correctly.
    async fn memory_hints(&self, request: &TranslationRequest<'_>) -> Option<String> {
        let table = format!("{}.{}", self.default_schema, request.object_name);
        let identity = self.memory.identity_columns(&table).await;
        (!identity.is_empty()).then(|| {
            format!(
                "\nNote: column(s) {} of {} are IDENTITY on the target.\n",
                identity.join(", "),
                table
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::scripted::ScriptedModel;

    fn translator() -> Translator {
        Translator::new(
            Arc::new(SharedMemory::in_memory()),
            "dbo",
            Some(ConflictStrategy::CreateOrAlter),
        )
    }

    #[tokio::test]
    async fn view_translation_is_rule_based() {
        let request = TranslationRequest {
            object_name: "V_DIFF",
            kind: ObjectKind::View,
            source_text: "CREATE OR REPLACE VIEW v_diff AS SELECT a FROM t1 MINUS SELECT a FROM t2",
            repair: None,
        };
        let sql = translator().translate(&request).await.unwrap();
        assert!(sql.starts_with("CREATE OR ALTER VIEW [dbo].[V_DIFF]"));
        assert!(sql.contains("EXCEPT"));
        assert!(!sql.contains("MINUS"));
    }

    #[tokio::test]
    async fn table_translation_strips_fks_and_injects_identity() {
        use model::core::identifiers::QualifiedName;

        let request = TranslationRequest {
            object_name: "EMP",
            kind: ObjectKind::Table,
            source_text: "CREATE TABLE \"HR\".\"EMP\" (\n  EMP_ID NUMBER NOT NULL PRIMARY KEY,\n  DEPT_ID NUMBER(9),\n  CONSTRAINT FK_EMP_DEPT FOREIGN KEY (DEPT_ID) REFERENCES DEPT (ID)\n)",
            repair: None,
        };
        let mut fk_manager = FkManager::new("dbo");
        let plan = IdentityPlan {
            sequence: QualifiedName::new("HR", "EMP_SEQ"),
            table: QualifiedName::new("dbo", "EMP"),
            column: "EMP_ID".into(),
            seed: 1,
            skipped_trigger: "HR.EMP_BI".into(),
        };

        let sql = translator()
            .translate_table(&request, &mut fk_manager, Some(&plan))
            .await
            .unwrap();

        assert!(sql.starts_with("CREATE TABLE [dbo].[EMP]"));
        assert!(sql.contains("EMP_ID INT IDENTITY(1,1) NOT NULL PRIMARY KEY"));
        assert!(!sql.to_uppercase().contains("FOREIGN KEY"));
        assert_eq!(
            fk_manager.stripped_count(&QualifiedName::new("dbo", "EMP")),
            1
        );
    }

    #[tokio::test]
    async fn code_translation_uses_the_model_and_scrubs_output() {
        let model = Arc::new(ScriptedModel::new());
        model.respond(
            "GET_BONUS",
            "```sql\nCREATE FUNCTION [dbo].[GET_BONUS] (@id INT) RETURNS INT AS\nBEGIN\n  RETURN (SELECT NVL(bonus, 0) FROM pay WHERE emp_id = @id)\nEND\n```",
        );

        let request = TranslationRequest {
            object_name: "GET_BONUS",
            kind: ObjectKind::Function,
            source_text: "CREATE OR REPLACE FUNCTION GET_BONUS (p_id NUMBER) RETURN NUMBER IS BEGIN RETURN NVL(x, 0); END;",
            repair: None,
        };
        let sql = translator()
            .with_llm(model.clone())
            .translate(&request)
            .await
            .unwrap();

        assert!(sql.contains("ISNULL(bonus, 0)"));
        assert!(!sql.contains("NVL("));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn repair_hints_reach_the_model_payload() {
        let model = Arc::new(ScriptedModel::new());
        let hints = RepairHints {
            root_cause: "MINUS is not a T-SQL operator".into(),
            fix_strategy: "replace MINUS with EXCEPT".into(),
            confidence: "high".into(),
            prior_errors: vec!["Incorrect syntax near 'MINUS'.".into()],
            memory_solutions: vec!["use EXCEPT".into()],
        };
        let request = TranslationRequest {
            object_name: "P1",
            kind: ObjectKind::Procedure,
            source_text: "CREATE OR REPLACE PROCEDURE p1 IS BEGIN NULL; END;",
            repair: Some(&hints),
        };
        translator()
            .with_llm(model.clone())
            .translate(&request)
            .await
            .unwrap();

        let payload = &model.calls()[0];
        assert!(payload.contains("Root cause (high confidence)"));
        assert!(payload.contains("replace MINUS with EXCEPT"));
        assert!(payload.contains("Attempt 1 error"));
    }

    #[tokio::test]
    async fn without_model_code_gets_lexical_pass() {
        let request = TranslationRequest {
            object_name: "TRG",
            kind: ObjectKind::Trigger,
            source_text: "CREATE OR REPLACE TRIGGER trg BEFORE INSERT ON t FOR EACH ROW BEGIN :NEW.id := 1; END;",
            repair: None,
        };
        let sql = translator().translate(&request).await.unwrap();
        assert!(sql.contains("CREATE OR ALTER TRIGGER"));
        assert!(sql.contains("inserted."));
        assert!(!sql.contains(":NEW"));
    }
}
