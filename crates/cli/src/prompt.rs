use async_trait::async_trait;
use engine_processing::repair::ConflictPrompt;
use model::{core::identifiers::{ObjectId, ObjectKind}, migration::selection::ConflictResolution};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive OBJECT_EXISTS resolution over stdin. The repair controller
/// bounds the wait; an unanswered prompt falls back to the per-kind
/// default there.
pub struct StdinPrompt;

#[async_trait]
impl ConflictPrompt for StdinPrompt {
    async fn resolve(&self, object: &ObjectId) -> ConflictResolution {
        let options = if object.kind == ObjectKind::Table {
            "[D]rop / [S]kip / [A]ppend"
        } else {
            "[D]rop / [S]kip / [A]lter"
        };
        println!("{object} already exists on the target. {options}?");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        if reader.read_line(&mut line).await.is_err() {
            return default_for(object.kind);
        }
        match line.trim().to_uppercase().as_str() {
            "D" | "DROP" => ConflictResolution::Drop,
            "S" | "SKIP" => ConflictResolution::Skip,
            "A" | "APPEND" if object.kind == ObjectKind::Table => ConflictResolution::Append,
            "A" | "ALTER" => ConflictResolution::Alter,
            _ => default_for(object.kind),
        }
    }
}

fn default_for(kind: ObjectKind) -> ConflictResolution {
    if kind == ObjectKind::Table {
        ConflictResolution::Append
    } else {
        ConflictResolution::Drop
    }
}
