use connectors::adapter::TargetAdapter;
use engine_core::memory::SharedMemory;
use model::core::identifiers::{ObjectId, QualifiedName};
use std::sync::Arc;
use tracing::debug;

/// One object waiting on references that were missing at deploy time.
#[derive(Debug, Clone)]
pub struct PendingObject {
    pub id: ObjectId,
    pub unresolved: Vec<String>,
}

/// Queue of objects that failed with a dependency-category error. After
/// each deployment pass the orchestrator asks which entries are now
/// satisfiable and re-submits them, for at most `max_dependency_cycles`
/// cycles. No topological sort: CREATE OR ALTER placeholders break cycles
/// on the second pass.
#[derive(Debug, Default)]
pub struct DependencyManager {
    queue: Vec<PendingObject>,
}

impl DependencyManager {
    pub fn new() -> Self {
        DependencyManager::default()
    }

    pub fn enqueue(&mut self, id: ObjectId, unresolved: Vec<String>) {
        debug!(object = %id, unresolved = ?unresolved, "queued on missing dependencies");
        // Re-queued objects replace their previous entry.
        self.queue.retain(|pending| pending.id != id);
        self.queue.push(PendingObject { id, unresolved });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Entries still waiting, for the final report.
    pub fn remaining(&self) -> &[PendingObject] {
        &self.queue
    }

    /// Removes and returns every entry whose unresolved references now all
    /// exist on the target (shared memory first, live query as fallback).
    pub async fn take_satisfied(
        &mut self,
        memory: &SharedMemory,
        target: &Arc<dyn TargetAdapter>,
        default_schema: &str,
    ) -> Vec<PendingObject> {
        let mut satisfied = Vec::new();
        let mut still_waiting = Vec::new();

        for pending in self.queue.drain(..) {
            let mut all_present = true;
            for reference in &pending.unresolved {
                if !reference_present(memory, target, reference, default_schema, &pending.id).await
                {
                    all_present = false;
                    break;
                }
            }
            if all_present {
                satisfied.push(pending);
            } else {
                still_waiting.push(pending);
            }
        }

        self.queue = still_waiting;
        satisfied
    }

    /// Everything still queued, regardless of satisfaction; used for the
    /// final cycle so a placeholder created mid-pass gets its chance.
    pub fn take_all(&mut self) -> Vec<PendingObject> {
        std::mem::take(&mut self.queue)
    }
}

async fn reference_present(
    memory: &SharedMemory,
    target: &Arc<dyn TargetAdapter>,
    reference: &str,
    default_schema: &str,
    waiting: &ObjectId,
) -> bool {
    if memory.is_known_target_object(reference).await {
        return true;
    }
    let qualified = QualifiedName::parse(reference, default_schema);
    target
        .object_exists(&qualified.schema, &qualified.name, waiting.kind)
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::mock::MockTarget;
    use model::core::identifiers::ObjectKind;

    fn proc_id(name: &str) -> ObjectId {
        ObjectId::new("dbo", name, ObjectKind::Procedure)
    }

    #[tokio::test]
    async fn entries_wait_until_references_exist() {
        let memory = SharedMemory::in_memory();
        let target = Arc::new(MockTarget::new()) as Arc<dyn TargetAdapter>;
        let mut manager = DependencyManager::new();
        manager.enqueue(proc_id("P1"), vec!["dbo.P2".to_string()]);

        let ready = manager.take_satisfied(&memory, &target, "dbo").await;
        assert!(ready.is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn live_target_objects_satisfy_references() {
        let memory = SharedMemory::in_memory();
        let mock = Arc::new(MockTarget::new());
        mock.add_existing_object("dbo", "P2");
        let target = mock.clone() as Arc<dyn TargetAdapter>;

        let mut manager = DependencyManager::new();
        manager.enqueue(proc_id("P1"), vec!["dbo.P2".to_string()]);

        let ready = manager.take_satisfied(&memory, &target, "dbo").await;
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, proc_id("P1"));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn shared_memory_mappings_satisfy_references() {
        let memory = SharedMemory::in_memory();
        memory
            .record_table_mapping("HR.P2", "dbo.P2")
            .await
            .unwrap();
        let target = Arc::new(MockTarget::new()) as Arc<dyn TargetAdapter>;

        let mut manager = DependencyManager::new();
        manager.enqueue(proc_id("P1"), vec!["dbo.P2".to_string()]);

        let ready = manager.take_satisfied(&memory, &target, "dbo").await;
        assert_eq!(ready.len(), 1);
    }

    #[tokio::test]
    async fn requeueing_replaces_the_old_entry() {
        let mut manager = DependencyManager::new();
        manager.enqueue(proc_id("P1"), vec!["dbo.P2".to_string()]);
        manager.enqueue(proc_id("P1"), vec!["dbo.P3".to_string()]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.remaining()[0].unresolved, vec!["dbo.P3".to_string()]);
    }
}
