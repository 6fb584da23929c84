use crate::{
    error::MemoryError,
    memory::record::{MemoryRecord, normalize_signature, signature_similarity},
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Minimum similarity for a stored solution to be considered related.
const SIMILARITY_FLOOR: f64 = 0.35;

#[derive(Debug, Clone)]
pub struct RankedSolution {
    pub solution: String,
    pub category: Option<String>,
    pub success_count: u32,
    pub score: f64,
}

#[derive(Debug, Default)]
struct MemoryState {
    schemas: BTreeSet<String>,
    /// table (lowercased fq) → identity columns.
    identity_columns: BTreeMap<String, BTreeSet<String>>,
    solutions: Vec<SolutionEntry>,
    patterns: Vec<PatternEntry>,
    /// oracle fq (lowercased) → deployed target fq.
    table_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct SolutionEntry {
    signature: String,
    solution: String,
    category: Option<String>,
    success_count: u32,
}

#[derive(Debug, Clone)]
struct PatternEntry {
    source_snippet: String,
    target_snippet: String,
    quality: String,
}

/// Cross-run knowledge store. Created empty on first run, loaded from its
/// JSON file at startup, saved after every mutation. All access funnels
/// through one async mutex, so readers always see a consistent snapshot.
pub struct SharedMemory {
    state: Mutex<MemoryState>,
    path: Option<PathBuf>,
}

impl SharedMemory {
    /// Volatile store for tests and dry runs.
    pub fn in_memory() -> Self {
        SharedMemory {
            state: Mutex::new(MemoryState::default()),
            path: None,
        }
    }

    /// Loads from `path`, starting empty when the file does not exist yet.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = tokio::fs::read_to_string(&path).await?;
            let records: Vec<MemoryRecord> = serde_json::from_str(&raw)?;
            info!(records = records.len(), path = %path.display(), "loaded shared memory");
            MemoryState::from_records(records)
        } else {
            debug!(path = %path.display(), "no shared memory file yet, starting empty");
            MemoryState::default()
        };
        Ok(SharedMemory {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    pub async fn register_schema(&self, name: &str) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        if state.schemas.insert(name.to_lowercase()) {
            self.persist(&state).await?;
        }
        Ok(())
    }

    pub async fn known_schemas(&self) -> Vec<String> {
        self.state.lock().await.schemas.iter().cloned().collect()
    }

    pub async fn register_identity_column(
        &self,
        table: &str,
        column: &str,
    ) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        let inserted = state
            .identity_columns
            .entry(table.to_lowercase())
            .or_default()
            .insert(column.to_uppercase());
        if inserted {
            self.persist(&state).await?;
        }
        Ok(())
    }

    pub async fn identity_columns(&self, table: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .identity_columns
            .get(&table.to_lowercase())
            .map(|cols| cols.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Appends an error→solution association; an identical signature with
    /// the same solution has its success count incremented instead.
    pub async fn store_error_solution(
        &self,
        error_text: &str,
        solution: &str,
        category: Option<&str>,
    ) -> Result<(), MemoryError> {
        let signature = normalize_signature(error_text);
        let mut state = self.state.lock().await;
        if let Some(entry) = state
            .solutions
            .iter_mut()
            .find(|e| e.signature == signature && e.solution == solution)
        {
            entry.success_count += 1;
        } else {
            state.solutions.push(SolutionEntry {
                signature,
                solution: solution.to_string(),
                category: category.map(str::to_string),
                success_count: 1,
            });
        }
        self.persist(&state).await
    }

    /// Solutions related to `error_text`, ranked by signature similarity
    /// with past success count as the tie-breaker.
    pub async fn ranked_solutions(&self, error_text: &str, limit: usize) -> Vec<RankedSolution> {
        let signature = normalize_signature(error_text);
        let state = self.state.lock().await;
        let mut ranked: Vec<RankedSolution> = state
            .solutions
            .iter()
            .filter_map(|entry| {
                let score = signature_similarity(&signature, &entry.signature);
                (score >= SIMILARITY_FLOOR).then(|| RankedSolution {
                    solution: entry.solution.clone(),
                    category: entry.category.clone(),
                    success_count: entry.success_count,
                    score,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.success_count.cmp(&a.success_count))
        });
        ranked.truncate(limit);
        ranked
    }

    pub async fn store_pattern(
        &self,
        source_snippet: &str,
        target_snippet: &str,
        quality: &str,
    ) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        let exists = state.patterns.iter().any(|p| {
            p.source_snippet == source_snippet && p.target_snippet == target_snippet
        });
        if !exists {
            state.patterns.push(PatternEntry {
                source_snippet: source_snippet.to_string(),
                target_snippet: target_snippet.to_string(),
                quality: quality.to_string(),
            });
            self.persist(&state).await?;
        }
        Ok(())
    }

    pub async fn pattern_count(&self) -> usize {
        self.state.lock().await.patterns.len()
    }

    pub async fn record_table_mapping(
        &self,
        oracle_fq: &str,
        sqlserver_fq: &str,
    ) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;
        state
            .table_mappings
            .insert(oracle_fq.to_lowercase(), sqlserver_fq.to_string());
        self.persist(&state).await
    }

    pub async fn mapping_for(&self, oracle_fq: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .table_mappings
            .get(&oracle_fq.to_lowercase())
            .cloned()
    }

    /// True when some source object was already deployed under this target
    /// name. Used as the fast path of dependency-satisfaction checks.
    pub async fn is_known_target_object(&self, target_fq: &str) -> bool {
        let needle = target_fq.to_lowercase();
        self.state
            .lock()
            .await
            .table_mappings
            .values()
            .any(|v| v.to_lowercase() == needle)
    }

    /// Full record list, as persisted.
    pub async fn snapshot(&self) -> Vec<MemoryRecord> {
        self.state.lock().await.to_records()
    }

    /// Writes the current state out even when nothing changed; called on
    /// shutdown so partial progress survives a cancelled run.
    pub async fn flush(&self) -> Result<(), MemoryError> {
        let state = self.state.lock().await;
        self.persist(&state).await
    }

    async fn persist(&self, state: &MemoryState) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&state.to_records())?;
        tokio::fs::write(path, json)
            .await
            .map_err(|err| MemoryError::Persist(format!("{}: {err}", path.display())))
    }
}

impl MemoryState {
    fn from_records(records: Vec<MemoryRecord>) -> Self {
        let mut state = MemoryState::default();
        for record in records {
            match record {
                MemoryRecord::Schema { name } => {
                    state.schemas.insert(name);
                }
                MemoryRecord::IdentityColumn { table, column } => {
                    state
                        .identity_columns
                        .entry(table)
                        .or_default()
                        .insert(column);
                }
                MemoryRecord::ErrorSolution {
                    signature,
                    solution,
                    category,
                    success_count,
                } => state.solutions.push(SolutionEntry {
                    signature,
                    solution,
                    category,
                    success_count,
                }),
                MemoryRecord::Pattern {
                    source_snippet,
                    target_snippet,
                    quality,
                } => state.patterns.push(PatternEntry {
                    source_snippet,
                    target_snippet,
                    quality,
                }),
                MemoryRecord::TableMapping { oracle, sqlserver } => {
                    state.table_mappings.insert(oracle, sqlserver);
                }
            }
        }
        state
    }

    fn to_records(&self) -> Vec<MemoryRecord> {
        let mut records = Vec::new();
        for schema in &self.schemas {
            records.push(MemoryRecord::Schema {
                name: schema.clone(),
            });
        }
        for (table, columns) in &self.identity_columns {
            for column in columns {
                records.push(MemoryRecord::IdentityColumn {
                    table: table.clone(),
                    column: column.clone(),
                });
            }
        }
        for entry in &self.solutions {
            records.push(MemoryRecord::ErrorSolution {
                signature: entry.signature.clone(),
                solution: entry.solution.clone(),
                category: entry.category.clone(),
                success_count: entry.success_count,
            });
        }
        for entry in &self.patterns {
            records.push(MemoryRecord::Pattern {
                source_snippet: entry.source_snippet.clone(),
                target_snippet: entry.target_snippet.clone(),
                quality: entry.quality.clone(),
            });
        }
        for (oracle, sqlserver) in &self.table_mappings {
            records.push(MemoryRecord::TableMapping {
                oracle: oracle.clone(),
                sqlserver: sqlserver.clone(),
            });
        }
        records
    }
}
