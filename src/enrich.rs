//! Background enrichment
//!
//! Re-resolves previously-ingested descriptions through the assistant's
//! knowledge base and writes the standardized `Name_cas_Number` enriched
//! format, and only when BOTH a usable name and an identifier come back, so
//! records never accumulate half-formed `_cas_` noise.
//!
//! One dedicated worker per job; progress lives in an owned, mutex-guarded
//! record that callers poll. No blocking wait is exposed.

use crate::llm::LlmCapability;
use crate::normalize::normalize;
use crate::store::CatalogStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Lifecycle of an enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Failed,
}

/// Point-in-time progress of an enrichment job.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentProgress {
    pub status: JobStatus,
    pub total: usize,
    pub current: usize,
    pub processed: usize,
    pub errors: usize,
    pub last_run: Option<DateTime<Utc>>,
}

impl Default for EnrichmentProgress {
    fn default() -> Self {
        Self {
            status: JobStatus::Idle,
            total: 0,
            current: 0,
            processed: 0,
            errors: 0,
            last_run: None,
        }
    }
}

/// Owned handle to one background enrichment run.
///
/// Single producer (the worker task), any number of polling consumers.
pub struct EnrichmentJob {
    id: Uuid,
    progress: Arc<Mutex<EnrichmentProgress>>,
}

impl EnrichmentJob {
    /// Start a worker over the given descriptions.
    pub fn spawn(
        store: Arc<dyn CatalogStore>,
        llm: LlmCapability,
        descriptions: Vec<String>,
    ) -> Self {
        let progress = Arc::new(Mutex::new(EnrichmentProgress {
            status: JobStatus::Running,
            total: descriptions.len(),
            ..Default::default()
        }));

        let job = Self {
            id: Uuid::new_v4(),
            progress: Arc::clone(&progress),
        };
        tokio::spawn(run_enrichment(store, llm, descriptions, progress));
        job
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current progress. Cheap; callers poll.
    pub fn snapshot(&self) -> EnrichmentProgress {
        self.progress.lock().unwrap().clone()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.snapshot().status,
            JobStatus::Done | JobStatus::Failed
        )
    }
}

async fn run_enrichment(
    store: Arc<dyn CatalogStore>,
    llm: LlmCapability,
    descriptions: Vec<String>,
    progress: Arc<Mutex<EnrichmentProgress>>,
) {
    let Some(assistant) = llm.get().cloned() else {
        tracing::warn!("enrichment requested without an assistant configured");
        progress.lock().unwrap().status = JobStatus::Failed;
        return;
    };

    for description in descriptions {
        if description.trim().is_empty() {
            progress.lock().unwrap().current += 1;
            continue;
        }

        let outcome = assistant.known_identity(&description).await;
        let mut applied = false;
        if let Some(known) = outcome {
            let name = known
                .descriptive_name
                .as_deref()
                .unwrap_or(&description);
            let name_token = title_case_compact(name);

            if let (true, Some(identifier)) = (name_token.len() > 2, known.identifier) {
                let enriched = format!("{name_token}_cas_{identifier}");
                match store.apply_enrichment(
                    &description,
                    &enriched,
                    &identifier,
                    known.descriptive_name.as_deref().unwrap_or(&description),
                ) {
                    Ok(updated) => {
                        tracing::info!(description = %description, enriched = %enriched,
                            updated, "enrichment applied");
                        applied = true;
                    }
                    Err(e) => {
                        tracing::warn!(description = %description, error = %e,
                            "enrichment write failed");
                    }
                }
            }
        }

        let mut guard = progress.lock().unwrap();
        if applied {
            guard.processed += 1;
        } else {
            guard.errors += 1;
        }
        guard.current += 1;
    }

    let mut guard = progress.lock().unwrap();
    guard.status = JobStatus::Done;
    guard.last_run = Some(Utc::now());
}

/// `"sodium lauryl sulfate"` → `"SodiumLaurylSulfate"`: normalized, each
/// word capitalized, spaces squeezed out.
fn title_case_compact(name: &str) -> String {
    normalize(name)
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MaterialRecord;
    use crate::llm::MockAssistant;
    use crate::store::SqliteStore;
    use std::time::Duration;

    async fn wait_for(job: &EnrichmentJob) -> EnrichmentProgress {
        for _ in 0..100 {
            if job.is_finished() {
                return job.snapshot();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("enrichment job did not finish in time");
    }

    #[test]
    fn title_case_compacts_names() {
        assert_eq!(title_case_compact("sodium lauryl sulfate"), "SodiumLaurylSulfate");
        assert_eq!(title_case_compact("GLYCERINE"), "Glycerine");
        assert_eq!(title_case_compact(""), "");
    }

    #[tokio::test]
    async fn job_enriches_records_with_full_answers() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert_material(&MaterialRecord::new("Mystery Compound", "Solvents"))
            .unwrap();

        let llm = MockAssistant::new()
            .with_identity("Mystery Compound", Some("1-2-3"), Some("MYSTERY ACID"))
            .into_capability();

        let job = EnrichmentJob::spawn(
            store.clone() as Arc<dyn CatalogStore>,
            llm,
            store.unenriched_descriptions().unwrap(),
        );
        let progress = wait_for(&job).await;

        assert_eq!(progress.status, JobStatus::Done);
        assert_eq!(progress.total, 1);
        assert_eq!(progress.processed, 1);
        assert_eq!(progress.errors, 0);
        assert!(progress.last_run.is_some());

        let record = &store.list_materials(None).unwrap()[0];
        assert_eq!(record.enriched_description, "MysteryAcid_cas_1-2-3");
        assert_eq!(record.identifier, "1-2-3");
        assert_eq!(record.descriptive_name, "MYSTERY ACID");
    }

    #[tokio::test]
    async fn partial_answers_are_counted_as_errors_and_skipped() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert_material(&MaterialRecord::new("Nameless", "Solvents"))
            .unwrap();

        // No knowledge-base answer at all: the standardized format is withheld.
        let llm = MockAssistant::new().into_capability();

        let job = EnrichmentJob::spawn(
            store.clone() as Arc<dyn CatalogStore>,
            llm,
            store.unenriched_descriptions().unwrap(),
        );
        let progress = wait_for(&job).await;

        assert_eq!(progress.status, JobStatus::Done);
        assert_eq!(progress.errors, 1);
        assert_eq!(progress.processed, 0);

        let record = &store.list_materials(None).unwrap()[0];
        assert_eq!(record.enriched_description, "");
    }

    #[tokio::test]
    async fn job_fails_without_assistant() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let job = EnrichmentJob::spawn(
            store as Arc<dyn CatalogStore>,
            LlmCapability::unavailable(),
            vec!["anything".to_string()],
        );
        let progress = wait_for(&job).await;
        assert_eq!(progress.status, JobStatus::Failed);
    }
}
