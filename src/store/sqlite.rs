//! SQLite storage backend for the material catalog

use super::traits::{CatalogStore, StoreError, StoreResult};
use crate::catalog::{
    Annotation, AnnotationKind, CategoryRule, MaterialRecord, NodeOverride, Parameter, RecordId,
    ValidationDocument, ValidationStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed catalog store
///
/// Single database file, thread-safe via an internal mutex on the
/// connection. Nested payloads (parameters, bucket rules, hierarchy
/// levels, validation documents) are stored as JSON columns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize the database schema.
    ///
    /// Base tables are created with `IF NOT EXISTS`; the validation columns
    /// arrived after the first deployments, so they are added through a
    /// pragma-checked migration rather than the base schema.
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            -- Material records (one per source row and brand)
            CREATE TABLE IF NOT EXISTS materials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session TEXT NOT NULL,
                row_number INTEGER NOT NULL,
                commodity TEXT NOT NULL,
                sub_category TEXT NOT NULL,
                description TEXT NOT NULL,
                brand TEXT NOT NULL,
                item_code TEXT NOT NULL,
                plant TEXT NOT NULL,
                region TEXT NOT NULL,
                enriched_description TEXT NOT NULL,
                final_search_term TEXT NOT NULL,
                identifier TEXT NOT NULL,
                descriptive_name TEXT NOT NULL,
                synonyms TEXT NOT NULL,
                quantity REAL NOT NULL,
                spend_value REAL NOT NULL,
                parameters_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_materials_sub_category
                ON materials(sub_category);
            CREATE INDEX IF NOT EXISTS idx_materials_description
                ON materials(description);

            -- Per-sub-category rules
            CREATE TABLE IF NOT EXISTS rules (
                sub_category TEXT PRIMARY KEY,
                identifier_name TEXT NOT NULL,
                parameters_json TEXT NOT NULL,
                bucket_rules_json TEXT NOT NULL,
                hierarchy_json TEXT NOT NULL
            );

            -- Tree placement overrides (one per moved node)
            CREATE TABLE IF NOT EXISTS overrides (
                node_id TEXT PRIMARY KEY,
                target_parent_id TEXT NOT NULL
            );

            -- Node annotations
            CREATE TABLE IF NOT EXISTS annotations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node_type TEXT NOT NULL,
                node_identifier TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT,
                question TEXT,
                answer TEXT,
                open INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_node
                ON annotations(node_type, node_identifier);

            -- WAL keeps concurrent readers live during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Self::migrate_add_validation(conn)?;

        Ok(())
    }

    /// Migration: validation columns on materials.
    ///
    /// SQLite has no ALTER TABLE ADD COLUMN IF NOT EXISTS, so column
    /// presence is checked via the table_info pragma first.
    fn migrate_add_validation(conn: &Connection) -> StoreResult<()> {
        let has_confidence: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('materials') WHERE name = 'confidence'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_confidence {
            conn.execute(
                "ALTER TABLE materials ADD COLUMN confidence INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
            conn.execute(
                "ALTER TABLE materials ADD COLUMN validation_status TEXT NOT NULL DEFAULT 'Pending'",
                [],
            )?;
            conn.execute(
                "ALTER TABLE materials ADD COLUMN validation_documents_json TEXT NOT NULL DEFAULT '[]'",
                [],
            )?;
        }

        Ok(())
    }
}

fn parse_created_at(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::DateParse(format!("{raw}: {e}")))
}

fn material_from_row(row: &Row<'_>) -> StoreResult<MaterialRecord> {
    let parameters_json: String = row.get("parameters_json")?;
    let documents_json: String = row.get("validation_documents_json")?;
    let status: String = row.get("validation_status")?;
    let created_at: String = row.get("created_at")?;

    let parameters: Vec<Parameter> = serde_json::from_str(&parameters_json)?;
    let validation_documents: Vec<ValidationDocument> = serde_json::from_str(&documents_json)?;

    Ok(MaterialRecord {
        id: RecordId::new(row.get("id")?),
        session: row.get("session")?,
        row_number: row.get("row_number")?,
        commodity: row.get("commodity")?,
        sub_category: row.get("sub_category")?,
        description: row.get("description")?,
        brand: row.get("brand")?,
        item_code: row.get("item_code")?,
        plant: row.get("plant")?,
        region: row.get("region")?,
        enriched_description: row.get("enriched_description")?,
        final_search_term: row.get("final_search_term")?,
        identifier: row.get("identifier")?,
        descriptive_name: row.get("descriptive_name")?,
        synonyms: row.get("synonyms")?,
        confidence: row.get("confidence")?,
        validation_status: ValidationStatus::from(status),
        validation_documents,
        quantity: row.get("quantity")?,
        spend_value: row.get("spend_value")?,
        parameters,
        created_at: parse_created_at(&created_at)?,
    })
}

fn annotation_from_row(row: &Row<'_>) -> StoreResult<Annotation> {
    let kind_tag: String = row.get("kind")?;
    let content: Option<String> = row.get("content")?;
    let question: Option<String> = row.get("question")?;
    let answer: Option<String> = row.get("answer")?;
    let created_at: String = row.get("created_at")?;

    let kind = match kind_tag.as_str() {
        "qa" => AnnotationKind::Qa {
            question: question.unwrap_or_default(),
            answer,
        },
        _ => AnnotationKind::Info {
            content: content.unwrap_or_default(),
        },
    };

    let mut annotation = Annotation {
        id: row.get("id")?,
        node_type: row.get("node_type")?,
        node_identifier: row.get("node_identifier")?,
        kind,
        open: false,
        created_at: parse_created_at(&created_at)?,
    };
    annotation.recompute_open();
    Ok(annotation)
}

impl CatalogStore for SqliteStore {
    fn insert_material(&self, record: &MaterialRecord) -> StoreResult<RecordId> {
        let conn = self.conn.lock().unwrap();
        let parameters_json = serde_json::to_string(&record.parameters)?;
        let documents_json = serde_json::to_string(&record.validation_documents)?;

        conn.execute(
            r#"
            INSERT INTO materials (
                session, row_number, commodity, sub_category, description,
                brand, item_code, plant, region, enriched_description,
                final_search_term, identifier, descriptive_name, synonyms,
                quantity, spend_value, parameters_json, created_at,
                confidence, validation_status, validation_documents_json
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
            "#,
            params![
                record.session,
                record.row_number,
                record.commodity,
                record.sub_category,
                record.description,
                record.brand,
                record.item_code,
                record.plant,
                record.region,
                record.enriched_description,
                record.final_search_term,
                record.identifier,
                record.descriptive_name,
                record.synonyms,
                record.quantity,
                record.spend_value,
                parameters_json,
                record.created_at.to_rfc3339(),
                record.confidence,
                record.validation_status.to_string(),
                documents_json,
            ],
        )?;

        Ok(RecordId::new(conn.last_insert_rowid()))
    }

    fn update_material(&self, record: &MaterialRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let parameters_json = serde_json::to_string(&record.parameters)?;
        let documents_json = serde_json::to_string(&record.validation_documents)?;

        let updated = conn.execute(
            r#"
            UPDATE materials SET
                description = ?2,
                enriched_description = ?3,
                final_search_term = ?4,
                identifier = ?5,
                descriptive_name = ?6,
                synonyms = ?7,
                quantity = ?8,
                spend_value = ?9,
                parameters_json = ?10,
                confidence = ?11,
                validation_status = ?12,
                validation_documents_json = ?13
            WHERE id = ?1
            "#,
            params![
                record.id.as_i64(),
                record.description,
                record.enriched_description,
                record.final_search_term,
                record.identifier,
                record.descriptive_name,
                record.synonyms,
                record.quantity,
                record.spend_value,
                parameters_json,
                record.confidence,
                record.validation_status.to_string(),
                documents_json,
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::RecordNotFound(record.id));
        }
        Ok(())
    }

    fn get_material(&self, id: RecordId) -> StoreResult<Option<MaterialRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM materials WHERE id = ?1")?;
        let mut rows = stmt.query(params![id.as_i64()])?;
        match rows.next()? {
            Some(row) => Ok(Some(material_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_materials(&self, sub_category: Option<&str>) -> StoreResult<Vec<MaterialRecord>> {
        let conn = self.conn.lock().unwrap();
        let (sql, filter) = match sub_category {
            Some(sub) => (
                "SELECT * FROM materials WHERE sub_category = ?1 ORDER BY id",
                Some(sub),
            ),
            None => ("SELECT * FROM materials ORDER BY id", None),
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = match filter {
            Some(sub) => stmt.query(params![sub])?,
            None => stmt.query([])?,
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(material_from_row(row)?);
        }
        Ok(records)
    }

    fn clear_session(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM materials", [])?;
        conn.execute("DELETE FROM annotations", [])?;
        Ok(())
    }

    fn distinct_sub_categories(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT sub_category FROM materials
             WHERE sub_category <> '' ORDER BY sub_category",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn unenriched_descriptions(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT description FROM materials
             WHERE enriched_description = ''
                OR instr(enriched_description, '_cas_') = 0
             ORDER BY description",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn apply_enrichment(
        &self,
        description: &str,
        enriched: &str,
        identifier: &str,
        descriptive_name: &str,
    ) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE materials SET enriched_description = ?1, identifier = ?2,
             descriptive_name = ?3 WHERE description = ?4",
            params![enriched, identifier, descriptive_name, description],
        )?;
        Ok(updated)
    }

    fn upsert_rule(&self, rule: &CategoryRule) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO rules (
                sub_category, identifier_name, parameters_json,
                bucket_rules_json, hierarchy_json
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(sub_category) DO UPDATE SET
                identifier_name = excluded.identifier_name,
                parameters_json = excluded.parameters_json,
                bucket_rules_json = excluded.bucket_rules_json,
                hierarchy_json = excluded.hierarchy_json
            "#,
            params![
                rule.sub_category,
                rule.identifier_name,
                serde_json::to_string(&rule.parameter_order)?,
                serde_json::to_string(&rule.bucket_rules)?,
                serde_json::to_string(&rule.hierarchy_order)?,
            ],
        )?;
        Ok(())
    }

    fn get_rule(&self, sub_category: &str) -> StoreResult<Option<CategoryRule>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT identifier_name, parameters_json, bucket_rules_json,
                 hierarchy_json FROM rules WHERE sub_category = ?1",
                params![sub_category],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((identifier_name, parameters, buckets, hierarchy)) = row else {
            return Ok(None);
        };
        Ok(Some(CategoryRule {
            sub_category: sub_category.to_string(),
            identifier_name,
            parameter_order: serde_json::from_str(&parameters)?,
            bucket_rules: serde_json::from_str(&buckets)?,
            hierarchy_order: serde_json::from_str(&hierarchy)?,
        }))
    }

    fn list_rules(&self) -> StoreResult<Vec<CategoryRule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sub_category, identifier_name, parameters_json,
             bucket_rules_json, hierarchy_json FROM rules ORDER BY sub_category",
        )?;
        let mut rows = stmt.query([])?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            let parameters: String = row.get(2)?;
            let buckets: String = row.get(3)?;
            let hierarchy: String = row.get(4)?;
            rules.push(CategoryRule {
                sub_category: row.get(0)?,
                identifier_name: row.get(1)?,
                parameter_order: serde_json::from_str(&parameters)?,
                bucket_rules: serde_json::from_str(&buckets)?,
                hierarchy_order: serde_json::from_str(&hierarchy)?,
            });
        }
        Ok(rules)
    }

    fn delete_rule(&self, sub_category: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM rules WHERE sub_category = ?1", params![sub_category])?;
        Ok(deleted > 0)
    }

    fn upsert_override(&self, ov: &NodeOverride) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO overrides (node_id, target_parent_id)
            VALUES (?1, ?2)
            ON CONFLICT(node_id) DO UPDATE SET
                target_parent_id = excluded.target_parent_id
            "#,
            params![ov.node_id, ov.target_parent_id],
        )?;
        Ok(())
    }

    fn list_overrides(&self) -> StoreResult<Vec<NodeOverride>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT node_id, target_parent_id FROM overrides ORDER BY node_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(NodeOverride {
                node_id: row.get(0)?,
                target_parent_id: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn delete_override(&self, node_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM overrides WHERE node_id = ?1", params![node_id])?;
        Ok(deleted > 0)
    }

    fn insert_annotation(&self, annotation: &Annotation) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();

        let mut fresh = annotation.clone();
        fresh.recompute_open();
        let (kind, content, question, answer) = match &fresh.kind {
            AnnotationKind::Info { content } => ("info", Some(content.clone()), None, None),
            AnnotationKind::Qa { question, answer } => {
                ("qa", None, Some(question.clone()), answer.clone())
            }
        };

        conn.execute(
            r#"
            INSERT INTO annotations (
                node_type, node_identifier, kind, content, question, answer,
                open, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                fresh.node_type,
                fresh.node_identifier,
                kind,
                content,
                question,
                answer,
                fresh.open,
                fresh.created_at.to_rfc3339(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn list_annotations(&self, node: Option<(&str, &str)>) -> StoreResult<Vec<Annotation>> {
        let conn = self.conn.lock().unwrap();
        let (sql, filter) = match node {
            Some(_) => (
                "SELECT * FROM annotations
                 WHERE node_type = ?1 AND node_identifier = ?2 ORDER BY id",
                node,
            ),
            None => ("SELECT * FROM annotations ORDER BY id", None),
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = match filter {
            Some((node_type, node_identifier)) => stmt.query(params![node_type, node_identifier])?,
            None => stmt.query([])?,
        };

        let mut annotations = Vec::new();
        while let Some(row) = rows.next()? {
            annotations.push(annotation_from_row(row)?);
        }
        Ok(annotations)
    }

    fn answer_annotation(&self, id: i64, answer: Option<&str>) -> StoreResult<Annotation> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare("SELECT * FROM annotations WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        let Some(row) = rows.next()? else {
            return Err(StoreError::AnnotationNotFound(id));
        };
        let mut annotation = annotation_from_row(row)?;
        drop(rows);
        drop(stmt);

        annotation.set_answer(answer.map(str::to_string));
        let stored_answer = match &annotation.kind {
            AnnotationKind::Qa { answer, .. } => answer.clone(),
            AnnotationKind::Info { .. } => None,
        };

        conn.execute(
            "UPDATE annotations SET answer = ?2, open = ?3 WHERE id = ?1",
            params![id, stored_answer, annotation.open],
        )?;

        Ok(annotation)
    }

    fn delete_annotation(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM annotations WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BucketOp, BucketRule};

    fn sample_record() -> MaterialRecord {
        MaterialRecord::new("Glycerine USP", "Solvents")
            .with_brand("Acme")
            .with_region("EU")
            .with_plant("Lyon")
            .with_identifier("56-81-5")
            .with_enriched_description("glycerine_cas_56-81-5")
            .with_parameter("Purity", "85%")
    }

    #[test]
    fn material_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_material(&sample_record()).unwrap();

        let loaded = store.get_material(id).unwrap().expect("record");
        assert_eq!(loaded.description, "Glycerine USP");
        assert_eq!(loaded.identifier, "56-81-5");
        assert_eq!(loaded.parameters, vec![Parameter::new("Purity", "85%")]);
        assert_eq!(loaded.validation_status, ValidationStatus::Pending);
    }

    #[test]
    fn update_persists_and_missing_record_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_material(&sample_record()).unwrap();

        let mut record = store.get_material(id).unwrap().unwrap();
        record.confidence = 100;
        record.validation_status = ValidationStatus::ValidatedManual;
        store.update_material(&record).unwrap();

        let loaded = store.get_material(id).unwrap().unwrap();
        assert_eq!(loaded.confidence, 100);
        assert_eq!(loaded.validation_status, ValidationStatus::ValidatedManual);

        let ghost = sample_record().with_id(RecordId::new(9999));
        assert!(matches!(
            store.update_material(&ghost),
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn listing_filters_by_sub_category() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_material(&sample_record()).unwrap();
        store
            .insert_material(&MaterialRecord::new("SLES", "Surfactants"))
            .unwrap();

        assert_eq!(store.list_materials(None).unwrap().len(), 2);
        assert_eq!(store.list_materials(Some("Solvents")).unwrap().len(), 1);
        assert_eq!(
            store.distinct_sub_categories().unwrap(),
            vec!["Solvents", "Surfactants"]
        );
    }

    #[test]
    fn clear_session_keeps_rules_and_overrides() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_material(&sample_record()).unwrap();
        store
            .insert_annotation(&Annotation::info("material", "1", "note"))
            .unwrap();
        store.upsert_rule(&CategoryRule::new("Solvents")).unwrap();
        store
            .upsert_override(&NodeOverride::new("root::a", "root::b"))
            .unwrap();

        store.clear_session().unwrap();

        assert!(store.list_materials(None).unwrap().is_empty());
        assert!(store.list_annotations(None).unwrap().is_empty());
        assert_eq!(store.list_rules().unwrap().len(), 1);
        assert_eq!(store.list_overrides().unwrap().len(), 1);
    }

    #[test]
    fn rules_round_trip_with_buckets() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rule = CategoryRule::new("Surfactants")
            .with_identifier_name("CAS")
            .with_parameter("Purity")
            .with_bucket(BucketRule::new(BucketOp::Lt { value: 90.0 }, "Low"))
            .with_hierarchy(&["Region", "Identifier"]);
        store.upsert_rule(&rule).unwrap();

        let loaded = store.get_rule("Surfactants").unwrap().expect("rule");
        assert_eq!(loaded, rule);

        // Upsert replaces
        let replacement = CategoryRule::new("Surfactants").with_parameter("Grade");
        store.upsert_rule(&replacement).unwrap();
        let loaded = store.get_rule("Surfactants").unwrap().unwrap();
        assert_eq!(loaded.parameter_order, vec!["Grade"]);

        assert!(store.delete_rule("Surfactants").unwrap());
        assert!(!store.delete_rule("Surfactants").unwrap());
    }

    #[test]
    fn override_latest_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_override(&NodeOverride::new("root::a", "root::b"))
            .unwrap();
        store
            .upsert_override(&NodeOverride::new("root::a", "root::c"))
            .unwrap();

        let overrides = store.list_overrides().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].target_parent_id, "root::c");
    }

    #[test]
    fn annotation_answer_recomputes_open() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .insert_annotation(&Annotation::question("material", "1", "pharma grade?"))
            .unwrap();

        let open = store
            .list_annotations(Some(("material", "1")))
            .unwrap()
            .remove(0);
        assert!(open.is_open_qa());

        let answered = store.answer_annotation(id, Some("Yes, USP.")).unwrap();
        assert!(!answered.is_open_qa());

        let reopened = store.answer_annotation(id, None).unwrap();
        assert!(reopened.is_open_qa());

        assert!(matches!(
            store.answer_annotation(404, Some("?")),
            Err(StoreError::AnnotationNotFound(404))
        ));
    }

    #[test]
    fn unenriched_descriptions_skip_standardized_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_material(&sample_record()).unwrap(); // has _cas_ format
        store
            .insert_material(&MaterialRecord::new("Mystery Compound", "Solvents"))
            .unwrap();

        assert_eq!(
            store.unenriched_descriptions().unwrap(),
            vec!["Mystery Compound"]
        );

        let updated = store
            .apply_enrichment("Mystery Compound", "mystery_cas_1-2-3", "1-2-3", "MYSTERY ACID")
            .unwrap();
        assert_eq!(updated, 1);
        assert!(store.unenriched_descriptions().unwrap().is_empty());
    }

    #[test]
    fn snapshot_carries_all_collections() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_material(&sample_record()).unwrap();
        store.upsert_rule(&CategoryRule::new("Solvents")).unwrap();
        store
            .upsert_override(&NodeOverride::new("root::a", "root::b"))
            .unwrap();
        store
            .insert_annotation(&Annotation::info("material", "1", "note"))
            .unwrap();

        let snapshot = store.snapshot(None).unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.rules.len(), 1);
        assert_eq!(snapshot.overrides.len(), 1);
        assert_eq!(snapshot.annotations.len(), 1);
        assert!(snapshot.rule_for("Solvents").is_some());
        assert!(snapshot.rule_for("Other").is_none());
    }

    #[test]
    fn reopening_a_file_store_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materia.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_material(&sample_record()).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_materials(None).unwrap().len(), 1);
    }
}
