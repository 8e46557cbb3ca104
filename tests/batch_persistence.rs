use std::fs;
use std::path::Path;

use tempfile::tempdir;

use event_atlas::{
    BatchWriter, BatchWriterConfig, FieldValue, IndexerError, Record, SqliteTableStore,
    TableStore, UnloadingConfig,
};

fn build_record(event_id: &str, summary: &str, year: i32) -> Record {
    Record::new()
        .with("event_id", event_id)
        .with("summary", summary)
        .with("year", year)
        .with("is_guess", false)
}

fn build_config(side_dir: &Path, batch_size: usize) -> BatchWriterConfig {
    BatchWriterConfig::new("events")
        .with_index_key("event_id")
        .with_text_indexed_fields(["summary"])
        .with_batch_size(batch_size)
        .with_unloading(UnloadingConfig::new(32, side_dir, "/media/events"))
}

#[test]
fn oversized_values_are_offloaded_and_rows_survive_reopen() {
    let dir = tempdir().unwrap();
    let side_dir = dir.path().join("side_files");
    let db_path = dir.path().join("db").join("events.db");
    let long_summary = "Published a translation of Menabrea's memoir with extensive notes";

    let mut writer = BatchWriter::new(
        SqliteTableStore::open(&db_path).unwrap(),
        build_config(&side_dir, 10),
    )
    .unwrap();
    writer
        .add_record(build_record("Ada_Lovelace_000", "Born in London", 1815))
        .unwrap();
    writer
        .add_record(build_record("Ada_Lovelace_001", long_summary, 1843))
        .unwrap();
    let store = writer.finish().unwrap();
    assert_eq!(store.path(), Some(db_path.as_path()));
    drop(store);

    let reopened = SqliteTableStore::open(&db_path).unwrap();
    assert_eq!(reopened.row_count("events").unwrap(), 2);
    let mut stmt = reopened
        .connection()
        .prepare("SELECT summary FROM events ORDER BY event_id")
        .unwrap();
    let summaries: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(summaries[0], "Born in London");
    assert_eq!(
        summaries[1],
        "file:/media/events/Ada_Lovelace_001_summary.dat"
    );
    assert_eq!(
        fs::read_to_string(side_dir.join("Ada_Lovelace_001_summary.dat")).unwrap(),
        long_summary
    );
    assert!(!side_dir.join("Ada_Lovelace_000_summary.dat").exists());
}

#[test]
fn batches_flush_after_threshold_and_append_to_existing_table() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("events.db");

    for run in 0..2 {
        let mut writer = BatchWriter::new(
            SqliteTableStore::open(&db_path).unwrap(),
            BatchWriterConfig::new("events").with_batch_size(3),
        )
        .unwrap();
        for idx in 0..4 {
            writer
                .add_record(build_record(&format!("run{run}_{idx}"), "Visited Paris", 1850))
                .unwrap();
        }
        // The fourth record exceeds the batch size of three.
        assert_eq!(writer.buffered(), 0);
        assert_eq!(writer.rows_written(), 4);
        writer.finish().unwrap();
    }

    let store = SqliteTableStore::open(&db_path).unwrap();
    assert_eq!(store.row_count("events").unwrap(), 8);
}

#[test]
fn text_index_is_filled_from_existing_rows() {
    let dir = tempdir().unwrap();
    let mut writer = BatchWriter::new(
        SqliteTableStore::in_memory().unwrap(),
        build_config(&dir.path().join("side"), 100),
    )
    .unwrap();
    writer
        .add_record(build_record("Curie_000", "Awarded the Nobel Prize", 1903))
        .unwrap();
    writer
        .add_record(build_record("Curie_001", "Moved to Paris", 1891))
        .unwrap();
    writer.flush().unwrap();
    writer.create_index().unwrap();
    writer.create_text_index().unwrap();

    let matched: String = writer
        .store()
        .connection()
        .query_row(
            "SELECT events.event_id FROM text_search \
             JOIN events ON events.rowid = text_search.rowid \
             WHERE text_search MATCH 'Nobe*'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(matched, "Curie_000");
}

#[test]
fn failed_flush_is_reported_and_keeps_records() {
    let mut writer = BatchWriter::new(
        SqliteTableStore::in_memory().unwrap(),
        BatchWriterConfig::new("events"),
    )
    .unwrap();
    writer
        .add_record(build_record("Ada_Lovelace_000", "Born", 1815))
        .unwrap();
    writer
        .add_record(build_record("Ada_Lovelace_001", "Died", 1852).with("place", "London"))
        .unwrap();

    let err = writer.flush().unwrap_err();
    assert!(matches!(err, IndexerError::Persistence(_)));
    assert_eq!(writer.buffered(), 2);
    assert_eq!(writer.rows_written(), 0);
}

#[test]
fn records_convert_from_serializable_rows() {
    #[derive(serde::Serialize)]
    struct Row {
        page_title: String,
        year: i32,
    }

    let record = Record::from_serialize(&Row {
        page_title: "Ada Lovelace".to_string(),
        year: 1843,
    })
    .unwrap();
    assert_eq!(
        record.get("page_title"),
        Some(&FieldValue::Text("Ada Lovelace".to_string()))
    );
    assert_eq!(record.get("year"), Some(&FieldValue::Integer(1843)));
}
