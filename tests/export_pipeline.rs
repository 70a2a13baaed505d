//! End-to-end export tests against the in-memory backend

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use dataformat::backend::MemoryBackend;
use dataformat::config::ExportConfig;
use dataformat::error::{DataFormatError, Result};
use dataformat::export::{
    self, BulkJsonWriter, ColumnSchema, CsvWriter, ExportCoordinator, ExportFormat,
    ExportRequest, FormatWriter, XlsWriter,
};
use dataformat::model::{ProjectedRow, Record};

use common::{Cell, header, read_sheet};

const INDEX: &str = "dataset";

fn dataset_record(i: i64) -> Record {
    let Value::Object(source) = json!({
        "aaa": format!("test {i}"),
        "bbb": i,
        "ccc": format!("c{}", i % 7),
        "eee": {"fff": format!("f{i}"), "ggg": i, "hhh": i % 2 == 0}
    }) else {
        unreachable!()
    };
    let mut record = Record::new(i.to_string(), source);
    record.doc_type = Some("item".to_string());
    record
}

async fn dataset(n: i64) -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_all(INDEX, (0..n).map(dataset_record)).await;
    backend
}

fn config(batch_size: usize) -> ExportConfig {
    ExportConfig {
        batch_size,
        show_progress: false,
        ..ExportConfig::default()
    }
}

async fn export_csv(backend: Arc<MemoryBackend>, request: &ExportRequest) -> Result<String> {
    let mut writer = CsvWriter::new(Vec::new());
    ExportCoordinator::new(backend, &config(100))
        .execute(request, &mut writer)
        .await?;
    Ok(String::from_utf8(writer.into_inner()).unwrap())
}

async fn export_json(backend: Arc<MemoryBackend>, request: &ExportRequest) -> Result<String> {
    let mut writer = BulkJsonWriter::new(Vec::new(), request.index(), request.doc_type());
    ExportCoordinator::new(backend, &config(100))
        .execute(request, &mut writer)
        .await?;
    Ok(String::from_utf8(writer.into_inner()).unwrap())
}

#[tokio::test]
async fn csv_export_of_whole_index() {
    let backend = dataset(1000).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Csv).unwrap();

    let out = export_csv(backend.clone(), &request).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 1001);
    assert_eq!(
        lines[0],
        r#""aaa","bbb","ccc","eee.fff","eee.ggg","eee.hhh""#
    );
    assert_eq!(lines[1], r#""test 0",0,"c0","f0",0,"true""#);
    assert_eq!(backend.stats().await.outstanding(), 0);
}

#[tokio::test]
async fn bulk_json_export_pairs_actions_with_rows() {
    let backend = dataset(1000).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Json)
        .unwrap()
        .with_doc_type("item");

    let out = export_json(backend, &request).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 2000);
    for pair in lines.chunks(2) {
        assert!(pair[0].starts_with(r#"{"index""#), "{}", pair[0]);
        assert!(pair[1].starts_with(r#"{"aaa""#), "{}", pair[1]);
    }
    assert_eq!(
        lines[2],
        r#"{"index":{"_index":"dataset","_type":"item","_id":"1"}}"#
    );
    let row: Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(row["eee.ggg"], json!(1));
    assert_eq!(row["eee.hhh"], json!(false));
}

#[tokio::test]
async fn spreadsheet_export_produces_workbook() {
    let backend = dataset(1000).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Xls).unwrap();
    let mut writer = XlsWriter::new(Vec::new(), "Sheet1");

    let summary = ExportCoordinator::new(backend.clone(), &config(100))
        .execute(&request, &mut writer)
        .await
        .unwrap();

    assert_eq!(summary.rows_exported, 1000);
    assert_eq!(writer.rows_written(), 1000);
    assert_eq!(summary.bytes_written, writer.bytes_written());
    assert_eq!(backend.stats().await.released, 1);

    let sheet = read_sheet(&writer.into_inner());
    assert_eq!(sheet.len(), 1001);
    assert_eq!(
        header(&sheet),
        vec!["aaa", "bbb", "ccc", "eee.fff", "eee.ggg", "eee.hhh"]
    );
    assert_eq!(
        sheet[8],
        vec![
            Some(Cell::text("test 7")),
            Some(Cell::Number(7.0)),
            Some(Cell::text("c0")),
            Some(Cell::text("f7")),
            Some(Cell::Number(7.0)),
            Some(Cell::text("false")),
        ]
    );
}

#[tokio::test]
async fn explicit_field_list_fixes_columns_for_every_format() {
    let backend = dataset(20).await;
    let request = |format| {
        ExportRequest::new(INDEX, format)
            .unwrap()
            .with_fields("aaa,eee.ggg")
            .unwrap()
    };

    let csv = export_csv(backend.clone(), &request(ExportFormat::Csv))
        .await
        .unwrap();
    assert_eq!(csv.lines().next(), Some(r#""aaa","eee.ggg""#));
    assert_eq!(csv.lines().nth(4), Some(r#""test 3",3"#));

    let json = export_json(backend.clone(), &request(ExportFormat::Json))
        .await
        .unwrap();
    assert_eq!(json.lines().nth(1), Some(r#"{"aaa":"test 0","eee.ggg":0}"#));

    let mut writer = XlsWriter::new(Vec::new(), "Sheet1");
    let summary = ExportCoordinator::new(backend, &config(7))
        .execute(&request(ExportFormat::Xls), &mut writer)
        .await
        .unwrap();
    assert_eq!(summary.columns, vec!["aaa", "eee.ggg"]);
    assert_eq!(summary.rows_exported, 20);

    let sheet = read_sheet(&writer.into_inner());
    assert_eq!(sheet.len(), 21);
    assert_eq!(header(&sheet), vec!["aaa", "eee.ggg"]);
    assert_eq!(sheet[20], vec![Some(Cell::text("test 19")), Some(Cell::Number(19.0))]);
}

#[tokio::test]
async fn range_query_with_sort_limits_rows() {
    let backend = dataset(1000).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Csv)
        .unwrap()
        .with_doc_type("item")
        .with_body(
            r#"{"query":{"bool":{"must":[{"range":{"item.bbb":{"from":"100","to":"199"}}}],"must_not":[],"should":[]}},"sort":"bbb"}"#,
        )
        .unwrap();

    let out = export_csv(backend, &request).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 101);
    assert!(lines[1].starts_with(r#""test 100",100,"#));
    assert!(lines[100].starts_with(r#""test 199",199,"#));
}

#[tokio::test]
async fn repeated_exports_are_byte_identical() {
    let backend = dataset(300).await;
    let csv = ExportRequest::new(INDEX, ExportFormat::Csv).unwrap();
    let json = ExportRequest::new(INDEX, ExportFormat::Json).unwrap();

    assert_eq!(
        export_csv(backend.clone(), &csv).await.unwrap(),
        export_csv(backend.clone(), &csv).await.unwrap()
    );
    assert_eq!(
        export_json(backend.clone(), &json).await.unwrap(),
        export_json(backend.clone(), &json).await.unwrap()
    );
    assert_eq!(backend.stats().await.outstanding(), 0);
}

#[tokio::test]
async fn fetch_failure_releases_cursor_once() {
    let backend = dataset(1000).await;
    backend.fail_fetch_at(2).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Csv).unwrap();
    let mut writer = CsvWriter::new(Vec::new());

    let err = ExportCoordinator::new(backend.clone(), &config(200))
        .execute(&request, &mut writer)
        .await
        .unwrap_err();

    assert!(matches!(err, DataFormatError::Backend(_)), "{err}");
    let out = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(out.lines().count(), 201);
    assert!(!out.contains("\"test 200\""));

    let stats = backend.stats().await;
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.invalid_releases, 0);
    assert_eq!(stats.outstanding(), 0);
}

/// Writer that cancels the export after a given number of rows
struct CancellingWriter {
    inner: CsvWriter<Vec<u8>>,
    token: CancellationToken,
    cancel_after: u64,
}

#[async_trait]
impl FormatWriter for CancellingWriter {
    async fn write_header(&mut self, schema: &ColumnSchema) -> Result<()> {
        self.inner.write_header(schema).await
    }

    async fn write_row(&mut self, row: &ProjectedRow) -> Result<()> {
        self.inner.write_row(row).await?;
        if self.inner.rows_written() == self.cancel_after {
            self.token.cancel();
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.inner.finalize().await
    }

    fn rows_written(&self) -> u64 {
        self.inner.rows_written()
    }

    fn bytes_written(&self) -> u64 {
        self.inner.bytes_written()
    }
}

#[tokio::test]
async fn cancellation_mid_export_releases_cursor() {
    let backend = dataset(1000).await;
    let token = CancellationToken::new();
    let request = ExportRequest::new(INDEX, ExportFormat::Csv).unwrap();
    let mut writer = CancellingWriter {
        inner: CsvWriter::new(Vec::new()),
        token: token.clone(),
        cancel_after: 150,
    };

    let err = ExportCoordinator::new(backend.clone(), &config(100))
        .with_cancellation(token)
        .execute(&request, &mut writer)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(writer.rows_written(), 150);
    let out = String::from_utf8(writer.inner.into_inner()).unwrap();
    assert_eq!(out.lines().count(), 151);
    let stats = backend.stats().await;
    assert_eq!(stats.fetches, 2);
    assert_eq!(stats.released, 1);
    assert_eq!(stats.outstanding(), 0);
}

#[tokio::test]
async fn inferred_export_with_no_matches_is_empty() {
    let backend = dataset(10).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Csv)
        .unwrap()
        .with_body(r#"{"query":{"term":{"aaa":"nothing"}}}"#)
        .unwrap();

    assert_eq!(export_csv(backend.clone(), &request).await.unwrap(), "");

    let json = ExportRequest::new(INDEX, ExportFormat::Json)
        .unwrap()
        .with_body(r#"{"query":{"term":{"aaa":"nothing"}}}"#)
        .unwrap();
    assert_eq!(export_json(backend.clone(), &json).await.unwrap(), "");
    assert_eq!(backend.stats().await.outstanding(), 0);
}

#[tokio::test]
async fn run_writes_file_and_reports_summary() {
    let backend = dataset(50).await;
    let request = ExportRequest::new(INDEX, ExportFormat::Csv)
        .unwrap()
        .with_fields("eee.ggg,aaa")
        .unwrap();
    let path = std::env::temp_dir().join(format!("dfexport-{}.csv", uuid::Uuid::new_v4()));

    let file = tokio::fs::File::create(&path).await.unwrap();
    let summary = export::run(backend.clone(), &config(8), &request, file, None)
        .await
        .unwrap();
    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let _ = tokio::fs::remove_file(&path).await;

    assert_eq!(summary.rows_exported, 50);
    assert_eq!(summary.batches, 7);
    assert_eq!(summary.bytes_written, content.len() as u64);
    assert_eq!(content.lines().next(), Some(r#""eee.ggg","aaa""#));
    assert_eq!(content.lines().nth(50), Some(r#"49,"test 49""#));
}

#[tokio::test]
async fn loads_ndjson_hits_and_plain_objects() {
    let path = std::env::temp_dir().join(format!("dfexport-{}.ndjson", uuid::Uuid::new_v4()));
    tokio::fs::write(
        &path,
        concat!(
            r#"{"_id":"a1","_type":"item","_source":{"aaa":"x","eee":{"ggg":1}}}"#,
            "\n\n",
            r#"{"aaa":"y","eee":{"ggg":2}}"#,
            "\n"
        ),
    )
    .await
    .unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let loaded = backend.load_ndjson(INDEX, &path).await.unwrap();
    let _ = tokio::fs::remove_file(&path).await;
    assert_eq!(loaded, 2);

    let request = ExportRequest::new(INDEX, ExportFormat::Json).unwrap();
    let out = export_json(backend, &request).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], r#"{"index":{"_index":"dataset","_id":"a1"}}"#);
    assert_eq!(lines[3], r#"{"aaa":"y","eee.ggg":2}"#);
    assert_eq!(lines[2], r#"{"index":{"_index":"dataset","_id":"3"}}"#);
}

/// Nested record: `{aaa, bbb, ccc, eee: {fff, ggg, hhh}}` with date strings
fn nested_item(i: i64) -> Record {
    let Value::Object(source) = json!({
        "aaa": format!("test {i}"),
        "bbb": i,
        "ccc": "2012-01-01:00:00.000Z",
        "eee": {"fff": format!("TEST {i}"), "ggg": i, "hhh": "2013-01-01:00:00.000Z"}
    }) else {
        unreachable!()
    };
    let mut record = Record::new(i.to_string(), source);
    record.doc_type = Some("item".to_string());
    record
}

/// Same document as a backend that returns pre-dotted fields in its own order
fn dotted_item(i: i64) -> Record {
    let Value::Object(source) = json!({
        "eee.ggg": i,
        "aaa": format!("test {i}"),
        "eee.fff": format!("TEST {i}"),
        "ccc": "2012-01-01:00:00.000Z",
        "bbb": i,
        "eee.hhh": "2013-01-01:00:00.000Z"
    }) else {
        unreachable!()
    };
    let mut record = Record::new(i.to_string(), source);
    record.doc_type = Some("item".to_string());
    record
}

async fn items(make: fn(i64) -> Record) -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_all(INDEX, (1..=1000).map(make)).await;
    backend
}

const RANGE_QUERY: &str = r#"{"query":{"bool":{"must":[{"range":{"item.bbb":{"from":"100","to":"199"}}}],"must_not":[],"should":[]}},"sort":["bbb"]}"#;

#[tokio::test]
async fn inferred_header_follows_source_field_order() {
    let request = ExportRequest::new(INDEX, ExportFormat::Csv)
        .unwrap()
        .with_doc_type("item");

    let nested = export_csv(items(nested_item).await, &request).await.unwrap();
    let lines: Vec<&str> = nested.lines().collect();
    assert_eq!(lines.len(), 1001);
    assert_eq!(
        lines[0],
        r#""aaa","bbb","ccc","eee.fff","eee.ggg","eee.hhh""#
    );
    assert_eq!(
        lines[1],
        r#""test 1",1,"2012-01-01:00:00.000Z","TEST 1",1,"2013-01-01:00:00.000Z""#
    );

    let dotted = export_csv(items(dotted_item).await, &request).await.unwrap();
    let lines: Vec<&str> = dotted.lines().collect();
    assert_eq!(lines.len(), 1001);
    assert_eq!(
        lines[0],
        r#""eee.ggg","aaa","eee.fff","ccc","bbb","eee.hhh""#
    );
}

#[tokio::test]
async fn dotted_scenario_in_every_format() {
    let backend = items(dotted_item).await;
    let all = |format| {
        ExportRequest::new(INDEX, format)
            .unwrap()
            .with_doc_type("item")
    };

    let json = export_json(backend.clone(), &all(ExportFormat::Json))
        .await
        .unwrap();
    let lines: Vec<&str> = json.lines().collect();
    assert_eq!(lines.len(), 2000);
    assert!(lines[0].starts_with(r#"{"index""#));
    assert!(lines[1].starts_with(r#"{"eee.ggg":1,"aaa":"test 1""#));

    let mut writer = XlsWriter::new(Vec::new(), "Sheet1");
    ExportCoordinator::new(backend.clone(), &config(100))
        .execute(&all(ExportFormat::Xls), &mut writer)
        .await
        .unwrap();
    let sheet = read_sheet(&writer.into_inner());
    assert_eq!(sheet.len(), 1001);
    assert_eq!(
        header(&sheet),
        vec!["eee.ggg", "aaa", "eee.fff", "ccc", "bbb", "eee.hhh"]
    );
}

#[tokio::test]
async fn field_list_scenario_in_every_format() {
    let backend = items(nested_item).await;
    let listed = |format| {
        ExportRequest::new(INDEX, format)
            .unwrap()
            .with_doc_type("item")
            .with_fields("aaa,eee.ggg")
            .unwrap()
    };

    let csv = export_csv(backend.clone(), &listed(ExportFormat::Csv))
        .await
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1001);
    assert_eq!(lines[0], r#""aaa","eee.ggg""#);

    let json = export_json(backend.clone(), &listed(ExportFormat::Json))
        .await
        .unwrap();
    let lines: Vec<&str> = json.lines().collect();
    assert_eq!(lines.len(), 2000);
    assert!(lines[0].starts_with(r#"{"index""#));
    assert!(lines[1].starts_with(r#"{"aaa""#));

    let mut writer = XlsWriter::new(Vec::new(), "Sheet1");
    ExportCoordinator::new(backend, &config(100))
        .execute(&listed(ExportFormat::Xls), &mut writer)
        .await
        .unwrap();
    let sheet = read_sheet(&writer.into_inner());
    assert_eq!(sheet.len(), 1001);
    assert_eq!(header(&sheet), vec!["aaa", "eee.ggg"]);
}

#[tokio::test]
async fn range_query_scenario_in_every_format() {
    let backend = items(dotted_item).await;
    let ranged = |format| {
        ExportRequest::new(INDEX, format)
            .unwrap()
            .with_doc_type("item")
            .with_body(RANGE_QUERY)
            .unwrap()
    };

    let csv = export_csv(backend.clone(), &ranged(ExportFormat::Csv))
        .await
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 101);
    assert_eq!(
        lines[0],
        r#""eee.ggg","aaa","eee.fff","ccc","bbb","eee.hhh""#
    );
    assert!(lines[1].starts_with("100,"));

    let json = export_json(backend.clone(), &ranged(ExportFormat::Json))
        .await
        .unwrap();
    let lines: Vec<&str> = json.lines().collect();
    assert_eq!(lines.len(), 200);
    assert!(lines[0].starts_with(r#"{"index""#));
    assert!(lines[1].starts_with(r#"{"eee.ggg":100,"aaa":"test 100","#));

    let mut writer = XlsWriter::new(Vec::new(), "Sheet1");
    ExportCoordinator::new(backend, &config(100))
        .execute(&ranged(ExportFormat::Xls), &mut writer)
        .await
        .unwrap();
    let sheet = read_sheet(&writer.into_inner());
    assert_eq!(sheet.len(), 101);
    assert_eq!(sheet[0][0], Some(Cell::text("eee.ggg")));
    assert_eq!(sheet[0][1], Some(Cell::text("aaa")));
    assert_eq!(sheet[1][0], Some(Cell::Number(100.0)));
    assert_eq!(sheet[1][1], Some(Cell::text("test 100")));
    assert_eq!(sheet[100][0], Some(Cell::Number(199.0)));
}
