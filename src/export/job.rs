//! Single-table export job
//!
//! A job converts every record file of one table into `<output>/<table>.csv`
//! in two sequential passes over the files:
//!
//! 1. **Inferring**: decode every record and build the column schema
//! 2. **Writing**: write the header, decode every record again and write one
//!    row per record
//!
//! Rows go to a temporary file in the output directory that is renamed over
//! `<table>.csv` only after the last row is flushed, so a failed job never
//! leaves a partial CSV behind.

use crate::backup::{
    DecodedEntity, EntityDecoder, JsonEntityDecoder, KeyTokenParser, RecordReader,
    ReferenceTokenParser,
};
use crate::discovery::TableUnit;
use crate::error::{JobError, JobResult};
use crate::export::key_codec::{encode_identifier, KeyCodec};
use crate::export::schema::{infer_schema, Schema};
use crate::export::value::ValueEncoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Collaborators shared by every job of a run
pub struct ExportContext {
    decoder: Arc<dyn EntityDecoder>,
    encoder: ValueEncoder,
}

impl ExportContext {
    pub fn new(decoder: Arc<dyn EntityDecoder>, parser: Arc<dyn KeyTokenParser>) -> Self {
        Self {
            decoder,
            encoder: ValueEncoder::new(KeyCodec::new(parser)),
        }
    }

    /// JSON entity records with URL-safe reference tokens
    pub fn bundled() -> Self {
        Self::new(Arc::new(JsonEntityDecoder), Arc::new(ReferenceTokenParser))
    }

    pub fn encoder(&self) -> &ValueEncoder {
        &self.encoder
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Inferring,
    Writing,
    Done,
    Failed,
}

/// Outcome metrics of a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct JobMetrics {
    /// Table name
    pub table: String,

    /// Rows written (excluding the header)
    pub records: u64,

    /// Wall time of both passes
    pub elapsed: Duration,

    /// Size of the CSV file
    pub bytes_written: u64,
}

impl JobMetrics {
    /// Average processing time per record, `None` for an empty table
    pub fn time_per_record(&self) -> Option<Duration> {
        if self.records == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.elapsed.as_secs_f64() / self.records as f64,
        ))
    }

    /// Records per second
    pub fn records_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

/// Converts one table into one CSV file
pub struct TableExportJob {
    unit: TableUnit,
    output_dir: PathBuf,
    context: Arc<ExportContext>,
    state: JobState,
}

impl TableExportJob {
    pub fn new(
        unit: TableUnit,
        output_dir: impl Into<PathBuf>,
        context: Arc<ExportContext>,
    ) -> Self {
        Self {
            unit,
            output_dir: output_dir.into(),
            context,
            state: JobState::Pending,
        }
    }

    pub fn table(&self) -> &str {
        &self.unit.name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Final CSV location
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.unit.name))
    }

    /// Run both passes; the job ends in `Done` or `Failed`
    pub fn run(&mut self) -> JobResult<JobMetrics> {
        let started = Instant::now();
        info!(table = %self.unit.name, files = self.unit.files.len(), "Table export starting");

        match self.execute(started) {
            Ok(metrics) => {
                self.state = JobState::Done;
                info!(
                    table = %metrics.table,
                    records = metrics.records,
                    elapsed_ms = metrics.elapsed.as_millis() as u64,
                    "Table export completed"
                );
                Ok(metrics)
            }
            Err(e) => {
                self.state = JobState::Failed;
                error!(table = %self.unit.name, error = %e, "Table export failed");
                Err(e)
            }
        }
    }

    fn execute(&mut self, started: Instant) -> JobResult<JobMetrics> {
        self.state = JobState::Inferring;
        let schema = infer_schema(self.entities())?;
        debug!(table = %self.unit.name, columns = schema.len(), "Schema inferred");

        self.state = JobState::Writing;
        let (records, bytes_written) = self.write_csv(&schema)?;

        Ok(JobMetrics {
            table: self.unit.name.clone(),
            records,
            elapsed: started.elapsed(),
            bytes_written,
        })
    }

    fn entities(&self) -> EntityStream<'_> {
        EntityStream {
            files: self.unit.files.iter(),
            current: None,
            decoder: self.context.decoder.as_ref(),
            failed: false,
        }
    }

    /// Second pass: header plus one row per record; returns (rows, bytes)
    fn write_csv(&self, schema: &Schema) -> JobResult<(u64, u64)> {
        let path = self.output_path();
        let io_error = |source| JobError::Io {
            path: path.clone(),
            source,
        };

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", self.unit.name))
            .suffix(".csv.tmp")
            .tempfile_in(&self.output_dir)
            .map_err(io_error)?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(temp);
        writer.write_record(schema.header())?;

        let encoder = self.context.encoder();
        let mut records = 0u64;
        for entity in self.entities() {
            let entity = entity?;
            let row = encoder.encode_row(&entity, schema).map_err(|cell| {
                let value = malformed_value(&entity, &cell.property);
                error!(
                    table = %self.unit.name,
                    record = records + 1,
                    entity = %encode_identifier(&entity.key),
                    property = %cell.property,
                    value = %value,
                    "Unrecognized identifier layout"
                );
                JobError::MalformedIdentifier {
                    record: records + 1,
                    entity: encode_identifier(&entity.key),
                    property: cell.property,
                    source: cell.source,
                }
            })?;
            writer.write_record(&row)?;
            records += 1;
        }

        let temp = writer.into_inner().map_err(|e| io_error(e.into_error()))?;
        let file = temp.persist(&path).map_err(|e| io_error(e.error))?;
        let bytes_written = file.metadata().map_err(io_error)?.len();

        Ok((records, bytes_written))
    }
}

fn malformed_value(entity: &DecodedEntity, property: &str) -> String {
    entity
        .get(property)
        .map(|value| format!("{:?}", value))
        .unwrap_or_default()
}

/// Records of one open file
struct OpenFile<'a> {
    path: &'a Path,
    reader: RecordReader<BufReader<File>>,
    index: u64,
}

impl OpenFile<'_> {
    fn next_entity(&mut self, decoder: &dyn EntityDecoder) -> Option<JobResult<DecodedEntity>> {
        let record = self.index;
        let result = match self.reader.next()? {
            Ok(bytes) => decoder.decode(&bytes),
            Err(e) => Err(e),
        };
        self.index += 1;

        Some(result.map_err(|source| JobError::Deserialization {
            file: self.path.to_path_buf(),
            record,
            source,
        }))
    }
}

/// Lazily decodes every record of every file of a table, in file order
struct EntityStream<'a> {
    files: std::slice::Iter<'a, PathBuf>,
    current: Option<OpenFile<'a>>,
    decoder: &'a dyn EntityDecoder,
    failed: bool,
}

impl Iterator for EntityStream<'_> {
    type Item = JobResult<DecodedEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(item) = current.next_entity(self.decoder) {
                    self.failed = item.is_err();
                    return Some(item);
                }
                self.current = None;
            }

            let path = self.files.next()?;
            match RecordReader::open(path) {
                Ok(reader) => {
                    self.current = Some(OpenFile {
                        path,
                        reader,
                        index: 0,
                    });
                }
                Err(source) => {
                    self.failed = true;
                    return Some(Err(JobError::Io {
                        path: path.clone(),
                        source,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::RecordWriter;
    use std::fs;
    use tempfile::tempdir;

    fn write_records(path: &Path, docs: &[&str]) {
        let mut writer = RecordWriter::create(path).unwrap();
        for doc in docs {
            writer.write_record(doc.as_bytes()).unwrap();
        }
        writer.into_inner().unwrap();
    }

    fn job_for(files: Vec<PathBuf>, output: &Path) -> TableExportJob {
        let unit = TableUnit {
            name: "Foo".into(),
            files,
        };
        TableExportJob::new(unit, output, Arc::new(ExportContext::bundled()))
    }

    #[test]
    fn test_metrics_rates() {
        let metrics = JobMetrics {
            table: "Foo".into(),
            records: 1000,
            elapsed: Duration::from_secs(10),
            bytes_written: 0,
        };
        assert!((metrics.records_per_second() - 100.0).abs() < 0.001);
        assert_eq!(metrics.time_per_record(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_metrics_empty_table() {
        let metrics = JobMetrics {
            table: "Empty".into(),
            records: 0,
            elapsed: Duration::ZERO,
            bytes_written: 3,
        };
        assert_eq!(metrics.time_per_record(), None);
        assert_eq!(metrics.records_per_second(), 0.0);
    }

    #[test]
    fn test_two_pass_export() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let file = input.path().join("output-0");
        write_records(
            &file,
            &[
                r#"{"key": {"kind": "Foo", "id": 1}, "properties": [{"name": "name", "type": "string", "value": "a"}]}"#,
                r#"{"key": {"kind": "Foo", "id": 2}, "properties": [{"name": "name", "type": "string", "value": "b"}, {"name": "age", "type": "integer", "value": 30}]}"#,
            ],
        );

        let mut job = job_for(vec![file], output.path());
        assert_eq!(job.state(), JobState::Pending);

        let metrics = job.run().unwrap();
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(metrics.records, 2);

        let csv = fs::read_to_string(output.path().join("Foo.csv")).unwrap();
        assert_eq!(csv, "id,name,age\nFoo@1,a,\nFoo@2,b,30\n");
        assert_eq!(metrics.bytes_written, csv.len() as u64);
    }

    #[test]
    fn test_values_are_quoted() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let file = input.path().join("output-0");
        write_records(
            &file,
            &[r#"{"key": {"kind": "Foo", "name": "x"}, "properties": [{"name": "note", "type": "string", "value": "a, \"b\"\nc"}]}"#],
        );

        job_for(vec![file], output.path()).run().unwrap();

        let csv = fs::read_to_string(output.path().join("Foo.csv")).unwrap();
        assert_eq!(csv, "id,note\nFoo@x,\"a, \"\"b\"\"\nc\"\n");
    }

    #[test]
    fn test_failed_job_leaves_no_output() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let file = input.path().join("output-0");
        write_records(
            &file,
            &[
                r#"{"key": {"kind": "Foo", "id": 1}, "properties": [{"name": "ref", "type": "string", "value": "ah0123456789012345678901"}]}"#,
            ],
        );

        let mut job = job_for(vec![file], output.path());
        let err = job.run().unwrap_err();
        assert_eq!(job.state(), JobState::Failed);
        assert!(matches!(err, JobError::MalformedIdentifier { record: 1, .. }));

        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_record_fails_job() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let file = input.path().join("output-0");
        write_records(&file, &["{not json"]);

        let mut job = job_for(vec![file.clone()], output.path());
        match job.run() {
            Err(JobError::Deserialization { file: f, record, .. }) => {
                assert_eq!(f, file);
                assert_eq!(record, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!output.path().join("Foo.csv").exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let output = tempdir().unwrap();
        let mut job = job_for(vec![output.path().join("absent")], output.path());
        assert!(matches!(job.run(), Err(JobError::Io { .. })));
    }
}
