//! Parquet sink for parsed records.
//!
//! Load balancer entries become 28 Utf8 columns. Firewall entries keep their
//! scalar fields as Utf8 columns, the request as a struct column, and the
//! free-form rule lists as JSON text.

use crate::core::traits::RecordWriter;
use crate::sources::alb::{LoadBalancerLogEntry, FIELD_COUNT, FIELD_NAMES};
use crate::sources::waf::{FirewallLogEntry, QueryArgs};
use arrow_array::builder::{StringBuilder, StructBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{ArrowError, DataType, Field, Fields, Schema, SchemaRef};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BATCH_SIZE: usize = 1024;

/// A record type with a fixed Arrow layout.
pub trait ParquetRecord: Sized {
    type Batch: BatchBuilder<Self>;

    fn schema() -> SchemaRef;
}

/// Accumulates records column by column until the batch is flushed.
pub trait BatchBuilder<R> {
    fn with_capacity(capacity: usize) -> Self;
    /// Appends a record and returns its approximate encoded size.
    fn append(&mut self, record: &R) -> io::Result<u64>;
    fn len(&self) -> usize;
    fn finish(&mut self, schema: SchemaRef) -> Result<RecordBatch, ArrowError>;
}

pub struct ParquetWriter<R: ParquetRecord> {
    dir: PathBuf,
    stem: String,
    target_size_bytes: u64,
    current_size: u64,
    file_index: u64,
    schema: SchemaRef,
    writer: Option<ArrowWriter<File>>,
    batch: R::Batch,
    batch_size: usize,
}

impl<R: ParquetRecord> ParquetWriter<R> {
    pub fn new(dir: impl Into<PathBuf>, stem: &str, target_size_mb: u64) -> io::Result<Self> {
        Self::with_batch_size(dir, stem, target_size_mb, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(
        dir: impl Into<PathBuf>,
        stem: &str,
        target_size_mb: u64,
        batch_size: usize,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let schema = R::schema();
        let batch_size = batch_size.max(1);
        let writer = open_writer(&dir, stem, 1, schema.clone())?;
        Ok(Self {
            dir,
            stem: stem.to_string(),
            target_size_bytes: target_size_mb.saturating_mul(1024 * 1024),
            current_size: 0,
            file_index: 1,
            schema,
            writer: Some(writer),
            batch: R::Batch::with_capacity(batch_size),
            batch_size,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.flush_batch()?;
        let writer = self.take_writer()?;
        writer.close().map_err(map_parquet_err)?;
        self.file_index += 1;
        self.writer = Some(open_writer(
            &self.dir,
            &self.stem,
            self.file_index,
            self.schema.clone(),
        )?);
        self.current_size = 0;
        Ok(())
    }

    fn flush_batch(&mut self) -> io::Result<()> {
        if self.batch.len() == 0 {
            return Ok(());
        }

        let batch = self
            .batch
            .finish(self.schema.clone())
            .map_err(map_arrow_err)?;
        let writer = self.writer.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "parquet writer not initialized")
        })?;
        writer.write(&batch).map_err(map_parquet_err)?;
        Ok(())
    }

    fn take_writer(&mut self) -> io::Result<ArrowWriter<File>> {
        self.writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "parquet writer not initialized"))
    }
}

impl<R: ParquetRecord> RecordWriter<R> for ParquetWriter<R> {
    fn write_record(&mut self, record: &R) -> io::Result<u64> {
        if self.current_size >= self.target_size_bytes && self.current_size > 0 {
            self.rotate()?;
        }

        let size = self.batch.append(record)?;
        self.current_size += size;

        if self.batch.len() >= self.batch_size {
            self.flush_batch()?;
        }

        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_batch()?;
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(map_parquet_err)?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush_batch()?;
        let writer = self.take_writer()?;
        writer.close().map_err(map_parquet_err)?;
        Ok(())
    }
}

impl ParquetRecord for LoadBalancerLogEntry {
    type Batch = LoadBalancerBatch;

    fn schema() -> SchemaRef {
        let fields: Vec<Field> = FIELD_NAMES
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

pub struct LoadBalancerBatch {
    columns: Vec<StringBuilder>,
    len: usize,
}

impl BatchBuilder<LoadBalancerLogEntry> for LoadBalancerBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: (0..FIELD_COUNT)
                .map(|_| StringBuilder::with_capacity(capacity, capacity * 16))
                .collect(),
            len: 0,
        }
    }

    fn append(&mut self, record: &LoadBalancerLogEntry) -> io::Result<u64> {
        let mut size = 0usize;
        for (builder, value) in self.columns.iter_mut().zip(record.to_positional()) {
            builder.append_value(value);
            size += value.len();
        }
        self.len += 1;
        Ok(size as u64)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn finish(&mut self, schema: SchemaRef) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        self.len = 0;
        RecordBatch::try_new(schema, arrays)
    }
}

impl ParquetRecord for FirewallLogEntry {
    type Batch = FirewallBatch;

    fn schema() -> SchemaRef {
        let fields = vec![
            Field::new("action", DataType::Utf8, false),
            Field::new("format_version", DataType::Utf8, true),
            Field::new("timestamp", DataType::Utf8, true),
            Field::new("http_source_id", DataType::Utf8, false),
            Field::new("http_source_name", DataType::Utf8, false),
            Field::new("http_request", DataType::Struct(http_request_fields()), false),
            Field::new("non_terminating_matching_rules_json", DataType::Utf8, false),
            Field::new("request_headers_inserted_json", DataType::Utf8, true),
            Field::new("rate_based_rule_list_json", DataType::Utf8, false),
            Field::new("response_code_sent", DataType::Utf8, true),
            Field::new("rule_group_list_json", DataType::Utf8, false),
            Field::new("terminating_rule_id", DataType::Utf8, false),
            Field::new("terminating_rule_match_details_json", DataType::Utf8, false),
            Field::new("terminating_rule_type", DataType::Utf8, false),
            Field::new("web_acl_id", DataType::Utf8, false),
        ];
        Arc::new(Schema::new(fields))
    }
}

fn http_request_fields() -> Fields {
    Fields::from(vec![
        Field::new("args", DataType::Utf8, false),
        Field::new("client_ip", DataType::Utf8, false),
        Field::new("country", DataType::Utf8, false),
        Field::new("headers_json", DataType::Utf8, false),
        Field::new("http_method", DataType::Utf8, false),
        Field::new("http_version", DataType::Utf8, false),
        Field::new("request_id", DataType::Utf8, false),
        Field::new("uri", DataType::Utf8, false),
    ])
}

pub struct FirewallBatch {
    action: StringBuilder,
    format_version: StringBuilder,
    timestamp: StringBuilder,
    http_source_id: StringBuilder,
    http_source_name: StringBuilder,
    http_request: StructBuilder,
    non_terminating_matching_rules: StringBuilder,
    request_headers_inserted: StringBuilder,
    rate_based_rule_list: StringBuilder,
    response_code_sent: StringBuilder,
    rule_group_list: StringBuilder,
    terminating_rule_id: StringBuilder,
    terminating_rule_match_details: StringBuilder,
    terminating_rule_type: StringBuilder,
    web_acl_id: StringBuilder,
    len: usize,
}

impl BatchBuilder<FirewallLogEntry> for FirewallBatch {
    fn with_capacity(capacity: usize) -> Self {
        let strings = || StringBuilder::with_capacity(capacity, capacity * 32);
        Self {
            action: strings(),
            format_version: strings(),
            timestamp: strings(),
            http_source_id: strings(),
            http_source_name: strings(),
            http_request: StructBuilder::from_fields(http_request_fields(), capacity),
            non_terminating_matching_rules: strings(),
            request_headers_inserted: strings(),
            rate_based_rule_list: strings(),
            response_code_sent: strings(),
            rule_group_list: strings(),
            terminating_rule_id: strings(),
            terminating_rule_match_details: strings(),
            terminating_rule_type: strings(),
            web_acl_id: strings(),
            len: 0,
        }
    }

    fn append(&mut self, record: &FirewallLogEntry) -> io::Result<u64> {
        let mut size = 0usize;
        let mut put = |builder: &mut StringBuilder, value: Option<&str>| {
            size += value.map_or(0, str::len);
            append_string(builder, value);
        };

        let format_version = scalar_text(&record.format_version);
        let timestamp = scalar_text(&record.timestamp);
        let non_terminating = json_text(&record.non_terminating_matching_rules)?;
        let headers_inserted = match &record.request_headers_inserted {
            Value::Null => None,
            value => Some(json_text(value)?),
        };
        let rate_based = json_text(&record.rate_based_rule_list)?;
        let response_code = scalar_text(&record.response_code_sent);
        let rule_groups = json_text(&record.rule_group_list)?;
        let match_details = json_text(&record.terminating_rule_match_details)?;

        put(&mut self.action, Some(&record.action));
        put(&mut self.format_version, format_version.as_deref());
        put(&mut self.timestamp, timestamp.as_deref());
        put(&mut self.http_source_id, Some(&record.http_source_id));
        put(&mut self.http_source_name, Some(&record.http_source_name));
        put(&mut self.non_terminating_matching_rules, Some(&non_terminating));
        put(&mut self.request_headers_inserted, headers_inserted.as_deref());
        put(&mut self.rate_based_rule_list, Some(&rate_based));
        put(&mut self.response_code_sent, response_code.as_deref());
        put(&mut self.rule_group_list, Some(&rule_groups));
        put(&mut self.terminating_rule_id, Some(&record.terminating_rule_id));
        put(&mut self.terminating_rule_match_details, Some(&match_details));
        put(&mut self.terminating_rule_type, Some(&record.terminating_rule_type));
        put(&mut self.web_acl_id, Some(&record.web_acl_id));

        let request = &record.http_request;
        let args = match &request.args {
            QueryArgs::Raw(raw) => raw.clone(),
            QueryArgs::Structured(map) => json_text(map)?,
        };
        let headers = json_text(&request.headers)?;
        let values: [&str; 8] = [
            &args,
            &request.client_ip,
            &request.country,
            &headers,
            &request.http_method,
            &request.http_version,
            &request.request_id,
            &request.uri,
        ];
        for (index, value) in values.into_iter().enumerate() {
            put(struct_string(&mut self.http_request, index)?, Some(value));
        }
        self.http_request.append(true);

        self.len += 1;
        Ok(size as u64)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn finish(&mut self, schema: SchemaRef) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(self.action.finish()) as ArrayRef,
            Arc::new(self.format_version.finish()) as ArrayRef,
            Arc::new(self.timestamp.finish()) as ArrayRef,
            Arc::new(self.http_source_id.finish()) as ArrayRef,
            Arc::new(self.http_source_name.finish()) as ArrayRef,
            Arc::new(self.http_request.finish()) as ArrayRef,
            Arc::new(self.non_terminating_matching_rules.finish()) as ArrayRef,
            Arc::new(self.request_headers_inserted.finish()) as ArrayRef,
            Arc::new(self.rate_based_rule_list.finish()) as ArrayRef,
            Arc::new(self.response_code_sent.finish()) as ArrayRef,
            Arc::new(self.rule_group_list.finish()) as ArrayRef,
            Arc::new(self.terminating_rule_id.finish()) as ArrayRef,
            Arc::new(self.terminating_rule_match_details.finish()) as ArrayRef,
            Arc::new(self.terminating_rule_type.finish()) as ArrayRef,
            Arc::new(self.web_acl_id.finish()) as ArrayRef,
        ];
        self.len = 0;
        RecordBatch::try_new(schema, arrays)
    }
}

fn struct_string(builder: &mut StructBuilder, index: usize) -> io::Result<&mut StringBuilder> {
    builder.field_builder::<StringBuilder>(index).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("http_request column {index} is not a string column"),
        )
    })
}

fn append_string(builder: &mut StringBuilder, value: Option<&str>) {
    match value {
        Some(value) => builder.append_value(value),
        None => builder.append_null(),
    }
}

/// Strings stay as-is, `null` becomes a null cell, anything else is JSON text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn json_text<T: Serialize + ?Sized>(value: &T) -> io::Result<String> {
    serde_json::to_string(value).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

fn open_writer(dir: &Path, stem: &str, index: u64, schema: SchemaRef) -> io::Result<ArrowWriter<File>> {
    let path = dir.join(format!("{stem}-{index:06}.parquet"));
    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    ArrowWriter::try_new(file, schema, Some(props)).map_err(map_parquet_err)
}

fn map_parquet_err(err: ParquetError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

fn map_arrow_err(err: ArrowError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}
