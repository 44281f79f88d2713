//! JSON-lines sink for parsed records.
//!
//! Writes one document per line either to a stream (stdout) or to
//! size-rotated files, optionally gzip-compressed.

use crate::core::traits::RecordWriter;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSON-lines writer for any serializable record.
pub struct JsonlWriter {
    sink: Option<Sink>,
    rotation: Option<Rotation>,
    current_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonlCompression {
    None,
    Gzip,
}

enum Sink {
    Plain(Box<dyn Write>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Plain(writer) => writer.write_all(bytes),
            Sink::Gzip(encoder) => encoder.write_all(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(writer) => writer.flush(),
            Sink::Gzip(encoder) => encoder.flush(),
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Sink::Plain(mut writer) => writer.flush(),
            Sink::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

struct Rotation {
    dir: PathBuf,
    prefix: String,
    target_size_bytes: u64,
    compression: JsonlCompression,
    file_index: u64,
}

impl JsonlWriter {
    /// Writes to stdout.
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Writes to an arbitrary stream without rotation.
    pub fn from_writer(writer: impl Write + 'static) -> Self {
        Self {
            sink: Some(Sink::Plain(Box::new(BufWriter::new(writer)))),
            rotation: None,
            current_size: 0,
        }
    }

    /// Writes `<stem>-<stamp>-<unique>-<index>.jsonl[.gz]` files into `dir`,
    /// starting a new file once `target_size_mb` is reached.
    pub fn new(
        dir: impl Into<PathBuf>,
        stem: &str,
        target_size_mb: u64,
        compression: Option<&str>,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let rotation = Rotation {
            dir,
            prefix: format!("{stem}-{}-{}", current_stamp(), unique_id()),
            target_size_bytes: target_size_mb.saturating_mul(1024 * 1024),
            compression: parse_compression(compression)?,
            file_index: 1,
        };
        let sink = open_sink(&rotation)?;
        Ok(Self {
            sink: Some(sink),
            rotation: Some(rotation),
            current_size: 0,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(sink) = self.sink.take() {
            sink.finish()?;
        }
        let Some(rotation) = self.rotation.as_mut() else {
            return Ok(());
        };
        rotation.file_index += 1;
        self.sink = Some(open_sink(rotation)?);
        self.current_size = 0;
        Ok(())
    }

    fn sink(&mut self) -> io::Result<&mut Sink> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "jsonl writer already closed"))
    }
}

impl<R: Serialize> RecordWriter<R> for JsonlWriter {
    fn write_record(&mut self, record: &R) -> io::Result<u64> {
        let mut buffer =
            serde_json::to_vec(record).map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        buffer.push(b'\n');
        let size = buffer.len() as u64;

        let should_rotate = self.rotation.as_ref().is_some_and(|rotation| {
            self.current_size > 0 && self.current_size + size > rotation.target_size_bytes
        });
        if should_rotate {
            self.rotate()?;
        }

        self.sink()?.write_all(&buffer)?;
        self.current_size += size;
        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(sink) => sink.finish(),
            None => Ok(()),
        }
    }
}

fn open_sink(rotation: &Rotation) -> io::Result<Sink> {
    let ext = match rotation.compression {
        JsonlCompression::None => "jsonl",
        JsonlCompression::Gzip => "jsonl.gz",
    };
    let path = file_path(&rotation.dir, &rotation.prefix, rotation.file_index, ext);
    let file = BufWriter::new(File::create(path)?);
    Ok(match rotation.compression {
        JsonlCompression::None => Sink::Plain(Box::new(file)),
        JsonlCompression::Gzip => Sink::Gzip(GzEncoder::new(file, Compression::default())),
    })
}

fn file_path(dir: &Path, prefix: &str, index: u64, ext: &str) -> PathBuf {
    dir.join(format!("{prefix}-{index:06}.{ext}"))
}

fn current_stamp() -> String {
    let now = Utc::now();
    format!("{}", now.format("%Y%m%dT%H%MZ"))
}

fn unique_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn parse_compression(value: Option<&str>) -> io::Result<JsonlCompression> {
    let Some(value) = value else {
        return Ok(JsonlCompression::None);
    };
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(JsonlCompression::None);
    }
    match normalized.as_str() {
        "none" => Ok(JsonlCompression::None),
        "gzip" | "gz" => Ok(JsonlCompression::Gzip),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported jsonl compression: {value}"),
        )),
    }
}
