use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta::{self as fasta, record::{Definition, Sequence}, Record};

use crate::errors::PoaBatchError;

/// The reads of a single window, as read from a FASTA file
#[derive(Debug, Clone, Default)]
pub struct WindowReads {
    /// Window name, derived from the file name
    pub name: String,
    pub read_names: Vec<String>,
    pub reads: Vec<Vec<u8>>,
}

impl WindowReads {
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

/// Read all records of a (optionally gzipped) FASTA file as one window
pub fn read_window(path: impl AsRef<Path>) -> Result<WindowReads, PoaBatchError> {
    let path = path.as_ref();
    let is_gzipped = path.extension().is_some_and(|ext| ext == "gz");

    let file = File::open(path)
        .map_err(|source| PoaBatchError::FileReadError { source })?;

    let reader_inner: Box<dyn BufRead> = if is_gzipped {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let non_gzip_path = if is_gzipped { path.with_extension("") } else { path.to_path_buf() };
    let name = non_gzip_path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    read_window_from(name, reader_inner)
}

pub fn read_window_from(name: String, reader_inner: impl BufRead) -> Result<WindowReads, PoaBatchError> {
    let mut reader = fasta::io::Reader::new(reader_inner);
    let mut window = WindowReads { name, ..WindowReads::default() };

    for result in reader.records() {
        let record = result?;

        window.read_names.push(String::from_utf8_lossy(record.name()).to_string());
        window.reads.push(record.sequence().as_ref().to_vec());
    }

    Ok(window)
}

/// Writes window outputs as FASTA records
pub struct OutputWriter<W: Write> {
    writer: fasta::io::Writer<W>,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { writer: fasta::io::Writer::new(inner) }
    }

    pub fn write_consensus(&mut self, window_name: &str, consensus: &[u8]) -> Result<(), PoaBatchError> {
        let header = Definition::new(format!("{window_name}_consensus"), None);
        let record = Record::new(header, Sequence::from(consensus.to_vec()));
        self.writer.write_record(&record)?;

        Ok(())
    }

    /// Write each MSA row as a record named after its read
    pub fn write_msa(&mut self, window: &WindowReads, msa: &[Vec<u8>]) -> Result<(), PoaBatchError> {
        for (read_name, row) in window.read_names.iter().zip(msa) {
            let header = Definition::new(read_name.as_str(), None);
            let record = Record::new(header, Sequence::from(row.clone()));
            self.writer.write_record(&record)?;
        }

        Ok(())
    }
}
