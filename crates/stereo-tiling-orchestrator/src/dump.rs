//! On-disk tile format.
//!
//! ```text
//! u64 LE     header length in bytes
//! [u8]       JSON header (kind, shape, band/column names, attributes)
//! [f64 LE]   payload, one band/column after the other, in header order
//! ```
//!
//! Payload values are stored bit-for-bit, NaN payloads included.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DenseTile, HandleKind, OrchestratorError, SparseTile, TaskValue};

/// Upper bound on the header size, to reject garbage before allocating.
const MAX_HEADER_LEN: u64 = 64 << 20;

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Header {
    Dense {
        rows: usize,
        cols: usize,
        bands: Vec<String>,
        #[serde(default)]
        attributes: Map<String, Value>,
    },
    Sparse {
        len: usize,
        columns: Vec<String>,
        #[serde(default)]
        attributes: Map<String, Value>,
    },
}

fn write_arrays<'a, W: Write>(
    w: &mut W,
    header: &Header,
    arrays: impl Iterator<Item = &'a [f64]>,
) -> Result<(), OrchestratorError> {
    let header = serde_json::to_vec(header)?;
    w.write_u64::<LE>(header.len() as u64)?;
    w.write_all(&header)?;
    for array in arrays {
        for &v in array {
            w.write_f64::<LE>(v)?;
        }
    }
    Ok(())
}

pub(crate) fn write_dense(path: &Path, tile: &DenseTile) -> Result<(), OrchestratorError> {
    let (rows, cols) = tile.shape();
    let header = Header::Dense {
        rows,
        cols,
        bands: tile.bands().map(|(name, _)| name.to_string()).collect(),
        attributes: tile.attributes.clone(),
    };
    let mut w = BufWriter::new(File::create(path)?);
    write_arrays(&mut w, &header, tile.bands().map(|(_, v)| v))?;
    w.flush()?;
    Ok(())
}

pub(crate) fn write_sparse(path: &Path, tile: &SparseTile) -> Result<(), OrchestratorError> {
    let header = Header::Sparse {
        len: tile.len(),
        columns: tile.columns().map(|(name, _)| name.to_string()).collect(),
        attributes: tile.attributes.clone(),
    };
    let mut w = BufWriter::new(File::create(path)?);
    write_arrays(&mut w, &header, tile.columns().map(|(_, v)| v))?;
    w.flush()?;
    Ok(())
}

struct DumpReader<'p> {
    path: &'p Path,
    r: BufReader<File>,
}

impl DumpReader<'_> {
    fn corrupted(&self, reason: impl Into<String>) -> OrchestratorError {
        OrchestratorError::Corrupted {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn eof(&self, e: io::Error, what: &str) -> OrchestratorError {
        match e.kind() {
            ErrorKind::UnexpectedEof => self.corrupted(format!("truncated {what}")),
            _ => OrchestratorError::Io(e),
        }
    }

    fn header(&mut self) -> Result<Header, OrchestratorError> {
        let len = match self.r.read_u64::<LE>() {
            Ok(len) => len,
            Err(e) => return Err(self.eof(e, "header length")),
        };
        if len > MAX_HEADER_LEN {
            return Err(self.corrupted(format!("header length {len} out of range")));
        }
        let mut raw = vec![0u8; len as usize];
        if let Err(e) = self.r.read_exact(&mut raw) {
            return Err(self.eof(e, "header"));
        }
        serde_json::from_slice(&raw).map_err(|e| self.corrupted(format!("bad header: {e}")))
    }

    fn array(&mut self, len: usize) -> Result<Vec<f64>, OrchestratorError> {
        if len.checked_mul(8).is_none() {
            return Err(self.corrupted(format!("array length {len} out of range")));
        }
        let mut values = vec![0.0; len];
        if let Err(e) = self.r.read_f64_into::<LE>(&mut values) {
            return Err(self.eof(e, "payload"));
        }
        Ok(values)
    }

    fn finish(mut self) -> Result<(), OrchestratorError> {
        let mut extra = [0u8; 1];
        match self.r.read(&mut extra)? {
            0 => Ok(()),
            _ => Err(self.corrupted("trailing bytes after payload")),
        }
    }
}

/// Read a tile of the expected `kind` back from `path`.
pub(crate) fn read(path: &Path, kind: HandleKind) -> Result<TaskValue, OrchestratorError> {
    let mut reader = DumpReader {
        path,
        r: BufReader::new(File::open(path)?),
    };
    let value = match (reader.header()?, kind) {
        (
            Header::Dense {
                rows,
                cols,
                bands,
                attributes,
            },
            HandleKind::Dense,
        ) => {
            let size = rows
                .checked_mul(cols)
                .ok_or_else(|| reader.corrupted(format!("shape {rows}x{cols} out of range")))?;
            let mut tile = DenseTile::new(rows, cols);
            tile.attributes = attributes;
            for name in bands {
                let values = reader.array(size)?;
                tile.insert_band(name, values)?;
            }
            TaskValue::Dense(tile)
        }
        (
            Header::Sparse {
                len,
                columns,
                attributes,
            },
            HandleKind::Sparse,
        ) => {
            let mut tile = SparseTile::new();
            tile.attributes = attributes;
            for name in columns {
                let values = reader.array(len)?;
                tile.insert_column(name, values)?;
            }
            TaskValue::Sparse(tile)
        }
        _ => return Err(reader.corrupted(format!("header does not hold a {kind} tile"))),
    };
    reader.finish()?;
    Ok(value)
}
