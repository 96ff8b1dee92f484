//! Self-describing binary diagnostics dumps (ZDF).
//!
//! Every file starts with a magic tag and format version, followed by
//! tagged records: `u32` record tag, length-prefixed record name, `u64`
//! payload length, payload. All integers, floats and the `f32` data
//! payloads are little-endian. A file is readable without prior knowledge
//! of its contents: the iteration record carries the simulation time, the
//! info records carry per-axis labels, units and ranges, and the dataset
//! records carry their own type code and shape.
//!
//! The writer covers the four record groups the engine emits: scalar grids
//! (field components, charge density), phasespace histograms (written as
//! grids over their quantity axes) and particle lists (one 1D dataset per
//! quantity). A matching reader is provided and used by the tests to
//! verify round-trips.

use crate::Result;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// File magic, followed by the format version.
pub const MAGIC: &[u8; 4] = b"ZDF1";
/// Format version written by this crate.
pub const VERSION: u32 = 1;

/// Record tag: iteration number and simulation time.
pub const TAG_ITERATION: u32 = 0x0020_0000;
/// Record tag: grid metadata (shape, axis labels/units/ranges).
pub const TAG_GRID_INFO: u32 = 0x0021_0000;
/// Record tag: particle list metadata (name, count, quantity labels).
pub const TAG_PART_INFO: u32 = 0x0022_0000;
/// Record tag: raw dataset (type code, shape, payload).
pub const TAG_DATASET: u32 = 0x0010_0000;

/// Dataset type code for little-endian `f32`.
pub const DTYPE_F32: u32 = 32;

/// One axis of a grid or phasespace record.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    /// Axis label.
    pub label: String,
    /// Axis units.
    pub units: String,
    /// Lower edge of the axis range.
    pub min: f64,
    /// Upper edge of the axis range.
    pub max: f64,
}

/// Metadata for a grid (or phasespace) record.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMeta {
    /// Record name.
    pub name: String,
    /// Quantity label.
    pub label: String,
    /// Quantity units.
    pub units: String,
    /// Axis descriptions, one per dimension.
    pub axes: Vec<GridAxis>,
    /// Iteration number.
    pub iteration: u64,
    /// Simulation time.
    pub time: f64,
}

/// Metadata for a particle list record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleMeta {
    /// Species name.
    pub name: String,
    /// Iteration number.
    pub iteration: u64,
    /// Simulation time.
    pub time: f64,
    /// Number of particles in the dump.
    pub count: u64,
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Length-prefixed UTF-8 string.
fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

fn str_len(s: &str) -> u64 {
    4 + s.len() as u64
}

fn write_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    write_u32(w, VERSION)
}

fn write_record_header<W: Write>(w: &mut W, tag: u32, name: &str, len: u64) -> io::Result<()> {
    write_u32(w, tag)?;
    write_str(w, name)?;
    write_u64(w, len)
}

fn write_iteration<W: Write>(w: &mut W, n: u64, t: f64) -> io::Result<()> {
    write_record_header(w, TAG_ITERATION, "iteration", 16)?;
    write_u64(w, n)?;
    write_f64(w, t)
}

fn write_dataset<W: Write>(w: &mut W, shape: &[u64], data: &[f32]) -> io::Result<()> {
    let len = 4 + 4 + 8 * shape.len() as u64 + 4 * data.len() as u64;
    write_record_header(w, TAG_DATASET, "data", len)?;
    write_u32(w, DTYPE_F32)?;
    write_u32(w, shape.len() as u32)?;
    for &s in shape {
        write_u64(w, s)?;
    }
    for &v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Write a 2D scalar grid record (also used for phasespace histograms).
///
/// `data` is row-major with `shape[0]` varying fastest.
pub fn write_grid(path: &Path, data: &[f32], shape: [usize; 2], meta: &GridMeta) -> Result<()> {
    debug_assert_eq!(data.len(), shape[0] * shape[1]);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_header(&mut w)?;
    write_iteration(&mut w, meta.iteration, meta.time)?;

    let mut len = 4 + 2 * 8 + str_len(&meta.label) + str_len(&meta.units);
    for ax in &meta.axes {
        len += str_len(&ax.label) + str_len(&ax.units) + 16;
    }
    write_record_header(&mut w, TAG_GRID_INFO, &meta.name, len)?;
    write_u32(&mut w, 2)?;
    write_u64(&mut w, shape[0] as u64)?;
    write_u64(&mut w, shape[1] as u64)?;
    write_str(&mut w, &meta.label)?;
    write_str(&mut w, &meta.units)?;
    for ax in &meta.axes {
        write_str(&mut w, &ax.label)?;
        write_str(&mut w, &ax.units)?;
        write_f64(&mut w, ax.min)?;
        write_f64(&mut w, ax.max)?;
    }

    write_dataset(&mut w, &[shape[0] as u64, shape[1] as u64], data)?;
    w.flush()?;
    Ok(())
}

/// Write a particle list: one 1D `f32` dataset per quantity.
pub fn write_particles(
    path: &Path,
    arrays: &[(String, Vec<f32>)],
    meta: &ParticleMeta,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_header(&mut w)?;
    write_iteration(&mut w, meta.iteration, meta.time)?;

    let mut len = 8 + 4;
    for (label, _) in arrays {
        len += str_len(label);
    }
    write_record_header(&mut w, TAG_PART_INFO, &meta.name, len)?;
    write_u64(&mut w, meta.count)?;
    write_u32(&mut w, arrays.len() as u32)?;
    for (label, _) in arrays {
        write_str(&mut w, label)?;
    }

    for (_, data) in arrays {
        write_dataset(&mut w, &[data.len() as u64], data)?;
    }
    w.flush()?;
    Ok(())
}

fn bad_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(f64::from_le_bytes(b))
}

fn read_str<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    String::from_utf8(b).map_err(|_| bad_data("invalid UTF-8 in string"))
}

fn read_header<R: Read>(r: &mut R) -> io::Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(bad_data("not a ZDF file"));
    }
    let version = read_u32(r)?;
    if version != VERSION {
        return Err(bad_data("unsupported ZDF version"));
    }
    Ok(())
}

fn read_record_header<R: Read>(r: &mut R, expect: u32) -> io::Result<String> {
    let tag = read_u32(r)?;
    if tag != expect {
        return Err(bad_data("unexpected record tag"));
    }
    let name = read_str(r)?;
    let _len = read_u64(r)?;
    Ok(name)
}

fn read_dataset<R: Read>(r: &mut R) -> io::Result<(Vec<u64>, Vec<f32>)> {
    read_record_header(r, TAG_DATASET)?;
    let dtype = read_u32(r)?;
    if dtype != DTYPE_F32 {
        return Err(bad_data("unsupported dataset type"));
    }
    let ndims = read_u32(r)? as usize;
    let mut shape = Vec::with_capacity(ndims);
    for _ in 0..ndims {
        shape.push(read_u64(r)?);
    }
    let count: u64 = shape.iter().product();
    let mut data = Vec::with_capacity(count as usize);
    let mut b = [0u8; 4];
    for _ in 0..count {
        r.read_exact(&mut b)?;
        data.push(f32::from_le_bytes(b));
    }
    Ok((shape, data))
}

/// Read back a grid record written by [`write_grid`].
pub fn read_grid(path: &Path) -> Result<(Vec<f32>, [usize; 2], GridMeta)> {
    let mut r = BufReader::new(File::open(path)?);
    read_header(&mut r)?;

    read_record_header(&mut r, TAG_ITERATION)?;
    let iteration = read_u64(&mut r)?;
    let time = read_f64(&mut r)?;

    let name = read_record_header(&mut r, TAG_GRID_INFO)?;
    let ndims = read_u32(&mut r)?;
    if ndims != 2 {
        return Err(bad_data("expected a 2D grid record").into());
    }
    let shape = [read_u64(&mut r)? as usize, read_u64(&mut r)? as usize];
    let label = read_str(&mut r)?;
    let units = read_str(&mut r)?;
    let mut axes = Vec::with_capacity(2);
    for _ in 0..2 {
        axes.push(GridAxis {
            label: read_str(&mut r)?,
            units: read_str(&mut r)?,
            min: read_f64(&mut r)?,
            max: read_f64(&mut r)?,
        });
    }

    let (dshape, data) = read_dataset(&mut r)?;
    if dshape != [shape[0] as u64, shape[1] as u64] {
        return Err(bad_data("dataset shape disagrees with grid info").into());
    }

    Ok((
        data,
        shape,
        GridMeta {
            name,
            label,
            units,
            axes,
            iteration,
            time,
        },
    ))
}

/// Read back a particle list written by [`write_particles`].
pub fn read_particles(path: &Path) -> Result<(Vec<(String, Vec<f32>)>, ParticleMeta)> {
    let mut r = BufReader::new(File::open(path)?);
    read_header(&mut r)?;

    read_record_header(&mut r, TAG_ITERATION)?;
    let iteration = read_u64(&mut r)?;
    let time = read_f64(&mut r)?;

    let name = read_record_header(&mut r, TAG_PART_INFO)?;
    let count = read_u64(&mut r)?;
    let nquants = read_u32(&mut r)? as usize;
    let mut labels = Vec::with_capacity(nquants);
    for _ in 0..nquants {
        labels.push(read_str(&mut r)?);
    }

    let mut arrays = Vec::with_capacity(nquants);
    for label in labels {
        let (shape, data) = read_dataset(&mut r)?;
        if shape.len() != 1 || shape[0] != count {
            return Err(bad_data("particle dataset length disagrees with count").into());
        }
        arrays.push((label, data));
    }

    Ok((
        arrays,
        ParticleMeta {
            name,
            iteration,
            time,
            count,
        },
    ))
}
