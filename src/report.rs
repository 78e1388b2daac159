//! Plain-text printers for resource samples and integer buffers.

use crate::error::ReportError;
use std::io::{self, Write};
use std::time::Duration;

/// Fixed-width unsigned integer that can be dumped in aligned columns.
pub trait Dump: Copy + std::fmt::Display {
    /// Column width of the widest decimal value.
    const WIDTH: usize;
    /// Short type tag printed after the label.
    const TAG: &'static str;
}

impl Dump for u8 {
    const WIDTH: usize = 3;
    const TAG: &'static str = "u8";
}

impl Dump for u32 {
    const WIDTH: usize = 10;
    const TAG: &'static str = "u32";
}

impl Dump for u64 {
    const WIDTH: usize = 20;
    const TAG: &'static str = "u64";
}

/// Write `data` as one labeled row.
pub fn write_vector<T: Dump, W: Write>(out: &mut W, name: &str, data: &[T]) -> io::Result<()> {
    writeln!(out, "{} ({}[{}]):", name, T::TAG, data.len())?;
    write_row(out, data)
}

/// Write `data` as a labeled row-major `rows` x `cols` grid.
pub fn write_matrix<T: Dump, W: Write>(
    out: &mut W,
    name: &str,
    data: &[T],
    rows: usize,
    cols: usize,
) -> Result<(), ReportError> {
    if rows.checked_mul(cols) != Some(data.len()) {
        return Err(ReportError::ShapeMismatch {
            rows,
            cols,
            len: data.len(),
        });
    }
    writeln!(out, "{} ({}[{}x{}]):", name, T::TAG, rows, cols)?;
    if cols > 0 {
        for row in data.chunks(cols) {
            write_row(out, row)?;
        }
    }
    Ok(())
}

fn write_row<T: Dump, W: Write>(out: &mut W, row: &[T]) -> io::Result<()> {
    write!(out, " ")?;
    for value in row {
        write!(out, " {:>width$}", value, width = T::WIDTH)?;
    }
    writeln!(out)
}

/// Print a labeled vector to stdout.
pub fn print_vector<T: Dump>(name: &str, data: &[T]) -> io::Result<()> {
    write_vector(&mut io::stdout().lock(), name, data)
}

/// Print a labeled matrix to stdout.
pub fn print_matrix<T: Dump>(name: &str, data: &[T], rows: usize, cols: usize) -> Result<(), ReportError> {
    write_matrix(&mut io::stdout().lock(), name, data, rows, cols)
}

struct Spread {
    min: f64,
    avg: f64,
    max: f64,
}

fn spread(values: impl Iterator<Item = f64>) -> Option<Spread> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    (count > 0).then(|| Spread {
        min,
        avg: sum / count as f64,
        max,
    })
}

fn write_spread<W: Write>(out: &mut W, label: &str, runs: usize, unit: &str, s: Option<Spread>) -> io::Result<()> {
    match s {
        Some(s) => writeln!(
            out,
            "{}: {} run(s), min {:.3} {unit}, avg {:.3} {unit}, max {:.3} {unit}",
            label,
            runs,
            s.min,
            s.avg,
            s.max,
            unit = unit
        ),
        None => writeln!(out, "{}: no samples", label),
    }
}

/// Summarize cycle counts from repeated runs.
pub fn write_cpuinfo<W: Write>(out: &mut W, label: &str, cycles: &[u64]) -> io::Result<()> {
    let s = spread(cycles.iter().map(|&c| c as f64));
    write_spread(out, label, cycles.len(), "cycles", s)
}

/// Summarize wall-clock durations from repeated runs.
pub fn write_clkinfo<W: Write>(out: &mut W, label: &str, times: &[Duration]) -> io::Result<()> {
    let s = spread(times.iter().map(|t| t.as_secs_f64() * 1e3));
    write_spread(out, label, times.len(), "ms", s)
}

/// Summarize memory footprints (kilobytes) from repeated runs.
pub fn write_meminfo<W: Write>(out: &mut W, label: &str, kilobytes: &[u64]) -> io::Result<()> {
    let s = spread(kilobytes.iter().map(|&k| k as f64));
    write_spread(out, label, kilobytes.len(), "KB", s)
}

/// [`write_cpuinfo`] to stdout.
pub fn print_cpuinfo(label: &str, cycles: &[u64]) -> io::Result<()> {
    write_cpuinfo(&mut io::stdout().lock(), label, cycles)
}

/// [`write_clkinfo`] to stdout.
pub fn print_clkinfo(label: &str, times: &[Duration]) -> io::Result<()> {
    write_clkinfo(&mut io::stdout().lock(), label, times)
}

/// [`write_meminfo`] to stdout.
pub fn print_meminfo(label: &str, kilobytes: &[u64]) -> io::Result<()> {
    write_meminfo(&mut io::stdout().lock(), label, kilobytes)
}
