//! Output tensor text format.
//!
//! ```text
//! height_out width_out channels
//! v v v  v v v  v v v       (row 0)
//! ```
//!
//! Each value is followed by one space; pixels are separated by one extra
//! space. Rows end with the trailing value separator and a newline.

use crate::error::Result;
use crate::tensor::{CellIndex, OutputTensor};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render `tensor` into `out`.
///
/// # Errors
///
/// Returns any I/O error from `out`.
pub fn render_output(tensor: &OutputTensor, out: &mut impl Write) -> Result<()> {
    let shape = tensor.shape();
    writeln!(out, "{} {} {}", shape.height, shape.width, shape.channels)?;
    for row in 0..shape.height {
        for col in 0..shape.width {
            for channel in 0..shape.channels {
                write!(out, "{} ", tensor.get(CellIndex::new(row, col, channel)))?;
            }
            if col + 1 < shape.width {
                write!(out, " ")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write `tensor` to a file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_output(path: impl AsRef<Path>, tensor: &OutputTensor) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    render_output(tensor, &mut out)?;
    out.flush()?;
    tracing::info!("Wrote {} output to {}", tensor.shape(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn layout_separates_pixels_with_extra_space() {
        let mut t = OutputTensor::zeros(Shape::new(1, 2, 3));
        for (i, cell) in t.cells().collect::<Vec<_>>().into_iter().enumerate() {
            t.set(cell, u16::try_from(i).unwrap());
        }
        let mut buf = Vec::new();
        render_output(&t, &mut buf).unwrap();
        // cells() is channel-major: [0][0][0]=0, [0][1][0]=1, [0][0][1]=2, ...
        assert_eq!(String::from_utf8(buf).unwrap(), "1 2 3\n0 2 4  1 3 5 \n");
    }

    #[test]
    fn one_line_per_row() {
        let t = OutputTensor::zeros(Shape::new(3, 1, 1));
        let mut buf = Vec::new();
        render_output(&t, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "3 1 1\n0 \n0 \n0 \n");
    }
}
