//! Per-axis indices with ellipsis support.

use std::fmt;

/// One element of a multi-axis index.
///
/// Fixed positions before an ellipsis address leading axes; positions after it
/// address trailing axes. Without an ellipsis, unindexed trailing axes are
/// taken whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// A single position along the axis; the axis is removed from the result.
    At(usize),
    /// All remaining axes, taken whole.
    Ellipsis,
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index::At(value)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::At(pos) => write!(f, "{pos}"),
            Index::Ellipsis => f.write_str("..."),
        }
    }
}

/// Resolves an index list against a shape into `(axis, position)` pairs.
///
/// Panics on more than one ellipsis, too many indices, or out-of-range positions.
pub(crate) fn resolve(indices: &[Index], shape: &[usize]) -> Vec<(usize, usize)> {
    let ndim = shape.len();
    let ellipses = indices.iter().filter(|idx| **idx == Index::Ellipsis).count();
    assert!(ellipses <= 1, "at most one ellipsis is allowed in an index");
    let fixed = indices.len() - ellipses;
    assert!(
        fixed <= ndim,
        "index with {fixed} positions applied to a tensor of rank {ndim}"
    );

    let split = indices
        .iter()
        .position(|idx| *idx == Index::Ellipsis)
        .unwrap_or(indices.len());
    let trailing = &indices[(split + 1).min(indices.len())..];
    let trailing_start = ndim - trailing.len();

    let mut resolved = Vec::with_capacity(fixed);
    let leading = indices[..split].iter().enumerate();
    let tail = trailing
        .iter()
        .enumerate()
        .map(|(offset, idx)| (trailing_start + offset, idx));
    for (axis, idx) in leading.chain(tail) {
        if let Index::At(pos) = idx {
            assert!(
                *pos < shape[axis],
                "index {pos} out of range for axis {axis} of size {}",
                shape[axis]
            );
            resolved.push((axis, *pos));
        }
    }
    resolved
}

/// Shape left after removing the fixed axes.
pub(crate) fn selected_shape(shape: &[usize], fixed: &[(usize, usize)]) -> Vec<usize> {
    shape
        .iter()
        .enumerate()
        .filter(|(axis, _)| !fixed.iter().any(|(f, _)| f == axis))
        .map(|(_, len)| *len)
        .collect()
}

/// Writes an index list as `[0, 1, ...]`.
pub(crate) fn render(indices: &[Index]) -> String {
    let parts: Vec<String> = indices.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
