use ndarray::{ArcArray, ArrayD, Axis, IxDyn, Slice};

/// Array storage for dataset variables.
///
/// Zero-filled arrays are kept as shape-only placeholders until something
/// asks for the values, so extending a dataset in time does not allocate the
/// extended fields up front.
#[derive(Debug, Clone)]
pub enum LazyArray {
    /// Materialized values, shared between datasets that did not modify them
    Dense(ArcArray<f32, IxDyn>),
    /// Deferred zero array of the given shape
    Zeros(Vec<usize>),
    /// `prefix` along `axis`, followed by zeros up to `len` entries on that axis
    Padded {
        prefix: ArcArray<f32, IxDyn>,
        axis: usize,
        len: usize,
    },
}

impl LazyArray {
    pub fn zeros(shape: &[usize]) -> Self {
        LazyArray::Zeros(shape.to_vec())
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            LazyArray::Dense(array) => array.shape().to_vec(),
            LazyArray::Zeros(shape) => shape.clone(),
            LazyArray::Padded { prefix, axis, len } => {
                let mut shape = prefix.shape().to_vec();
                shape[*axis] = *len;
                shape
            }
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            LazyArray::Dense(array) => array.ndim(),
            LazyArray::Zeros(shape) => shape.len(),
            LazyArray::Padded { prefix, .. } => prefix.ndim(),
        }
    }

    /// True if any part of the values has not been allocated yet
    pub fn is_deferred(&self) -> bool {
        !matches!(self, LazyArray::Dense(_))
    }

    /// Produce the values. Dense arrays are returned without copying.
    pub fn materialize(&self) -> ArcArray<f32, IxDyn> {
        match self {
            LazyArray::Dense(array) => array.clone(),
            LazyArray::Zeros(shape) => ArrayD::<f32>::zeros(IxDyn(shape)).into_shared(),
            LazyArray::Padded { prefix, axis, .. } => {
                let mut out = ArrayD::<f32>::zeros(IxDyn(&self.shape()));
                let filled = prefix.len_of(Axis(*axis));
                out.slice_axis_mut(Axis(*axis), Slice::from(0..filled))
                    .assign(prefix);
                out.into_shared()
            }
        }
    }

    /// Take `indices` along `axis`.
    pub fn select(&self, axis: usize, indices: &[usize]) -> LazyArray {
        match self {
            LazyArray::Dense(array) => {
                LazyArray::Dense(array.select(Axis(axis), indices).into_shared())
            }
            LazyArray::Zeros(shape) => {
                let mut shape = shape.clone();
                shape[axis] = indices.len();
                LazyArray::Zeros(shape)
            }
            LazyArray::Padded {
                prefix,
                axis: pad_axis,
                len,
            } => {
                if axis != *pad_axis {
                    return LazyArray::Padded {
                        prefix: prefix.select(Axis(axis), indices).into_shared(),
                        axis: *pad_axis,
                        len: *len,
                    };
                }
                let filled = prefix.len_of(Axis(axis));
                if indices.iter().all(|&i| i < filled) {
                    LazyArray::Dense(prefix.select(Axis(axis), indices).into_shared())
                } else if indices.iter().all(|&i| i >= filled) {
                    let mut shape = self.shape();
                    shape[axis] = indices.len();
                    LazyArray::Zeros(shape)
                } else {
                    LazyArray::Dense(
                        self.materialize()
                            .select(Axis(axis), indices)
                            .into_shared(),
                    )
                }
            }
        }
    }

    /// Insert a new axis of length one at `axis`.
    pub fn insert_axis(&self, axis: usize) -> LazyArray {
        match self {
            LazyArray::Dense(array) => LazyArray::Dense(array.clone().insert_axis(Axis(axis))),
            LazyArray::Zeros(shape) => {
                let mut shape = shape.clone();
                shape.insert(axis, 1);
                LazyArray::Zeros(shape)
            }
            LazyArray::Padded {
                prefix,
                axis: pad_axis,
                len,
            } => LazyArray::Padded {
                prefix: prefix.clone().insert_axis(Axis(axis)),
                axis: if axis <= *pad_axis { pad_axis + 1 } else { *pad_axis },
                len: *len,
            },
        }
    }

    /// Remove a length-one axis. The caller checks the length.
    pub fn remove_axis(&self, axis: usize) -> LazyArray {
        match self {
            LazyArray::Dense(array) => {
                LazyArray::Dense(array.clone().index_axis_move(Axis(axis), 0))
            }
            LazyArray::Zeros(shape) => {
                let mut shape = shape.clone();
                shape.remove(axis);
                LazyArray::Zeros(shape)
            }
            LazyArray::Padded {
                prefix,
                axis: pad_axis,
                len,
            } => {
                if axis == *pad_axis {
                    // a length-one padded axis is either all prefix or all zeros
                    return self.select(axis, &[0]).remove_axis(axis);
                }
                LazyArray::Padded {
                    prefix: prefix.clone().index_axis_move(Axis(axis), 0),
                    axis: if axis < *pad_axis { pad_axis - 1 } else { *pad_axis },
                    len: *len,
                }
            }
        }
    }
}

impl From<ArrayD<f32>> for LazyArray {
    fn from(array: ArrayD<f32>) -> Self {
        LazyArray::Dense(array.into_shared())
    }
}

impl From<ArcArray<f32, IxDyn>> for LazyArray {
    fn from(array: ArcArray<f32, IxDyn>) -> Self {
        LazyArray::Dense(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn padded() -> LazyArray {
        let prefix = array![[1.0_f32, 2.0], [3.0, 4.0]].into_dyn().into_shared();
        LazyArray::Padded {
            prefix,
            axis: 0,
            len: 4,
        }
    }

    #[test]
    fn test_zeros_stay_deferred_through_selection() {
        let zeros = LazyArray::zeros(&[1, 5, 3]);
        let selected = zeros.select(1, &[0, 2]);
        assert!(selected.is_deferred());
        assert_eq!(selected.shape(), vec![1, 2, 3]);
    }

    #[test]
    fn test_padded_materialize() {
        let values = padded().materialize();
        assert_eq!(values.shape(), &[4, 2]);
        let expected = array![[1.0_f32, 2.0], [3.0, 4.0], [0.0, 0.0], [0.0, 0.0]].into_dyn();
        assert_eq!(values.to_owned(), expected);
    }

    #[test]
    fn test_padded_select_regions() {
        let head = padded().select(0, &[0, 1]);
        assert!(!head.is_deferred());

        let tail = padded().select(0, &[2, 3]);
        assert!(matches!(tail, LazyArray::Zeros(ref s) if s == &vec![2, 2]));

        let mixed = padded().select(0, &[1, 2]).materialize();
        assert_eq!(mixed.to_owned(), array![[3.0_f32, 4.0], [0.0, 0.0]].into_dyn());
    }

    #[test]
    fn test_insert_and_remove_axis() {
        let dense = LazyArray::from(Array2::<f32>::ones((2, 3)).into_dyn());
        let expanded = dense.insert_axis(0);
        assert_eq!(expanded.shape(), vec![1, 2, 3]);
        assert_eq!(expanded.remove_axis(0).shape(), vec![2, 3]);

        let padded = padded().insert_axis(0);
        assert!(matches!(padded, LazyArray::Padded { axis: 1, .. }));
        assert_eq!(padded.shape(), vec![1, 4, 2]);
        assert_eq!(padded.remove_axis(0).shape(), vec![4, 2]);
    }
}
