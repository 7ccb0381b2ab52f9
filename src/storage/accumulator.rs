use parking_lot::Mutex;

/// Scalar slots summed across workers.
///
/// Scalars can't be split in owned ranges like vectors, so every worker adds its weighted
/// contribution while holding the mutex.
#[derive(Debug)]
pub struct ScalarAccumulator {
    len: usize,
    slots: Mutex<Box<[f64]>>,
}

impl ScalarAccumulator {
    /// Creates a new `ScalarAccumulator`.
    ///
    /// # Arguments
    /// * `len` - The amount of scalars reduced together.
    ///
    /// # Returns
    /// A new `ScalarAccumulator` instance.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            slots: Mutex::new(vec![0.; len].into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Overwrites the slots with `values * weight`.
    pub fn reset(&self, values: &[f64], weight: f64) {
        self.slots
            .lock()
            .iter_mut()
            .zip(values)
            .for_each(|(slot, v)| *slot = v * weight);
    }

    /// Adds `values * weight` to the slots.
    pub fn add(&self, values: &[f64], weight: f64) {
        self.slots
            .lock()
            .iter_mut()
            .zip(values)
            .for_each(|(slot, v)| *slot += v * weight);
    }

    /// Copies the current slots into `out`.
    pub fn read(&self, out: &mut [f64]) {
        out.copy_from_slice(&self.slots.lock());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_discards_previous_sum() {
        let acc = ScalarAccumulator::new(2);

        acc.reset(&[1., 2.], 0.5);
        acc.add(&[3., 4.], 0.5);

        let mut out = [0.; 2];
        acc.read(&mut out);
        assert_eq!(out, [2., 3.]);

        acc.reset(&[10., 10.], 1.);
        acc.read(&mut out);
        assert_eq!(out, [10., 10.]);
    }
}
