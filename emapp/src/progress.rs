pub trait ProgressReporter {
    /// `value` is in `0.0..=1.0`.
    fn set_progress(&mut self, value: f32);
}

impl<F> ProgressReporter for F
where
    F: FnMut(f32),
{
    fn set_progress(&mut self, value: f32) {
        self(value)
    }
}
