/// Percent-complete reporting for long loops.
///
/// Emits a `tracing::debug!` event each time the loop crosses another
/// `step` percent. Purely informational.
pub(crate) struct Progress {
    label: &'static str,
    total: usize,
    step: usize,
    next: usize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self::with_step(label, total, 10)
    }

    pub fn with_step(label: &'static str, total: usize, step: usize) -> Self {
        let step = step.clamp(1, 100);
        Self {
            label,
            total,
            step,
            next: step,
        }
    }

    /// Record that item `index` (0-based) is done.
    /// Returns the percentage reported, if any.
    pub fn tick(&mut self, index: usize) -> Option<usize> {
        if self.total == 0 || self.next > 100 {
            return None;
        }

        let percent = (index + 1).min(self.total) * 100 / self.total;
        if percent < self.next {
            return None;
        }

        tracing::debug!(
            "{} {:>3}% ({}/{})",
            self.label,
            percent,
            index + 1,
            self.total
        );
        self.next = (percent / self.step + 1) * self.step;
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_step_once() {
        let mut progress = Progress::new("testing", 20);
        let reported: Vec<usize> = (0..20).filter_map(|i| progress.tick(i)).collect();
        assert_eq!(reported, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_skips_when_items_outnumber_steps() {
        let mut progress = Progress::with_step("testing", 3, 25);
        let reported: Vec<usize> = (0..3).filter_map(|i| progress.tick(i)).collect();
        assert_eq!(reported, vec![33, 66, 100]);
    }

    #[test]
    fn test_empty_loop_is_silent() {
        let mut progress = Progress::new("testing", 0);
        assert_eq!(progress.tick(0), None);
    }
}
