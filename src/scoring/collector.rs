/// Pending frequencies per note, indexed by the timeline's dense note index.
///
/// Lists are allocated once per song; clearing a note keeps its capacity so
/// a restarted performance does not reallocate.
#[derive(Debug, Clone, Default)]
pub struct NoteSampleCollector {
    pending: Vec<Vec<f32>>,
}

impl NoteSampleCollector {
    pub fn new(note_count: usize) -> Self {
        NoteSampleCollector {
            pending: vec![Vec::new(); note_count],
        }
    }

    pub fn push(&mut self, note: usize, hz: f32) {
        if let Some(list) = self.pending.get_mut(note) {
            list.push(hz);
        }
    }

    pub fn samples(&self, note: usize) -> &[f32] {
        self.pending.get(note).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear(&mut self, note: usize) {
        if let Some(list) = self.pending.get_mut(note) {
            list.clear();
        }
    }

    pub fn clear_all(&mut self) {
        self.pending.iter_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut c = NoteSampleCollector::new(3);
        c.push(1, 440.0);
        c.push(1, 441.0);
        c.push(2, 220.0);
        assert_eq!(c.samples(1), &[440.0, 441.0]);

        c.clear(1);
        assert!(c.samples(1).is_empty());
        assert_eq!(c.samples(2), &[220.0]);

        c.clear_all();
        assert!((0..3).all(|note| c.samples(note).is_empty()));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut c = NoteSampleCollector::new(1);
        c.push(5, 440.0);
        c.clear(5);
        assert!(c.samples(5).is_empty());
        assert!(c.samples(0).is_empty());
    }
}
