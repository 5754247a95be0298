use crate::domain::Record;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

/// Observer of selection changes. Called once per successful mutation, after the
/// new index is in place.
pub trait CatalogListener {
    fn current_changed(&mut self, index: usize, record: &Record);
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SelectError {
    #[error("index {index} is out of range for a catalog of {len} entries")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered records plus the current selection.
pub struct Catalog {
    records: Vec<Record>,
    current: usize,
    listeners: Vec<Box<dyn CatalogListener>>,
}

impl Catalog {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            current: 0,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn CatalogListener>) {
        self.listeners.push(listener);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Record> {
        self.records.get(self.current)
    }

    pub fn advance(&mut self) {
        let len = self.records.len();
        if len == 0 {
            return;
        }
        self.set_current((self.current + 1) % len);
    }

    pub fn retreat(&mut self) {
        let len = self.records.len();
        if len == 0 {
            return;
        }
        self.set_current((self.current + len - 1) % len);
    }

    pub fn select_random(&mut self) {
        self.select_random_with(&mut OsRng);
    }

    pub fn select_random_with<R: RngCore>(&mut self, rng: &mut R) {
        let len = self.records.len();
        if len == 0 {
            return;
        }
        let index = uniform_index(rng, len);
        self.set_current(index);
    }

    pub fn select_index(&mut self, index: usize) -> Result<(), SelectError> {
        let len = self.records.len();
        if index >= len {
            return Err(SelectError::OutOfRange { index, len });
        }
        self.set_current(index);
        Ok(())
    }

    fn set_current(&mut self, index: usize) {
        self.current = index;
        let Some(record) = self.records.get(index) else {
            return;
        };
        for listener in &mut self.listeners {
            listener.current_changed(index, record);
        }
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("len", &self.records.len())
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// Rejection sampling keeps the draw uniform for any `len`.
fn uniform_index<R: RngCore>(rng: &mut R, len: usize) -> usize {
    let len = len as u64;
    let zone = u64::MAX - (u64::MAX % len);
    loop {
        let value = rng.next_u64();
        if value < zone {
            return (value % len) as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, channel};

    struct Recorder(Sender<(usize, u32)>);

    impl CatalogListener for Recorder {
        fn current_changed(&mut self, index: usize, record: &Record) {
            let _ = self.0.send((index, record.id));
        }
    }

    fn record(id: u32, name: &str) -> Record {
        Record {
            id,
            name: name.to_string(),
            types: vec!["normal".to_string()],
            height_m: 1.0,
            weight_kg: 1.0,
            description: String::new(),
            sprite: String::new(),
            cry: String::new(),
        }
    }

    fn catalog_of(len: u32) -> Catalog {
        Catalog::new((1..=len).map(|id| record(id, &format!("mon{id}"))).collect())
    }

    fn recorded(catalog: &mut Catalog) -> Receiver<(usize, u32)> {
        let (tx, rx) = channel();
        catalog.subscribe(Box::new(Recorder(tx)));
        rx
    }

    #[test]
    fn advance_and_retreat_cycle_back_to_start() {
        for len in 1..=7 {
            let mut catalog = catalog_of(len);
            catalog.select_index(len as usize / 2).expect("select");
            let start = catalog.current_index();
            for _ in 0..len {
                catalog.advance();
            }
            assert_eq!(catalog.current_index(), start);
            for _ in 0..len {
                catalog.retreat();
            }
            assert_eq!(catalog.current_index(), start);
        }
    }

    #[test]
    fn retreat_wraps_from_first_to_last() {
        let mut catalog = catalog_of(3);
        catalog.retreat();
        assert_eq!(catalog.current_index(), 2);
        catalog.advance();
        assert_eq!(catalog.current_index(), 0);
    }

    #[test]
    fn select_random_stays_in_range() {
        let mut catalog = catalog_of(5);
        for _ in 0..500 {
            catalog.select_random();
            assert!(catalog.current_index() < catalog.len());
        }
    }

    #[test]
    fn select_index_rejects_out_of_range_without_change() {
        let mut catalog = catalog_of(2);
        let rx = recorded(&mut catalog);
        catalog.advance();
        assert_eq!(
            catalog.select_index(2),
            Err(SelectError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(catalog.current_index(), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn empty_catalog_is_a_no_op() {
        let mut catalog = Catalog::new(Vec::new());
        let rx = recorded(&mut catalog);
        catalog.advance();
        catalog.retreat();
        catalog.select_random();
        assert!(catalog.current().is_none());
        assert_eq!(catalog.current_index(), 0);
        assert!(catalog.select_index(0).is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn every_mutation_notifies_each_listener_once() {
        let mut catalog = catalog_of(4);
        let first = recorded(&mut catalog);
        let second = recorded(&mut catalog);

        catalog.advance();
        catalog.retreat();
        catalog.select_index(3).expect("select");

        let expected = vec![(1, 2), (0, 1), (3, 4)];
        assert_eq!(first.try_iter().collect::<Vec<_>>(), expected);
        assert_eq!(second.try_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn uniform_index_covers_every_slot() {
        let mut rng = OsRng;
        let mut seen = [false; 6];
        for _ in 0..2_000 {
            seen[uniform_index(&mut rng, 6)] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }
}
