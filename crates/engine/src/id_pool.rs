use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const MAX_IDS: usize = 16 * 1024;
pub const DEFAULT_QUARANTINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdPoolError {
    #[error("id pool exhausted ({0} ids in use)")]
    Exhausted(usize),
    #[error("id {0} is not allocated")]
    NotAllocated(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdState {
    Free,
    Allocated,
    Quarantined,
}

/// Small integer ids for short-lived snapshot objects. Freed ids sit in
/// quarantine for a while before they can be handed out again.
#[derive(Debug)]
pub struct IdPool {
    states: Vec<IdState>,
    free: VecDeque<usize>,
    quarantine: VecDeque<(usize, Instant)>,
    quarantine_time: Duration,
    in_use: usize,
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new(MAX_IDS, DEFAULT_QUARANTINE)
    }
}

impl IdPool {
    pub fn new(capacity: usize, quarantine_time: Duration) -> Self {
        Self {
            states: vec![IdState::Free; capacity],
            free: (0..capacity).collect(),
            quarantine: VecDeque::new(),
            quarantine_time,
            in_use: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.states.len()
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn quarantined(&self) -> usize {
        self.quarantine.len()
    }

    pub fn usage(&self) -> f32 {
        self.in_use as f32 / self.capacity().max(1) as f32
    }

    pub fn new_id(&mut self) -> Result<usize, IdPoolError> {
        self.new_id_at(Instant::now())
    }

    pub fn new_id_at(&mut self, now: Instant) -> Result<usize, IdPoolError> {
        self.release_expired(now);

        let Some(id) = self.free.pop_front() else {
            log::error!(
                "id pool exhausted: {} in use, {} quarantined",
                self.in_use,
                self.quarantine.len()
            );
            return Err(IdPoolError::Exhausted(self.in_use));
        };
        self.states[id] = IdState::Allocated;
        self.in_use += 1;
        Ok(id)
    }

    pub fn free_id(&mut self, id: usize) -> Result<(), IdPoolError> {
        self.free_id_at(id, Instant::now())
    }

    pub fn free_id_at(&mut self, id: usize, now: Instant) -> Result<(), IdPoolError> {
        match self.states.get(id) {
            Some(IdState::Allocated) => {}
            _ => return Err(IdPoolError::NotAllocated(id)),
        }
        self.states[id] = IdState::Quarantined;
        self.in_use -= 1;
        self.quarantine.push_back((id, now + self.quarantine_time));
        Ok(())
    }

    pub fn timeout_ids(&mut self) {
        while let Some((id, _)) = self.quarantine.pop_front() {
            self.states[id] = IdState::Free;
            self.free.push_back(id);
        }
    }

    pub fn reset(&mut self) {
        let capacity = self.capacity();
        self.states.fill(IdState::Free);
        self.free = (0..capacity).collect();
        self.quarantine.clear();
        self.in_use = 0;
    }

    fn release_expired(&mut self, now: Instant) {
        while let Some(&(id, deadline)) = self.quarantine.front() {
            if deadline > now {
                break;
            }
            self.quarantine.pop_front();
            self.states[id] = IdState::Free;
            self.free.push_back(id);
        }
    }
}
