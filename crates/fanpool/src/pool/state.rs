use core::fmt;
use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`WorkerPool`](crate::WorkerPool).
///
/// Transitions only move forward: `Created → Started → Draining →
/// Terminated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PoolState {
    /// Built but no workers spawned yet.
    Created = 0,
    /// Workers are running and the input queue accepts jobs.
    Started = 1,
    /// Input is closed; workers are finishing the remaining jobs.
    Draining = 2,
    /// Every worker has exited and the result stream is closed.
    Terminated = 3,
}

impl PoolState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Started,
            2 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Atomic holder for a [`PoolState`].
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new(state: PoolState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> PoolState {
        PoolState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from → to`. On failure returns the state actually observed.
    pub(crate) fn transition(&self, from: PoolState, to: PoolState) -> Result<(), PoolState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PoolState::from_u8)
    }

    /// Unconditionally sets the state. Only the completion barrier uses this,
    /// to reach `Terminated`.
    pub(crate) fn set(&self, state: PoolState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What a single worker is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for the next job.
    Idle = 0,
    /// Running a job while the input queue is still open.
    Processing = 1,
    /// Running a job after the input queue was closed.
    Draining = 2,
    /// Exited, normally or after a crash.
    Terminated = 3,
}

impl WorkerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Processing,
            2 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

/// One padded slot per worker so that workers updating their own state do not
/// share cache lines.
pub(crate) struct WorkerStates {
    slots: Box<[CachePadded<AtomicU8>]>,
}

impl WorkerStates {
    pub(crate) fn new(workers: usize) -> Self {
        let slots = (0..workers)
            .map(|_| CachePadded::new(AtomicU8::new(WorkerState::Idle as u8)))
            .collect();
        Self { slots }
    }

    pub(crate) fn set(&self, worker_id: usize, state: WorkerState) {
        self.slots[worker_id].store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self, worker_id: usize) -> WorkerState {
        WorkerState::from_u8(self.slots[worker_id].load(Ordering::Acquire))
    }

    pub(crate) fn snapshot(&self) -> Vec<WorkerState> {
        (0..self.slots.len()).map(|id| self.get(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_only_from_expected_state() {
        let cell = StateCell::new(PoolState::Created);
        assert_eq!(cell.transition(PoolState::Started, PoolState::Draining), Err(PoolState::Created));
        assert_eq!(cell.transition(PoolState::Created, PoolState::Started), Ok(()));
        assert_eq!(cell.get(), PoolState::Started);
        assert_eq!(cell.transition(PoolState::Created, PoolState::Started), Err(PoolState::Started));
    }

    #[test]
    fn worker_states_start_idle() {
        let states = WorkerStates::new(3);
        assert_eq!(states.snapshot(), vec![WorkerState::Idle; 3]);

        states.set(1, WorkerState::Draining);
        assert_eq!(states.get(1), WorkerState::Draining);
        assert_eq!(
            states.snapshot(),
            vec![WorkerState::Idle, WorkerState::Draining, WorkerState::Idle]
        );
    }

    #[test]
    fn pool_state_display_is_lowercase() {
        assert_eq!(PoolState::Draining.to_string(), "draining");
        assert!(PoolState::Created < PoolState::Terminated);
    }
}
