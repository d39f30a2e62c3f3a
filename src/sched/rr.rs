//! Round-robin scheduler implementation.

use super::trait_def::Scheduler;
use crate::thread::ThreadId;

/// Strict round-robin cursor over threads in registration order.
///
/// Invariant once started: `active < running`.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinScheduler {
    active: usize,
    running: usize,
}

impl RoundRobinScheduler {
    pub const fn new() -> Self {
        Self { active: 0, running: 0 }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn start(&mut self, running: usize) -> Option<ThreadId> {
        self.running = running;
        self.active = 0;
        self.active()
    }

    fn pick_next(&mut self) -> Option<ThreadId> {
        if self.running == 0 {
            return None;
        }
        self.active = (self.active + 1) % self.running;
        Some(ThreadId::new(self.active))
    }

    fn active(&self) -> Option<ThreadId> {
        (self.running > 0).then(|| ThreadId::new(self.active))
    }

    fn running(&self) -> usize {
        self.running
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_unstarted_scheduler_picks_nothing() {
        let mut sched = RoundRobinScheduler::new();
        assert_eq!(sched.active(), None);
        assert_eq!(sched.pick_next(), None);
        assert_eq!(sched.start(0), None);
        assert_eq!(sched.pick_next(), None);
    }

    #[test]
    fn test_three_threads_visit_in_order() {
        let mut sched = RoundRobinScheduler::new();
        assert_eq!(sched.start(3), Some(ThreadId::new(0)));

        let order: Vec<usize> = (0..3).filter_map(|_| sched.pick_next()).map(ThreadId::index).collect();
        assert_eq!(order, [1, 2, 0]);
    }

    #[test]
    fn test_active_after_k_picks_is_k_mod_n() {
        for n in 1..=7 {
            let mut sched = RoundRobinScheduler::new();
            sched.start(n);
            for k in 1..=3 * n {
                let next = sched.pick_next().unwrap();
                assert_eq!(next.index(), k % n);
                assert_eq!(sched.active(), Some(next));
            }
        }
    }

    #[test]
    fn test_single_thread_switches_to_itself() {
        let mut sched = RoundRobinScheduler::new();
        sched.start(1);
        assert_eq!(sched.pick_next(), Some(ThreadId::new(0)));
    }

    #[test]
    fn test_reset() {
        let mut sched = RoundRobinScheduler::new();
        sched.start(4);
        sched.pick_next();
        sched.reset();
        assert_eq!(sched.running(), 0);
        assert_eq!(sched.active(), None);
    }
}
