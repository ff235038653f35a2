//! The actor run-queue (spec §5 "Scheduling model": cooperative,
//! single-threaded per actor). Grounded on the teacher's
//! `scheduler/timeout_worker.rs`, which hands ready processes between
//! threads over an unbounded `crossbeam_channel`; this core keeps the same
//! channel plumbing to decide which actor runs next, even though — per
//! SPEC_FULL.md — only one OS thread drains it (the spec's model doesn't
//! need a worker pool, just the notion of "which actor has mail waiting").
//!
//! `Actor::send_message` pushes the receiving actor's id here whenever a
//! message is delivered; a driver loop (`VirtualMachine::run_ready`, or a
//! caller's own loop) pops ids off and processes one actor's mailbox at a
//! time. An actor with no pending notification is simply never polled —
//! the channel *is* the ready set.

use crossbeam_channel::{unbounded, Receiver, Sender};

pub struct Scheduler {
    ready_tx: Sender<u32>,
    ready_rx: Receiver<u32>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        let (ready_tx, ready_rx) = unbounded();
        Scheduler { ready_tx, ready_rx }
    }

    /// Marks `actor_id` as having a message waiting. Safe to call more than
    /// once per actor between drains — `run_ready` only cares that the actor
    /// is polled at least once after a delivery, not how many times its id
    /// was queued.
    pub fn notify_ready(&self, actor_id: u32) {
        // An unbounded channel never blocks on send; the only failure mode
        // is every receiver having been dropped, which can't happen while
        // `self` is alive since `self` owns the receiving end too.
        self.ready_tx.send(actor_id).expect("scheduler receiver dropped while sender still live");
    }

    /// Pops the next actor id with mail waiting, if any.
    pub fn next_ready(&self) -> Option<u32> {
        self.ready_rx.try_recv().ok()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actors_are_drained_in_notification_order() {
        let scheduler = Scheduler::new();
        scheduler.notify_ready(3);
        scheduler.notify_ready(1);
        assert_eq!(scheduler.next_ready(), Some(3));
        assert_eq!(scheduler.next_ready(), Some(1));
        assert_eq!(scheduler.next_ready(), None);
    }
}
