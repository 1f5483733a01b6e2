use std::collections::HashMap;

use tokio::time::Instant;

use crate::Callback;

pub(crate) struct TimerTask {
    pub id: String,
    pub expiry: Instant,
    pub callback: Callback,
}

/// Binary min-heap ordered by expiry, with an id → slot map so that a pending
/// task can be removed (or replaced) in O(log n). `std::collections::BinaryHeap`
/// offers no removal by key, hence the hand-rolled sift routines.
pub(crate) struct TaskHeap {
    slots: Vec<TimerTask>,
    index: HashMap<String, usize>,
}

impl TaskHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn min_expiry(&self) -> Option<Instant> {
        self.slots.first().map(|t| t.expiry)
    }

    pub fn push(&mut self, task: TimerTask) {
        let i = self.slots.len();
        self.index.insert(task.id.clone(), i);
        self.slots.push(task);
        self.sift_up(i);
    }

    /// Pop the earliest task.
    pub fn pop(&mut self) -> Option<TimerTask> {
        if self.slots.is_empty() {
            return None;
        }
        self.remove_at(0)
    }

    /// Remove a task by id. Returns it if it was pending.
    pub fn remove(&mut self, id: &str) -> Option<TimerTask> {
        let i = *self.index.get(id)?;
        self.remove_at(i)
    }

    fn remove_at(&mut self, i: usize) -> Option<TimerTask> {
        let last = self.slots.len() - 1;
        self.slots.swap(i, last);
        let task = self.slots.pop()?;
        self.index.remove(&task.id);
        if i < self.slots.len() {
            self.record_slot(i);
            self.sift_down(i);
            self.sift_up(i);
        }
        Some(task)
    }

    fn record_slot(&mut self, i: usize) {
        self.index.insert(self.slots[i].id.clone(), i);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.slots[i].expiry >= self.slots[parent].expiry {
                break;
            }
            self.slots.swap(i, parent);
            self.record_slot(i);
            self.record_slot(parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < self.slots.len() && self.slots[left].expiry < self.slots[smallest].expiry {
                smallest = left;
            }
            if right < self.slots.len() && self.slots[right].expiry < self.slots[smallest].expiry {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.slots.swap(i, smallest);
            self.record_slot(i);
            self.record_slot(smallest);
            i = smallest;
        }
    }
}
