//! Which manor gets the input focus next
//!
//! Every candidate reports two waits: until urgent work is due (priority
//! class) and until anything at all is due (normal class). A ready
//! priority-class candidate wins outright. Otherwise the smallest wait wins
//! across both classes. Ties go to the higher static priority, then to the
//! earlier declared candidate. `+inf` means nothing pending.

use std::cmp::Ordering;

/// Something the scheduler can pick
pub trait Schedulable {
    fn id(&self) -> &str;

    /// Static priority, higher first
    fn priority(&self) -> i32;

    /// Seconds until urgent work is due; `<= 0` is ready
    fn time_until_priority_ready(&self, now: f64) -> f64;

    /// Seconds until any work is due; `<= 0` is ready
    fn time_until_normal_ready(&self, now: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    Priority,
    Normal,
}

/// The scheduler's pick
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Position in the slice given to [`Scheduler::select`]
    pub index: usize,
    pub id: String,
    /// Seconds to wait before the pick is ready, never negative
    pub wait_secs: f64,
    pub priority: i32,
    pub class: PriorityClass,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    priority: i32,
    wait: f64,
    class: PriorityClass,
}

fn usable(wait: f64) -> bool {
    !wait.is_nan() && wait != f64::INFINITY
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Pick the next candidate, `None` when nothing has work pending
    pub fn select<T: Schedulable>(&self, items: &[T], now: f64) -> Option<Selection> {
        let best = self.candidates(items, now).into_iter().min_by(Self::order)?;
        let item = &items[best.index];
        Some(Selection {
            index: best.index,
            id: item.id().to_string(),
            wait_secs: best.wait,
            priority: best.priority,
            class: best.class,
            ready: best.wait <= 0.0,
        })
    }

    /// Indices of every candidate with work pending, best first
    pub fn ranking<T: Schedulable>(&self, items: &[T], now: f64) -> Vec<usize> {
        let mut candidates = self.candidates(items, now);
        candidates.sort_by(Self::order);
        let mut seen = Vec::with_capacity(items.len());
        for c in candidates {
            if !seen.contains(&c.index) {
                seen.push(c.index);
            }
        }
        seen
    }

    fn candidates<T: Schedulable>(&self, items: &[T], now: f64) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(items.len() * 2);
        for (index, item) in items.iter().enumerate() {
            let priority = item.priority();
            let urgent = item.time_until_priority_ready(now);
            if usable(urgent) {
                out.push(Candidate {
                    index,
                    priority,
                    wait: urgent.max(0.0),
                    class: PriorityClass::Priority,
                });
            }
            let normal = item.time_until_normal_ready(now);
            if usable(normal) {
                out.push(Candidate {
                    index,
                    priority,
                    wait: normal.max(0.0),
                    class: PriorityClass::Normal,
                });
            }
        }
        out
    }

    fn order(a: &Candidate, b: &Candidate) -> Ordering {
        let ready = |c: &Candidate| c.class == PriorityClass::Priority && c.wait <= 0.0;
        ready(b)
            .cmp(&ready(a))
            .then_with(|| a.wait.total_cmp(&b.wait))
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.index.cmp(&b.index))
            .then_with(|| class_rank(a.class).cmp(&class_rank(b.class)))
    }
}

fn class_rank(class: PriorityClass) -> u8 {
    match class {
        PriorityClass::Priority => 0,
        PriorityClass::Normal => 1,
    }
}
