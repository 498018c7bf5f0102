//! Game-specific hooks of a manor
//!
//! The manor drives navigation and execution; what to do once the goal
//! state is reached, how to tell that the emulator is beyond saving, and
//! how to relaunch it are up to a [`ManorBehavior`].

use super::timers::{Timer, TimerBook};
use super::{ManorError, ManorView};
use crate::action::{Action, Value};
use crate::config::{ManorConfig, MessageHandler, SlotConfig, TimedTask};
use crate::ports::InputPort;

pub trait ManorBehavior {
    /// Register timers and slots, before any saved snapshot is restored
    fn install(&self, book: &mut TimerBook, now: f64);

    /// Work to run from the goal state, empty when there is nothing to do
    fn on_ready(&mut self, view: &ManorView<'_>, book: &mut TimerBook, now: f64) -> Vec<Action>;

    /// Whether the emulator is in a state only a restart can fix
    fn detect_error(
        &mut self,
        _view: &ManorView<'_>,
        _input: &mut dyn InputPort,
    ) -> Result<bool, ManorError> {
        Ok(false)
    }

    /// Actions that relaunch the game
    fn restart(&mut self, view: &ManorView<'_>) -> Vec<Action>;

    /// Called when the manor gets the input focus back
    fn on_resume(&mut self, _view: &ManorView<'_>) {}
}

/// Behaviour built from a [`ManorConfig`]: timed tasks, slots, message
/// handlers and a restart script
#[derive(Debug, Clone)]
pub struct ScriptedBehavior {
    tasks: Vec<TimedTask>,
    slots: Vec<SlotConfig>,
    handlers: Vec<MessageHandler>,
    restart: Vec<Action>,
}

impl ScriptedBehavior {
    pub fn from_config(config: &ManorConfig) -> Self {
        Self {
            tasks: config.tasks.clone(),
            slots: config.slots.clone(),
            handlers: config.on_message.clone(),
            restart: config.restart.clone(),
        }
    }

    fn task(&self, name: &str) -> Option<&TimedTask> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

impl ManorBehavior for ScriptedBehavior {
    fn install(&self, book: &mut TimerBook, now: f64) {
        for task in &self.tasks {
            let mut timer = Timer::new(&task.name, task.interval_secs, now).with_priority(task.priority);
            if task.urgent {
                timer = timer.urgent();
            }
            if task.start_now {
                timer = timer.starting_now(now);
            }
            book.add_timer(timer);
        }
        for slot in &self.slots {
            book.register_slots(&slot.kind, slot.count);
        }
    }

    fn on_ready(&mut self, view: &ManorView<'_>, book: &mut TimerBook, now: f64) -> Vec<Action> {
        let mut work = Vec::new();
        for message in view.inbox {
            let handlers: Vec<&MessageHandler> =
                self.handlers.iter().filter(|h| h.kind == message.kind).collect();
            if handlers.is_empty() {
                log::debug!("[{}] ignoring '{}' from [{}]", view.id, message.kind, message.from);
                continue;
            }
            log::info!("[{}] handling '{}' from [{}]", view.id, message.kind, message.from);
            work.push(Action::SetVariable {
                name: "message.from".into(),
                value: Value::Text(message.from.clone()),
            });
            if let Some(body) = &message.body {
                work.push(Action::SetVariable {
                    name: "message.body".into(),
                    value: body.clone(),
                });
            }
            for handler in handlers {
                work.extend(handler.actions.iter().cloned());
            }
        }

        let due: Vec<String> = book.due(now).iter().map(|t| t.name.clone()).collect();

        for name in due {
            let Some(task) = self.task(&name) else {
                continue;
            };
            if let Some(kind) = &task.slot {
                if book.occupy_slot(kind, task.slot_secs, now).is_none() {
                    let wait = book.time_until_free_slot(kind, now);
                    log::debug!(
                        "[{}] '{}' waits {:.0}s for a free {} slot",
                        view.id,
                        name,
                        wait,
                        kind
                    );
                    // a pool that never frees up retries on the task's own period
                    let until = if wait.is_finite() {
                        now + wait
                    } else {
                        now + task.interval_secs
                    };
                    book.postpone(&name, until);
                    continue;
                }
            }
            log::info!("[{}] running task '{}'", view.id, name);
            work.extend(task.actions.iter().cloned());
            book.mark_executed(&name, now);
        }
        work
    }

    /// A window that no longer exists can only come back through a restart
    fn detect_error(
        &mut self,
        view: &ManorView<'_>,
        input: &mut dyn InputPort,
    ) -> Result<bool, ManorError> {
        Ok(input.get_window_rect(view.window)?.is_none())
    }

    fn restart(&mut self, view: &ManorView<'_>) -> Vec<Action> {
        if self.restart.is_empty() {
            log::warn!("[{}] no restart actions configured", view.id);
        }
        self.restart.clone()
    }
}
