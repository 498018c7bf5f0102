//! Single-step action executor
//!
//! [`execute`] runs one action against the ports and reports what the
//! sequence should do next. It never touches the sequence itself: control
//! flow comes back as [`StepOutcome::Expanded`] and the manor splices it in.

use super::{Action, ActionError, ClickTarget, LogLevel, Variables};
use crate::bus::{MessageBus, Outgoing};
use crate::clock::{millis, Clock};
use crate::ports::{InputPort, Point, VisionPort, WindowId};
use crate::stealth::{Humanizer, StealthConfig};

/// Everything one step may touch
pub struct ExecContext<'a> {
    /// Manor id, for logs
    pub manor: &'a str,
    pub window: &'a WindowId,
    pub vision: &'a mut dyn VisionPort,
    pub input: &'a mut dyn InputPort,
    pub clock: &'a dyn Clock,
    pub humanizer: &'a mut Humanizer,
    pub stealth: &'a StealthConfig,
    pub variables: &'a mut Variables,
    pub bus: &'a mut MessageBus,
}

/// Result of one step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Side effect performed
    Done,
    /// Condition false, nothing done
    Skipped,
    /// Could not perform the step
    Failed(String),
    /// Run these next, in order
    Expanded(Vec<Action>),
    /// Not before `deadline`; `action` goes back in front of the queue
    Waiting { deadline: f64, action: Action },
    Navigate(String),
    Replan,
    Yield,
}

pub fn execute(action: &Action, ctx: &mut ExecContext<'_>) -> Result<StepOutcome, ActionError> {
    let outcome = match action {
        Action::Click { target } => click_target(target, ctx)?,
        Action::TextClick { text, offset } => match ctx.vision.find_text(ctx.window, text)? {
            Some(p) => click(ctx, p.offset(offset.0, offset.1))?,
            None => StepOutcome::Failed(format!("text '{}' not visible", text)),
        },
        Action::KeyPress { key } => {
            ctx.input.key_press(ctx.window, key)?;
            ctx.vision.invalidate(ctx.window);
            StepOutcome::Done
        }
        Action::Wait { ms } => {
            ctx.clock.sleep(millis(*ms));
            StepOutcome::Done
        }
        Action::Delay { ms, deadline } => {
            let now = ctx.clock.now();
            let deadline = deadline.unwrap_or(now + *ms as f64 / 1000.0);
            if now >= deadline {
                StepOutcome::Done
            } else {
                StepOutcome::Waiting {
                    deadline,
                    action: Action::Delay {
                        ms: *ms,
                        deadline: Some(deadline),
                    },
                }
            }
        }
        Action::Log { level, message } => {
            let level = match level {
                LogLevel::Debug => log::Level::Debug,
                LogLevel::Info => log::Level::Info,
                LogLevel::Warn => log::Level::Warn,
                LogLevel::Error => log::Level::Error,
            };
            log::log!(level, "[{}] {}", ctx.manor, message);
            StepOutcome::Done
        }
        Action::SetVariable { name, value } => {
            ctx.variables.insert(name.clone(), value.clone());
            StepOutcome::Done
        }
        Action::If { condition, then } => {
            if condition.evaluate(ctx.vision, ctx.window, ctx.variables)? {
                StepOutcome::Expanded(then.clone())
            } else {
                StepOutcome::Skipped
            }
        }
        Action::IfElse {
            condition,
            then,
            otherwise,
        } => {
            if condition.evaluate(ctx.vision, ctx.window, ctx.variables)? {
                StepOutcome::Expanded(then.clone())
            } else {
                StepOutcome::Expanded(otherwise.clone())
            }
        }
        Action::For {
            times,
            done,
            label,
            body,
        } => {
            if done >= times {
                log::debug!("[{}] {} finished", ctx.manor, action);
                StepOutcome::Done
            } else {
                let mut next = body.clone();
                next.push(Action::For {
                    times: *times,
                    done: done + 1,
                    label: label.clone(),
                    body: body.clone(),
                });
                StepOutcome::Expanded(next)
            }
        }
        Action::While {
            condition,
            max_iterations,
            done,
            label,
            body,
        } => {
            if !condition.evaluate(ctx.vision, ctx.window, ctx.variables)? {
                StepOutcome::Done
            } else if done >= max_iterations {
                log::error!(
                    "[{}] {} hit its iteration limit ({})",
                    ctx.manor,
                    action,
                    max_iterations
                );
                StepOutcome::Failed(format!("iteration limit {} reached", max_iterations))
            } else {
                let mut next = body.clone();
                next.push(Action::While {
                    condition: condition.clone(),
                    max_iterations: *max_iterations,
                    done: done + 1,
                    label: label.clone(),
                    body: body.clone(),
                });
                StepOutcome::Expanded(next)
            }
        }
        Action::ForEach {
            variable,
            items,
            index,
            body,
        } => match items.get(*index) {
            None => StepOutcome::Done,
            Some(item) => {
                let mut next = Vec::with_capacity(body.len() + 2);
                next.push(Action::SetVariable {
                    name: variable.clone(),
                    value: item.clone(),
                });
                next.extend(body.iter().cloned());
                next.push(Action::ForEach {
                    variable: variable.clone(),
                    items: items.clone(),
                    index: index + 1,
                    body: body.clone(),
                });
                StepOutcome::Expanded(next)
            }
        },
        Action::Composite { actions, .. } => StepOutcome::Expanded(actions.clone()),
        Action::Switch {
            variable,
            cases,
            default,
        } => {
            let value = ctx.variables.get(variable);
            let branch = cases
                .iter()
                .find(|c| Some(&c.value) == value)
                .map_or(default, |c| &c.actions);
            StepOutcome::Expanded(branch.clone())
        }
        Action::Guarded {
            action: inner,
            retries,
            on_failure,
        } => match execute(inner, ctx)? {
            // a pending delay keeps its guard
            StepOutcome::Waiting { deadline, action } => StepOutcome::Waiting {
                deadline,
                action: Action::Guarded {
                    action: Box::new(action),
                    retries: *retries,
                    on_failure: on_failure.clone(),
                },
            },
            other => other,
        },
        Action::Send {
            to,
            kind,
            body,
            ttl_secs,
        } => {
            let outgoing = Outgoing {
                to: to.clone(),
                kind: kind.clone(),
                body: body.clone(),
                ttl_secs: *ttl_secs,
            };
            ctx.bus.send(ctx.manor, outgoing, ctx.clock.now());
            StepOutcome::Done
        }
        Action::Navigate { goal } => StepOutcome::Navigate(goal.clone()),
        Action::Replan => StepOutcome::Replan,
        Action::Yield => StepOutcome::Yield,
    };
    Ok(outcome)
}

fn click_target(target: &ClickTarget, ctx: &mut ExecContext<'_>) -> Result<StepOutcome, ActionError> {
    match target {
        ClickTarget::Template {
            template,
            threshold,
            offset,
        } => match ctx.vision.find_image(ctx.window, template, *threshold)? {
            Some(m) => click(ctx, m.point().offset(offset.0, offset.1)),
            None => Ok(StepOutcome::Failed(format!("'{}' not visible", template))),
        },
        ClickTarget::Position { x, y, relative } => {
            let Some(rect) = ctx.input.get_window_rect(ctx.window)? else {
                return Ok(StepOutcome::Failed("window not found".to_string()));
            };
            let point = if *relative {
                rect.relative_point(*x, *y)
            } else {
                Point::new(x.round() as i32, y.round() as i32)
            };
            click(ctx, rect.clamp_point(point))
        }
    }
}

fn click(ctx: &mut ExecContext<'_>, at: Point) -> Result<StepOutcome, ActionError> {
    let humanized = ctx.humanizer.click(ctx.stealth, at.x, at.y);
    ctx.clock.sleep(millis(humanized.pre_delay_ms));
    ctx.input.click_at(ctx.window, humanized.x, humanized.y)?;
    ctx.vision.invalidate(ctx.window);
    Ok(StepOutcome::Done)
}
