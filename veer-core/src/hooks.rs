//! Hook Bus: priority-ordered publish/subscribe.
//!
//! Handlers for one event name run in strictly descending priority, ties in
//! registration order. Each handler receives the context mutably plus a
//! read-only view of shared state (the session, for scoring hooks), and may
//! either mutate the context in place or hand back a replacement.
//!
//! A handler that returns an error or panics is isolated: the failure is
//! logged and the chain continues with the context as it was before that
//! handler ran. The bus never short-circuits; `stop`-style flags are a
//! convention between handlers.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::{HookError, VeerError};

/// What a handler wants done with the context after it ran.
#[derive(Debug)]
pub enum Flow<C> {
    /// Keep the (possibly mutated) context.
    Continue,
    /// Replace the context for the remaining handlers.
    Replace(C),
}

/// Return type of every handler.
pub type HandlerResult<C> = Result<Flow<C>, HookError>;

type Handler<C, S> = Box<dyn FnMut(&mut C, &S) -> HandlerResult<C>>;

/// Subscription options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOptions {
    /// Higher runs first. Defaults to 0.
    pub priority: i32,
    /// Unsubscribe automatically after the first invocation.
    pub once: bool,
}

impl HookOptions {
    /// Options with the given priority.
    #[must_use]
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            once: false,
        }
    }

    /// Mark the subscription as one-shot.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Token returned by [`HookBus::on`]; pass it to [`HookBus::off`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration<C, S: ?Sized> {
    id: HandlerId,
    priority: i32,
    once: bool,
    handler: Handler<C, S>,
}

/// Priority-ordered hook bus over context type `C` with shared state `S`.
pub struct HookBus<C, S: ?Sized = ()> {
    handlers: HashMap<String, Vec<Registration<C, S>>>,
    next_id: u64,
    failures: u64,
}

impl<C, S: ?Sized> HookBus<C, S> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
            failures: 0,
        }
    }

    /// Subscribe `handler` to `name`.
    ///
    /// Blank names are ignored; the returned id then unsubscribes nothing.
    pub fn on<F>(&mut self, name: &str, handler: F, options: HookOptions) -> HandlerId
    where
        F: FnMut(&mut C, &S) -> HandlerResult<C> + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;

        let name = name.trim();
        if name.is_empty() {
            return id;
        }

        let list = self.handlers.entry(name.to_string()).or_default();
        // Insert after every handler of equal or higher priority so ties keep
        // registration order.
        let at = list.partition_point(|r| r.priority >= options.priority);
        list.insert(
            at,
            Registration {
                id,
                priority: options.priority,
                once: options.once,
                handler: Box::new(handler),
            },
        );
        id
    }

    /// Unsubscribe a handler. Returns `true` when something was removed.
    pub fn off(&mut self, name: &str, id: HandlerId) -> bool {
        let name = name.trim();
        let Some(list) = self.handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(name);
        }
        removed
    }

    /// Whether `name` has at least one subscriber.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.handlers
            .get(name.trim())
            .is_some_and(|list| !list.is_empty())
    }

    /// Number of subscribers for `name`.
    #[must_use]
    pub fn len(&self, name: &str) -> usize {
        self.handlers.get(name.trim()).map_or(0, Vec::len)
    }

    /// Whether the bus has no subscribers at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove the subscribers of `name`, or of every event when `None`.
    pub fn clear(&mut self, name: Option<&str>) {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => {
                self.handlers.remove(name);
            }
            _ => self.handlers.clear(),
        }
    }

    /// Names of every event with subscribers.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total handler failures (errors and panics) since the bus was created.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl<C: Clone, S: ?Sized> HookBus<C, S> {
    /// Run every handler of `name` in order and return the resulting context.
    pub fn emit(&mut self, name: &str, mut ctx: C, state: &S) -> C {
        let name = name.trim();
        let Some(list) = self.handlers.get_mut(name) else {
            return ctx;
        };

        let mut spent = Vec::new();
        for reg in list.iter_mut() {
            let last_good = ctx.clone();
            let handler = &mut reg.handler;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut ctx, state)));

            let error = match outcome {
                Ok(Ok(Flow::Continue)) => None,
                Ok(Ok(Flow::Replace(next))) => {
                    ctx = next;
                    None
                }
                Ok(Err(error)) => Some(error),
                Err(_) => Some(HookError::panicked()),
            };
            if let Some(source) = error {
                let failure = VeerError::Handler {
                    event: name.to_string(),
                    source,
                };
                warn!(event = name, handler = reg.id.0, error = %failure, "Hook handler isolated");
                self.failures += 1;
                ctx = last_good;
            }

            if reg.once {
                spent.push(reg.id);
            }
        }

        if !spent.is_empty() {
            list.retain(|r| !spent.contains(&r.id));
            if list.is_empty() {
                self.handlers.remove(name);
            }
        }
        ctx
    }
}

impl<C, S: ?Sized> Default for HookBus<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S: ?Sized> fmt::Debug for HookBus<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        f.debug_struct("HookBus")
            .field("handlers", &counts)
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Trace = Vec<&'static str>;

    fn push(label: &'static str) -> impl FnMut(&mut Trace, &()) -> HandlerResult<Trace> {
        move |trace: &mut Trace, _: &()| {
            trace.push(label);
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn handlers_run_by_descending_priority_with_stable_ties() {
        let mut bus: HookBus<Trace> = HookBus::new();
        bus.on("score", push("p1"), HookOptions::priority(1));
        bus.on("score", push("p3a"), HookOptions::priority(3));
        bus.on("score", push("p5"), HookOptions::priority(5));
        bus.on("score", push("p3b"), HookOptions::priority(3));

        let trace = bus.emit("score", Vec::new(), &());
        assert_eq!(trace, vec!["p5", "p3a", "p3b", "p1"]);
    }

    #[test]
    fn once_handler_fires_exactly_once() {
        let mut bus: HookBus<Trace> = HookBus::new();
        bus.on("score", push("once"), HookOptions::default().once());
        bus.on("score", push("always"), HookOptions::default());

        assert_eq!(bus.emit("score", Vec::new(), &()), vec!["once", "always"]);
        assert_eq!(bus.emit("score", Vec::new(), &()), vec!["always"]);
        assert_eq!(bus.len("score"), 1);
    }

    #[test]
    fn replacement_context_flows_to_next_handler() {
        let mut bus: HookBus<i64> = HookBus::new();
        bus.on("n", |_, _| Ok(Flow::Replace(10)), HookOptions::priority(2));
        bus.on(
            "n",
            |n, _| {
                *n += 1;
                Ok(Flow::Continue)
            },
            HookOptions::priority(1),
        );
        assert_eq!(bus.emit("n", 0, &()), 11);
    }

    #[test]
    fn failing_handler_rolls_back_and_chain_continues() {
        let mut bus: HookBus<i64> = HookBus::new();
        bus.on(
            "n",
            |n, _| {
                *n = 99;
                Err(HookError::new("boom"))
            },
            HookOptions::priority(3),
        );
        bus.on(
            "n",
            |_, _| -> HandlerResult<i64> { panic!("handler bug") },
            HookOptions::priority(2),
        );
        bus.on(
            "n",
            |n, _| {
                *n += 1;
                Ok(Flow::Continue)
            },
            HookOptions::priority(1),
        );

        assert_eq!(bus.emit("n", 5, &()), 6);
        assert_eq!(bus.failures(), 2);
    }

    #[test]
    fn handlers_read_shared_state() {
        let mut bus: HookBus<i64, i64> = HookBus::new();
        bus.on(
            "n",
            |n, bonus| {
                *n += *bonus;
                Ok(Flow::Continue)
            },
            HookOptions::default(),
        );
        assert_eq!(bus.emit("n", 1, &41), 42);
    }

    #[test]
    fn off_has_and_clear() {
        let mut bus: HookBus<Trace> = HookBus::new();
        let id = bus.on("a", push("a"), HookOptions::default());
        bus.on("b", push("b"), HookOptions::default());
        assert!(bus.has("a"));
        assert!(bus.off("a", id));
        assert!(!bus.has("a"));
        assert!(!bus.off("a", id));

        bus.on("c", push("c"), HookOptions::default());
        bus.clear(Some("b"));
        assert_eq!(bus.names(), vec!["c".to_string()]);
        bus.clear(None);
        assert!(bus.is_empty());
    }

    #[test]
    fn blank_names_are_ignored() {
        let mut bus: HookBus<Trace> = HookBus::new();
        bus.on("  ", push("x"), HookOptions::default());
        assert!(bus.is_empty());
        assert_eq!(bus.emit("", Vec::new(), &()), Vec::<&str>::new());
    }
}
