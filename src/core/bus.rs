//! In-process publish/subscribe for domain events.
//!
//! The shell owns the bus. Components register once at startup for the
//! topics they care about, and each published event is handed to them
//! synchronously in registration order. Handlers never await: anything
//! asynchronous they need is requested as an [`Effect`] and carried out by
//! the shell.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::domain::events::{DomainEvent, Topic};

/// Asynchronous work a handler asks the shell to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-query the server environment/status endpoint
    RefreshServerInfo,
}

/// Effects collected while one event is dispatched
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects(Vec<Effect>);

impl Effects {
    pub fn push(&mut self, effect: Effect) {
        if !self.0.contains(&effect) {
            self.0.push(effect);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, effect: Effect) -> bool {
        self.0.contains(&effect)
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A typed handler of domain events
pub trait Subscriber {
    /// Topics this subscriber receives
    fn topics(&self) -> &'static [Topic];

    fn on_event(&mut self, event: &DomainEvent, effects: &mut Effects);
}

struct Registration {
    topics: &'static [Topic],
    handler: Rc<RefCell<dyn Subscriber>>,
}

/// The domain event broker
#[derive(Default)]
pub struct EventBus {
    registrations: Vec<Registration>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registrations.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<S: Subscriber + 'static>(&mut self, subscriber: &Rc<RefCell<S>>) {
        let topics = subscriber.borrow().topics();
        let handler: Rc<RefCell<dyn Subscriber>> = subscriber.clone();
        self.registrations.push(Registration { topics, handler });
    }

    /// Deliver `event` to every subscriber of its topic.
    pub fn publish(&self, event: &DomainEvent) -> Effects {
        let topic = event.topic();
        let mut effects = Effects::default();
        let mut delivered = 0;

        for registration in self
            .registrations
            .iter()
            .filter(|r| r.topics.contains(&topic))
        {
            registration.handler.borrow_mut().on_event(event, &mut effects);
            delivered += 1;
        }

        debug!(%topic, delivered, "Published domain event");
        effects
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.topics.contains(&topic))
            .count()
    }
}
