//! Deferred publish/subscribe bus
//!
//! `publish` never runs a handler. Events are queued and handed out in
//! publish order when the owner drains the bus at the tick boundary, so a
//! handler added or removed while a tick is in progress cannot race with
//! delivery. Events published during a drain wait for the next boundary.

use crate::condition::ConditionKey;
use crate::error::NarrativeError;
use crate::types::event::{StoryEvent, Topic};
use crate::types::ids::RunnerId;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

const TARGET: &str = "storyweave::bus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Receiver of a subscription
pub enum Handler {
    /// A node condition, addressed by its owner
    Condition(ConditionKey),
    /// Runner-level routing (jump and trigger requests)
    Runner(RunnerId),
    /// Host callback; it sees the event but cannot touch scheduling state
    Observer(Box<dyn FnMut(&StoryEvent)>),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Condition(key) => f.debug_tuple("Condition").field(key).finish(),
            Handler::Runner(runner) => f.debug_tuple("Runner").field(runner).finish(),
            Handler::Observer(_) => f.write_str("Observer(..)"),
        }
    }
}

/// Internal destination of a delivery, resolved by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Condition(ConditionKey),
    Runner(RunnerId),
}

#[derive(Debug)]
struct Subscription {
    topic: Topic,
    handler: Handler,
}

pub struct EventBus {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    queue: VecDeque<StoryEvent>,
    next_id: u64,
    attached: bool,
}

impl EventBus {
    /// Bus without a drain mechanism; publishing is refused until `attach`.
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            queue: VecDeque::new(),
            next_id: 0,
            attached: false,
        }
    }

    /// Bus whose owner drains it every tick
    pub fn attached() -> Self {
        let mut bus = Self::new();
        bus.attach();
        bus
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn subscribe(&mut self, topic: Topic, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        log::trace!(target: TARGET, "subscribe {id:?} to {topic:?} ({handler:?})");
        self.subscriptions.insert(id, Subscription { topic, handler });
        id
    }

    /// Returns false when the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            log::trace!(target: TARGET, "unsubscribe {id:?}");
        }
        removed
    }

    /// Queue an event for delivery at the next tick boundary.
    ///
    /// On a detached bus the event is dropped and a configuration error is
    /// logged; the caller never sees a failure.
    pub fn publish(&mut self, event: StoryEvent) {
        let topic = event.topic();
        if let Err(err) = self.try_publish(event) {
            log::error!(
                target: TARGET,
                "configuration error: {err}; {topic:?} event dropped"
            );
        }
    }

    /// `publish` that reports a detached bus to the caller
    pub fn try_publish(&mut self, event: StoryEvent) -> Result<(), NarrativeError> {
        if !self.attached {
            return Err(NarrativeError::BusDetached);
        }
        log::debug!(target: TARGET, "publish {event:?}");
        self.queue.push_back(event);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Everything published before this boundary, in publish order.
    pub fn take_batch(&mut self) -> Vec<StoryEvent> {
        self.queue.drain(..).collect()
    }

    /// Subscriptions currently listening on `topic`, oldest first
    pub fn subscribers_of(&self, topic: Topic) -> Vec<SubscriptionId> {
        self.subscriptions
            .iter()
            .filter(|(_, sub)| sub.topic == topic)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Deliver `event` to one subscription.
    ///
    /// Observers run in place. Internal handlers are returned as a `Route`
    /// for the owner to act on. `None` when the subscription was removed
    /// earlier in the drain.
    pub fn route(&mut self, id: SubscriptionId, event: &StoryEvent) -> Option<Route> {
        let subscription = self.subscriptions.get_mut(&id)?;
        match &mut subscription.handler {
            Handler::Condition(key) => Some(Route::Condition(key.clone())),
            Handler::Runner(runner) => Some(Route::Runner(runner.clone())),
            Handler::Observer(callback) => {
                callback(event);
                None
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("queued", &self.queue.len())
            .field("attached", &self.attached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(bus: &mut EventBus, topic: Topic) -> Rc<RefCell<Vec<StoryEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(
            topic,
            Handler::Observer(Box::new(move |event| sink.borrow_mut().push(event.clone()))),
        );
        seen
    }

    fn drain(bus: &mut EventBus) -> Vec<Route> {
        let mut routes = Vec::new();
        for event in bus.take_batch() {
            for id in bus.subscribers_of(event.topic()) {
                if let Some(route) = bus.route(id, &event) {
                    routes.push(route);
                }
            }
        }
        routes
    }

    #[test]
    fn publish_is_deferred_until_drain() {
        let mut bus = EventBus::attached();
        let seen = recorder(&mut bus, Topic::AreaEntered);

        bus.publish(StoryEvent::area_entered("gate"));
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.pending(), 1);

        drain(&mut bus);
        assert_eq!(*seen.borrow(), vec![StoryEvent::area_entered("gate")]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn delivery_preserves_publish_order() {
        let mut bus = EventBus::attached();
        let seen = recorder(&mut bus, Topic::AreaEntered);

        bus.publish(StoryEvent::area_entered("a"));
        bus.publish(StoryEvent::area_entered("b"));
        bus.publish(StoryEvent::area_entered("c"));
        drain(&mut bus);

        let order: Vec<_> = seen
            .borrow()
            .iter()
            .map(|event| match event {
                StoryEvent::AreaEntered { trigger_id } => trigger_id.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn detached_bus_drops_events() {
        let mut bus = EventBus::new();
        let seen = recorder(&mut bus, Topic::AreaEntered);

        bus.publish(StoryEvent::area_entered("gate"));
        assert_eq!(bus.pending(), 0);
        assert_eq!(
            bus.try_publish(StoryEvent::area_entered("gate")),
            Err(NarrativeError::BusDetached)
        );
        drain(&mut bus);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn topics_are_isolated() {
        let mut bus = EventBus::attached();
        let areas = recorder(&mut bus, Topic::AreaEntered);
        let interactions = recorder(&mut bus, Topic::InteractionTriggered);

        bus.publish(StoryEvent::interaction("lever"));
        drain(&mut bus);

        assert!(areas.borrow().is_empty());
        assert_eq!(interactions.borrow().len(), 1);
    }

    #[test]
    fn unsubscribed_handler_is_not_delivered() {
        let mut bus = EventBus::attached();
        let id = bus.subscribe(Topic::JumpRequested, Handler::Runner(RunnerId::from("r1")));

        bus.publish(StoryEvent::JumpRequested {
            origin_runner: RunnerId::from("r1"),
            origin_node: "a".into(),
            storyboard: "main".into(),
            node_id: "b".into(),
        });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        assert!(drain(&mut bus).is_empty());
    }

    #[test]
    fn internal_handlers_resolve_to_routes() {
        let mut bus = EventBus::attached();
        bus.subscribe(Topic::TriggerRequested, Handler::Runner(RunnerId::from("r1")));

        bus.publish(StoryEvent::TriggerRequested {
            runner_id: RunnerId::from("r1"),
            node_id: "n".into(),
        });

        assert_eq!(drain(&mut bus), vec![Route::Runner(RunnerId::from("r1"))]);
    }
}
