use std::{collections::HashMap, sync::Arc};

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestQueue, UnboundedQueue},
};

pub struct Routes {
    pub table: HashMap<&'static str, Vec<Route>>,
}

pub struct Route {
    pub subscriber_id: &'static str,
    pub inbox: RouteInbox,
}

pub enum RouteInbox {
    Unbounded(Arc<UnboundedQueue<Arc<EnrichedEvent>>>),
    FifoDropOldest(Arc<FifoDropOldestQueue<Arc<EnrichedEvent>>>),
}

impl RouteInbox {
    /// Returns true when an older event had to be evicted.
    pub fn deliver(&self, event: Arc<EnrichedEvent>) -> bool {
        match self {
            RouteInbox::Unbounded(q) => {
                q.push(event);
                false
            }
            RouteInbox::FifoDropOldest(q) => q.push_overwrite(event),
        }
    }
}
