//! In-memory [`OpportunitySource`] that drains a preloaded queue, for tests
//! that drive the Execution Engine without a real opportunity scanner.

use std::sync::Mutex;
use std::collections::VecDeque;

use async_trait::async_trait;
use fab_domain::ports::OpportunitySource;
use fab_domain::Opportunity;

#[derive(Default)]
pub struct QueuedOpportunitySource {
    queue: Mutex<VecDeque<Opportunity>>,
}

impl QueuedOpportunitySource {
    pub fn new(opportunities: Vec<Opportunity>) -> Self {
        QueuedOpportunitySource { queue: Mutex::new(opportunities.into_iter().collect()) }
    }

    pub fn empty() -> Self {
        QueuedOpportunitySource { queue: Mutex::new(VecDeque::new()) }
    }

    pub fn push(&self, opportunity: Opportunity) {
        self.queue.lock().unwrap().push_back(opportunity);
    }
}

#[async_trait]
impl OpportunitySource for QueuedOpportunitySource {
    async fn next_opportunity(&self) -> anyhow::Result<Option<Opportunity>> {
        Ok(self.queue.lock().unwrap().pop_front())
    }
}
