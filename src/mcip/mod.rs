pub mod contracts;
pub mod journey;

pub use contracts::{CareRecommendation, Contract, ContractType, NextStep, Provenance};
pub use journey::{JourneyState, ProductKey};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::finance::FinancialProfile;
use crate::utils::{Clock, EngineError};

type Subscriber = Box<dyn Fn(&Contract) + Send + Sync>;

/// The coordinator: an in-process registry of typed contracts plus the
/// journey unlock graph, one instance per user session.
///
/// Products never import one another; every cross-product read goes
/// through here. Publication is last-writer-wins per contract type and
/// notifies subscribers in registration order.
pub struct Mcip {
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<ContractType, Contract>>,
    subscribers: RwLock<HashMap<ContractType, Vec<Subscriber>>>,
    completed: RwLock<BTreeSet<ProductKey>>,
    unlock_graph: Vec<journey::UnlockRule>,
}

impl Mcip {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            completed: RwLock::new(BTreeSet::new()),
            unlock_graph: journey::default_unlock_graph(),
        }
    }

    /// Replace any prior record of the same type and notify subscribers.
    pub fn publish(&self, mut contract: Contract) {
        let contract_type = contract.contract_type();
        contract.stamp_last_updated(self.clock.now());

        {
            let mut records = self.records.write().expect("mcip records lock poisoned");
            records.insert(contract_type, contract.clone());
        }
        info!(contract = %contract_type, "Contract published");

        let subscribers = self.subscribers.read().expect("mcip subscribers lock poisoned");
        if let Some(callbacks) = subscribers.get(&contract_type) {
            for callback in callbacks {
                callback(&contract);
            }
        }
    }

    pub fn get(&self, contract_type: ContractType) -> Option<Contract> {
        self.records
            .read()
            .expect("mcip records lock poisoned")
            .get(&contract_type)
            .cloned()
    }

    /// Typed accessor; the error kind drives the "locked/not ready" state
    /// downstream rather than a hard failure.
    pub fn care_recommendation(&self) -> Result<CareRecommendation, EngineError> {
        match self.get(ContractType::CareRecommendation) {
            Some(Contract::Care(record)) => Ok(record),
            _ => Err(EngineError::ContractMissing("care_recommendation")),
        }
    }

    pub fn financial_profile(&self) -> Result<FinancialProfile, EngineError> {
        match self.get(ContractType::FinancialProfile) {
            Some(Contract::Financial(record)) => Ok(record),
            _ => Err(EngineError::ContractMissing("financial_profile")),
        }
    }

    pub fn subscribe(
        &self,
        contract_type: ContractType,
        callback: impl Fn(&Contract) + Send + Sync + 'static,
    ) {
        self.subscribers
            .write()
            .expect("mcip subscribers lock poisoned")
            .entry(contract_type)
            .or_default()
            .push(Box::new(callback));
        debug!(contract = %contract_type, "Subscriber registered");
    }

    /// First-class completion signal; unlocking cascades through the
    /// graph on the next `journey_state` derivation.
    pub fn mark_complete(&self, product: ProductKey) {
        let inserted = self
            .completed
            .write()
            .expect("mcip completion lock poisoned")
            .insert(product);
        if inserted {
            info!(product = %product, "Product marked complete");
        }
    }

    pub fn journey_state(&self) -> JourneyState {
        let completed = self
            .completed
            .read()
            .expect("mcip completion lock poisoned")
            .clone();
        let published: HashSet<ContractType> = self
            .records
            .read()
            .expect("mcip records lock poisoned")
            .keys()
            .copied()
            .collect();
        journey::derive(&self.unlock_graph, &completed, &published)
    }
}
