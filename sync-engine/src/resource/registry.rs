//! Registry of the resource engines, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use sync_types::ResType;

use super::{EntityKind, LogicDeps, RelationKind, ResourceLogic, SyncResource};

/// All resource engines, iterated in sweep order.
pub struct ResourceRegistry {
    order: Vec<ResType>,
    resources: HashMap<ResType, Arc<dyn SyncResource>>,
}

impl ResourceRegistry {
    /// Build the engine of every resource kind.
    pub fn new(deps: LogicDeps) -> Self {
        let mut resources: HashMap<ResType, Arc<dyn SyncResource>> = HashMap::new();
        for res in ResType::ALL {
            let logic: Arc<dyn SyncResource> = match (EntityKind::for_resource(res), RelationKind::for_resource(res)) {
                (Some(kind), _) => Arc::new(ResourceLogic::new(kind, deps.clone())),
                (None, Some(kind)) => Arc::new(ResourceLogic::new(kind, deps.clone())),
                (None, None) => continue,
            };
            resources.insert(res, logic);
        }
        Self {
            order: ResType::ALL.to_vec(),
            resources,
        }
    }

    /// Engine of one resource kind.
    pub fn get(&self, res_type: ResType) -> Option<&Arc<dyn SyncResource>> {
        self.resources.get(&res_type)
    }

    /// Engines in sweep order, optionally restricted to `only`.
    pub fn iter<'a>(&'a self, only: Option<&'a [ResType]>) -> impl Iterator<Item = &'a Arc<dyn SyncResource>> + 'a {
        self.order
            .iter()
            .filter(move |res| only.map_or(true, |only| only.contains(res)))
            .filter_map(|res| self.resources.get(res))
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
