//! Metadata and exclusion filter.
//!
//! Some records are never synchronized:
//!
//! - the host pool (its business, idle set and idle module) of every
//!   environment
//! - on a source, everything inside the internal blueking business,
//!   including hosts assigned to it and their associations
//!
//! [`Metadata`] turns these rules into list filters for full sync and into
//! per-event decisions for incremental sync. It also keeps the set of hosts
//! inside the blueking business up to date from host-relation events; the
//! watch path is the only writer of that map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sync_types::{Document, EventInfo, EventType, ResType, SyncRole};
use tokio::sync::RwLock;

use crate::store::{Filter, FindQuery, Store};
use crate::tables::{self, int_field, str_field};
use crate::SyncError;

/// Ids of the host pool containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostPool {
    /// Host pool business id.
    pub biz: i64,
    /// Idle set id.
    pub set: i64,
    /// Idle module id.
    pub module: i64,
}

/// Ids of the inner containers of one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InnerIds {
    /// Host pool containers.
    pub host_pool: HostPool,
}

impl InnerIds {
    /// Rewrite container ids of `from` in `doc` into the ids of `self`.
    pub fn remap_from(&self, from: &InnerIds, doc: &mut Document) {
        let pairs = [
            (tables::BK_BIZ_ID, from.host_pool.biz, self.host_pool.biz),
            (tables::BK_SET_ID, from.host_pool.set, self.host_pool.set),
            (tables::BK_MODULE_ID, from.host_pool.module, self.host_pool.module),
        ];
        for (field, foreign, local) in pairs {
            if foreign != local && int_field(doc, field) == Some(foreign) {
                doc.insert(field.to_string(), Value::from(local));
            }
        }
    }
}

#[derive(Debug)]
struct Blueking {
    biz_id: i64,
    host_modules: RwLock<HashMap<i64, HashSet<i64>>>,
}

/// Exclusion rules and inner ids of the local environment.
pub struct Metadata {
    role: SyncRole,
    store: Arc<dyn Store>,
    inner_ids: InnerIds,
    blueking: Option<Blueking>,
}

async fn required_int(
    store: &dyn Store,
    collection: &str,
    filter: Filter,
    field: &str,
    what: &str,
) -> Result<i64, SyncError> {
    let doc = store.find_one(collection, &filter).await?;
    doc.as_ref()
        .and_then(|d| int_field(d, field))
        .ok_or_else(|| SyncError::Metadata(format!("{} not found", what)))
}

impl Metadata {
    /// Build metadata from known inner ids, without a blueking business.
    pub fn new(role: SyncRole, store: Arc<dyn Store>, inner_ids: InnerIds) -> Self {
        Self {
            role,
            store,
            inner_ids,
            blueking: None,
        }
    }

    /// Track a blueking business and its current host relations.
    pub fn with_blueking(mut self, biz_id: i64, relations: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut host_modules: HashMap<i64, HashSet<i64>> = HashMap::new();
        for (host_id, module_id) in relations {
            host_modules.entry(host_id).or_default().insert(module_id);
        }
        self.blueking = Some(Blueking {
            biz_id,
            host_modules: RwLock::new(host_modules),
        });
        self
    }

    /// Load inner ids (and, on a source, the blueking business) from the store.
    pub async fn load(role: SyncRole, store: Arc<dyn Store>) -> Result<Self, SyncError> {
        let biz = required_int(
            store.as_ref(),
            tables::BIZ,
            Filter::eq(tables::DEFAULT, 1),
            tables::BK_BIZ_ID,
            "host pool business",
        )
        .await?;
        let set = required_int(
            store.as_ref(),
            tables::SET,
            Filter::eq(tables::BK_BIZ_ID, biz).and(Filter::eq(tables::DEFAULT, 1)),
            tables::BK_SET_ID,
            "host pool set",
        )
        .await?;
        let module = required_int(
            store.as_ref(),
            tables::MODULE,
            Filter::eq(tables::BK_SET_ID, set).and(Filter::eq(tables::DEFAULT, 1)),
            tables::BK_MODULE_ID,
            "host pool module",
        )
        .await?;

        let inner_ids = InnerIds {
            host_pool: HostPool { biz, set, module },
        };
        let metadata = Self::new(role, store.clone(), inner_ids);
        if role != SyncRole::Src {
            return Ok(metadata);
        }

        let blueking = store
            .find_one(tables::BIZ, &Filter::eq(tables::BK_BIZ_NAME, tables::BLUEKING_BIZ_NAME))
            .await?
            .and_then(|d| int_field(&d, tables::BK_BIZ_ID));
        let Some(bk_biz_id) = blueking else {
            tracing::info!("No blueking business found, nothing to exclude");
            return Ok(metadata);
        };

        let relations = store
            .find(
                tables::MODULE_HOST_CONFIG,
                &FindQuery::new(Filter::eq(tables::BK_BIZ_ID, bk_biz_id)),
            )
            .await?;
        let pairs: Vec<(i64, i64)> = relations
            .iter()
            .filter_map(|r| Some((int_field(r, tables::BK_HOST_ID)?, int_field(r, tables::BK_MODULE_ID)?)))
            .collect();
        tracing::info!(
            "Loaded blueking business {} with {} host relations",
            bk_biz_id,
            pairs.len()
        );
        Ok(metadata.with_blueking(bk_biz_id, pairs))
    }

    /// Role of the local environment.
    pub fn role(&self) -> SyncRole {
        self.role
    }

    /// Inner ids of the local environment.
    pub fn inner_ids(&self) -> &InnerIds {
        &self.inner_ids
    }

    fn blueking_biz(&self) -> Option<i64> {
        self.blueking.as_ref().map(|b| b.biz_id).filter(|id| *id != 0)
    }

    /// Whether a host currently belongs to the blueking business.
    pub async fn is_host_in_blueking(&self, host_id: i64) -> bool {
        match &self.blueking {
            Some(b) => b.host_modules.read().await.contains_key(&host_id),
            None => false,
        }
    }

    async fn blueking_host_ids(&self) -> Vec<i64> {
        let Some(b) = &self.blueking else {
            return Vec::new();
        };
        let mut ids: Vec<i64> = b.host_modules.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Object ids to sync as object instances and as quoted instances.
    ///
    /// Preset objects are left out.
    pub async fn common_obj_ids(&self) -> Result<(Vec<String>, Vec<String>), SyncError> {
        let objects = self
            .store
            .distinct(tables::OBJ_DES, tables::BK_OBJ_ID, &Filter::eq(tables::BK_IS_PRE, false))
            .await?;
        let quoted = self.quoted_models().await?;

        let mut obj_ids = Vec::new();
        let mut quoted_ids = Vec::new();
        for obj in objects.iter().filter_map(Value::as_str) {
            if quoted.contains(obj) {
                quoted_ids.push(obj.to_string());
            } else {
                obj_ids.push(obj.to_string());
            }
        }
        Ok((obj_ids, quoted_ids))
    }

    /// Object ids whose instance associations are synced.
    ///
    /// Unlike [`common_obj_ids`](Self::common_obj_ids) this includes preset
    /// objects such as hosts, but never quoted models.
    pub async fn asst_obj_ids(&self) -> Result<Vec<String>, SyncError> {
        let objects = self
            .store
            .distinct(tables::OBJ_DES, tables::BK_OBJ_ID, &Filter::All)
            .await?;
        let quoted = self.quoted_models().await?;
        Ok(objects
            .iter()
            .filter_map(Value::as_str)
            .filter(|obj| !quoted.contains(*obj))
            .map(str::to_string)
            .collect())
    }

    async fn quoted_models(&self) -> Result<HashSet<String>, SyncError> {
        let models = self
            .store
            .distinct(tables::MODEL_QUOTE_RELATION, tables::DEST_MODEL, &Filter::All)
            .await?;
        Ok(models
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Narrow a full-sync list filter to the records that may be synced.
    pub async fn add_list_cond(&self, res_type: ResType, filter: Filter) -> Filter {
        let pool = self.inner_ids.host_pool;
        let blueking = self.blueking_biz();

        let extra = match res_type {
            ResType::Biz | ResType::ObjectInstance => {
                let excluded: Vec<i64> = std::iter::once(pool.biz).chain(blueking).collect();
                return filter.and(Filter::not_in(tables::BK_BIZ_ID, excluded));
            }
            ResType::Set => Filter::ne(tables::BK_SET_ID, pool.set),
            ResType::Module => Filter::ne(tables::BK_MODULE_ID, pool.module),
            ResType::Host => {
                let hosts = self.blueking_host_ids().await;
                if hosts.is_empty() {
                    return filter;
                }
                return filter.and(Filter::not_in(tables::BK_HOST_ID, hosts));
            }
            ResType::InstAsst => {
                let hosts = self.blueking_host_ids().await;
                if hosts.is_empty() {
                    return filter;
                }
                Filter::Or(vec![
                    Filter::ne(tables::BK_OBJ_ID, tables::HOST_OBJ_ID),
                    Filter::not_in(tables::BK_INST_ID, hosts.clone()),
                ])
                .and(Filter::Or(vec![
                    Filter::ne(tables::BK_ASST_OBJ_ID, tables::HOST_OBJ_ID),
                    Filter::not_in(tables::BK_ASST_INST_ID, hosts),
                ]))
            }
            _ => Filter::All,
        };

        let extra = match blueking {
            Some(bk) if res_type.is_biz_related() => extra.and(Filter::ne(tables::BK_BIZ_ID, bk)),
            _ => extra,
        };
        filter.and(extra)
    }

    /// Decide whether a watched event is synced, filling its sub-resources.
    ///
    /// Host-relation events inside the blueking business are rewritten: a
    /// host's first relation into it becomes a host delete, the removal of
    /// its last relation becomes a host create. Other relation events
    /// inside it are swallowed.
    pub async fn parse_event_detail(&self, mut event: EventInfo) -> Option<EventInfo> {
        if event.res_type == ResType::HostRelation {
            return self.parse_host_rel_event(event).await;
        }

        if let Some(bk) = self.blueking_biz() {
            if event.res_type.is_biz_related() && int_field(&event.detail, tables::BK_BIZ_ID) == Some(bk) {
                return None;
            }
        }

        let pool = self.inner_ids.host_pool;
        let detail = &event.detail;
        let keep = match event.res_type {
            ResType::Biz => int_field(detail, tables::BK_BIZ_ID) != Some(pool.biz),
            ResType::Set => int_field(detail, tables::BK_SET_ID) != Some(pool.set),
            ResType::Module => int_field(detail, tables::BK_MODULE_ID) != Some(pool.module),
            ResType::Host => match int_field(detail, tables::BK_HOST_ID) {
                Some(host_id) => !self.is_host_in_blueking(host_id).await,
                None => true,
            },
            ResType::ObjectInstance => {
                let obj = str_field(detail, tables::BK_OBJ_ID).unwrap_or_default().to_string();
                let keep = int_field(detail, tables::BK_BIZ_ID) != Some(pool.biz);
                event.sub_res = vec![obj];
                keep
            }
            ResType::InstAsst => {
                let sides = [
                    (tables::BK_OBJ_ID, tables::BK_INST_ID),
                    (tables::BK_ASST_OBJ_ID, tables::BK_ASST_INST_ID),
                ];
                let mut keep = true;
                let mut sub_res = Vec::with_capacity(2);
                for (obj_field, inst_field) in sides {
                    let obj = str_field(detail, obj_field).unwrap_or_default();
                    if obj == tables::HOST_OBJ_ID {
                        if let Some(inst) = int_field(detail, inst_field) {
                            if self.is_host_in_blueking(inst).await {
                                keep = false;
                            }
                        }
                    }
                    sub_res.push(obj.to_string());
                }
                event.sub_res = sub_res;
                keep
            }
            _ => true,
        };

        keep.then_some(event)
    }

    async fn parse_host_rel_event(&self, event: EventInfo) -> Option<EventInfo> {
        let Some(blueking) = self.blueking.as_ref().filter(|b| b.biz_id != 0) else {
            return Some(event);
        };
        if int_field(&event.detail, tables::BK_BIZ_ID) != Some(blueking.biz_id) {
            return Some(event);
        }

        let host_id = int_field(&event.detail, tables::BK_HOST_ID)?;
        let module_id = int_field(&event.detail, tables::BK_MODULE_ID)?;
        let mut host_modules = blueking.host_modules.write().await;

        if event.event_type == EventType::Delete {
            let modules = host_modules.get_mut(&host_id)?;
            modules.remove(&module_id);
            if !modules.is_empty() {
                return None;
            }
            host_modules.remove(&host_id);

            // the host left the blueking business: sync it again
            let host = match self
                .store
                .find_one(tables::HOST, &Filter::eq(tables::BK_HOST_ID, host_id))
                .await
            {
                Ok(Some(host)) => host,
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!("Failed to read host {} leaving blueking business: {}", host_id, e);
                    return None;
                }
            };
            return Some(EventInfo::new(
                EventType::Create,
                ResType::Host,
                host_id.to_string(),
                host,
            ));
        }

        if let Some(modules) = host_modules.get_mut(&host_id) {
            modules.insert(module_id);
            return None;
        }
        host_modules.insert(host_id, HashSet::from([module_id]));

        // the host entered the blueking business: remove it downstream
        let mut detail = Document::new();
        detail.insert(tables::BK_HOST_ID.to_string(), Value::from(host_id));
        Some(EventInfo::new(
            EventType::Delete,
            ResType::Host,
            host_id.to_string(),
            detail,
        ))
    }
}
