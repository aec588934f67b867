//! The eleven resource kinds.

use sync_types::{Document, RelationKey, ResType, SortKey, SyncInterval};

use super::ResourceKind;
use crate::store::Filter;
use crate::tables::{self, id_field};

/// Where a kind's records are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// One collection for all records.
    Fixed(&'static str),
    /// One collection per object id, named `<prefix><obj_id>`.
    PerObject(&'static str),
}

impl Table {
    /// Collection name for a sub-resource.
    pub fn name(&self, sub_res: &str) -> String {
        match self {
            Table::Fixed(name) => name.to_string(),
            Table::PerObject(prefix) => format!("{}{}", prefix, sub_res),
        }
    }
}

/// A kind keyed by one numeric id.
#[derive(Debug, Clone, Copy)]
pub struct EntityKind {
    res_type: ResType,
    id_field: &'static str,
    table: Table,
    related: &'static [&'static str],
}

/// A kind keyed by an id pair.
#[derive(Debug, Clone, Copy)]
pub struct RelationKind {
    res_type: ResType,
    fields: [&'static str; 2],
    table: Table,
    related: &'static [&'static str],
}

const BIZ_ONLY: &[&str] = &[tables::BK_BIZ_ID];

impl EntityKind {
    /// Descriptor of a single-key resource kind, `None` for relations.
    pub fn for_resource(res_type: ResType) -> Option<Self> {
        let (id_field, table, related) = match res_type {
            ResType::Biz => (tables::BK_BIZ_ID, Table::Fixed(tables::BIZ), &[][..]),
            ResType::Set => (tables::BK_SET_ID, Table::Fixed(tables::SET), BIZ_ONLY),
            ResType::Module => (tables::BK_MODULE_ID, Table::Fixed(tables::MODULE), BIZ_ONLY),
            ResType::Host => (tables::BK_HOST_ID, Table::Fixed(tables::HOST), &[][..]),
            ResType::ObjectInstance => (
                tables::BK_INST_ID,
                Table::PerObject(tables::OBJECT_BASE_PREFIX),
                BIZ_ONLY,
            ),
            ResType::QuotedInstance => (
                "id",
                Table::PerObject(tables::QUOTED_INST_PREFIX),
                BIZ_ONLY,
            ),
            ResType::InstAsst => (
                "id",
                Table::PerObject(tables::INST_ASST_PREFIX),
                &[tables::BK_INST_ID, tables::BK_ASST_INST_ID][..],
            ),
            ResType::ServiceInstance => ("id", Table::Fixed(tables::SERVICE_INSTANCE), BIZ_ONLY),
            ResType::Process => ("bk_process_id", Table::Fixed(tables::PROCESS), BIZ_ONLY),
            ResType::HostRelation | ResType::ProcessRelation => return None,
        };
        Some(Self {
            res_type,
            id_field,
            table,
            related,
        })
    }
}

impl RelationKind {
    /// Descriptor of a relation resource kind, `None` for entities.
    pub fn for_resource(res_type: ResType) -> Option<Self> {
        let (fields, table) = match res_type {
            ResType::HostRelation => (
                [tables::BK_HOST_ID, tables::BK_MODULE_ID],
                Table::Fixed(tables::MODULE_HOST_CONFIG),
            ),
            ResType::ProcessRelation => (
                ["bk_process_id", "service_instance_id"],
                Table::Fixed(tables::PROCESS_INSTANCE_RELATION),
            ),
            _ => return None,
        };
        Some(Self {
            res_type,
            fields,
            table,
            related: BIZ_ONLY,
        })
    }
}

fn related_values(doc: &Document, fields: &[&str]) -> Vec<i64> {
    fields.iter().filter_map(|f| id_field(doc, f)).collect()
}

impl ResourceKind for EntityKind {
    type Key = i64;

    fn res_type(&self) -> ResType {
        self.res_type
    }

    fn collection(&self, sub_res: &str) -> String {
        self.table.name(sub_res)
    }

    fn key_of(&self, doc: &Document) -> Option<i64> {
        id_field(doc, self.id_field).filter(|id| *id > 0)
    }

    fn related_ids(&self, doc: &Document) -> Vec<i64> {
        related_values(doc, self.related)
    }

    fn interval_filter(&self, interval: &SyncInterval<i64>) -> Filter {
        let lower = Filter::gte(self.id_field, interval.start);
        match interval.end {
            Some(end) => lower.and(Filter::lt(self.id_field, end)),
            None => lower,
        }
    }

    fn keys_filter(&self, keys: &[i64]) -> Filter {
        Filter::is_in(self.id_field, keys.iter().copied())
    }

    fn sort_fields(&self) -> Vec<&'static str> {
        vec![self.id_field]
    }
}

impl ResourceKind for RelationKind {
    type Key = RelationKey;

    fn res_type(&self) -> ResType {
        self.res_type
    }

    fn collection(&self, sub_res: &str) -> String {
        self.table.name(sub_res)
    }

    fn key_of(&self, doc: &Document) -> Option<RelationKey> {
        let first = id_field(doc, self.fields[0]).filter(|id| *id > 0)?;
        let second = id_field(doc, self.fields[1]).filter(|id| *id > 0)?;
        Some(RelationKey::new(first, second))
    }

    fn related_ids(&self, doc: &Document) -> Vec<i64> {
        related_values(doc, self.related)
    }

    fn interval_filter(&self, interval: &SyncInterval<RelationKey>) -> Filter {
        let [a, b] = self.fields;
        let start = &interval.start;
        let lower = Filter::Or(vec![
            Filter::gt(a, start.first),
            Filter::eq(a, start.first).and(Filter::gte(b, start.second)),
        ]);
        match &interval.end {
            Some(end) => lower.and(Filter::Or(vec![
                Filter::lt(a, end.first),
                Filter::eq(a, end.first).and(Filter::lt(b, end.second)),
            ])),
            None => lower,
        }
    }

    fn keys_filter(&self, keys: &[RelationKey]) -> Filter {
        let [a, b] = self.fields;
        Filter::Or(
            keys.iter()
                .map(|k| Filter::eq(a, k.first).and(Filter::eq(b, k.second)))
                .collect(),
        )
    }

    fn sort_fields(&self) -> Vec<&'static str> {
        self.fields.to_vec()
    }
}

/// Key ids plus related ids of a document of any kind, `None` if the
/// document carries no valid key.
pub fn record_ids(res_type: ResType, doc: &Document) -> Option<Vec<i64>> {
    if let Some(kind) = EntityKind::for_resource(res_type) {
        let mut ids = kind.key_of(doc)?.ids();
        ids.extend(kind.related_ids(doc));
        return Some(ids);
    }
    let kind = RelationKind::for_resource(res_type)?;
    let mut ids = kind.key_of(doc)?.ids();
    ids.extend(kind.related_ids(doc));
    Some(ids)
}

/// Sub-resource of a change-feed event derived from its collection name.
pub fn sub_res_from_collection(res_type: ResType, collection: &str) -> Option<String> {
    let kind = EntityKind::for_resource(res_type)?;
    match kind.table {
        Table::PerObject(prefix) => collection.strip_prefix(prefix).map(str::to_string),
        Table::Fixed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn every_resource_has_exactly_one_descriptor() {
        for res in ResType::ALL {
            let entity = EntityKind::for_resource(res).is_some();
            let relation = RelationKind::for_resource(res).is_some();
            assert!(entity ^ relation, "{res}");
            assert_eq!(relation, res.is_relation(), "{res}");
        }
    }

    #[test]
    fn per_object_collections() {
        let kind = EntityKind::for_resource(ResType::ObjectInstance).unwrap();
        assert_eq!(kind.collection("bk_switch"), "cc_ObjectBase_0_pub_bk_switch");
        let host = EntityKind::for_resource(ResType::Host).unwrap();
        assert_eq!(host.collection(""), "cc_HostBase");
    }

    #[test]
    fn entity_interval_filter_is_half_open() {
        let kind = EntityKind::for_resource(ResType::Host).unwrap();
        let filter = kind.interval_filter(&SyncInterval::new(10, 20));
        assert!(filter.matches(&doc(json!({"bk_host_id": 10}))));
        assert!(filter.matches(&doc(json!({"bk_host_id": 19}))));
        assert!(!filter.matches(&doc(json!({"bk_host_id": 20}))));
        assert!(!filter.matches(&doc(json!({"bk_host_id": 9}))));
    }

    #[test]
    fn relation_interval_filter_is_lexicographic() {
        let kind = RelationKind::for_resource(ResType::HostRelation).unwrap();
        let window = SyncInterval::new(RelationKey::new(2, 5), RelationKey::new(4, 3));
        let filter = kind.interval_filter(&window);

        let rel = |h: i64, m: i64| doc(json!({"bk_host_id": h, "bk_module_id": m}));
        assert!(!filter.matches(&rel(2, 4)));
        assert!(filter.matches(&rel(2, 5)));
        assert!(filter.matches(&rel(3, 1)));
        assert!(filter.matches(&rel(4, 2)));
        assert!(!filter.matches(&rel(4, 3)));
        assert!(!filter.matches(&rel(5, 0)));
    }

    #[test]
    fn relation_keys_filter_matches_exact_tuples() {
        let kind = RelationKind::for_resource(ResType::ProcessRelation).unwrap();
        let filter = kind.keys_filter(&[RelationKey::new(1, 2), RelationKey::new(3, 4)]);
        let rel = |p: i64, s: i64| doc(json!({"bk_process_id": p, "service_instance_id": s}));
        assert!(filter.matches(&rel(1, 2)));
        assert!(filter.matches(&rel(3, 4)));
        assert!(!filter.matches(&rel(1, 4)));
    }

    #[test]
    fn keys_must_be_positive_integers() {
        let kind = EntityKind::for_resource(ResType::Biz).unwrap();
        assert_eq!(kind.key_of(&doc(json!({"bk_biz_id": 7}))), Some(7));
        assert_eq!(kind.key_of(&doc(json!({"bk_biz_id": 0}))), None);
        assert_eq!(kind.key_of(&doc(json!({"bk_biz_id": "7"}))), None);
        assert_eq!(kind.key_of(&doc(json!({"bk_biz_id": 2.9}))), None);
        assert_eq!(kind.key_of(&doc(json!({"name": "x"}))), None);

        let rel = RelationKind::for_resource(ResType::HostRelation).unwrap();
        assert_eq!(rel.key_of(&doc(json!({"bk_host_id": "1", "bk_module_id": 2}))), None);
    }

    #[test]
    fn record_ids_include_related() {
        let ids = record_ids(
            ResType::InstAsst,
            &doc(json!({"id": 9, "bk_inst_id": 3, "bk_asst_inst_id": 4})),
        )
        .unwrap();
        assert_eq!(ids, vec![9, 3, 4]);

        let ids = record_ids(
            ResType::HostRelation,
            &doc(json!({"bk_host_id": 1, "bk_module_id": 2, "bk_biz_id": 3})),
        )
        .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(record_ids(ResType::Host, &doc(json!({}))).is_none());
    }

    #[test]
    fn quoted_sub_resource_from_collection() {
        assert_eq!(
            sub_res_from_collection(ResType::QuotedInstance, "cc_QuotedInst_0_pub_disk"),
            Some("disk".to_string())
        );
        assert_eq!(sub_res_from_collection(ResType::ServiceInstance, "cc_ServiceInstance"), None);
    }
}
