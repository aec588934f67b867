//! Resource kinds and environment roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A synchronized resource kind.
///
/// Variants are declared in dependency order: a full sweep visits them in
/// the order of [`ResType::ALL`] so that containers exist before their
/// members and entities exist before the relations pointing at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResType {
    /// Business.
    Biz,
    /// Set inside a business.
    Set,
    /// Module inside a set.
    Module,
    /// Host.
    Host,
    /// Host to module relation.
    HostRelation,
    /// Instance of a custom object model.
    ObjectInstance,
    /// Instance of a quoted (embedded table) model.
    QuotedInstance,
    /// Instance association.
    InstAsst,
    /// Service instance.
    ServiceInstance,
    /// Process.
    Process,
    /// Process to service instance relation.
    ProcessRelation,
}

impl ResType {
    /// All resource kinds in sweep order.
    pub const ALL: [ResType; 11] = [
        ResType::Biz,
        ResType::Set,
        ResType::Module,
        ResType::Host,
        ResType::HostRelation,
        ResType::ObjectInstance,
        ResType::QuotedInstance,
        ResType::InstAsst,
        ResType::ServiceInstance,
        ResType::Process,
        ResType::ProcessRelation,
    ];

    /// Wire name of this resource kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResType::Biz => "biz",
            ResType::Set => "set",
            ResType::Module => "module",
            ResType::Host => "host",
            ResType::HostRelation => "host_relation",
            ResType::ObjectInstance => "object_instance",
            ResType::QuotedInstance => "quoted_instance",
            ResType::InstAsst => "inst_asst",
            ResType::ServiceInstance => "service_instance",
            ResType::Process => "process",
            ResType::ProcessRelation => "process_relation",
        }
    }

    /// Whether records of this kind are keyed by an id pair.
    pub fn is_relation(&self) -> bool {
        matches!(self, ResType::HostRelation | ResType::ProcessRelation)
    }

    /// Whether this kind is split into sub-resources (one per object id).
    pub fn has_sub_resource(&self) -> bool {
        matches!(
            self,
            ResType::ObjectInstance | ResType::QuotedInstance | ResType::InstAsst
        )
    }

    /// Whether documents of this kind carry the owning business id.
    pub fn is_biz_related(&self) -> bool {
        matches!(
            self,
            ResType::Biz
                | ResType::ObjectInstance
                | ResType::Set
                | ResType::Module
                | ResType::HostRelation
                | ResType::ServiceInstance
                | ResType::Process
                | ResType::ProcessRelation
        )
    }

    /// Key field names: one for entities, two for relations.
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            ResType::Biz => &["bk_biz_id"],
            ResType::Set => &["bk_set_id"],
            ResType::Module => &["bk_module_id"],
            ResType::Host => &["bk_host_id"],
            ResType::HostRelation => &["bk_host_id", "bk_module_id"],
            ResType::ObjectInstance => &["bk_inst_id"],
            ResType::QuotedInstance => &["id"],
            ResType::InstAsst => &["id"],
            ResType::ServiceInstance => &["id"],
            ResType::Process => &["bk_process_id"],
            ResType::ProcessRelation => &["bk_process_id", "service_instance_id"],
        }
    }
}

impl fmt::Display for ResType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResType::ALL
            .into_iter()
            .find(|res| res.as_str() == s)
            .ok_or_else(|| TypesError::UnknownResource(s.to_string()))
    }
}

/// Role of the local environment in a synchronization pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRole {
    /// Pushes local data to the transfer medium.
    Src,
    /// Pulls data from the transfer medium and applies it locally.
    Dest,
}

impl fmt::Display for SyncRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncRole::Src => f.write_str("src"),
            SyncRole::Dest => f.write_str("dest"),
        }
    }
}

impl FromStr for SyncRole {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "src" => Ok(SyncRole::Src),
            "dest" => Ok(SyncRole::Dest),
            other => Err(TypesError::UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for res in ResType::ALL {
            assert_eq!(res.as_str().parse::<ResType>().unwrap(), res);
        }
        assert!("cluster".parse::<ResType>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ResType::HostRelation).unwrap();
        assert_eq!(json, "\"host_relation\"");
        let role: SyncRole = serde_json::from_str("\"dest\"").unwrap();
        assert_eq!(role, SyncRole::Dest);
    }

    #[test]
    fn relations_have_two_key_fields() {
        for res in ResType::ALL {
            let expected = if res.is_relation() { 2 } else { 1 };
            assert_eq!(res.key_fields().len(), expected, "{res}");
        }
    }

    #[test]
    fn sweep_order_starts_with_containers() {
        assert_eq!(ResType::ALL[0], ResType::Biz);
        assert!(ResType::Host < ResType::HostRelation);
        assert!(ResType::ServiceInstance < ResType::ProcessRelation);
    }
}
