//! Collection and field names of the configuration database.

use serde_json::Value;
use sync_types::Document;

/// Businesses.
pub const BIZ: &str = "cc_ApplicationBase";
/// Sets.
pub const SET: &str = "cc_SetBase";
/// Modules.
pub const MODULE: &str = "cc_ModuleBase";
/// Hosts.
pub const HOST: &str = "cc_HostBase";
/// Host to module relations.
pub const MODULE_HOST_CONFIG: &str = "cc_ModuleHostConfig";
/// Object model descriptions.
pub const OBJ_DES: &str = "cc_ObjDes";
/// Model quote relations (embedded table models).
pub const MODEL_QUOTE_RELATION: &str = "cc_ModelQuoteRelation";
/// Service instances.
pub const SERVICE_INSTANCE: &str = "cc_ServiceInstance";
/// Processes.
pub const PROCESS: &str = "cc_Process";
/// Process to service instance relations.
pub const PROCESS_INSTANCE_RELATION: &str = "cc_ProcessInstanceRelation";
/// Platform settings.
pub const SYSTEM: &str = "cc_System";
/// `_id` of the platform setting document in [`SYSTEM`].
pub const PLATFORM_SETTING_ID: &str = "platform_setting";

/// Prefix of per-object instance collections.
pub const OBJECT_BASE_PREFIX: &str = "cc_ObjectBase_0_pub_";
/// Prefix of per-object instance association collections.
pub const INST_ASST_PREFIX: &str = "cc_InstAsst_0_pub_";
/// Prefix of per-object quoted instance collections.
pub const QUOTED_INST_PREFIX: &str = "cc_QuotedInst_0_pub_";

/// Business id.
pub const BK_BIZ_ID: &str = "bk_biz_id";
/// Business name.
pub const BK_BIZ_NAME: &str = "bk_biz_name";
/// Set id.
pub const BK_SET_ID: &str = "bk_set_id";
/// Module id.
pub const BK_MODULE_ID: &str = "bk_module_id";
/// Host id.
pub const BK_HOST_ID: &str = "bk_host_id";
/// Object id.
pub const BK_OBJ_ID: &str = "bk_obj_id";
/// Associated object id.
pub const BK_ASST_OBJ_ID: &str = "bk_asst_obj_id";
/// Instance id.
pub const BK_INST_ID: &str = "bk_inst_id";
/// Associated instance id.
pub const BK_ASST_INST_ID: &str = "bk_asst_inst_id";
/// Preset flag of object descriptions.
pub const BK_IS_PRE: &str = "bk_ispre";
/// Default-container flag.
pub const DEFAULT: &str = "default";
/// Destination model of a quote relation.
pub const DEST_MODEL: &str = "dest_model";
/// Object id of hosts.
pub const HOST_OBJ_ID: &str = "host";
/// Name of the internal blueking business.
pub const BLUEKING_BIZ_NAME: &str = "蓝鲸";

/// Read a record id. Only integral JSON numbers are ids; numeric strings
/// and fractions never match the numeric window filters.
pub fn id_field(doc: &Document, field: &str) -> Option<i64> {
    match doc.get(field)? {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Read an integer field, accepting numeric strings.
pub fn int_field(doc: &Document, field: &str) -> Option<i64> {
    match doc.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read a string field.
pub fn str_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}
