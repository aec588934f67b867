//! Incremental-sync scenarios.

#[cfg(test)]
mod tests {
    use crate::assertions::assert_converged;
    use crate::harness::{doc, Topology};
    use serde_json::json;
    use sync_engine::{tables, Filter};
    use sync_types::{Document, ResType};

    fn host(id: i64, name: &str) -> Document {
        doc(json!({"bk_host_id": id, "bk_host_name": name}))
    }

    fn relation_key(host: i64, module: i64) -> Filter {
        Filter::eq(tables::BK_HOST_ID, host).and(Filter::eq(tables::BK_MODULE_ID, module))
    }

    fn relation(host: i64, module: i64) -> Document {
        doc(json!({"bk_host_id": host, "bk_module_id": module, "bk_biz_id": 101}))
    }

    /// Several changes of one object inside a watch cycle arrive as one.
    #[tokio::test]
    async fn changes_collapse_before_relay() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.put_host(7, "first").await;
        src.put_host(7, "second").await;
        src.put_host(9, "short lived").await;
        src.drop_host(9).await;

        assert_eq!(topo.incremental_sync().await, 1);
        assert_eq!(topo.dest.env.documents(tables::HOST), vec![host(7, "second")]);
    }

    /// Deletes reach the destination without a full sync.
    #[tokio::test]
    async fn deletes_propagate() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.put_host(1, "one").await;
        src.put_host(3, "three").await;
        topo.incremental_sync().await;

        topo.source("env-a").drop_host(1).await;
        topo.incremental_sync().await;
        assert_eq!(topo.dest.env.documents(tables::HOST), vec![host(3, "three")]);
    }

    /// A state reached incrementally needs no correction by full sync.
    #[tokio::test]
    async fn full_sync_after_incremental_writes_nothing() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        for id in [1, 3, 5, 7] {
            src.put_host(id, "h").await;
        }
        src.put_host(5, "renamed").await;
        topo.incremental_sync().await;
        let writes = topo.dest.env.store.write_count();

        topo.full_sync().await;
        assert_eq!(topo.dest.env.store.write_count(), writes);
        assert_converged(
            &topo.source("env-a").env.documents(tables::HOST),
            &topo.dest.env.documents(tables::HOST),
            &[tables::BK_HOST_ID],
        )
        .unwrap();
    }

    /// Moving a host between modules replaces the relation tuple.
    #[tokio::test]
    async fn relation_change_replaces_tuple() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.write(
            ResType::HostRelation,
            tables::MODULE_HOST_CONFIG,
            relation_key(1, 301),
            relation(1, 301),
        )
        .await;
        topo.incremental_sync().await;
        assert_eq!(topo.dest.env.documents(tables::MODULE_HOST_CONFIG), vec![relation(1, 301)]);

        let src = topo.source("env-a");
        src.remove(ResType::HostRelation, tables::MODULE_HOST_CONFIG, relation_key(1, 301))
            .await;
        src.write(
            ResType::HostRelation,
            tables::MODULE_HOST_CONFIG,
            relation_key(1, 303),
            relation(1, 303),
        )
        .await;
        topo.incremental_sync().await;
        assert_eq!(topo.dest.env.documents(tables::MODULE_HOST_CONFIG), vec![relation(1, 303)]);
    }

    /// Quoted instances travel through the change feed, per object.
    #[tokio::test]
    async fn quoted_instances_keep_their_object() {
        let mut topo = Topology::new(&["env-a"]);
        let collection = format!("{}disk", tables::QUOTED_INST_PREFIX);
        let detail = doc(json!({"id": 5, "bk_inst_id": 1, "bk_biz_id": 101}));
        topo.source("env-a")
            .write(ResType::QuotedInstance, &collection, Filter::eq("id", 5), detail.clone())
            .await;

        topo.incremental_sync().await;
        assert_eq!(topo.dest.env.documents(&collection), vec![detail]);
    }
}
