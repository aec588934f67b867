//! Full-sync scenarios.

#[cfg(test)]
mod tests {
    use crate::assertions::{assert_converged, assert_unique, excluding};
    use crate::harness::{doc, Topology};
    use serde_json::json;
    use sync_engine::{tables, Filter, Store};
    use sync_types::Document;

    const HOST_KEY: &[&str] = &[tables::BK_HOST_ID];

    fn host(id: i64, name: &str) -> Document {
        doc(json!({"bk_host_id": id, "bk_host_name": name}))
    }

    fn host_name(docs: &[Document], id: i64) -> Option<String> {
        docs.iter()
            .find(|d| d.get(tables::BK_HOST_ID) == Some(&json!(id)))
            .and_then(|d| d.get("bk_host_name"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Stale, missing and extra records are all reconciled across windows.
    #[tokio::test]
    async fn full_sync_converges_across_windows() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.env.store.seed(tables::HOST, (1..=15).step_by(2).map(|id| host(id, "src")));
        src.env.store.seed(
            tables::BIZ,
            [doc(json!({"bk_biz_id": 101})), doc(json!({"bk_biz_id": 103}))],
        );
        src.env.store.seed(tables::SET, [doc(json!({"bk_set_id": 201, "bk_biz_id": 101}))]);

        let dest = &topo.dest.env;
        dest.store.seed(
            tables::HOST,
            [host(3, "stale"), host(17, "gone upstream"), host(4, "owned by env-b")],
        );

        assert!(topo.full_sync().await > 0);

        let src = &topo.source("env-a").env;
        let dest = &topo.dest.env;
        let mut expected = src.documents(tables::HOST);
        expected.push(host(4, "owned by env-b"));
        assert_converged(&expected, &dest.documents(tables::HOST), HOST_KEY).unwrap();

        assert_converged(
            &excluding(&src.documents(tables::BIZ), tables::BK_BIZ_ID, &[10]),
            &excluding(&dest.documents(tables::BIZ), tables::BK_BIZ_ID, &[1]),
            &[tables::BK_BIZ_ID],
        )
        .unwrap();
        assert_converged(
            &excluding(&src.documents(tables::SET), tables::BK_SET_ID, &[20]),
            &excluding(&dest.documents(tables::SET), tables::BK_SET_ID, &[2]),
            &[tables::BK_SET_ID],
        )
        .unwrap();
    }

    /// The destination's own host pool is never touched, and the source's
    /// host pool ids are rewritten into the destination's.
    #[tokio::test]
    async fn host_pool_ids_are_remapped() {
        let mut topo = Topology::new(&["env-a"]);
        topo.source("env-a").env.store.seed(
            tables::MODULE,
            [doc(json!({"bk_module_id": 301, "bk_set_id": 20, "bk_biz_id": 10}))],
        );

        topo.full_sync().await;

        let modules = topo.dest.env.documents(tables::MODULE);
        assert!(modules.contains(&doc(json!({
            "bk_module_id": 3,
            "bk_set_id": 2,
            "bk_biz_id": 1,
            "default": 1
        }))));
        assert!(modules.contains(&doc(json!({"bk_module_id": 301, "bk_set_id": 2, "bk_biz_id": 1}))));
        assert!(!modules.iter().any(|m| m.get(tables::BK_MODULE_ID) == Some(&json!(30))));
    }

    /// Replaying a converged state writes nothing.
    #[tokio::test]
    async fn replay_is_idempotent() {
        let mut topo = Topology::new(&["env-a"]);
        topo.source("env-a")
            .env
            .store
            .seed(tables::HOST, (1..=9).step_by(2).map(|id| host(id, "h")));
        topo.full_sync().await;
        let writes = topo.dest.env.store.write_count();

        assert!(topo.full_sync().await > 0);
        assert_eq!(topo.dest.env.store.write_count(), writes);
        assert_unique(&topo.dest.env.documents(tables::HOST), HOST_KEY).unwrap();
    }

    /// Each source only reconciles the ids it owns.
    #[tokio::test]
    async fn sources_partition_the_destination() {
        let mut topo = Topology::new(&["env-a", "env-b"]);
        topo.source("env-a").env.store.seed(
            tables::HOST,
            [host(1, "a-1"), host(3, "a-3"), host(5, "a-5"), host(6, "a-6")],
        );
        topo.source("env-b")
            .env
            .store
            .seed(tables::HOST, [host(2, "b-2"), host(4, "b-4"), host(6, "b-6")]);

        topo.full_sync().await;
        let hosts = topo.dest.env.documents(tables::HOST);
        assert_eq!(hosts.len(), 6);
        assert_eq!(host_name(&hosts, 6).as_deref(), Some("b-6"));
        assert_unique(&hosts, HOST_KEY).unwrap();

        let env_b = &topo.source("env-b").env;
        env_b
            .store
            .delete(tables::HOST, &Filter::eq(tables::BK_HOST_ID, 4))
            .await
            .unwrap();
        topo.full_sync().await;

        let expected = vec![
            host(1, "a-1"),
            host(3, "a-3"),
            host(5, "a-5"),
            host(2, "b-2"),
            host(6, "b-6"),
        ];
        assert_converged(&expected, &topo.dest.env.documents(tables::HOST), HOST_KEY).unwrap();
    }
}
