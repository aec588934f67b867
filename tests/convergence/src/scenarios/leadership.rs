//! Leadership scenarios.

#[cfg(test)]
mod tests {
    use crate::assertions::assert_converged;
    use crate::harness::{doc, Topology};
    use serde_json::json;
    use sync_engine::tables;
    use sync_types::Document;

    fn host(id: i64) -> Document {
        doc(json!({"bk_host_id": id}))
    }

    /// A source replica without leadership pushes nothing until it leads.
    #[tokio::test]
    async fn source_waits_for_leadership() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.env.store.seed(tables::HOST, [host(1), host(3)]);
        src.env.leader.set_master(false);

        assert_eq!(topo.full_sync().await, 0);
        assert_eq!(topo.medium.total_queued(), 0);

        topo.source("env-a").env.leader.set_master(true);
        topo.full_sync().await;
        assert_converged(
            &[host(1), host(3)],
            &topo.dest.env.documents(tables::HOST),
            &[tables::BK_HOST_ID],
        )
        .unwrap();
    }

    /// Payloads wait in the medium while the destination has no leader.
    #[tokio::test]
    async fn destination_resumes_from_queue() {
        let mut topo = Topology::new(&["env-a"]);
        topo.source("env-a").env.store.seed(tables::HOST, [host(1)]);
        topo.dest.env.leader.set_master(false);

        assert_eq!(topo.full_sync().await, 0);
        assert!(topo.medium.total_queued() > 0);
        assert!(topo.dest.env.documents(tables::HOST).is_empty());

        topo.dest.env.leader.set_master(true);
        assert!(topo.dest.pull_full().await > 0);
        assert_eq!(topo.dest.env.documents(tables::HOST), vec![host(1)]);
        assert_eq!(topo.medium.total_queued(), 0);
    }

    /// Changes made while the watcher had no leadership are relayed later.
    #[tokio::test]
    async fn watcher_catches_up_after_leadership_returns() {
        let mut topo = Topology::new(&["env-a"]);
        let src = topo.source("env-a");
        src.env.leader.set_master(false);
        src.put_host(5, "while follower").await;

        assert_eq!(topo.incremental_sync().await, 0);
        assert!(topo.dest.env.documents(tables::HOST).is_empty());

        topo.source("env-a").env.leader.set_master(true);
        assert_eq!(topo.incremental_sync().await, 1);
        assert_eq!(
            topo.dest.env.documents(tables::HOST),
            vec![doc(json!({"bk_host_id": 5, "bk_host_name": "while follower"}))]
        );
    }
}
