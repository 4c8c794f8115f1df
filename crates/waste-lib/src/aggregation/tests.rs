//! Join tests
//!
//! Listings are built by hand to cover the ways the request and usage
//! sides can disagree.

#[cfg(test)]
mod join_tests {
    use crate::aggregation::{join, JoinStats};
    use crate::quantity::Quantity;
    use crate::source::{ContainerRequests, ContainerUsage, WorkloadSpec, WorkloadUsage};

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn spec(namespace: &str, name: &str, containers: &[(&str, &str, &str)]) -> WorkloadSpec {
        WorkloadSpec {
            name: name.to_string(),
            namespace: namespace.to_string(),
            containers: containers
                .iter()
                .map(|(name, cpu, mem)| ContainerRequests {
                    name: name.to_string(),
                    requested_cpu: q(cpu),
                    requested_mem: q(mem),
                })
                .collect(),
        }
    }

    fn usage(namespace: &str, name: &str, containers: &[(&str, &str, &str)]) -> WorkloadUsage {
        WorkloadUsage {
            name: name.to_string(),
            namespace: namespace.to_string(),
            containers: containers
                .iter()
                .map(|(name, cpu, mem)| ContainerUsage {
                    name: name.to_string(),
                    used_cpu: q(cpu),
                    used_mem: q(mem),
                })
                .collect(),
        }
    }

    #[test]
    fn test_join_populates_requests_and_usage() {
        let joined = join(
            vec![spec("ns1", "p1", &[("c1", "1000m", "1"), ("c2", "0", "0")])],
            vec![usage("ns1", "p1", &[("c1", "10m", "100m")])],
        );

        assert_eq!(joined.pods.len(), 1);
        let pod = &joined.pods[0];
        assert_eq!(pod.namespace, "ns1");
        assert_eq!(pod.name, "p1");

        let c1 = pod.container("c1").unwrap();
        assert_eq!(c1.requested_cpu, q("1"));
        assert_eq!(c1.used_cpu, q("10m"));
        assert_eq!(c1.used_mem, q("100m"));

        // c2 is only in the request listing: usage stays at zero
        let c2 = pod.container("c2").unwrap();
        assert!(c2.used_cpu.is_zero());
        assert!(c2.used_mem.is_zero());

        assert!(pod.is_cpu_bound());
        assert!(pod.is_mem_bound());
        assert!(pod.is_resource_bound());
        assert_eq!(pod.cpu_utilization_pct(), Some(1.0));
        assert_eq!(pod.mem_utilization_pct(), Some(10.0));
        assert!(pod.has_low_utilization(50.0));
    }

    #[test]
    fn test_usage_for_unknown_pod_is_dropped() {
        let joined = join(
            vec![spec("ns1", "p1", &[("c1", "100m", "64Mi")])],
            vec![
                usage("ns1", "gone", &[("c1", "50m", "32Mi")]),
                usage("ns1", "p1", &[("c1", "20m", "16Mi")]),
            ],
        );

        assert_eq!(joined.pods.len(), 1);
        assert_eq!(joined.pods[0].name, "p1");
        assert_eq!(joined.stats.skipped_usage_entries, 1);
        assert_eq!(joined.stats.reported_pods, 2);
    }

    #[test]
    fn test_usage_only_container_is_unbound() {
        let joined = join(
            vec![spec("ns1", "p1", &[("app", "200m", "128Mi")])],
            vec![usage(
                "ns1",
                "p1",
                &[("app", "20m", "64Mi"), ("injected", "500m", "1Gi")],
            )],
        );

        let pod = &joined.pods[0];
        let injected = pod.container("injected").unwrap();
        assert!(!injected.is_cpu_bound());
        assert!(!injected.is_mem_bound());
        assert_eq!(injected.used_cpu, q("500m"));

        // The usage-only container does not distort the pod ratios
        assert_eq!(pod.cpu_utilization_pct(), Some(10.0));
        assert_eq!(pod.mem_utilization_pct(), Some(50.0));
        assert_eq!(joined.stats.usage_only_containers, 1);
    }

    #[test]
    fn test_identity_includes_namespace() {
        let joined = join(
            vec![
                spec("team-a", "api", &[("c", "100m", "0")]),
                spec("team-b", "api", &[("c", "400m", "0")]),
            ],
            vec![
                usage("team-b", "api", &[("c", "100m", "0")]),
                usage("team-a", "api", &[("c", "90m", "0")]),
            ],
        );

        assert_eq!(joined.pods.len(), 2);
        assert_eq!(joined.pods[0].namespace, "team-a");
        assert_eq!(joined.pods[0].cpu_utilization_pct(), Some(90.0));
        assert_eq!(joined.pods[1].namespace, "team-b");
        assert_eq!(joined.pods[1].cpu_utilization_pct(), Some(25.0));
    }

    #[test]
    fn test_request_only_pods_are_left_out() {
        let joined = join(
            vec![
                spec("ns", "running", &[("c", "100m", "0")]),
                spec("ns", "pending", &[("c", "100m", "0")]),
            ],
            vec![usage("ns", "running", &[("c", "10m", "0")])],
        );

        let names: Vec<_> = joined.pods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["running"]);
        assert_eq!(joined.stats.request_only_pods, 1);
    }

    #[test]
    fn test_pods_come_out_in_identity_order() {
        let joined = join(
            vec![
                spec("b", "z", &[("c", "1", "0")]),
                spec("a", "y", &[("c", "1", "0")]),
                spec("b", "a", &[("c", "1", "0")]),
            ],
            vec![
                usage("b", "a", &[("c", "0", "0")]),
                usage("b", "z", &[("c", "0", "0")]),
                usage("a", "y", &[("c", "0", "0")]),
            ],
        );

        let keys: Vec<_> = joined.pods.iter().map(|p| p.key().to_string()).collect();
        assert_eq!(keys, ["a/y", "b/a", "b/z"]);
    }

    #[test]
    fn test_empty_listings() {
        let joined = join(Vec::new(), Vec::new());
        assert!(joined.pods.is_empty());
        assert_eq!(joined.stats, JoinStats::default());
    }

    #[test]
    fn test_stats() {
        let joined = join(
            vec![
                spec("ns", "a", &[("c", "1", "1Gi")]),
                spec("ns", "b", &[("c", "1", "1Gi")]),
                spec("ns", "c", &[("c", "1", "1Gi")]),
            ],
            vec![
                usage("ns", "a", &[("c", "1", "1Gi"), ("extra", "1", "1Gi")]),
                usage("ns", "b", &[("c", "1", "1Gi")]),
                usage("ns", "x", &[("c", "1", "1Gi")]),
            ],
        );

        assert_eq!(
            joined.stats,
            JoinStats {
                requested_pods: 3,
                reported_pods: 3,
                joined_pods: 2,
                skipped_usage_entries: 1,
                usage_only_containers: 1,
                request_only_pods: 1,
            }
        );
    }
}
