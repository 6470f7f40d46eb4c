use sluice_core::action::NoopAction;
use sluice_core::graph::TaskGraph;
use proptest::prelude::*;

/// Random acyclic graphs: task `i` may only depend on tasks `0..i`.
fn gen_graph() -> impl Strategy<Value = TaskGraph> {
    (1usize..12)
        .prop_flat_map(|count| {
            (0..count)
                .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(4)))
                .collect::<Vec<_>>()
        })
        .prop_map(|deps_per_task| {
            let mut graph = TaskGraph::new();
            for (i, deps) in deps_per_task.into_iter().enumerate() {
                let deps: Vec<String> = deps
                    .into_iter()
                    .filter(|&d| d < i)
                    .map(|d| format!("t{}", d))
                    .collect();
                graph.register(format!("t{}", i), deps, NoopAction).unwrap();
            }
            graph
        })
}

proptest! {
    #[test]
    fn test_plan_has_no_duplicates(graph in gen_graph()) {
        let names: Vec<String> = graph.names().iter().map(|s| s.to_string()).collect();
        let plan = graph.plan(&names).unwrap();
        let mut seen = std::collections::HashSet::new();
        for task in &plan {
            prop_assert!(seen.insert(task.clone()), "Duplicate task in plan: {}", task);
        }
        prop_assert_eq!(plan.len(), graph.len());
    }

    #[test]
    fn test_prerequisites_precede_dependents(graph in gen_graph()) {
        let target = graph.names().last().map(|s| s.to_string()).unwrap();
        let plan = graph.plan(&[target]).unwrap();
        for (position, name) in plan.iter().enumerate() {
            let task = graph.get(name).unwrap();
            for dep in &task.depends_on {
                let dep_position = plan.iter().position(|n| n == dep);
                prop_assert!(dep_position.is_some(), "{} missing from plan", dep);
                prop_assert!(dep_position.unwrap() < position);
            }
        }
    }

    #[test]
    fn test_validate_accepts_acyclic_graphs(graph in gen_graph()) {
        prop_assert_eq!(graph.validate().unwrap().len(), graph.len());
    }
}
