// ABOUTME: Structural validation of parsed plans
// ABOUTME: Checks dependency references and detects cycles before any execution starts

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::HashMap;

use super::Plan;
use crate::engine::{EngineError, Result};

/// Validate a plan's dependency structure: every referenced dependency must
/// exist, no task may depend on itself, and the graph must be acyclic.
///
/// The runtime scheduler degrades gracefully on a cycle (it skips the
/// unreachable remainder), but a cycle in a declarative plan is always an
/// authoring mistake worth failing fast on.
pub fn validate(plan: &Plan) -> Result<()> {
    let mut graph: Graph<String, ()> = Graph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for id in plan.tasks.keys() {
        let index = graph.add_node(id.clone());
        indices.insert(id.as_str(), index);
    }

    for (id, task) in &plan.tasks {
        for dependency in &task.depends_on {
            if dependency == id {
                return Err(EngineError::CircularDependency {
                    tasks: vec![id.clone()],
                });
            }

            let Some(&dep_index) = indices.get(dependency.as_str()) else {
                return Err(EngineError::UnknownDependency {
                    task_id: id.clone(),
                    dependency: dependency.clone(),
                });
            };

            graph.add_edge(dep_index, indices[id.as_str()], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| EngineError::CircularDependency {
        tasks: vec![graph[cycle.node_id()].clone()],
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_from(yaml: &str) -> Plan {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_plan_passes() {
        let plan = plan_from(
            r#"
name: ok
tasks:
  a:
    command: { program: echo }
  b:
    command: { program: echo }
    depends_on: [a]
"#,
        );
        assert!(validate(&plan).is_ok());
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let plan = plan_from(
            r#"
name: bad
tasks:
  a:
    command: { program: echo }
    depends_on: [ghost]
"#,
        );
        let err = validate(&plan).unwrap_err();
        assert!(
            matches!(err, EngineError::UnknownDependency { task_id, dependency }
                if task_id == "a" && dependency == "ghost")
        );
    }

    #[test]
    fn test_self_dependency_rejected() {
        let plan = plan_from(
            r#"
name: bad
tasks:
  a:
    command: { program: echo }
    depends_on: [a]
"#,
        );
        assert!(matches!(
            validate(&plan).unwrap_err(),
            EngineError::CircularDependency { .. }
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let plan = plan_from(
            r#"
name: bad
tasks:
  a:
    command: { program: echo }
    depends_on: [b]
  b:
    command: { program: echo }
    depends_on: [a]
"#,
        );
        assert!(matches!(
            validate(&plan).unwrap_err(),
            EngineError::CircularDependency { .. }
        ));
    }
}
