//! Resolves runbooks into validated execution plans.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;

use wct_component::ComponentRegistry;
use wct_core::Schema;

use crate::dag::ExecutionDAG;
use crate::error::PlanningError;
use crate::runbook::{MergePolicy, ProcessConfig, Runbook, SourceConfig};

/// How a planned artifact is produced.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Source {
        config: SourceConfig,
    },
    Derived {
        inputs: Vec<String>,
        process: ProcessConfig,
        merge: MergePolicy,
    },
    /// Mirrors a child runbook's declared output under a parent-visible id.
    Alias {
        target: String,
    },
}

/// One artifact in the resolved plan.
#[derive(Debug, Clone)]
pub struct PlannedNode {
    pub kind: NodeKind,
    pub optional: bool,
    pub output: bool,
    /// Definition-level override of the component's default output schema.
    pub output_schema: Option<String>,
    /// `parent`, or `child:{runbook_name}` for inlined child artifacts.
    pub origin: String,
}

impl PlannedNode {
    /// Direct dependencies implied by the node kind.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<String> {
        match &self.kind {
            NodeKind::Source { .. } => BTreeSet::new(),
            NodeKind::Derived { inputs, .. } => inputs.iter().cloned().collect(),
            NodeKind::Alias { target } => [target.clone()].into(),
        }
    }
}

/// Effective schemas for one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactSchemas {
    /// Schema of the (merged) input; `None` for source artifacts.
    pub input: Option<Schema>,
    pub output: Schema,
}

/// A validated runbook with its DAG and resolved schemas.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub runbook: Runbook,
    pub nodes: BTreeMap<String, PlannedNode>,
    pub dag: ExecutionDAG,
    pub schemas: BTreeMap<String, ArtifactSchemas>,
    pub runbook_path: String,
    /// BLAKE3 digest of the runbook file; resume rejects a changed file.
    pub runbook_hash: String,
}

/// Parses a runbook, inlines child runbooks, validates the DAG, and
/// resolves every artifact's effective schemas against the registry.
pub struct Planner<'a> {
    registry: &'a ComponentRegistry,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a runbook file into an execution plan.
    pub fn plan(&self, runbook_path: &Path) -> Result<ExecutionPlan, PlanningError> {
        let display_path = runbook_path.display().to_string();
        let bytes = std::fs::read(runbook_path).map_err(|e| PlanningError::ReadFailed {
            path: display_path.clone(),
            reason: e.to_string(),
        })?;
        let runbook_hash = blake3::hash(&bytes).to_hex().to_string();

        let text = String::from_utf8(bytes).map_err(|e| PlanningError::Parse {
            path: display_path.clone(),
            reason: e.to_string(),
        })?;
        let runbook = Runbook::from_yaml(&text).map_err(|e| match e {
            PlanningError::Invalid(reason) => PlanningError::Parse {
                path: display_path.clone(),
                reason,
            },
            other => other,
        })?;

        let base_dir = runbook_path.parent().unwrap_or_else(|| Path::new("."));
        let mut nodes = BTreeMap::new();
        self.collect_nodes(
            &runbook,
            "",
            base_dir,
            0,
            runbook.config.max_child_depth,
            "parent",
            &BTreeMap::new(),
            &mut nodes,
        )?;

        let dependency_map: BTreeMap<String, BTreeSet<String>> = nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.dependencies()))
            .collect();
        let dag = ExecutionDAG::new(dependency_map)?;
        dag.validate()?;

        let schemas = self.resolve_schemas(&nodes, &dag)?;

        debug!(
            runbook = %runbook.name,
            artifacts = nodes.len(),
            "Planned runbook"
        );

        Ok(ExecutionPlan {
            runbook,
            nodes,
            dag,
            schemas,
            runbook_path: display_path,
            runbook_hash,
        })
    }

    /// Recursively collect planned nodes, inlining child runbooks with
    /// namespaced ids.
    #[allow(clippy::too_many_arguments)]
    fn collect_nodes(
        &self,
        runbook: &Runbook,
        prefix: &str,
        base_dir: &Path,
        depth: usize,
        max_depth: usize,
        origin: &str,
        input_substitution: &BTreeMap<String, String>,
        nodes: &mut BTreeMap<String, PlannedNode>,
    ) -> Result<(), PlanningError> {
        for (artifact_id, definition) in &runbook.artifacts {
            let full_id = namespaced(prefix, artifact_id);

            if let Some(source) = &definition.source {
                insert_node(
                    nodes,
                    full_id,
                    PlannedNode {
                        kind: NodeKind::Source {
                            config: source.clone(),
                        },
                        optional: definition.optional,
                        output: definition.output,
                        output_schema: definition.output_schema.clone(),
                        origin: origin.to_string(),
                    },
                )?;
            } else if let Some(inputs) = &definition.inputs {
                let process = definition.process.clone().ok_or_else(|| {
                    PlanningError::Invalid(format!(
                        "artifact '{full_id}' has 'inputs' but no 'process'"
                    ))
                })?;

                let mut resolved_inputs = Vec::new();
                for reference in inputs.ids() {
                    match self.resolve_input_reference(
                        runbook,
                        prefix,
                        &reference,
                        input_substitution,
                    )? {
                        Some(resolved) => resolved_inputs.push(resolved),
                        None => continue, // unmapped optional input
                    }
                }

                insert_node(
                    nodes,
                    full_id,
                    PlannedNode {
                        kind: NodeKind::Derived {
                            inputs: resolved_inputs,
                            process,
                            merge: definition.merge.unwrap_or_default(),
                        },
                        optional: definition.optional,
                        output: definition.output,
                        output_schema: definition.output_schema.clone(),
                        origin: origin.to_string(),
                    },
                )?;
            } else if let Some(child_config) = &definition.child_runbook {
                if depth + 1 > max_depth {
                    return Err(PlanningError::ChildDepthExceeded { limit: max_depth });
                }

                self.inline_child_runbook(
                    runbook,
                    prefix,
                    &full_id,
                    definition.optional,
                    definition.output,
                    child_config,
                    base_dir,
                    depth,
                    max_depth,
                    input_substitution,
                    nodes,
                )?;
            }
        }

        Ok(())
    }

    /// Resolve an input reference within one runbook's namespace: a
    /// declared child input maps to the parent artifact bound to it (or is
    /// dropped when optional and unmapped); anything else is an artifact id
    /// in the current runbook.
    fn resolve_input_reference(
        &self,
        runbook: &Runbook,
        prefix: &str,
        reference: &str,
        input_substitution: &BTreeMap<String, String>,
    ) -> Result<Option<String>, PlanningError> {
        if let Some(declarations) = &runbook.inputs
            && let Some(declaration) = declarations.get(reference)
        {
            return match input_substitution.get(reference) {
                Some(mapped) => Ok(Some(mapped.clone())),
                None if declaration.optional => Ok(None),
                None => Err(PlanningError::Invalid(format!(
                    "required input '{reference}' of runbook '{}' is not mapped",
                    runbook.name
                ))),
            };
        }
        Ok(Some(namespaced(prefix, reference)))
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_child_runbook(
        &self,
        parent: &Runbook,
        prefix: &str,
        full_id: &str,
        optional: bool,
        output: bool,
        config: &crate::runbook::ChildRunbookConfig,
        base_dir: &Path,
        depth: usize,
        max_depth: usize,
        input_substitution: &BTreeMap<String, String>,
        nodes: &mut BTreeMap<String, PlannedNode>,
    ) -> Result<(), PlanningError> {
        let child_path = base_dir.join(&config.path);
        let child_error = |reason: String| PlanningError::ChildRunbook {
            path: config.path.clone(),
            reason,
        };

        let text = std::fs::read_to_string(&child_path)
            .map_err(|e| child_error(format!("cannot read: {e}")))?;
        let child = Runbook::from_yaml(&text).map_err(|e| child_error(e.to_string()))?;

        // Every required child input must be bound to a parent artifact.
        for required in child.required_input_names() {
            if !config.input_mapping.contains_key(&required) {
                return Err(child_error(format!(
                    "required input '{required}' is not present in input_mapping"
                )));
            }
        }

        // Resolve mapped parent artifacts in the parent's namespace.
        let mut substitution = BTreeMap::new();
        for (child_input, parent_ref) in &config.input_mapping {
            let declared = child
                .inputs
                .as_ref()
                .and_then(|inputs| inputs.get(child_input));
            if declared.is_none() {
                return Err(child_error(format!(
                    "input_mapping references undeclared input '{child_input}'"
                )));
            }
            let Some(resolved) =
                self.resolve_input_reference(parent, prefix, parent_ref, input_substitution)?
            else {
                return Err(child_error(format!(
                    "input '{child_input}' maps to unavailable artifact '{parent_ref}'"
                )));
            };
            substitution.insert(child_input.clone(), resolved);
        }

        let child_origin = format!("child:{}", child.name);
        let child_base = child_path.parent().unwrap_or_else(|| Path::new("."));
        self.collect_nodes(
            &child,
            full_id,
            child_base,
            depth + 1,
            max_depth,
            &child_origin,
            &substitution,
            nodes,
        )?;

        // Bind the child's declared outputs into the parent namespace.
        let declared_outputs = child.outputs.clone().unwrap_or_default();
        let resolve_output = |name: &str| -> Result<String, PlanningError> {
            let declaration = declared_outputs.get(name).ok_or_else(|| {
                child_error(format!("child runbook declares no output '{name}'"))
            })?;
            Ok(namespaced(full_id, &declaration.artifact))
        };

        if let Some(output_name) = &config.output {
            insert_node(
                nodes,
                full_id.to_string(),
                PlannedNode {
                    kind: NodeKind::Alias {
                        target: resolve_output(output_name)?,
                    },
                    optional,
                    output,
                    output_schema: None,
                    origin: child_origin.clone(),
                },
            )?;
        }

        if let Some(output_mapping) = &config.output_mapping {
            for (child_output, parent_name) in output_mapping {
                insert_node(
                    nodes,
                    namespaced(prefix, parent_name),
                    PlannedNode {
                        kind: NodeKind::Alias {
                            target: resolve_output(child_output)?,
                        },
                        optional,
                        output,
                        output_schema: None,
                        origin: child_origin.clone(),
                    },
                )?;
            }
        }

        Ok(())
    }

    /// Resolve each artifact's effective input and output schemas in
    /// dependency order.
    fn resolve_schemas(
        &self,
        nodes: &BTreeMap<String, PlannedNode>,
        dag: &ExecutionDAG,
    ) -> Result<BTreeMap<String, ArtifactSchemas>, PlanningError> {
        let mut schemas: BTreeMap<String, ArtifactSchemas> = BTreeMap::new();
        let mut sorter = dag.sorter();

        while sorter.is_active() {
            let ready = sorter.take_ready();
            if ready.is_empty() {
                break; // unreachable after validate(), but never spin
            }
            for artifact_id in ready {
                let node = &nodes[&artifact_id];
                let resolved = self.resolve_node_schemas(&artifact_id, node, &schemas)?;
                schemas.insert(artifact_id.clone(), resolved);
                sorter.done(&artifact_id);
            }
        }

        Ok(schemas)
    }

    fn resolve_node_schemas(
        &self,
        artifact_id: &str,
        node: &PlannedNode,
        resolved: &BTreeMap<String, ArtifactSchemas>,
    ) -> Result<ArtifactSchemas, PlanningError> {
        let declared_override = node
            .output_schema
            .as_deref()
            .map(Schema::parse)
            .transpose()?;

        match &node.kind {
            NodeKind::Source { config } => {
                let factory = self.registry.connector(&config.component_type).ok_or_else(
                    || PlanningError::UnknownComponentType {
                        artifact_id: artifact_id.to_string(),
                        component_type: config.component_type.clone(),
                    },
                )?;
                if !factory.can_create(&config.properties) {
                    return Err(PlanningError::ComponentConfig {
                        artifact_id: artifact_id.to_string(),
                        component_type: config.component_type.clone(),
                        reason: "configuration rejected by factory".to_string(),
                    });
                }
                let output = match declared_override {
                    Some(schema) => schema,
                    None => factory.output_schemas().into_iter().next().ok_or_else(|| {
                        PlanningError::ComponentConfig {
                            artifact_id: artifact_id.to_string(),
                            component_type: config.component_type.clone(),
                            reason: "component declares no output schemas".to_string(),
                        }
                    })?,
                };
                Ok(ArtifactSchemas {
                    input: None,
                    output,
                })
            }
            NodeKind::Derived {
                inputs, process, ..
            } => {
                let factory = self.registry.processor(&process.component_type).ok_or_else(
                    || PlanningError::UnknownComponentType {
                        artifact_id: artifact_id.to_string(),
                        component_type: process.component_type.clone(),
                    },
                )?;
                if !factory.can_create(&process.properties) {
                    return Err(PlanningError::ComponentConfig {
                        artifact_id: artifact_id.to_string(),
                        component_type: process.component_type.clone(),
                        reason: "configuration rejected by factory".to_string(),
                    });
                }

                let mut input_schema: Option<Schema> = None;
                for input_id in inputs {
                    let producer = &resolved[input_id].output;
                    match &input_schema {
                        None => input_schema = Some(producer.clone()),
                        Some(first) if first != producer => {
                            return Err(PlanningError::FanInSchemaMismatch {
                                artifact_id: artifact_id.to_string(),
                                first: first.reference(),
                                second: producer.reference(),
                            });
                        }
                        Some(_) => {}
                    }
                }

                if let Some(schema) = &input_schema {
                    let accepted = factory.input_schemas();
                    if !accepted.contains(schema) {
                        return Err(PlanningError::InputSchemaMismatch {
                            artifact_id: artifact_id.to_string(),
                            component_type: process.component_type.clone(),
                            found: schema.reference(),
                            accepted: accepted
                                .iter()
                                .map(Schema::reference)
                                .collect::<Vec<_>>()
                                .join(", "),
                        });
                    }
                }

                let output = match declared_override {
                    Some(schema) => schema,
                    None => factory.output_schemas().into_iter().next().ok_or_else(|| {
                        PlanningError::ComponentConfig {
                            artifact_id: artifact_id.to_string(),
                            component_type: process.component_type.clone(),
                            reason: "component declares no output schemas".to_string(),
                        }
                    })?,
                };

                Ok(ArtifactSchemas {
                    input: input_schema,
                    output,
                })
            }
            NodeKind::Alias { target } => {
                let target_output = resolved[target].output.clone();
                Ok(ArtifactSchemas {
                    input: Some(target_output.clone()),
                    output: declared_override.unwrap_or(target_output),
                })
            }
        }
    }
}

fn namespaced(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}/{id}")
    }
}

fn insert_node(
    nodes: &mut BTreeMap<String, PlannedNode>,
    id: String,
    node: PlannedNode,
) -> Result<(), PlanningError> {
    if nodes.contains_key(&id) {
        return Err(PlanningError::Invalid(format!(
            "duplicate artifact id '{id}'"
        )));
    }
    nodes.insert(id, node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map as JsonMap, Value};
    use std::sync::Arc;
    use wct_component::{ComponentRegistry, ConnectorFactory, ProcessorFactory, ServiceContainer};
    use wct_core::{ComponentError, Connector, Processor};

    struct TestConnectorFactory {
        name: &'static str,
        output: Schema,
    }

    impl ConnectorFactory for TestConnectorFactory {
        fn component_name(&self) -> &str {
            self.name
        }

        fn output_schemas(&self) -> Vec<Schema> {
            vec![self.output.clone()]
        }

        fn can_create(&self, properties: &JsonMap<String, Value>) -> bool {
            !properties.contains_key("invalid")
        }

        fn create(
            &self,
            _properties: &JsonMap<String, Value>,
            _services: &ServiceContainer,
        ) -> Result<Box<dyn Connector>, ComponentError> {
            Err(ComponentError::Config("planner tests never execute".to_string()))
        }
    }

    struct TestProcessorFactory {
        name: &'static str,
        input: Schema,
        output: Schema,
    }

    impl ProcessorFactory for TestProcessorFactory {
        fn component_name(&self) -> &str {
            self.name
        }

        fn input_schemas(&self) -> Vec<Schema> {
            vec![self.input.clone()]
        }

        fn output_schemas(&self) -> Vec<Schema> {
            vec![self.output.clone()]
        }

        fn can_create(&self, properties: &JsonMap<String, Value>) -> bool {
            !properties.contains_key("invalid")
        }

        fn create(
            &self,
            _properties: &JsonMap<String, Value>,
            _services: &ServiceContainer,
        ) -> Result<Box<dyn Processor>, ComponentError> {
            Err(ComponentError::Config("planner tests never execute".to_string()))
        }
    }

    fn registry() -> ComponentRegistry {
        let standard_input = Schema::new("standard_input", "1.0.0");
        let finding = Schema::new("personal_data_finding", "1.0.0");

        let mut registry = ComponentRegistry::new();
        registry
            .register_connector(Arc::new(TestConnectorFactory {
                name: "filesystem",
                output: standard_input.clone(),
            }))
            .unwrap();
        registry
            .register_processor(Arc::new(TestProcessorFactory {
                name: "analyser",
                input: standard_input,
                output: finding.clone(),
            }))
            .unwrap();
        registry
            .register_processor(Arc::new(TestProcessorFactory {
                name: "classifier",
                input: finding.clone(),
                output: finding,
            }))
            .unwrap();
        registry
    }

    fn plan_yaml(yaml: &str) -> Result<ExecutionPlan, PlanningError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runbook.yaml");
        std::fs::write(&path, yaml).unwrap();
        let registry = registry();
        Planner::new(&registry).plan(&path)
    }

    #[test]
    fn resolves_schemas_along_the_chain() {
        let plan = plan_yaml(
            r"
name: chain
description: d
artifacts:
  raw:
    source: { type: filesystem }
  findings:
    inputs: raw
    process: { type: analyser }
  classified:
    inputs: findings
    process: { type: classifier }
",
        )
        .unwrap();

        assert!(plan.schemas["raw"].input.is_none());
        assert_eq!(plan.schemas["raw"].output.reference(), "standard_input/1.0.0");
        assert_eq!(
            plan.schemas["findings"].input.as_ref().unwrap().reference(),
            "standard_input/1.0.0"
        );
        assert_eq!(
            plan.schemas["findings"].output.reference(),
            "personal_data_finding/1.0.0"
        );
        assert_eq!(
            plan.schemas["classified"].input.as_ref().unwrap().reference(),
            "personal_data_finding/1.0.0"
        );
    }

    #[test]
    fn output_schema_override_takes_precedence() {
        let plan = plan_yaml(
            r"
name: override
description: d
artifacts:
  raw:
    source: { type: filesystem }
    output_schema: personal_data_finding/1.0.0
",
        )
        .unwrap();

        assert_eq!(
            plan.schemas["raw"].output.reference(),
            "personal_data_finding/1.0.0"
        );
    }

    #[test]
    fn unknown_component_type_fails_planning() {
        let err = plan_yaml(
            r"
name: unknown
description: d
artifacts:
  raw:
    source: { type: mysql }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::UnknownComponentType { .. }));
    }

    #[test]
    fn unknown_input_fails_planning() {
        let err = plan_yaml(
            r"
name: dangling
description: d
artifacts:
  findings:
    inputs: ghost
    process: { type: analyser }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::UnknownInput { .. }));
    }

    #[test]
    fn cycle_fails_planning() {
        let err = plan_yaml(
            r"
name: cycle
description: d
artifacts:
  a:
    inputs: b
    process: { type: classifier }
  b:
    inputs: a
    process: { type: classifier }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::CycleDetected { .. }));
    }

    #[test]
    fn input_schema_mismatch_fails_planning() {
        // classifier accepts finding schema, but raw produces standard_input.
        let err = plan_yaml(
            r"
name: mismatch
description: d
artifacts:
  raw:
    source: { type: filesystem }
  classified:
    inputs: raw
    process: { type: classifier }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::InputSchemaMismatch { .. }));
    }

    #[test]
    fn fan_in_with_mixed_schemas_fails_planning() {
        let err = plan_yaml(
            r"
name: mixed
description: d
artifacts:
  raw:
    source: { type: filesystem }
  findings:
    inputs: raw
    process: { type: analyser }
  merged:
    inputs: [raw, findings]
    merge: concatenate
    process: { type: analyser }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::FanInSchemaMismatch { .. }));
    }

    #[test]
    fn rejected_component_config_fails_planning() {
        let err = plan_yaml(
            r"
name: bad-config
description: d
artifacts:
  raw:
    source:
      type: filesystem
      properties: { invalid: true }
",
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::ComponentConfig { .. }));
    }

    #[test]
    fn child_depth_limit_is_enforced() {
        let dir = tempfile::tempdir().unwrap();

        // a -> b -> c nests two children; with max_child_depth 1 the second
        // level must be rejected.
        std::fs::write(
            dir.path().join("runbook.yaml"),
            r"
name: parent
description: d
config: { max_child_depth: 1 }
artifacts:
  raw:
    source: { type: filesystem }
  level1:
    child_runbook:
      path: child1.yaml
      input_mapping: { data: raw }
      output: out
",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("child1.yaml"),
            r"
name: child1
description: d
inputs:
  data: { input_schema: standard_input/1.0.0 }
outputs:
  out: { artifact: nested }
artifacts:
  nested:
    child_runbook:
      path: child2.yaml
      input_mapping: { data: data }
      output: out
",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("child2.yaml"),
            r"
name: child2
description: d
inputs:
  data: { input_schema: standard_input/1.0.0 }
outputs:
  out: { artifact: findings }
artifacts:
  findings:
    inputs: data
    process: { type: analyser }
",
        )
        .unwrap();

        let registry = registry();
        let err = Planner::new(&registry)
            .plan(&dir.path().join("runbook.yaml"))
            .unwrap_err();

        assert!(matches!(err, PlanningError::ChildDepthExceeded { .. }));
    }

    #[test]
    fn missing_required_child_input_mapping_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("runbook.yaml"),
            r"
name: parent
description: d
artifacts:
  raw:
    source: { type: filesystem }
  scan:
    child_runbook:
      path: child.yaml
      input_mapping: {}
      output: out
",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("child.yaml"),
            r"
name: child
description: d
inputs:
  data: { input_schema: standard_input/1.0.0 }
outputs:
  out: { artifact: findings }
artifacts:
  findings:
    inputs: data
    process: { type: analyser }
",
        )
        .unwrap();

        let registry = registry();
        let err = Planner::new(&registry)
            .plan(&dir.path().join("runbook.yaml"))
            .unwrap_err();

        let PlanningError::ChildRunbook { reason, .. } = err else {
            panic!("expected child runbook error, got {err}");
        };
        assert!(reason.contains("not present in input_mapping"));
    }
}
