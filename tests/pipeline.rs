//! End-to-end pipeline tests: runbook file in, report-worthy results out,
//! over the in-memory store with real connectors and analysers.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use wct::bootstrap::build_registry;
use wct_component::ServiceContainer;
use wct_llm::testing::MockProvider;
use wct_llm::{BatchResultPoller, LlmService};
use wct_orchestration::{
    DagExecutor, ExecutionError, ExecutionPlan, ExecutionResult, Planner, PlanningError,
};
use wct_store::{ArtifactStore, InMemoryStore};

struct Pipeline {
    _dir: tempfile::TempDir,
    runbook_path: PathBuf,
    store: Arc<InMemoryStore>,
    provider: Option<Arc<MockProvider>>,
}

impl Pipeline {
    /// Write fixtures and a runbook into a temp dir.
    fn new(runbook_yaml: &str, fixtures: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in fixtures {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let runbook_path = dir.path().join("runbook.yaml");
        std::fs::write(&runbook_path, runbook_yaml).unwrap();

        Self {
            _dir: dir,
            runbook_path,
            store: Arc::new(InMemoryStore::new()),
            provider: None,
        }
    }

    fn with_batching_provider(mut self) -> Self {
        self.provider = Some(Arc::new(MockProvider::batching("test-model")));
        self
    }

    fn plan(&self) -> Result<ExecutionPlan, PlanningError> {
        let registry = build_registry().unwrap();
        Planner::new(&registry).plan(&self.runbook_path)
    }

    async fn execute(&self, resume: Option<&str>) -> Result<ExecutionResult, ExecutionError> {
        let registry = build_registry().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::clone(&self.store) as _;
        let mut services = ServiceContainer::new(Arc::clone(&store));
        if let Some(provider) = &self.provider {
            services = services.with_llm(Arc::new(LlmService::new(
                Arc::clone(provider) as _,
                store,
            )));
        }
        DagExecutor::new(Arc::new(registry), services)
            .execute(&self.plan()?, resume)
            .await
    }
}

fn findings_of<'a>(result: &'a ExecutionResult, artifact_id: &str) -> Vec<&'a Value> {
    result.artifacts[artifact_id]
        .message
        .as_ref()
        .unwrap()
        .content()["findings"]
        .as_array()
        .unwrap()
        .iter()
        .collect()
}

#[tokio::test]
async fn single_source_through_analyser_produces_email_finding() {
    let pipeline = Pipeline::new(
        r"
name: single-source
description: one file, one analyser
artifacts:
  raw:
    source:
      type: filesystem
      properties: { path: fixture.txt }
  findings:
    inputs: raw
    process:
      type: personal_data_analyser
      properties: { llm_validation: { enabled: false } }
    output: true
",
        &[("fixture.txt", "registered email: user@example.com\n")],
    );
    // Runbook paths resolve relative to the invocation; rewrite to absolute.
    let pipeline = absolute_fixture(pipeline, "fixture.txt");

    let result = pipeline.execute(None).await.unwrap();

    assert!(result.succeeded());
    assert!(result.artifacts["raw"].success);
    assert!(result.artifacts["findings"].success);

    let findings = findings_of(&result, "findings");
    assert!(!findings.is_empty());
    let email = findings
        .iter()
        .find(|f| f["category"] == "email")
        .expect("an email finding");
    assert!(
        email["matched_patterns"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["pattern"] == "email")
    );

    // The persisted message equals the returned one and validates.
    let stored = pipeline
        .store
        .get(&result.run_id, "artifacts/findings")
        .await
        .unwrap();
    stored.validate().unwrap();
}

/// Rewrite every `path:` fixture property to an absolute path inside the
/// pipeline's temp dir, so execution does not depend on the test's cwd.
fn absolute_fixture(pipeline: Pipeline, file: &str) -> Pipeline {
    let absolute = pipeline._dir.path().join(file).display().to_string();
    let yaml = std::fs::read_to_string(&pipeline.runbook_path).unwrap();
    std::fs::write(
        &pipeline.runbook_path,
        yaml.replace(&format!("path: {file}"), &format!("path: {absolute}")),
    )
    .unwrap();
    pipeline
}

#[tokio::test]
async fn fan_in_concatenates_both_sources() {
    let pipeline = Pipeline::new(
        r"
name: fan-in
description: two files merged into one analysis
artifacts:
  left:
    source:
      type: filesystem
      properties: { path: left.txt }
  right:
    source:
      type: filesystem
      properties: { path: right.txt }
  findings:
    inputs: [left, right]
    merge: concatenate
    process:
      type: personal_data_analyser
      properties: { llm_validation: { enabled: false } }
    output: true
",
        &[
            ("left.txt", "email field present here\n"),
            ("right.txt", "telephone number column\n"),
        ],
    );
    let pipeline = absolute_fixture(pipeline, "left.txt");
    let pipeline = absolute_fixture(pipeline, "right.txt");

    let result = pipeline.execute(None).await.unwrap();

    assert!(result.succeeded());
    let findings = findings_of(&result, "findings");
    let sources: Vec<&str> = findings
        .iter()
        .map(|f| f["metadata"]["source"].as_str().unwrap())
        .collect();
    assert!(sources.iter().any(|s| s.ends_with("left.txt")));
    assert!(sources.iter().any(|s| s.ends_with("right.txt")));
}

#[tokio::test]
async fn optional_source_failure_skips_dependent_and_fails_run() {
    let pipeline = Pipeline::new(
        r"
name: optional-failure
description: missing optional source
artifacts:
  raw:
    source:
      type: filesystem
      properties: { path: /nonexistent/missing.txt }
    optional: true
  findings:
    inputs: raw
    process:
      type: personal_data_analyser
      properties: { llm_validation: { enabled: false } }
",
        &[],
    );

    let result = pipeline.execute(None).await.unwrap();

    assert!(!result.succeeded());
    assert!(!result.artifacts["raw"].success);
    assert!(result.skipped.contains("findings"));
}

#[tokio::test]
async fn batch_submission_poll_then_resume_completes() {
    let pipeline = Pipeline::new(
        r"
name: batch-validation
description: LLM validation over a batch provider
artifacts:
  raw:
    source:
      type: filesystem
      properties: { path: fixture.txt }
  findings:
    inputs: raw
    process:
      type: personal_data_analyser
      properties: { llm_validation: { enabled: true } }
    output: true
",
        &[("fixture.txt", "customer email: user@example.com\n")],
    )
    .with_batching_provider();
    let pipeline = absolute_fixture(pipeline, "fixture.txt");
    let provider = Arc::clone(pipeline.provider.as_ref().unwrap());

    // First run pauses on batch submission.
    let paused = pipeline.execute(None).await.unwrap();
    assert!(paused.pending);
    assert!(paused.artifacts["raw"].success);
    assert!(!paused.artifacts.contains_key("findings"));

    // First poll: still in progress.
    let poller = BatchResultPoller::new(
        Arc::clone(&pipeline.store) as Arc<dyn ArtifactStore>,
        Arc::clone(&provider) as _,
    );
    let poll = poller.poll_run(&paused.run_id).await.unwrap();
    assert_eq!(poll.pending, 1);
    assert_eq!(poll.completed, 0);

    // Complete the batch at the provider, poll again.
    for batch_id in provider.submitted_batches() {
        provider.finish_batch_with(&batch_id, |_| serde_json::json!({"results": []}));
    }
    let poll = poller.poll_run(&paused.run_id).await.unwrap();
    assert_eq!(poll.completed, 1);
    assert_eq!(poll.pending, 0);

    // Resume finds completed cache entries and finishes the run.
    let resumed = pipeline.execute(Some(&paused.run_id)).await.unwrap();
    assert!(resumed.succeeded(), "resumed run should complete");
    assert!(resumed.artifacts["findings"].success);
    assert_eq!(
        resumed.artifacts["findings"].message.as_ref().unwrap().content()
            ["analysis_metadata"]["llm_validation_enabled"],
        true
    );
}

#[tokio::test]
async fn cyclic_runbook_fails_planning() {
    let pipeline = Pipeline::new(
        r"
name: cycle
description: two artifacts depending on each other
artifacts:
  a:
    inputs: b
    process: { type: personal_data_analyser }
  b:
    inputs: a
    process: { type: personal_data_analyser }
",
        &[],
    );

    let err = pipeline.plan().unwrap_err();
    assert!(matches!(err, PlanningError::CycleDetected { .. }));
}

#[tokio::test]
async fn resume_after_runbook_edit_is_rejected() {
    let pipeline = Pipeline::new(
        r"
name: resume-guard
description: runbook changes invalidate resume
artifacts:
  raw:
    source:
      type: filesystem
      properties: { path: fixture.txt }
",
        &[("fixture.txt", "plain content\n")],
    );
    let pipeline = absolute_fixture(pipeline, "fixture.txt");

    let result = pipeline.execute(None).await.unwrap();
    assert!(result.succeeded());

    // Edit the runbook, then try to resume the old run with the new plan.
    let yaml = std::fs::read_to_string(&pipeline.runbook_path).unwrap();
    std::fs::write(
        &pipeline.runbook_path,
        yaml.replace("runbook changes", "RUNBOOK CHANGES"),
    )
    .unwrap();

    let err = pipeline.execute(Some(&result.run_id)).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Planning(PlanningError::RunbookHashMismatch { .. })
    ));

    // The stored artifact is untouched.
    assert!(
        pipeline
            .store
            .exists(&result.run_id, "artifacts/raw")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn child_runbook_inlines_and_aliases_its_output() {
    let child_yaml = r"
name: subject-scan
description: reusable data-subject scan
inputs:
  data: { input_schema: standard_input/1.0.0 }
outputs:
  findings: { artifact: subjects }
artifacts:
  subjects:
    inputs: data
    process:
      type: data_subject_analyser
      properties: { llm_validation: { enabled: false } }
";
    let pipeline = Pipeline::new(
        r"
name: parent
description: composed scan
artifacts:
  raw:
    source:
      type: filesystem
      properties: { path: fixture.txt }
  scan:
    child_runbook:
      path: child.yaml
      input_mapping: { data: raw }
      output: findings
    output: true
",
        &[
            ("fixture.txt", "customer order history table\n"),
            ("child.yaml", child_yaml),
        ],
    );
    let pipeline = absolute_fixture(pipeline, "fixture.txt");

    let result = pipeline.execute(None).await.unwrap();

    assert!(result.succeeded());
    assert!(result.artifacts["raw"].success);
    assert!(result.artifacts["scan/subjects"].success);
    assert_eq!(result.artifacts["scan/subjects"].origin, "child:subject-scan");

    let alias = &result.artifacts["scan"];
    assert!(alias.success);
    assert_eq!(alias.alias.as_deref(), Some("scan/subjects"));

    let findings = findings_of(&result, "scan");
    assert!(findings.iter().any(|f| f["category"] == "customer"));
}

#[tokio::test]
async fn empty_runbook_succeeds_with_no_artifacts() {
    let pipeline = Pipeline::new("name: empty\ndescription: nothing\nartifacts: {}\n", &[]);

    let result = pipeline.execute(None).await.unwrap();

    assert!(result.succeeded());
    assert!(result.artifacts.is_empty());
}
