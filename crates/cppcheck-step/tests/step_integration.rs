//! Integration tests for the cppcheck step with in-memory host state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cppcheck_step::step::{REPORT_ARTIFACT, WARNINGS_PROPERTY, WARNINGS_STATISTIC};
use cppcheck_step::{
    CommandOutcome, CommandRunner, CommandSpec, CommandStatus, CppCheckConfig, CppCheckStep,
    RunnerError, StepHost, Verdict,
};
use serde_json::json;
use step_state::fakes::{MemoryArtifactStore, MemoryPropertyStore};
use step_state::{ArtifactStore, PropertyStore};

const XML_NO_ERRORS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results version="2">
  <cppcheck version="1.54"/>
  <errors>
  </errors>
</results>"#;

const XML_ONE_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results version="2">
  <cppcheck version="1.54"/>
  <errors>
  <error id="returnReference" severity="error" msg="Returning reference to auto variable" verbose="Returning reference to auto variable">
    <location file="test.cpp" line="13"/>
  </error>
  </errors>
</results>"#;

const XML_ERROR_NO_LOCATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results version="2">
  <cppcheck version="1.54"/>
  <errors>
  <error id="missingInclude" severity="information" msg="Cppcheck cannot find all the include files (use --check-config for details)" verbose="Cppcheck cannot find all the include files. Cppcheck can check the code without the include files found. But the results will probably be more accurate if all the include files are found. Please check your project's include directories and add all of them as include directories for Cppcheck. To see what files Cppcheck cannot find use --check-config.">
  </error>
  </errors>
</results>"#;

const XML_MULTIPLE_ERRORS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results version="2">
  <cppcheck version="1.54"/>
  <errors>
  <error id="returnReference" severity="error" msg="Returning reference to auto variable" verbose="Returning reference to auto variable">
    <location file="test.cpp" line="14"/>
  </error>
  <error id="unreadVariable" severity="style" msg="Variable 'i' is assigned a value that is never used" verbose="Variable 'i' is assigned a value that is never used">
    <location file="test.cpp" line="27"/>
  </error>
  <error id="stlcstr" severity="error" msg="Dangerous usage of c_str(). The returned value by c_str() is invalid after this call." verbose="Dangerous usage of c_str(). The c_str() return value is only valid until its string is deleted.">
    <location file="test.cpp" line="21"/>
  </error>
  <error id="unusedFunction" severity="style" msg="The function 'dsfsdf' is never used" verbose="The function 'dsfsdf' is never used">
    <location file="test.cpp" line="24"/>
  </error>
  <error id="unusedFunction" severity="style" msg="The function 'foo' is never used" verbose="The function 'foo' is never used">
    <location file="test.cpp" line="11"/>
  </error>
  <error id="missingInclude" severity="information" msg="Cppcheck cannot find all the include files (use --check-config for details)" verbose="Cppcheck cannot find all the include files. Cppcheck can check the code without the include files found. But the results will probably be more accurate if all the include files are found. Please check your project's include directories and add all of them as include directories for Cppcheck. To see what files Cppcheck cannot find use --check-config.">
  </error>
  </errors>
</results>"#;

const XML_BAD: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<results version=\"2\">\n";

/// Runner returning canned output and recording the command it was given.
struct ScriptedRunner {
    stderr: String,
    status: CommandStatus,
    seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    fn new(stderr: &str, code: i32) -> Self {
        Self {
            stderr: stderr.to_string(),
            status: CommandStatus::Exited(code),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome, RunnerError> {
        self.seen.lock().unwrap().push(spec.argv.clone());
        Ok(CommandOutcome {
            stdout: "Checking main.cpp...\n".to_string(),
            stderr: self.stderr.clone(),
            status: self.status,
            duration_ms: 5,
        })
    }
}

struct Harness {
    artifacts: Arc<MemoryArtifactStore>,
    properties: Arc<MemoryPropertyStore>,
    host: StepHost,
}

impl Harness {
    fn new() -> Self {
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let properties = Arc::new(MemoryPropertyStore::new());
        let host = StepHost::new(artifacts.clone(), properties.clone());
        Self {
            artifacts,
            properties,
            host,
        }
    }

    async fn warnings_count(&self) -> Option<serde_json::Value> {
        self.properties
            .get_property(WARNINGS_PROPERTY)
            .await
            .unwrap()
            .map(|p| p.value)
    }
}

fn step(verbose: bool) -> CppCheckStep {
    CppCheckStep::new(
        CppCheckConfig::new(vec!["--enable=all".to_string(), ".".to_string()]).verbose(verbose),
    )
}

/// Test: clean report, zero exit
#[tokio::test]
async fn test_success() {
    let h = Harness::new();
    let runner = ScriptedRunner::new(XML_NO_ERRORS, 0);
    let mut step = step(false);

    let outcome = step.run(&h.host, &runner).await.expect("run failed");

    assert_eq!(
        runner.commands(),
        vec![vec!["cppcheck", "--xml-version=2", "--enable=all", "."]]
    );
    assert_eq!(outcome.verdict, Verdict::Success);
    assert_eq!(outcome.status_text, vec!["CppCheck"]);
    assert_eq!(h.artifacts.content(REPORT_ARTIFACT).as_deref(), Some(XML_NO_ERRORS));
    assert_eq!(h.warnings_count().await, Some(json!(0)));
    assert_eq!(
        h.artifacts.list_artifacts().await.unwrap(),
        vec![REPORT_ARTIFACT],
        "no warnings artifact for a clean report"
    );
}

/// Test: one issue with a location
#[tokio::test]
async fn test_one_error() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_ONE_ERROR, 0))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Warnings);
    assert_eq!(outcome.status_text, vec!["CppCheck", "warnings"]);
    assert_eq!(h.artifacts.content(REPORT_ARTIFACT).as_deref(), Some(XML_ONE_ERROR));
    assert_eq!(
        h.artifacts.content("warnings (1)").as_deref(),
        Some("[test.cpp:13]: (error) Returning reference to auto variable\n")
    );
    assert_eq!(h.warnings_count().await, Some(json!(1)));
}

/// Test: issue without a location has no file/line prefix
#[tokio::test]
async fn test_one_error_no_location() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_ERROR_NO_LOCATION, 0))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Warnings);
    assert_eq!(
        h.artifacts.content("warnings (1)").as_deref(),
        Some("(information) Cppcheck cannot find all the include files (use --check-config for details)\n")
    );
    assert_eq!(h.warnings_count().await, Some(json!(1)));
}

/// Test: verbose configuration swaps in the verbose message only
#[tokio::test]
async fn test_one_error_verbose() {
    let h = Harness::new();
    let mut step = step(true);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_ERROR_NO_LOCATION, 0))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Warnings);
    assert_eq!(
        h.artifacts.content("warnings (1)").as_deref(),
        Some("(information) Cppcheck cannot find all the include files. Cppcheck can check the code without the include files found. But the results will probably be more accurate if all the include files are found. Please check your project's include directories and add all of them as include directories for Cppcheck. To see what files Cppcheck cannot find use --check-config.\n")
    );
}

/// Test: six issues keep document order
#[tokio::test]
async fn test_multiple_errors() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_MULTIPLE_ERRORS, 0))
        .await
        .expect("run failed");

    let expected = "\
[test.cpp:14]: (error) Returning reference to auto variable
[test.cpp:27]: (style) Variable 'i' is assigned a value that is never used
[test.cpp:21]: (error) Dangerous usage of c_str(). The returned value by c_str() is invalid after this call.
[test.cpp:24]: (style) The function 'dsfsdf' is never used
[test.cpp:11]: (style) The function 'foo' is never used
(information) Cppcheck cannot find all the include files (use --check-config for details)
";

    assert_eq!(outcome.verdict, Verdict::Warnings);
    assert_eq!(outcome.warnings_count, 6);
    assert_eq!(outcome.lines.len(), 6);
    assert_eq!(h.artifacts.content("warnings (6)").as_deref(), Some(expected));
    assert_eq!(h.warnings_count().await, Some(json!(6)));
    assert_eq!(step.status().get_statistic(WARNINGS_STATISTIC, 0), 6);
}

/// Test: non-zero exit fails the step even with a clean report
#[tokio::test]
async fn test_failure() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_NO_ERRORS, 1))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Failure);
    assert_eq!(outcome.status_text, vec!["CppCheck", "failed"]);
    assert_eq!(outcome.exit_status, CommandStatus::Exited(1));
    assert!(outcome.fatal_error.is_none());
}

/// Test: exit failure still stores artifacts and publishes the count
#[tokio::test]
async fn test_failure_with_issues_still_counts() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_ONE_ERROR, 2))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Failure);
    assert_eq!(outcome.warnings_count, 1);
    assert!(h.artifacts.content("warnings (1)").is_some());
    assert_eq!(h.warnings_count().await, Some(json!(1)));
}

/// Test: truncated XML aborts before counting
#[tokio::test]
async fn test_bad_xml() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .run(&h.host, &ScriptedRunner::new(XML_BAD, 0))
        .await
        .expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Failure);
    assert_eq!(outcome.status_text, vec!["CppChecking"]);
    assert!(outcome.fatal_error.is_some());
    assert_eq!(h.artifacts.content(REPORT_ARTIFACT).as_deref(), Some(XML_BAD));
    assert_eq!(h.artifacts.list_artifacts().await.unwrap().len(), 1);
    assert_eq!(h.warnings_count().await, None);
    assert!(step.status().statistics().is_empty());
}

/// Test: two steps in one run accumulate the property
#[tokio::test]
async fn test_property_accumulates_across_steps() {
    let h = Harness::new();

    let mut first = step(false);
    first
        .run(&h.host, &ScriptedRunner::new(XML_MULTIPLE_ERRORS, 0))
        .await
        .expect("first run failed");

    let mut second = step(false);
    second
        .run(&h.host, &ScriptedRunner::new(XML_ONE_ERROR, 0))
        .await
        .expect("second run failed");

    assert_eq!(h.warnings_count().await, Some(json!(7)));
    let prop = h
        .properties
        .get_property(WARNINGS_PROPERTY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prop.source, "CppCheck");
}

/// Test: a count left by an earlier step is added to, not replaced
#[tokio::test]
async fn test_prior_property_value_is_kept() {
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let properties =
        Arc::new(MemoryPropertyStore::new().with_property(WARNINGS_PROPERTY, json!(10), "Compile"));
    let host = StepHost::new(artifacts, properties.clone());

    let mut step = step(false);
    step.run(&host, &ScriptedRunner::new(XML_ONE_ERROR, 0))
        .await
        .expect("run failed");

    assert_eq!(
        properties.get(WARNINGS_PROPERTY, json!(0)).await.unwrap(),
        json!(11)
    );
}

/// Test: finish() classifies output captured by the host directly
#[tokio::test]
async fn test_finish_with_captured_output() {
    let h = Harness::new();
    let mut step = step(false);

    let outcome = step
        .finish(&h.host, &CommandOutcome::captured(XML_ONE_ERROR, CommandStatus::Abnormal))
        .await
        .expect("finish failed");

    assert_eq!(outcome.verdict, Verdict::Failure);
    assert_eq!(outcome.warnings_count, 1);
}

/// Test: full path through a real subprocess standing in for cppcheck
#[cfg(unix)]
#[tokio::test]
async fn test_process_runner_end_to_end() {
    use cppcheck_step::ProcessRunner;
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.xml");
    std::fs::write(&report, XML_MULTIPLE_ERRORS).unwrap();

    let script = dir.path().join("fake-cppcheck");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\necho 'Checking main.cpp...'\ncat '{}' >&2\n",
            report.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let h = Harness::new();
    let config = CppCheckConfig::new(vec![".".to_string()])
        .with_binary(script.to_string_lossy())
        .with_timeout(60);
    let mut step = CppCheckStep::new(config);

    let outcome = step.run(&h.host, &ProcessRunner).await.expect("run failed");

    assert_eq!(outcome.verdict, Verdict::Warnings);
    assert_eq!(outcome.warnings_count, 6);
    assert_eq!(
        h.artifacts.content(REPORT_ARTIFACT).as_deref(),
        Some(XML_MULTIPLE_ERRORS)
    );
}
