//! End-to-end: YAML contract on disk, loaded through the config, run against
//! an in-process executor.

use std::path::Path;

use contractkit_core::verdict::VerdictStatus;
use contractkit_core::{
    Config, ExecutorError, HttpRequest, HttpResponse, RunReport, TestExecutor, TestResult, VerdictPolicy,
};
use contractkit_runner::ContractRunner;
use serde_json::json;

const PETS: &str = r##"
openapi: 3.0.3
info:
  title: Pets
  version: "1"
paths:
  /pets:
    post:
      summary: create pet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/NewPet'
            examples:
              rex:
                value:
                  name: rex
      responses:
        "201":
          description: created
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
        "400":
          description: invalid pet
  /pets/{id}:
    get:
      summary: fetch pet
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
      responses:
        "200":
          description: found
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
components:
  schemas:
    NewPet:
      type: object
      required: [name]
      properties:
        name:
          type: string
    Pet:
      type: object
      required: [id, name]
      properties:
        id:
          type: integer
        name:
          type: string
"##;

/// Answers like a well-behaved pet service, or with a string id when broken
struct PetService {
    broken: bool,
}

impl TestExecutor for PetService {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError> {
        let id = if self.broken { json!("one") } else { json!(1) };
        match request.method.as_str() {
            "POST" => Ok(HttpResponse::new(201).with_body(json!({"id": id, "name": request.body["name"]}))),
            "GET" => Ok(HttpResponse::new(200).with_body(json!({"id": id, "name": "rex"}))),
            _ => Err(ExecutorError::Transport("unsupported".into())),
        }
    }
}

fn write_contract(dir: &Path) -> Config {
    let spec = dir.join("pets.yaml");
    std::fs::write(&spec, PETS).unwrap();
    Config {
        spec,
        ..Config::default()
    }
}

#[test]
fn loads_scenarios_in_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ContractRunner::from_config(&write_contract(dir.path())).unwrap();
    let descriptions: Vec<String> = runner
        .feature()
        .scenarios
        .iter()
        .map(|s| s.test_description())
        .collect();
    insta::assert_snapshot!(descriptions.join("\n"), @r"
    Scenario: create pet (POST /pets -> 201)
    Scenario: create pet (POST /pets -> 400)
    Scenario: fetch pet (GET /pets/{id} -> 200)
    ");
}

#[test]
fn conforming_service_passes() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ContractRunner::from_config(&write_contract(dir.path())).unwrap();
    let outcomes = runner.run_with(&PetService { broken: false });

    let descriptions: Vec<&str> = outcomes.iter().map(|o| o.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec![
            "Scenario: create pet (POST /pets -> 201) | EX:rex",
            "Scenario: fetch pet (GET /pets/{id} -> 200)",
        ]
    );
    assert!(outcomes.iter().all(|o| o.result.is_passed()), "{outcomes:#?}");
    assert_eq!(outcomes[0].request.as_ref().unwrap().body, json!({"name": "rex"}));

    let verdict = VerdictPolicy::default().verdict(&outcomes);
    assert_eq!(verdict.status, VerdictStatus::Pass);
    assert_eq!(verdict.exit_code, 0);
}

#[test]
fn broken_service_fails_with_breadcrumbs() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ContractRunner::from_config(&write_contract(dir.path())).unwrap();
    let outcomes = runner.run_with(&PetService { broken: true });

    assert!(outcomes.iter().all(|o| matches!(o.result, TestResult::Failed(_))));
    let details = outcomes[1].details().unwrap();
    assert!(details.starts_with(">> RESPONSE.BODY"), "{details}");
    assert!(details.contains("\"one\" (string)"), "{details}");

    let verdict = VerdictPolicy::default().verdict(&outcomes);
    let report = RunReport::new(&outcomes, &verdict);
    assert_eq!(report.counts.failed, 2);
    assert_eq!(report.operations.len(), 2);
}

#[test]
fn max_tests_caps_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_tests: Some(1),
        ..write_contract(dir.path())
    };
    let runner = ContractRunner::from_config(&config).unwrap();
    assert_eq!(runner.run_with(&PetService { broken: false }).len(), 1);
    assert_eq!(runner.plan().unwrap().tests.len(), 1);
}

#[test]
fn generative_runs_add_negative_tests() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        generative: true,
        ..write_contract(dir.path())
    };
    let runner = ContractRunner::from_config(&config).unwrap();
    let plan = runner.plan().unwrap();
    assert!(plan.tests.iter().any(|t| t.negative));
    assert!(plan.tests.iter().any(|t| !t.negative));
}

#[test]
fn stubs_are_checked_against_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    std::fs::write(
        &good,
        r#"{"http-request": {"method": "GET", "path": "/pets/5"},
            "http-response": {"status": 200, "body": {"id": 5, "name": "rex"}}}"#,
    )
    .unwrap();
    std::fs::write(
        &bad,
        r#"{"http-request": {"method": "GET", "path": "/pets/five"},
            "http-response": {"status": 200, "body": {"id": 5, "name": "rex"}}}"#,
    )
    .unwrap();

    let config = Config {
        stubs: vec![good, bad, dir.path().join("missing.json")],
        ..write_contract(dir.path())
    };
    let checks = ContractRunner::from_config(&config).unwrap().check_stubs();
    assert_eq!(checks.len(), 3);
    assert_eq!(checks[0].result.as_deref(), Ok("fetch pet"));
    assert!(!checks[1].is_valid());
    assert!(checks[2].request.is_none());
}

#[test]
fn missing_spec_is_an_io_error() {
    let config = Config {
        spec: "/nonexistent/pets.yaml".into(),
        ..Config::default()
    };
    let err = ContractRunner::from_config(&config).err().unwrap();
    assert!(err.to_string().starts_with("IO error"), "{err}");
}
