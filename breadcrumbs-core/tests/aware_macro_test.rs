//! `#[aware]` on ordinary functions and methods.

mod common;

use anyhow::{bail, Result};
use breadcrumbs_core::prelude::*;
use breadcrumbs_core::{update_extra, update_info, Trail, TrailWriter};
use common::{fields, init_test_logging, titles};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::json;

#[aware(trail_param = "c")]
fn sum(c: &Crumb, a: i64, #[crumb(default = 1)] b: Option<i64>) -> i64 {
    update_extra!(yes = true);
    a + b
}

#[aware(trail_param = "c", redact_params = ("a",))]
fn sum_redacted(c: &Crumb, a: i64, b: i64) -> i64 {
    update_extra!(yes = true);
    a + b
}

#[aware(trail_param = "c", redact_params = "a")]
fn sum_redacted_str(c: &Crumb, a: i64, b: i64) -> i64 {
    a + b
}

#[aware]
fn decorated_sum(a: i64, b: i64) -> i64 {
    a + b
}

#[test]
fn test_func() {
    init_test_logging();
    let c = Crumb::new("start");

    assert_eq!(sum(&c, 1, Some(3)), 4);

    let t = c.trail();
    assert_eq!(t.len(), 1);
    assert_eq!(t[0].title(), "aware_macro_test::sum");
    assert_eq!(t[0].info(), fields(&[("a", json!(1)), ("b", json!(3))]));
    assert_eq!(t[0].extra(), fields(&[("yes", json!(true))]));
}

#[test]
fn test_func_defaults() {
    let c = Crumb::new("start");

    assert_eq!(sum(&c, 1, None), 2);

    let t = c.trail();
    assert_eq!(t.len(), 1);
    // The effective default is recorded, not the absent value
    assert_eq!(t[0].info(), fields(&[("a", json!(1)), ("b", json!(1))]));
}

#[test]
fn test_func_redact() {
    let c = Crumb::new("start");

    assert_eq!(sum_redacted(&c, 1, 3), 4);
    assert_eq!(sum_redacted_str(&c, 1, 3), 4);

    for crumb in c.trail() {
        let info = crumb.info();
        assert!(info["a"].is_sentinel(&REDACTED));
        assert_eq!(info["b"], json!(3));
        assert_eq!(info.len(), 2);
    }
    assert_eq!(c.trail()[0].extra(), fields(&[("yes", json!(true))]));
}

#[test]
fn test_ambient_attach() {
    let r = Crumb::new("R");

    let out = with_context(&r, || decorated_sum(1, 3));

    assert_eq!(out, 4);
    assert_eq!(titles(&r), vec!["aware_macro_test::decorated_sum"]);
    assert_eq!(r.trail()[0].info(), fields(&[("a", json!(1)), ("b", json!(3))]));
    assert!(r.trail()[0].trail().is_empty());
}

#[derive(Debug, Clone, Serialize)]
struct Source {
    table: String,
    limit: usize,
}

#[aware(redact_params = "password")]
fn connect(source: &Source, password: String, #[crumb(skip)] pool: &mut Vec<String>) -> usize {
    pool.push(format!("{}@{}", source.table, password.len()));
    pool.len()
}

#[test]
fn test_serializable_params_and_skip() {
    let run = Crumb::new("run");
    let mut pool = Vec::new();
    let source = Source {
        table: "orders".into(),
        limit: 10,
    };

    let n = with_context(&run, || connect(&source, "hunter2".into(), &mut pool));

    assert_eq!(n, 1);
    let info = run.trail()[0].info();
    assert_eq!(info["source"], json!({"table": "orders", "limit": 10}));
    assert_eq!(info["password"], *REDACTED);
    assert!(!info.contains_key("pool"));
}

#[aware(title = "pipeline::load")]
fn load(rows: Vec<i64>) -> Vec<i64> {
    update_info!(count = rows.len());
    rows.into_iter().filter(|r| *r > 0).collect()
}

#[aware]
fn transform(rows: Vec<i64>, #[crumb(default = 2)] mut factor: Option<i64>) -> Vec<i64> {
    factor += 1;
    let out: Vec<i64> = rows.iter().map(|r| r * factor).collect();
    put(Crumb::new("checkpoint"));
    out
}

#[aware]
fn pipeline(rows: Vec<i64>) -> Vec<i64> {
    let loaded = load(rows);
    transform(loaded, None)
}

#[test]
fn test_nested_calls_build_a_tree() {
    let run = Crumb::new("run");

    let out = with_context(&run, || pipeline(vec![-1, 1, 2]));

    assert_eq!(out, vec![3, 6]);
    assert_eq!(titles(&run), vec!["aware_macro_test::pipeline"]);
    let stage = &run.trail()[0];
    assert_eq!(
        titles(stage),
        vec!["pipeline::load", "aware_macro_test::transform"]
    );
    assert_eq!(stage.trail()[0].info()["count"], json!(3));
    assert_eq!(stage.trail()[1].info()["factor"], json!(2));
    assert_eq!(titles(&stage.trail()[1]), vec!["checkpoint"]);

    let text = TrailWriter::format_human_readable(&run);
    assert!(text.contains("└── pipeline::load"));
}

#[aware(trail_param = "c")]
fn checked(c: &Crumb, value: i64) -> Result<i64> {
    if value < 0 {
        bail!("negative input");
    }
    Ok(value)
}

#[aware(trail_param = "c", attach = "always")]
fn checked_always(c: &Crumb, value: i64) -> Result<i64> {
    if value < 0 {
        bail!("negative input");
    }
    Ok(value)
}

#[test]
fn test_failed_calls_follow_attach_policy() {
    let c = Crumb::new("start");

    assert_eq!(checked(&c, 1).unwrap(), 1);
    assert!(checked(&c, -1).is_err());
    assert!(checked_always(&c, -1).is_err());

    assert_eq!(
        titles(&c),
        vec![
            "aware_macro_test::checked",
            "aware_macro_test::checked_always"
        ]
    );
    let failed = &c.trail()[1];
    assert_eq!(failed.info(), fields(&[("value", json!(-1))]));
    assert!(failed
        .extra_field("error")
        .map(|e| e.to_string().contains("negative input"))
        .unwrap_or(false));
}

#[test]
fn test_panic_never_attaches() {
    #[aware(trail_param = "c")]
    fn explode(c: &Crumb, code: i64) -> i64 {
        if code > 0 {
            panic!("boom {}", code);
        }
        code
    }

    let c = Crumb::new("start");
    let outer = Crumb::new("outer");
    let _guard = enter_context(&outer);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| explode(&c, 7)));

    assert!(result.is_err());
    assert!(c.trail().is_empty());
    assert!(get_active().ptr_eq(&outer));
}

/// A host type that embeds a trail and records its own method calls.
#[derive(Default)]
struct Job {
    name: String,
    trail: Trail,
}

impl TrailCapable for Job {
    fn trail_slot(&self) -> &Trail {
        &self.trail
    }
}

impl Job {
    #[aware(trail_param = "self")]
    fn step(&self, stage: &str, #[crumb(default = 1)] attempts: Option<u32>) -> String {
        update_extra!(attempts = attempts);
        format!("{}:{}", self.name, stage)
    }

    #[aware(trail_param = "other")]
    fn handoff(&self, other: &Job) -> usize {
        self.name.len()
    }
}

#[test]
fn test_self_as_trail_target() {
    let job = Job {
        name: "etl".into(),
        ..Default::default()
    };
    let next = Job::default();

    assert_eq!(job.step("extract", None), "etl:extract");
    assert_eq!(job.step("load", Some(3)), "etl:load");
    assert_eq!(job.handoff(&next), 3);

    let t = job.trail();
    assert_eq!(t.len(), 2);
    assert!(t[0].title().ends_with("Job::step"));
    // The receiver is never recorded
    assert_eq!(
        t[1].info(),
        fields(&[("stage", json!("load")), ("attempts", json!(3))])
    );
    assert_eq!(t[1].extra(), fields(&[("attempts", json!(3))]));

    assert!(next.trail()[0].title().ends_with("Job::handoff"));
    assert!(next.trail()[0].info().is_empty());

    let copy = Job::default();
    copy.copy_trail_from(&job);
    job.step("verify", None);
    assert_eq!(copy.trail().len(), 2);
    assert_eq!(job.trail().len(), 3);
}

#[test]
fn test_unserializable_value_recorded_as_placeholder() {
    #[aware]
    fn keyed(map: std::collections::HashMap<(i32, i32), i32>) -> usize {
        map.len()
    }

    let run = Crumb::new("run");
    let map = [((1, 2), 3)].into_iter().collect();

    let n = with_context(&run, || keyed(map));

    assert_eq!(n, 1);
    let recorded = run.trail()[0].info()["map"].to_string();
    assert!(recorded.contains("unrecorded"));
}
