use std::collections::HashMap;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use cardsmith_core::{
    CancelToken, CardError, Expression, LimitKind, ScopeStack, ScriptLimits, ScriptRunner,
};

fn runner_with_main(main: &str) -> ScriptRunner {
    let mut runner = ScriptRunner::new(ScriptLimits::default());
    runner.set_main(main);
    runner
}

#[tokio::test]
async fn execute_forwards_arguments_and_returns_json() {
    let runner = runner_with_main(
        "return function(name, cost)\n    return { name = name, cost = cost + 1 }\nend",
    );
    let result = runner
        .execute(vec![json!("Dragon"), json!(4)], CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result, json!({ "name": "Dragon", "cost": 5 }));
}

#[tokio::test]
async fn concurrent_executions_share_nothing() {
    let runner = runner_with_main(
        "return function(n) tally = (tally or 0) + n; return tally end",
    );

    let mut handles = Vec::new();
    for n in 1..=4 {
        let runner = runner.clone();
        handles.push(tokio::spawn(async move {
            runner.execute(vec![json!(n)], CancelToken::new()).await
        }));
    }
    for (index, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        // Each run starts from a fresh global table.
        assert_eq!(result, json!(index + 1));
    }
}

#[tokio::test]
async fn cancelling_mid_run_aborts_the_script() {
    let mut runner = ScriptRunner::new(ScriptLimits {
        timeout: Duration::from_secs(30),
        ..ScriptLimits::default()
    });
    runner.set_main("return function() while true do end end");

    let cancel = CancelToken::new();
    let handle = {
        let runner = runner.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.execute(vec![], cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(CardError::ScriptCancelled)));
}

#[tokio::test]
async fn runaway_scripts_hit_the_timeout() {
    let mut runner = ScriptRunner::new(ScriptLimits {
        timeout: Duration::from_millis(100),
        ..ScriptLimits::default()
    });
    runner.set_main("return function() while true do end end");

    let result = runner.execute(vec![], CancelToken::new()).await;
    assert!(matches!(
        result,
        Err(CardError::ScriptResourceExceeded {
            limit: LimitKind::Timeout
        })
    ));
}

#[tokio::test]
async fn modules_are_shared_across_the_require_graph() {
    let mut runner = runner_with_main(
        "local stats = require(\"stats\")\n\
         local fmt = require(\"fmt\")\n\
         return function(hp) return fmt.label(stats.scale(hp)) end",
    );
    runner
        .add_module("stats", "return { scale = function(n) return n * 10 end }")
        .unwrap();
    runner
        .add_module(
            "fmt",
            "local stats = require(\"stats\")\n\
             return { label = function(n) return \"HP \" .. n end }",
        )
        .unwrap();

    let result = runner
        .execute(vec![json!(3)], CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result, json!("HP 30"));
}

#[test]
fn expressions_evaluate_against_scope_variables() {
    let expr = Expression::prepare("hp > 5 and title or \"weak\"").unwrap();

    let mut scopes = ScopeStack::new();
    scopes.push_new().set("hp", json!(9));
    scopes.push_new().set("title", json!("champion"));

    let result = expr
        .evaluate_with_scope(&scopes, &ScriptLimits::default())
        .unwrap();
    assert_eq!(result, json!("champion"));
}

#[test]
fn expressions_obey_the_same_limits_as_scripts() {
    // An expression can still loop through a function call; the interrupt
    // applies all the same.
    let expr = Expression::prepare("(function() while true do end end)()").unwrap();
    let limits = ScriptLimits {
        timeout: Duration::from_millis(100),
        ..ScriptLimits::default()
    };
    assert!(matches!(
        expr.evaluate(&HashMap::new(), &limits),
        Err(CardError::ScriptResourceExceeded {
            limit: LimitKind::Timeout
        })
    ));
}
