// tests/resolve.rs

//! End-to-end resolution scenarios through the public API.

mod common;

use common::*;
use depsolver::packages::{load_json_records, RelationRecord};
use depsolver::resolver::translate_item_to_install;
use depsolver::version::VerDirection;
use depsolver::{Error, InstallItem, ProvidesPriority, Solver, UserTask};
use std::collections::HashSet;

#[test]
fn test_install_single_package() {
    let scope = build_scope(&[pkg("foo", "1.0", &[])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("foo"))).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["foo-1.0-1"]);
    assert!(tx.to_remove.is_empty());
}

#[test]
fn test_install_newer_version_is_upgrade() {
    let scope = build_scope(&[pkg("foo", "2.0", &[])], &[pkg("foo", "1.0", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);
    let task = UserTask::new().install(InstallItem::new("foo"));

    let tx = solver.solve(&task).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["foo-2.0-1"]);
    assert_eq!(describe_all(&scope, &tx.to_remove), vec!["foo-1.0-1"]);

    let resolution = solver.resolve(&task).unwrap();
    assert!(resolution.install.is_empty());
    assert!(resolution.remove.is_empty());
    assert_eq!(resolution.upgrade.len(), 1);
    assert_eq!(resolution.upgrade[0].to_string(), "foo-1.0-1 -> 2.0-1");
}

#[test]
fn test_install_pulls_in_requirement() {
    let scope = build_scope(&[pkg("a", "1.0", &["b"]), pkg("b", "1.0", &[])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("a"))).unwrap();
    let installed: HashSet<String> = describe_all(&scope, &tx.to_install).into_iter().collect();
    assert!(installed.contains("a-1.0-1"));
    assert!(installed.contains("b-1.0-1"));
    assert!(tx.to_remove.is_empty());
}

#[test]
fn test_unmet_requirement_is_not_unsolvable() {
    let scope = build_scope(&[pkg("a", "1.0", &["x"])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let err = solver.solve(&UserTask::new().install(InstallItem::new("a"))).unwrap_err();
    match err {
        Error::UnmetRequirement { requirement, .. } => assert_eq!(requirement, "x"),
        other => panic!("expected an unmet requirement, got {}", other),
    }
}

#[test]
fn test_install_and_remove_same_name_is_contradiction() {
    let scope = build_scope(&[pkg("foo", "1.0", &[])], &[pkg("foo", "1.0", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let task = UserTask::new().install(InstallItem::new("foo")).remove("foo");
    assert!(matches!(solver.solve(&task).unwrap_err(), Error::Contradiction(_)));
    assert!(matches!(solver.dump_clauses(&task).unwrap_err(), Error::Contradiction(_)));
}

#[test]
fn test_no_contradictory_output() {
    let mut new_tool = pkg("newtool", "2", &["libfoo"]);
    new_tool.obsoletes.push(RelationRecord::new("oldtool"));
    let repo = [
        new_tool,
        pkg("libfoo", "1", &[]),
        pkg("libfoo", "2", &[]),
        pkg("app", "3", &["libfoo"]),
    ];
    let installed = [
        pkg("oldtool", "1", &[]),
        pkg("app", "1", &["libfoo"]),
        pkg("libfoo", "1", &[]),
    ];
    let scope = build_scope(&repo, &installed);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tasks = [
        UserTask::new().install(InstallItem::new("newtool")),
        UserTask::new().install(InstallItem::new("app")),
        UserTask::new().remove("oldtool"),
        UserTask::new()
            .install(InstallItem::new("newtool"))
            .install(InstallItem::new("app")),
    ];
    for task in &tasks {
        let tx = solver.solve(task).unwrap();
        let install: HashSet<_> = tx.to_install.iter().collect();
        assert!(tx.to_remove.iter().all(|v| !install.contains(v)));
        assert!(tx.to_install.iter().all(|&v| !scope.is_installed(v)));
        assert!(tx.to_remove.iter().all(|&v| scope.is_installed(v)));
    }
}

#[test]
fn test_obsoleted_package_is_removed() {
    let mut new_tool = pkg("newtool", "2", &[]);
    new_tool.obsoletes.push(RelationRecord::new("oldtool"));
    let scope = build_scope(&[new_tool], &[pkg("oldtool", "1", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let resolution = solver
        .resolve(&UserTask::new().install(InstallItem::new("newtool")))
        .unwrap();
    assert_eq!(resolution.install.len(), 1);
    assert_eq!(resolution.install[0].name, "newtool");
    assert_eq!(resolution.remove.len(), 1);
    assert_eq!(resolution.remove[0].name, "oldtool");
}

#[test]
fn test_removal_of_only_provider_removes_requirer() {
    let scope = build_scope(&[], &[pkg("app", "1", &["lib"]), pkg("lib", "1", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().remove("lib")).unwrap();
    let removed: HashSet<String> = describe_all(&scope, &tx.to_remove).into_iter().collect();
    assert!(removed.contains("lib-1-1"));
    assert!(removed.contains("app-1-1"));
    assert!(tx.to_install.is_empty());
}

#[test]
fn test_already_installed_request_changes_nothing() {
    let scope = build_scope(&[pkg("foo", "1.0", &[])], &[pkg("foo", "1.0", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let resolution = solver.resolve(&UserTask::new().install(InstallItem::new("foo"))).unwrap();
    assert!(resolution.is_empty());
    assert_eq!(resolution.to_string(), "Nothing to do\n");
}

#[test]
fn test_selection_is_deterministic() {
    let scope = build_scope(
        &[
            provider("openjdk17", "17.0.9", "java", "17"),
            provider("openjdk21", "21.0.1", "java", "21"),
            provider("temurin21", "21.0.1", "java", "21"),
        ],
        &[],
    );
    let priority = ProvidesPriority::new();
    let item = InstallItem::new("java");

    let first = translate_item_to_install(&scope, &priority, &item).unwrap();
    for _ in 0..5 {
        assert_eq!(translate_item_to_install(&scope, &priority, &item).unwrap(), first);
    }
    assert_eq!(scope.snapshot().describe(first), "openjdk21-21.0.1-1");
}

#[test]
fn test_provides_priority_steers_selection() {
    let scope = build_scope(
        &[
            provider("openjdk17", "17.0.9", "java", "17"),
            provider("openjdk21", "21.0.1", "java", "21"),
        ],
        &[],
    );
    let mut priority = ProvidesPriority::new();
    priority.set("java", vec!["openjdk17".to_string()]);
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("java"))).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["openjdk17-17.0.9-1"]);
}

#[test]
fn test_versioned_install_request() {
    let scope = build_scope(
        &[pkg("bash", "5.1", &[]), pkg("bash", "5.2", &[]), pkg("bash", "6.0", &[])],
        &[],
    );
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let item = InstallItem::parse("bash < 6").unwrap();
    let tx = solver.solve(&UserTask::new().install(item)).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["bash-5.2-1"]);
}

#[test]
fn test_unknown_package() {
    let scope = build_scope(&[pkg("foo", "1.0", &[])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let err = solver.solve(&UserTask::new().install(InstallItem::new("bar"))).unwrap_err();
    assert!(matches!(err, Error::UnknownPackage(_)));
}

#[test]
fn test_conflicting_requests_are_unsolvable() {
    let mut left = pkg("left", "1", &[]);
    left.conflicts.push(RelationRecord::new("right"));
    let scope = build_scope(&[left, pkg("right", "1", &[])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let task = UserTask::new()
        .install(InstallItem::new("left"))
        .install(InstallItem::new("right"));
    match solver.solve(&task).unwrap_err() {
        Error::Unsolvable { packages, .. } => {
            assert!(packages.contains(&"left-1-1".to_string()));
            assert!(packages.contains(&"right-1-1".to_string()));
        }
        other => panic!("expected unsolvable, got {}", other),
    }
}

#[test]
fn test_versioned_conflict_spares_newer_version() {
    let mut tool = pkg("tool", "1", &[]);
    tool.conflicts
        .push(RelationRecord::versioned("lib", VerDirection::Less, "2"));
    let scope = build_scope(&[tool, pkg("lib", "2", &[])], &[pkg("lib", "1", &[])]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("tool"))).unwrap();
    let removed = describe_all(&scope, &tx.to_remove);
    assert_eq!(removed, vec!["lib-1-1"]);
    assert!(describe_all(&scope, &tx.to_install).contains(&"tool-1-1".to_string()));
}

#[test]
fn test_installed_set_from_json() {
    let dir = temp_dir();
    let installed = [pkg("foo", "1.0", &[])];
    let path = write_json(dir.path(), "installed.json", &installed);

    let loaded = load_json_records(&path).unwrap();
    assert_eq!(loaded, installed.to_vec());

    let scope = build_scope(&[pkg("foo", "2.0", &[])], &loaded);
    let priority = ProvidesPriority::new();
    let resolution = Solver::new(&scope, &priority)
        .resolve(&UserTask::new().install(InstallItem::new("foo")))
        .unwrap();
    assert_eq!(resolution.upgrade.len(), 1);

    let json = serde_json::to_value(&resolution).unwrap();
    assert_eq!(json["upgrade"][0]["to"]["version"], "2.0");
    assert_eq!(json["upgrade"][0]["from"]["version"], "1.0");
}

#[test]
fn test_dump_clauses_lists_forced_decisions() {
    let scope = build_scope(&[pkg("foo", "2.0", &[])], &[pkg("foo", "1.0", &[])]);
    let priority = ProvidesPriority::new();
    let dump = Solver::new(&scope, &priority)
        .dump_clauses(&UserTask::new().install(InstallItem::new("foo")))
        .unwrap();
    assert_eq!(dump, "(foo-2.0-1) &&\n(!foo-1.0-1)");
}

#[test]
fn test_broken_older_version_does_not_block_install() {
    let scope = build_scope(&[pkg("foo", "1.0", &["missing"]), pkg("foo", "2.0", &[])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("foo"))).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["foo-2.0-1"]);
    assert!(tx.to_remove.is_empty());
}

#[test]
fn test_broken_conflict_target_does_not_block_install() {
    let mut a = pkg("a", "1", &[]);
    a.conflicts.push(RelationRecord::new("b"));
    let scope = build_scope(&[a, pkg("b", "1", &["missing"])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("a"))).unwrap();
    assert_eq!(describe_all(&scope, &tx.to_install), vec!["a-1-1"]);
    assert!(tx.to_remove.is_empty());
}

#[test]
fn test_broken_provider_is_passed_over() {
    let mut p1 = pkg("p1", "1.0", &["gone"]);
    p1.provides.push(RelationRecord::new("virt"));
    let mut p2 = pkg("p2", "1.0", &[]);
    p2.provides.push(RelationRecord::new("virt"));
    let scope = build_scope(&[pkg("app", "1.0", &["virt"]), p1, p2], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    let tx = solver.solve(&UserTask::new().install(InstallItem::new("app"))).unwrap();
    let installed: HashSet<String> = describe_all(&scope, &tx.to_install).into_iter().collect();
    assert!(installed.contains("app-1.0-1"));
    assert!(installed.contains("p2-1.0-1"));
    assert!(!installed.contains("p1-1.0-1"));
}

#[test]
fn test_unmet_requirement_of_only_alternative_is_reported() {
    let scope = build_scope(&[pkg("a", "1", &["b"]), pkg("b", "1", &["missing"])], &[]);
    let priority = ProvidesPriority::new();
    let solver = Solver::new(&scope, &priority);

    match solver.solve(&UserTask::new().install(InstallItem::new("a"))).unwrap_err() {
        Error::UnmetRequirement { package, requirement } => {
            assert_eq!(package, "b-1-1");
            assert_eq!(requirement, "missing");
        }
        other => panic!("expected an unmet requirement, got {}", other),
    }
}
