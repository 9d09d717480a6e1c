use pr_cannon_core::publish::{
    commit_message, generated_branch_name, parse_repo, pull_request_body, PublishError,
};

#[test]
fn commit_message_is_singular_for_one_file() {
    assert_eq!(
        commit_message(&["notes.txt"]),
        "Add notes.txt via pr-cannon"
    );
}

#[test]
fn commit_message_counts_multiple_files() {
    assert_eq!(
        commit_message(&["guides/a.md", "guides/b.md"]),
        "Add 2 files via pr-cannon"
    );
}

#[test]
fn body_for_one_file_names_it_inline() {
    let body = pull_request_body(&["notes.txt"]);
    assert!(body.contains("`notes.txt`"), "body was: {body}");
    assert!(!body.contains("files:"), "singular body must not enumerate");
}

#[test]
fn body_for_two_files_enumerates_both() {
    let body = pull_request_body(&["a.md", "b.md"]);
    assert!(body.contains("Added 2 files:"));
    assert!(body.contains("- `a.md`"));
    assert!(body.contains("- `b.md`"));
    assert!(!body.contains("more files"));
}

#[test]
fn body_for_ten_files_is_not_truncated() {
    let names: Vec<String> = (0..10).map(|i| format!("f{i}.txt")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let body = pull_request_body(&refs);
    let listed = body.lines().filter(|l| l.starts_with("- `")).count();
    assert_eq!(listed, 10);
    assert!(!body.contains("more files"));
}

#[test]
fn body_for_eleven_files_lists_ten_plus_summary() {
    let names: Vec<String> = (0..11).map(|i| format!("f{i}.txt")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let body = pull_request_body(&refs);
    let listed = body.lines().filter(|l| l.starts_with("- `")).count();
    assert_eq!(listed, 10, "only the first ten files are enumerated");
    assert!(body.contains("... and 1 more files"), "body was: {body}");
}

#[test]
fn branch_names_differ_across_milliseconds() {
    let a = generated_branch_name("notes.txt", 1_700_000_000_000);
    let b = generated_branch_name("notes.txt", 1_700_000_000_001);
    assert_ne!(a, b);
}

#[test]
fn branch_name_carries_namespace_label_and_timestamp() {
    assert_eq!(
        generated_branch_name("notes.txt", 1_700_000_000_000),
        "pr-cannon/add-notes.txt-1700000000000"
    );
}

#[test]
fn branch_label_is_sanitized_for_ref_safety() {
    let name = generated_branch_name("my report!.txt", 5);
    assert_eq!(name, "pr-cannon/add-my-report-.txt-5");
}

#[test]
fn parse_repo_accepts_owner_slash_name() {
    let repo = parse_repo("acme/demo").expect("well-formed id should parse");
    assert_eq!(repo.owner, "acme");
    assert_eq!(repo.name, "demo");
    assert_eq!(repo.full_name(), "acme/demo");
}

#[test]
fn parse_repo_rejects_malformed_identifiers() {
    for bad in ["acme", "acme/demo/extra", "/demo", "acme/", ""] {
        match parse_repo(bad) {
            Err(PublishError::InvalidRepoFormat(id)) => assert_eq!(id, bad),
            other => panic!("expected InvalidRepoFormat for {bad:?}, got {other:?}"),
        }
    }
}
