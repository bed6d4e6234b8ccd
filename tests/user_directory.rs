mod support;

use sitecreator::application::users::UserDirectoryError;
use support::Harness;

#[tokio::test]
async fn duplicate_group_names_are_rejected_without_changes() {
    let harness = Harness::new();
    harness
        .users
        .save_group(None, "Editors", "People who edit")
        .await
        .expect("create");

    let err = harness
        .users
        .save_group(None, "Editors", "Again")
        .await
        .expect_err("duplicate");
    assert!(matches!(err, UserDirectoryError::Validation(_)));

    let groups = harness.users.list_groups().await.expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].description, "People who edit");
}

#[tokio::test]
async fn blank_group_names_are_required() {
    let harness = Harness::new();
    let err = harness
        .users
        .save_group(None, "   ", "")
        .await
        .expect_err("blank");
    match err {
        UserDirectoryError::Validation(message) => assert_eq!(message, "This field is required."),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn renaming_a_group_to_its_own_name_is_allowed() {
    let harness = Harness::new();
    let group = harness
        .users
        .save_group(None, "Editors", "")
        .await
        .expect("create");

    let renamed = harness
        .users
        .save_group(Some(group.id), "Editors", "Updated")
        .await
        .expect("update");
    assert_eq!(renamed.description, "Updated");
}

#[tokio::test]
async fn membership_changes_are_reflected_in_lookups() {
    let harness = Harness::new();
    let ann = harness.profile("ann@example.com", false).await;
    let editors = harness.users.save_group(None, "Editors", "").await.expect("group");
    let readers = harness.users.save_group(None, "Readers", "").await.expect("group");

    harness
        .users
        .add_member(editors.id, &ann.email)
        .await
        .expect("add");
    let memberships = harness.users.groups_for(&ann).await.expect("groups");
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].id, editors.id);

    let available = harness.users.groups_not_in(&ann).await.expect("groups");
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, readers.id);

    let group = harness
        .users
        .find_group(editors.id)
        .await
        .expect("lookup")
        .expect("group");
    let members = harness
        .users
        .profiles_in_group(&group)
        .await
        .expect("members");
    assert_eq!(members, vec![ann.clone()]);

    harness
        .users
        .remove_member(editors.id, &ann.email)
        .await
        .expect("remove");
    assert!(harness.users.groups_for(&ann).await.expect("groups").is_empty());
}

#[tokio::test]
async fn adding_an_unknown_profile_is_not_found() {
    let harness = Harness::new();
    let group = harness.users.save_group(None, "Editors", "").await.expect("group");

    let err = harness
        .users
        .add_member(group.id, "nobody@example.com")
        .await
        .expect_err("missing profile");
    assert!(matches!(
        err,
        UserDirectoryError::NotFound { entity: "profile" }
    ));
}

#[tokio::test]
async fn import_reports_rejected_lines() {
    let harness = Harness::new();
    let report = harness
        .users
        .import_csv(
            "ann@example.com,1\nnot-an-email,0\nbob@example.com\ncarl@example.com, 0\n",
            false,
        )
        .await
        .expect("import");

    assert_eq!(report.imported, 2);
    let lines: Vec<usize> = report.rejected.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![2, 3]);

    let ann = harness
        .users
        .load_profile("ann@example.com")
        .await
        .expect("lookup")
        .expect("ann");
    assert!(ann.is_superuser);
}

#[tokio::test]
async fn complete_import_replaces_every_profile() {
    let harness = Harness::new();
    harness.profile("old@example.com", false).await;

    harness
        .users
        .import_csv("new@example.com,0\n", true)
        .await
        .expect("import");

    let emails: Vec<String> = harness
        .users
        .list_profiles()
        .await
        .expect("profiles")
        .into_iter()
        .map(|profile| profile.email)
        .collect();
    assert_eq!(emails, vec!["new@example.com".to_string()]);
}

#[tokio::test]
async fn export_writes_the_roster_sorted_by_email() {
    let harness = Harness::new();
    harness.profile("zed@example.com", false).await;
    harness.profile("amy@example.com", true).await;

    let csv = harness.users.export_csv().await.expect("export");
    assert_eq!(csv, "amy@example.com,1\nzed@example.com,0\n");
}

#[tokio::test]
async fn admin_profiles_are_created_once_as_superusers() {
    let harness = Harness::new();

    let created = harness
        .users
        .ensure_admin_profile("boss@example.com")
        .await
        .expect("create");
    assert!(created.is_superuser);

    let again = harness
        .users
        .ensure_admin_profile("boss@example.com")
        .await
        .expect("existing");
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn profile_lookups_see_updates_after_the_flush() {
    let harness = Harness::new();
    assert!(
        harness
            .users
            .load_profile("ann@example.com")
            .await
            .expect("lookup")
            .is_none()
    );

    harness
        .users
        .update_profile("ann@example.com", true)
        .await
        .expect("update");

    let ann = harness
        .users
        .load_profile("ann@example.com")
        .await
        .expect("lookup")
        .expect("ann");
    assert!(ann.is_superuser);
}

#[tokio::test]
async fn failed_complete_import_still_flushes_the_cache() {
    let harness = Harness::new();
    harness.profile("old@example.com", false).await;
    harness
        .users
        .load_profile("old@example.com")
        .await
        .expect("lookup")
        .expect("cached profile");
    let flushes_before = harness.cache.stats().flushes;

    harness.repo.fail_after("upsert_profile", 1);
    let err = harness
        .users
        .import_csv("a@example.com,0\nb@example.com,0\n", true)
        .await
        .expect_err("second upsert fails");
    assert!(matches!(err, UserDirectoryError::Repo(_)));

    assert_eq!(harness.cache.stats().flushes, flushes_before + 1);
    assert_eq!(harness.repo.profile_count(), 1);
    assert!(
        harness
            .users
            .load_profile("old@example.com")
            .await
            .expect("lookup")
            .is_none()
    );
}
