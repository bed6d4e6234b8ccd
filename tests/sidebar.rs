mod support;

use sitecreator::application::sidebar::SidebarError;
use sitecreator::domain::acl::AclDraft;
use sitecreator::domain::sidebar::SidebarParseError;
use support::Harness;

fn sidebar_yaml(entries: &[(i64, &str)]) -> String {
    let mut yaml = String::from("---\nheading: Main\npages:\n");
    for (id, title) in entries {
        yaml.push_str(&format!("- id: {id}\n  title: {title}\n"));
    }
    yaml
}

#[tokio::test]
async fn rendering_skips_unreadable_and_missing_pages() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let secret = harness
        .page_with_acl(&root, "secret", AclDraft::default())
        .await;

    let yaml = sidebar_yaml(&[
        (docs.id().get(), "Docs"),
        (secret.id().get(), "Secret"),
        (9999, "Gone"),
    ]);
    harness.sidebar.save(&yaml).await.expect("save");

    let anonymous = harness.sidebar.render(None).await.expect("render");
    assert!(anonymous.contains("<h1>Main</h1>"));
    assert!(anonymous.contains("href=\"/docs/\""));
    assert!(!anonymous.contains("Secret"));
    assert!(!anonymous.contains("Gone"));

    let superuser = harness.sidebar.render(Some(&admin)).await.expect("render");
    assert!(superuser.contains("Docs"));
    assert!(superuser.contains("href=\"/secret/\""));
    assert!(!superuser.contains("Gone"));
}

#[tokio::test]
async fn viewer_without_any_access_gets_an_empty_sidebar() {
    let harness = Harness::new();
    let root = harness.root_with(AclDraft::default()).await;
    let page = harness.page(&root, "docs", "Docs").await;
    harness
        .sidebar
        .save(&sidebar_yaml(&[(page.id().get(), "Docs")]))
        .await
        .expect("save");

    assert_eq!(harness.sidebar.render(None).await.expect("render"), "");
}

#[tokio::test]
async fn invalid_yaml_leaves_the_stored_sidebar_unchanged() {
    let harness = Harness::new();
    harness
        .sidebar
        .save("---\nheading: Main\npages: []\n")
        .await
        .expect("save");

    let err = harness
        .sidebar
        .save("- just\n- a list\n")
        .await
        .expect_err("not a mapping");
    assert!(matches!(err, SidebarError::Parse(SidebarParseError::Invalid)));

    let err = harness
        .sidebar
        .save("---\nheading: Main\n")
        .await
        .expect_err("missing pages");
    assert_eq!(err.to_string(), "Invalid YAML, missing key 'pages'");

    assert_eq!(
        harness.repo.stored_sidebar().as_deref(),
        Some("---\nheading: Main\npages: []\n")
    );
}

#[tokio::test]
async fn add_page_appends_to_the_last_section() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let faq = harness.page(&root, "faq", "FAQ").await;

    harness.sidebar.add_page(&docs).await.expect("add docs");
    harness.sidebar.add_page(&faq).await.expect("add faq");

    assert!(harness.sidebar.contains_page(&docs).await.expect("contains"));
    assert!(harness.sidebar.contains_page(&faq).await.expect("contains"));
    assert!(!harness.sidebar.contains_page(&root).await.expect("contains"));

    let source = harness.sidebar.source().await.expect("source");
    assert_eq!(source.matches("---").count(), 1);
    assert!(source.contains("title: FAQ"));
}

#[tokio::test]
async fn saving_flushes_rendered_sidebars() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;

    assert_eq!(harness.sidebar.render(None).await.expect("render"), "");
    harness
        .sidebar
        .save(&sidebar_yaml(&[(docs.id().get(), "Docs")]))
        .await
        .expect("save");
    assert!(
        harness
            .sidebar
            .render(None)
            .await
            .expect("render")
            .contains("Docs")
    );
}
