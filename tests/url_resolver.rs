mod support;

use sitecreator::domain::nodes::{AttachmentPayload, ContentNode};
use support::Harness;

#[tokio::test]
async fn every_page_path_resolves_back_to_the_page() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let guide = harness.page(&docs, "guide", "Guide").await;
    let faq = harness.page(&root, "faq", "FAQ").await;

    for page in [&root, &docs, &guide, &faq] {
        let path = harness.tree.path(&page.meta).await.expect("path");
        let resolved = harness
            .resolver
            .resolve(&format!("/{path}"))
            .await
            .expect("resolve")
            .expect("page exists");
        assert_eq!(resolved.id(), page.id(), "path {path:?}");
    }
}

#[tokio::test]
async fn cached_prefixes_do_not_change_results() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let guide = harness.page(&docs, "guide", "Guide").await;

    let first = harness.resolver.resolve("/docs/").await.expect("resolve");
    assert_eq!(first.map(|node| node.id()), Some(docs.id()));

    let second = harness
        .resolver
        .resolve("/docs/guide/")
        .await
        .expect("resolve");
    assert_eq!(second.map(|node| node.id()), Some(guide.id()));

    let again = harness
        .resolver
        .resolve("docs/guide")
        .await
        .expect("resolve");
    assert_eq!(again.map(|node| node.id()), Some(guide.id()));
}

#[tokio::test]
async fn last_segment_may_name_an_attachment() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let file = harness
        .attach(
            &docs,
            "manual.pdf",
            AttachmentPayload::Link("https://example.com/manual.pdf".into()),
        )
        .await;

    let resolved = harness
        .resolver
        .resolve("/docs/manual.pdf")
        .await
        .expect("resolve")
        .expect("attachment");
    match resolved {
        ContentNode::Attachment(attachment) => assert_eq!(attachment.id(), file.id()),
        ContentNode::Page(page) => panic!("resolved to page {}", page.id()),
    }

    let nested = harness
        .resolver
        .resolve("/docs/manual.pdf/more")
        .await
        .expect("resolve");
    assert!(nested.is_none());
}

#[tokio::test]
async fn unknown_segments_and_missing_root_resolve_to_nothing() {
    let harness = Harness::new();
    assert!(harness.resolver.resolve("/").await.expect("resolve").is_none());

    let root = harness.public_root().await;
    harness.page(&root, "docs", "Docs").await;
    assert!(
        harness
            .resolver
            .resolve("/docs/missing/")
            .await
            .expect("resolve")
            .is_none()
    );
}

#[tokio::test]
async fn deleted_pages_stop_resolving_after_the_flush() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;

    assert!(
        harness
            .resolver
            .resolve("/docs/")
            .await
            .expect("resolve")
            .is_some()
    );

    harness
        .tree
        .delete_page(Some(&admin), &docs)
        .await
        .expect("delete");

    assert!(
        harness
            .resolver
            .resolve("/docs/")
            .await
            .expect("resolve")
            .is_none()
    );
}
