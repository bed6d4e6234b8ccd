mod support;

use bytes::Bytes;
use sitecreator::application::tree::{
    PageTarget, SavePageCommand, TreeError, UploadCommand, UploadSource,
};
use sitecreator::domain::acl::AclDraft;
use sitecreator::domain::nodes::{AttachmentPayload, ContentNode};
use support::Harness;

fn command(name: &str, title: &str) -> SavePageCommand {
    SavePageCommand {
        name: name.to_string(),
        title: title.to_string(),
        content: "<p>body</p>".to_string(),
    }
}

#[tokio::test]
async fn initialize_site_creates_a_public_root_once() {
    let harness = Harness::new();

    let root = harness.tree.initialize_site().await.expect("init");
    assert!(root.meta.is_root());
    assert!(root.meta.acl_id.is_some());
    assert!(
        harness
            .tree
            .access()
            .can_read(&root.meta, None)
            .await
            .expect("read")
    );

    let again = harness.tree.initialize_site().await.expect("init again");
    assert_eq!(again.id(), root.id());
    assert_eq!(harness.repo.acl_count(), 1);
}

#[tokio::test]
async fn creating_a_page_requires_write_access() {
    let harness = Harness::new();
    let editor = harness.profile("e@example.com", false).await;
    let root = harness
        .root_with(AclDraft {
            user_write: vec![editor.id],
            global_read: true,
            ..AclDraft::default()
        })
        .await;

    let err = harness
        .tree
        .save_page(None, PageTarget::Create { parent: &root }, command("docs", "Docs"))
        .await
        .expect_err("anonymous cannot create");
    assert!(matches!(err, TreeError::Forbidden(_)));

    let page = harness
        .tree
        .save_page(
            Some(&editor),
            PageTarget::Create { parent: &root },
            command("docs", "Docs"),
        )
        .await
        .expect("editor creates");
    assert_eq!(page.meta.parent_id, Some(root.id()));
    assert!(page.meta.inherits_acl());
}

#[tokio::test]
async fn invalid_and_duplicate_names_are_rejected() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    harness.page(&root, "docs", "Docs").await;

    let err = harness
        .tree
        .save_page(
            Some(&admin),
            PageTarget::Create { parent: &root },
            command("has space", "Bad"),
        )
        .await
        .expect_err("invalid name");
    assert!(matches!(err, TreeError::Validation(_)));

    let err = harness
        .tree
        .save_page(
            Some(&admin),
            PageTarget::Create { parent: &root },
            command("docs", "Again"),
        )
        .await
        .expect_err("duplicate name");
    match err {
        TreeError::Validation(message) => assert!(message.contains("already exists")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn updating_keeps_the_name_check_scoped_to_siblings() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;

    let updated = harness
        .tree
        .save_page(
            Some(&admin),
            PageTarget::Update { page: &docs },
            command("docs", "Documentation"),
        )
        .await
        .expect("same name is fine");
    assert_eq!(updated.title, "Documentation");
    assert_eq!(updated.id(), docs.id());
}

#[tokio::test]
async fn deleting_a_page_removes_the_whole_subtree() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let docs = harness
        .page_with_acl(&root, "docs", AclDraft::public_read())
        .await;
    let guide = harness.page(&docs, "guide", "Guide").await;
    let blob = harness.blob(b"pdf bytes").await;
    let file = harness
        .attach(&guide, "guide.pdf", AttachmentPayload::Blob(blob))
        .await;
    let acls_before = harness.repo.acl_count();

    let removed = harness
        .tree
        .delete_page(Some(&admin), &docs)
        .await
        .expect("delete");
    assert_eq!(removed, 2);

    assert!(harness.repo.node(docs.id()).is_none());
    assert!(harness.repo.node(guide.id()).is_none());
    assert!(harness.repo.node(file.id()).is_none());
    assert_eq!(harness.repo.blob_count(), 0);
    assert_eq!(harness.repo.acl_count(), acls_before - 1);
    assert!(harness.repo.node(root.id()).is_some());
}

#[tokio::test]
async fn failed_subtree_delete_still_flushes_the_cache() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let guide = harness.page(&docs, "guide", "Guide").await;

    harness
        .resolver
        .resolve("docs/guide/")
        .await
        .expect("resolve")
        .expect("guide");
    assert!(!harness.cache.is_empty());
    let flushes_before = harness.cache.stats().flushes;

    // guide goes first, then docs fails.
    harness.repo.fail_after("delete_node", 1);
    let err = harness
        .tree
        .delete_page(Some(&admin), &docs)
        .await
        .expect_err("delete fails part way");
    assert!(matches!(err, TreeError::Repo(_)));

    assert!(harness.repo.node(guide.id()).is_none());
    assert!(harness.repo.node(docs.id()).is_some());
    assert_eq!(harness.cache.stats().flushes, flushes_before + 1);
    assert!(harness.cache.is_empty());
    assert!(
        harness
            .resolver
            .resolve("docs/guide/")
            .await
            .expect("resolve")
            .is_none()
    );
}

#[tokio::test]
async fn failed_attachment_update_discards_the_new_blob() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let old = harness.blob(b"one").await;
    let file = harness
        .attach(&root, "notes.txt", AttachmentPayload::Blob(old))
        .await;
    let blobs_before = harness.repo.blob_count();

    harness.repo.fail_after("update_attachment", 0);
    let err = harness
        .tree
        .upload_attachment(
            Some(&admin),
            &root,
            UploadCommand {
                source: UploadSource::File {
                    file_name: "notes.txt".to_string(),
                    data: Bytes::from_static(b"two"),
                },
                hidden: false,
            },
        )
        .await
        .expect_err("update fails");
    assert!(matches!(err, TreeError::Repo(_)));

    assert_eq!(harness.repo.blob_count(), blobs_before);
    let kept = harness.repo.node(file.id()).expect("attachment kept");
    let ContentNode::Attachment(kept) = kept else {
        panic!("expected an attachment");
    };
    assert_eq!(kept.blob_id(), Some(old));
}

#[tokio::test]
async fn failed_attachment_create_discards_the_new_blob() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;

    harness.repo.fail_after("create_attachment", 0);
    harness
        .tree
        .upload_attachment(
            Some(&admin),
            &root,
            UploadCommand {
                source: UploadSource::File {
                    file_name: "notes.txt".to_string(),
                    data: Bytes::from_static(b"one"),
                },
                hidden: false,
            },
        )
        .await
        .expect_err("create fails");
    assert_eq!(harness.repo.blob_count(), 0);
}

#[tokio::test]
async fn uploads_replace_same_named_attachments() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;

    let first = harness
        .tree
        .upload_attachment(
            Some(&admin),
            &root,
            UploadCommand {
                source: UploadSource::File {
                    file_name: "C:\\Users\\me\\notes.txt".to_string(),
                    data: Bytes::from_static(b"one"),
                },
                hidden: false,
            },
        )
        .await
        .expect("upload");
    assert_eq!(first.name(), "notes.txt");
    assert!(first.blob_id().is_some());

    let second = harness
        .tree
        .upload_attachment(
            Some(&admin),
            &root,
            UploadCommand {
                source: UploadSource::Link {
                    url: "https://example.com/files/notes.txt".to_string(),
                },
                hidden: true,
            },
        )
        .await
        .expect("replace with link");
    assert_eq!(second.id(), first.id());
    assert_eq!(second.link(), Some("https://example.com/files/notes.txt"));
    assert!(second.hidden);
    assert_eq!(harness.repo.blob_count(), 0);
}

#[tokio::test]
async fn invalid_links_are_rejected() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;

    let err = harness
        .tree
        .upload_attachment(
            Some(&admin),
            &root,
            UploadCommand {
                source: UploadSource::Link {
                    url: "not a url".to_string(),
                },
                hidden: false,
            },
        )
        .await
        .expect_err("invalid link");
    assert!(matches!(err, TreeError::Validation(_)));
}

#[tokio::test]
async fn breadcrumbs_list_ancestors_root_first() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    let guide = harness.page(&docs, "guide", "Guide").await;

    let crumbs = harness.tree.breadcrumbs(&guide).await.expect("crumbs");
    let paths: Vec<&str> = crumbs.iter().map(|crumb| crumb.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/docs/"]);
    assert_eq!(crumbs[1].name, "docs");
}

#[tokio::test]
async fn tree_data_and_sitemap_skip_unreadable_pages() {
    let harness = Harness::new();
    let root = harness.public_root().await;
    let docs = harness.page(&root, "docs", "Docs").await;
    harness.page(&docs, "guide", "Guide").await;
    harness
        .page_with_acl(&root, "secret", AclDraft::default())
        .await;

    let tree = harness.tree.tree_data(None).await.expect("tree data");
    assert_eq!(tree.identifier, "id");
    assert_eq!(tree.items.len(), 1);
    let root_node = &tree.items[0];
    assert_eq!(root_node.path, "");
    assert_eq!(root_node.children.len(), 1);
    assert_eq!(root_node.children[0].path, "docs/");
    assert_eq!(root_node.children[0].children[0].path, "docs/guide/");

    let sitemap = harness.tree.sitemap(None).await.expect("sitemap");
    let paths: Vec<(&str, usize)> = sitemap
        .iter()
        .map(|entry| (entry.path.as_str(), entry.depth))
        .collect();
    assert_eq!(paths, vec![("", 0), ("docs/", 1), ("docs/guide/", 2)]);
}

#[tokio::test]
async fn recently_modified_lists_newest_first() {
    let harness = Harness::new();
    let admin = harness.profile("root@example.com", true).await;
    let root = harness.public_root().await;
    let older = harness.page(&root, "older", "Older").await;
    harness.page(&root, "newer", "Newer").await;

    harness
        .tree
        .save_page(
            Some(&admin),
            PageTarget::Update { page: &older },
            command("older", "Touched"),
        )
        .await
        .expect("touch");

    let recent = harness.tree.recently_modified().await.expect("recent");
    assert_eq!(recent[0].title, "Touched");
}
