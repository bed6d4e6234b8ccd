use axum::{
    Extension,
    body::Body,
    extract::{Form, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{
        access::AclOverview,
        identity::Identity,
        tree::{PageTarget, SavePageCommand, TreeError},
    },
    domain::{
        nodes::{AttachmentPayload, Page},
        types::NodeId,
        users::{UserGroup, UserProfile},
    },
    infra::http::{
        access_error_to_http, forbidden_page, not_found_page, sanitize_filename,
        sidebar_error_to_http, tree_error_to_http,
    },
    presentation::{
        admin::views::{
            AdminAclEditorView, AdminFileRowView, AdminGranteeView, AdminGroupOptionView,
            AdminNoticeView, AdminPageEditorTemplate, AdminPageEditorView,
        },
        views::{file_extension, render_template_response},
    },
};

use super::{
    AdminState, admin_layout, edit_page_href,
    forms::{AdminNoticeQuery, AdminPageForm},
};

/// Prefilled values for the editor form.
struct EditorInput {
    name: String,
    title: String,
    content: String,
    error_message: Option<String>,
}

impl EditorInput {
    fn blank() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            content: String::new(),
            error_message: None,
        }
    }

    fn from_page(page: &Page) -> Self {
        Self {
            name: page.meta.name.clone(),
            title: page.title.clone(),
            content: page.content.clone(),
            error_message: None,
        }
    }

    fn rejected(form: AdminPageForm, message: String) -> Self {
        Self {
            name: form.name,
            title: form.title,
            content: form.content,
            error_message: Some(message),
        }
    }
}

async fn load_page(
    state: &AdminState,
    identity: &Identity,
    id: i64,
    source: &'static str,
) -> Result<Page, Response> {
    match state.tree.find_page(NodeId(id)).await {
        Ok(Some(page)) => Ok(page),
        Ok(None) => Err(not_found_page(
            &state.chrome,
            identity,
            &edit_page_href(id),
            Some(format!("No page exists with id {id}.")),
        )
        .await),
        Err(err) => Err(tree_error_to_http(source, err).into_response()),
    }
}

async fn ensure_writable(
    state: &AdminState,
    identity: &Identity,
    page: &Page,
    path: &str,
    source: &'static str,
) -> Result<(), Response> {
    match state
        .tree
        .access()
        .can_write(&page.meta, identity.viewer())
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => Err(forbidden_page(&state.chrome, identity, path, None).await),
        Err(err) => Err(access_error_to_http(source, err).into_response()),
    }
}

/// Parent for a new page: the given page, or the root. A missing root is created by a
/// superuser or platform admin and the editor is sent to it.
async fn resolve_parent(
    state: &AdminState,
    identity: &Identity,
    parent_id: Option<i64>,
    source: &'static str,
) -> Result<Page, Response> {
    if let Some(id) = parent_id {
        return load_page(state, identity, id, source).await;
    }

    match state.tree.root().await {
        Ok(Some(root)) => Ok(root),
        Ok(None) if identity.is_superuser() || identity.is_admin => {
            match state.tree.initialize_site().await {
                Ok(root) => Err(Redirect::to(&edit_page_href(root.id())).into_response()),
                Err(err) => Err(tree_error_to_http(source, err).into_response()),
            }
        }
        Ok(None) => Err(forbidden_page(&state.chrome, identity, "/admin/new/", None).await),
        Err(err) => Err(tree_error_to_http(source, err).into_response()),
    }
}

pub(super) async fn admin_page_new(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    render_new_page(&state, &identity, None).await
}

pub(super) async fn admin_page_new_under(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(parent_id): Path<i64>,
) -> Response {
    render_new_page(&state, &identity, Some(parent_id)).await
}

async fn render_new_page(state: &AdminState, identity: &Identity, parent_id: Option<i64>) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_new";

    let parent = match resolve_parent(state, identity, parent_id, SOURCE).await {
        Ok(parent) => parent,
        Err(response) => return response,
    };
    let action = new_page_action(parent_id);
    if let Err(response) = ensure_writable(state, identity, &parent, &action, SOURCE).await {
        return response;
    }

    render_new_editor(state, identity, &parent, parent_id, EditorInput::blank(), StatusCode::OK)
        .await
}

pub(super) async fn admin_page_create(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<AdminPageForm>,
) -> Response {
    create_page(&state, &identity, None, form).await
}

pub(super) async fn admin_page_create_under(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(parent_id): Path<i64>,
    Form(form): Form<AdminPageForm>,
) -> Response {
    create_page(&state, &identity, Some(parent_id), form).await
}

async fn create_page(
    state: &AdminState,
    identity: &Identity,
    parent_id: Option<i64>,
    form: AdminPageForm,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_create";

    let parent = match resolve_parent(state, identity, parent_id, SOURCE).await {
        Ok(parent) => parent,
        Err(response) => return response,
    };
    let action = new_page_action(parent_id);
    if let Err(response) = ensure_writable(state, identity, &parent, &action, SOURCE).await {
        return response;
    }

    let command = SavePageCommand {
        name: form.name.clone(),
        title: form.title.clone(),
        content: form.content.clone(),
    };
    match state
        .tree
        .save_page(
            identity.viewer(),
            PageTarget::Create { parent: &parent },
            command,
        )
        .await
    {
        Ok(page) => saved_redirect(page.id(), None),
        Err(TreeError::Validation(message)) => {
            render_new_editor(
                state,
                identity,
                &parent,
                parent_id,
                EditorInput::rejected(form, message),
                StatusCode::BAD_REQUEST,
            )
            .await
        }
        Err(TreeError::Forbidden(_)) => forbidden_page(&state.chrome, identity, &action, None).await,
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn admin_page_edit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Query(query): Query<AdminNoticeQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_edit";

    let page = match load_page(&state, &identity, id, SOURCE).await {
        Ok(page) => page,
        Err(response) => return response,
    };
    let path = edit_page_href(id);
    if let Err(response) = ensure_writable(&state, &identity, &page, &path, SOURCE).await {
        return response;
    }

    let notice = AdminNoticeView::from_code(query.m.as_deref());
    let input = EditorInput::from_page(&page);
    render_existing_editor(&state, &identity, &page, input, notice, StatusCode::OK).await
}

pub(super) async fn admin_page_update(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Form(form): Form<AdminPageForm>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_update";

    let page = match load_page(&state, &identity, id, SOURCE).await {
        Ok(page) => page,
        Err(response) => return response,
    };
    let path = edit_page_href(id);
    if let Err(response) = ensure_writable(&state, &identity, &page, &path, SOURCE).await {
        return response;
    }

    let command = SavePageCommand {
        name: form.name.clone(),
        title: form.title.clone(),
        content: form.content.clone(),
    };
    match state
        .tree
        .save_page(identity.viewer(), PageTarget::Update { page: &page }, command)
        .await
    {
        Ok(saved) => saved_redirect(saved.id(), None),
        Err(TreeError::Validation(message)) => {
            let input = EditorInput::rejected(form, message);
            render_existing_editor(&state, &identity, &page, input, None, StatusCode::BAD_REQUEST)
                .await
        }
        Err(TreeError::Forbidden(_)) => forbidden_page(&state.chrome, &identity, &path, None).await,
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn admin_page_delete(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_delete";

    let page = match load_page(&state, &identity, id, SOURCE).await {
        Ok(page) => page,
        Err(response) => return response,
    };

    match state.tree.delete_page(identity.viewer(), &page).await {
        Ok(_) => Redirect::to("/admin/").into_response(),
        Err(TreeError::Forbidden(_)) => {
            let path = format!("/admin/deletepage/{id}/");
            forbidden_page(&state.chrome, &identity, &path, None).await
        }
        Err(err) => tree_error_to_http(SOURCE, err).into_response(),
    }
}

/// Raw page body as an HTML download. The path segment is `<id>.html`.
pub(super) async fn admin_page_download(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(file): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_page_download";

    let request_path = format!("/admin/download/{file}");
    let Some(id) = file
        .strip_suffix(".html")
        .and_then(|id| id.parse::<i64>().ok())
    else {
        return not_found_page(&state.chrome, &identity, &request_path, None).await;
    };

    let page = match load_page(&state, &identity, id, SOURCE).await {
        Ok(page) => page,
        Err(response) => return response,
    };

    build_download_response(&page)
}

fn build_download_response(page: &Page) -> Response {
    let mut response = Response::new(Body::from(page.content.clone()));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let disposition = format!(
        "attachment; filename={}.html",
        sanitize_filename(page.name())
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    response
}

fn new_page_action(parent_id: Option<i64>) -> String {
    match parent_id {
        Some(id) => format!("/admin/new/{id}"),
        None => "/admin/new/".to_string(),
    }
}

fn saved_redirect(id: NodeId, fragment: Option<&str>) -> Response {
    let mut target = format!("{}?m=msgChangesSaved", edit_page_href(id));
    if let Some(fragment) = fragment {
        target.push('#');
        target.push_str(fragment);
    }
    Redirect::to(&target).into_response()
}

pub(super) fn saved_acl_redirect(id: NodeId) -> Response {
    saved_redirect(id, Some("security"))
}

async fn render_new_editor(
    state: &AdminState,
    identity: &Identity,
    parent: &Page,
    parent_id: Option<i64>,
    input: EditorInput,
    status: StatusCode,
) -> Response {
    let content = AdminPageEditorView {
        heading: format!("New page under \"{}\"", parent.title),
        form_action: new_page_action(parent_id),
        page_id: None,
        parent_id: Some(parent.id().to_string()),
        name: input.name,
        title: input.title,
        content: input.content,
        is_root: false,
        error_message: input.error_message,
        notice: None,
        view_href: None,
        new_child_href: None,
        download_href: None,
        delete_action: None,
        sidebar_action: None,
        in_sidebar: false,
        files: Vec::new(),
        acl: None,
    };

    let path = new_page_action(parent_id);
    match admin_layout(state, identity, &path, content).await {
        Ok(view) => render_template_response(AdminPageEditorTemplate { view }, status),
        Err(response) => response,
    }
}

async fn render_existing_editor(
    state: &AdminState,
    identity: &Identity,
    page: &Page,
    input: EditorInput,
    notice: Option<AdminNoticeView>,
    status: StatusCode,
) -> Response {
    const SOURCE: &str = "infra::http::admin::render_existing_editor";

    let page_path = match state.tree.path(&page.meta).await {
        Ok(path) => path,
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    let files = match state.tree.attached_files(page).await {
        Ok(files) => files,
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };
    let mut files: Vec<AdminFileRowView> = files
        .into_iter()
        .map(|file| AdminFileRowView {
            id: file.id().to_string(),
            href: format!("/{page_path}{}", file.name()),
            extension: file_extension(file.name()),
            is_link: matches!(file.payload(), AttachmentPayload::Link(_)),
            hidden: file.hidden,
            delete_action: format!("/admin/deletefile/{}/{}", page.id(), file.id()),
            name: file.meta.name,
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let overview = match state.tree.access().acl_overview(page).await {
        Ok(overview) => overview,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    };

    let in_sidebar = match state.sidebar.contains_page(page).await {
        Ok(contained) => contained,
        Err(err) => return sidebar_error_to_http(SOURCE, err).into_response(),
    };

    let id = page.id();
    let content = AdminPageEditorView {
        heading: format!("Editing \"{}\"", page.title),
        form_action: edit_page_href(id),
        page_id: Some(id.to_string()),
        parent_id: page.meta.parent_id.map(|parent| parent.to_string()),
        name: input.name,
        title: input.title,
        content: input.content,
        is_root: page.meta.is_root(),
        error_message: input.error_message,
        notice,
        view_href: Some(format!("/{page_path}")),
        new_child_href: Some(format!("/admin/new/{id}")),
        download_href: identity
            .is_superuser()
            .then(|| format!("/admin/download/{id}.html")),
        delete_action: Some(format!("/admin/deletepage/{id}/")),
        sidebar_action: identity
            .is_superuser()
            .then(|| format!("/admin/edit/add_to_sidebar/{id}")),
        in_sidebar,
        files,
        acl: Some(acl_editor_view(id, overview)),
    };

    let path = edit_page_href(id);
    match admin_layout(state, identity, &path, content).await {
        Ok(view) => render_template_response(AdminPageEditorTemplate { view }, status),
        Err(response) => response,
    }
}

fn acl_editor_view(page: NodeId, overview: AclOverview) -> AdminAclEditorView {
    fn grantees_from_groups(groups: Vec<UserGroup>) -> Vec<AdminGranteeView> {
        groups
            .into_iter()
            .map(|group| AdminGranteeView {
                id: group.id.to_string(),
                label: group.name,
            })
            .collect()
    }

    fn grantees_from_profiles(profiles: Vec<UserProfile>) -> Vec<AdminGranteeView> {
        profiles
            .into_iter()
            .map(|profile| AdminGranteeView {
                id: profile.id.to_string(),
                label: profile.email,
            })
            .collect()
    }

    fn options(groups: Vec<UserGroup>) -> Vec<AdminGroupOptionView> {
        groups
            .into_iter()
            .map(|group| AdminGroupOptionView {
                id: group.id.to_string(),
                name: group.name,
            })
            .collect()
    }

    AdminAclEditorView {
        page_id: page.to_string(),
        inherits: overview.inherits,
        global_write: overview.acl.global_write,
        global_read: overview.acl.global_read,
        write_groups: grantees_from_groups(overview.groups_with_write),
        read_groups: grantees_from_groups(overview.groups_with_read),
        write_users: grantees_from_profiles(overview.profiles_with_write),
        read_users: grantees_from_profiles(overview.profiles_with_read),
        groups_without_write: options(overview.groups_without_write),
        groups_without_read: options(overview.groups_without_read),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nodes::NodeMeta;
    use time::OffsetDateTime;

    #[test]
    fn download_is_an_html_attachment() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let page = Page {
            meta: NodeMeta {
                id: NodeId(7),
                name: "about".into(),
                created_at: now,
                modified_at: now,
                parent_id: Some(NodeId(1)),
                acl_id: None,
            },
            title: "About".into(),
            content: "<p>Hi</p>".into(),
        };

        let response = build_download_response(&page);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=about.html");
    }

    #[test]
    fn new_page_actions_keep_the_parent() {
        assert_eq!(new_page_action(Some(3)), "/admin/new/3");
        assert_eq!(new_page_action(None), "/admin/new/");
    }
}
