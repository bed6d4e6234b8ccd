use axum::{
    Extension,
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{identity::Identity, sidebar::SidebarError},
    domain::types::NodeId,
    infra::http::{not_found_page, sidebar_error_to_http, tree_error_to_http},
    presentation::{
        admin::views::{AdminSidebarEditorTemplate, AdminSidebarEditorView},
        views::render_template_response,
    },
};

use super::{AdminState, admin_layout, forms::AdminSidebarForm};

const SIDEBAR_PATH: &str = "/admin/edit/sidebar/";

pub(super) async fn admin_sidebar_edit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let yaml = match state.sidebar.source().await {
        Ok(yaml) => yaml,
        Err(err) => {
            return sidebar_error_to_http("infra::http::admin::admin_sidebar_edit", err)
                .into_response();
        }
    };

    render_editor(&state, &identity, yaml, None, StatusCode::OK).await
}

pub(super) async fn admin_sidebar_save(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<AdminSidebarForm>,
) -> Response {
    match state.sidebar.save(&form.yaml).await {
        Ok(()) => Redirect::to("/admin/").into_response(),
        Err(SidebarError::Parse(err)) => {
            render_editor(
                &state,
                &identity,
                form.yaml,
                Some(err.to_string()),
                StatusCode::BAD_REQUEST,
            )
            .await
        }
        Err(err) => {
            sidebar_error_to_http("infra::http::admin::admin_sidebar_save", err).into_response()
        }
    }
}

pub(super) async fn admin_add_to_sidebar(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_add_to_sidebar";

    let page = match state.tree.find_page(NodeId(id)).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            let path = format!("/admin/edit/add_to_sidebar/{id}");
            return not_found_page(&state.chrome, &identity, &path, None).await;
        }
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    match state.sidebar.add_page(&page).await {
        Ok(()) => Redirect::to(SIDEBAR_PATH).into_response(),
        Err(err) => sidebar_error_to_http(SOURCE, err).into_response(),
    }
}

async fn render_editor(
    state: &AdminState,
    identity: &Identity,
    yaml: String,
    error_message: Option<String>,
    status: StatusCode,
) -> Response {
    let content = AdminSidebarEditorView {
        yaml,
        error_message,
    };

    match admin_layout(state, identity, SIDEBAR_PATH, content).await {
        Ok(view) => render_template_response(AdminSidebarEditorTemplate { view }, status),
        Err(response) => response,
    }
}
