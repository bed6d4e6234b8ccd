use axum::{
    Extension,
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{identity::Identity, users::UserDirectoryError},
    domain::{
        types::GroupId,
        users::{UserGroup, UserProfile},
    },
    infra::http::{not_found_page, user_directory_error_to_http},
    presentation::{
        admin::views::{
            AdminGroupEditorTemplate, AdminGroupEditorView, AdminGroupListTemplate,
            AdminGroupListView, AdminGroupRowView, AdminUserListTemplate, AdminUserListView,
            AdminUserRowView,
        },
        views::render_template_response,
    },
};

use super::{AdminState, admin_layout, edit_user_href, forms::AdminGroupForm};

const LIST_GROUPS_PATH: &str = "/admin/users/listgroups/";

fn group_rows(groups: Vec<UserGroup>) -> Vec<AdminGroupRowView> {
    groups
        .into_iter()
        .map(|group| AdminGroupRowView {
            members_href: format!("/admin/users/bygroup/{}", group.id),
            edit_href: format!("/admin/users/editgroup/{}", group.id),
            delete_action: format!("/admin/users/deletegroup/{}", group.id),
            id: group.id.to_string(),
            member_count: group.members.len(),
            name: group.name,
            description: group.description,
        })
        .collect()
}

fn user_rows(profiles: Vec<UserProfile>) -> Vec<AdminUserRowView> {
    profiles
        .into_iter()
        .map(|profile| AdminUserRowView {
            edit_href: edit_user_href(&profile.email),
            email: profile.email,
            is_superuser: profile.is_superuser,
        })
        .collect()
}

async fn render_group_list(
    state: &AdminState,
    identity: &Identity,
    path: &str,
    heading: &str,
    source: &'static str,
) -> Response {
    let groups = match state.users.list_groups().await {
        Ok(groups) => groups,
        Err(err) => return user_directory_error_to_http(source, err).into_response(),
    };

    let content = AdminGroupListView {
        heading: heading.to_string(),
        groups: group_rows(groups),
        all_users_href: "/admin/users/bygroup/".to_string(),
        new_group_href: "/admin/users/newgroup/".to_string(),
    };

    match admin_layout(state, identity, path, content).await {
        Ok(view) => render_template_response(AdminGroupListTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

pub(super) async fn admin_filter_users(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    render_group_list(
        &state,
        &identity,
        "/admin/users/",
        "Users by group",
        "infra::http::admin::admin_filter_users",
    )
    .await
}

pub(super) async fn admin_list_groups(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    render_group_list(
        &state,
        &identity,
        LIST_GROUPS_PATH,
        "Groups",
        "infra::http::admin::admin_list_groups",
    )
    .await
}

pub(super) async fn admin_all_users(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let profiles = match state.users.list_profiles().await {
        Ok(profiles) => profiles,
        Err(err) => {
            return user_directory_error_to_http("infra::http::admin::admin_all_users", err)
                .into_response();
        }
    };

    render_user_list(&state, &identity, "All users".to_string(), profiles).await
}

pub(super) async fn admin_group_members(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::admin_group_members";

    let group = match load_group(&state, &identity, id, SOURCE).await {
        Ok(group) => group,
        Err(response) => return response,
    };
    let profiles = match state.users.profiles_in_group(&group).await {
        Ok(profiles) => profiles,
        Err(err) => return user_directory_error_to_http(SOURCE, err).into_response(),
    };

    render_user_list(&state, &identity, format!("Members of {}", group.name), profiles).await
}

async fn render_user_list(
    state: &AdminState,
    identity: &Identity,
    heading: String,
    profiles: Vec<UserProfile>,
) -> Response {
    let content = AdminUserListView {
        heading,
        users: user_rows(profiles),
    };

    match admin_layout(state, identity, "/admin/users/", content).await {
        Ok(view) => render_template_response(AdminUserListTemplate { view }, StatusCode::OK),
        Err(response) => response,
    }
}

async fn load_group(
    state: &AdminState,
    identity: &Identity,
    id: i64,
    source: &'static str,
) -> Result<UserGroup, Response> {
    match state.users.find_group(GroupId(id)).await {
        Ok(Some(group)) => Ok(group),
        Ok(None) => Err(not_found_page(
            &state.chrome,
            identity,
            LIST_GROUPS_PATH,
            Some(format!("No group exists with id {id}.")),
        )
        .await),
        Err(err) => Err(user_directory_error_to_http(source, err).into_response()),
    }
}

pub(super) async fn admin_group_new(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let content = AdminGroupEditorView {
        heading: "New group".to_string(),
        form_action: "/admin/users/newgroup/".to_string(),
        name: String::new(),
        description: String::new(),
        error_message: None,
    };
    render_group_editor(&state, &identity, content, StatusCode::OK).await
}

pub(super) async fn admin_group_create(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<AdminGroupForm>,
) -> Response {
    save_group(&state, &identity, None, form).await
}

pub(super) async fn admin_group_edit(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Response {
    let group = match load_group(&state, &identity, id, "infra::http::admin::admin_group_edit")
        .await
    {
        Ok(group) => group,
        Err(response) => return response,
    };

    let content = AdminGroupEditorView {
        heading: format!("Edit group {}", group.name),
        form_action: format!("/admin/users/editgroup/{id}"),
        name: group.name,
        description: group.description,
        error_message: None,
    };
    render_group_editor(&state, &identity, content, StatusCode::OK).await
}

pub(super) async fn admin_group_update(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Form(form): Form<AdminGroupForm>,
) -> Response {
    save_group(&state, &identity, Some(id), form).await
}

async fn save_group(
    state: &AdminState,
    identity: &Identity,
    id: Option<i64>,
    form: AdminGroupForm,
) -> Response {
    const SOURCE: &str = "infra::http::admin::save_group";

    match state
        .users
        .save_group(id.map(GroupId), &form.name, &form.description)
        .await
    {
        Ok(_) => Redirect::to(LIST_GROUPS_PATH).into_response(),
        Err(UserDirectoryError::Validation(message)) => {
            let (heading, form_action) = match id {
                Some(id) => ("Edit group".to_string(), format!("/admin/users/editgroup/{id}")),
                None => ("New group".to_string(), "/admin/users/newgroup/".to_string()),
            };
            let content = AdminGroupEditorView {
                heading,
                form_action,
                name: form.name,
                description: form.description,
                error_message: Some(message),
            };
            render_group_editor(state, identity, content, StatusCode::BAD_REQUEST).await
        }
        Err(UserDirectoryError::NotFound { entity }) => {
            not_found_page(
                &state.chrome,
                identity,
                LIST_GROUPS_PATH,
                Some(format!("{entity} not found")),
            )
            .await
        }
        Err(err) => user_directory_error_to_http(SOURCE, err).into_response(),
    }
}

async fn render_group_editor(
    state: &AdminState,
    identity: &Identity,
    content: AdminGroupEditorView,
    status: StatusCode,
) -> Response {
    match admin_layout(state, identity, LIST_GROUPS_PATH, content).await {
        Ok(view) => render_template_response(AdminGroupEditorTemplate { view }, status),
        Err(response) => response,
    }
}

pub(super) async fn admin_group_delete(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Response {
    match state.users.delete_group(GroupId(id)).await {
        Ok(()) => Redirect::to(LIST_GROUPS_PATH).into_response(),
        Err(err) => membership_error(&state, &identity, err, "infra::http::admin::admin_group_delete")
            .await,
    }
}

pub(super) async fn admin_group_add_member(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path((id, email)): Path<(i64, String)>,
) -> Response {
    match state.users.add_member(GroupId(id), &email).await {
        Ok(_) => Redirect::to(&edit_user_href(&email)).into_response(),
        Err(err) => {
            membership_error(&state, &identity, err, "infra::http::admin::admin_group_add_member")
                .await
        }
    }
}

pub(super) async fn admin_group_remove_member(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Path((id, email)): Path<(i64, String)>,
) -> Response {
    match state.users.remove_member(GroupId(id), &email).await {
        Ok(_) => Redirect::to(&edit_user_href(&email)).into_response(),
        Err(err) => {
            membership_error(
                &state,
                &identity,
                err,
                "infra::http::admin::admin_group_remove_member",
            )
            .await
        }
    }
}

async fn membership_error(
    state: &AdminState,
    identity: &Identity,
    err: UserDirectoryError,
    source: &'static str,
) -> Response {
    match err {
        UserDirectoryError::NotFound { entity } => {
            not_found_page(
                &state.chrome,
                identity,
                LIST_GROUPS_PATH,
                Some(format!("{entity} not found")),
            )
            .await
        }
        err => user_directory_error_to_http(source, err).into_response(),
    }
}
