use axum::{
    Extension,
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    application::{
        access::{AclGrant, EditAclCommand},
        error::HttpError,
        identity::Identity,
    },
    domain::{acl::AclList, types::GroupId, types::NodeId},
    infra::http::{access_error_to_http, forbidden_page, not_found_page, tree_error_to_http},
};

use super::{AdminState, forms::blank_to_none, pages::saved_acl_redirect};

const SOURCE: &str = "infra::http::admin::admin_acl_update";

/// Applies the ACL editor form. Grants come from `<list>` fields, revocations from
/// `<list>_remove_<id>` keys.
pub(super) async fn admin_acl_update(
    State(state): State<AdminState>,
    Extension(identity): Extension<Identity>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let Some(page_id) = field(&fields, "page_id").and_then(|id| id.trim().parse::<i64>().ok())
    else {
        return not_found_page(&state.chrome, &identity, "/admin/editacl", None).await;
    };

    let page = match state.tree.find_page(NodeId(page_id)).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            return not_found_page(
                &state.chrome,
                &identity,
                "/admin/editacl",
                Some(format!("No page exists with id {page_id}.")),
            )
            .await;
        }
        Err(err) => return tree_error_to_http(SOURCE, err).into_response(),
    };

    match state
        .tree
        .access()
        .can_write(&page.meta, identity.viewer())
        .await
    {
        Ok(true) => {}
        Ok(false) => return forbidden_page(&state.chrome, &identity, "/admin/editacl", None).await,
        Err(err) => return access_error_to_http(SOURCE, err).into_response(),
    }

    let command = match parse_acl_form(&fields) {
        Ok(command) => command,
        Err(err) => return err.into_response(),
    };

    match state.tree.access().edit_acl(&page, command).await {
        Ok(_) => saved_acl_redirect(page.id()),
        Err(err) => access_error_to_http(SOURCE, err).into_response(),
    }
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn parse_acl_form(fields: &[(String, String)]) -> Result<EditAclCommand, HttpError> {
    let mut command = EditAclCommand {
        global_write: field(fields, "global_write").is_some(),
        global_read: field(fields, "global_read").is_some(),
        ..EditAclCommand::default()
    };

    for list in AclList::ALL {
        if let Some(value) = field(fields, list.field_name()).and_then(blank_to_none) {
            let grant = if list.holds_users() {
                AclGrant::Profile {
                    list,
                    email: value.to_string(),
                }
            } else {
                AclGrant::Group {
                    list,
                    id: GroupId(parse_id(value)?),
                }
            };
            command.grants.push(grant);
        }

        let prefix = format!("{}_remove_", list.field_name());
        for (key, _) in fields {
            if let Some(id) = key.strip_prefix(&prefix) {
                command.removals.push((list, parse_id(id)?));
            }
        }
    }

    Ok(command)
}

fn parse_id(value: &str) -> Result<i64, HttpError> {
    value.trim().parse::<i64>().map_err(|_| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid access control request",
            format!("`{value}` is not a valid id"),
        )
    })
}
