//! Builds the `system.ready` bootstrap payload sent right after a
//! successful identify: everything a client needs to render its UI without
//! a second round trip.

use std::collections::HashSet;

use ecto_domain::entities::Member;
use ecto_domain::permissions::Permission;
use ecto_domain::Result;
use serde_json::{json, Value};

use crate::state::AppState;

const MEMBER_CAP: i64 = 1000;

pub async fn build(state: &AppState, member: &Member) -> Result<Value> {
    let server = ecto_db::repo::servers::get(&state.db, state.server_id).await?;
    let all_channels = ecto_db::repo::channels::list_for_server(&state.db, state.server_id).await?;
    let channel_ids: Vec<_> = all_channels.iter().map(|c| c.id).collect();
    let masks = ecto_db::permissions::build_batch_context(&state.db, state.server_id, member.user_id, &channel_ids).await?;

    let mut visible_channels = Vec::new();
    let mut visible_category_ids = HashSet::new();
    for channel in &all_channels {
        let ctx = masks.get(&channel.id).cloned().unwrap_or_default();
        let mask = ecto_domain::permissions::compute(&ctx);
        if !mask.has(Permission::READ_MESSAGES) {
            continue;
        }
        if let Some(category_id) = channel.category_id {
            visible_category_ids.insert(category_id);
        }
        visible_channels.push(json!({
            "id": channel.id,
            "server_id": channel.server_id,
            "category_id": channel.category_id,
            "name": channel.name,
            "kind": channel.kind,
            "topic": channel.topic,
            "position": channel.position,
            "slowmode_seconds": channel.slowmode_seconds,
            "nsfw": channel.nsfw,
            "my_permissions": mask,
        }));
    }

    let server_wide_ctx = ecto_db::permissions::build_context(&state.db, state.server_id, member.user_id, None).await?;
    let can_manage_channels = ecto_domain::permissions::compute_base(&server_wide_ctx).has(Permission::MANAGE_CHANNELS);

    let all_categories = ecto_db::repo::servers::list_categories(&state.db, state.server_id).await?;
    let categories: Vec<_> = all_categories
        .into_iter()
        .filter(|c| can_manage_channels || visible_category_ids.contains(&c.id))
        .collect();

    let roles = ecto_db::repo::roles::list_for_server(&state.db, state.server_id).await?;
    let members = ecto_db::repo::members::list_for_server(&state.db, state.server_id, MEMBER_CAP).await?;
    let read_states = ecto_db::repo::read_state::list_for_user(&state.db, state.server_id, member.user_id).await?;

    let presences: Vec<Value> = members
        .iter()
        .map(|m| json!({ "user_id": m.user_id, "status": state.presence.status(m.user_id) }))
        .collect();

    let voice_states = state.voice.voice_state.all();

    Ok(json!({
        "server": server,
        "channels": visible_channels,
        "categories": categories,
        "roles": roles,
        "members": members,
        "read_states": read_states,
        "presences": presences,
        "voice_states": voice_states,
    }))
}
