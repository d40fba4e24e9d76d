pub mod auditlog;
pub mod bans;
pub mod channels;
pub mod files;
pub mod health;
pub mod hub_files;
pub mod invites;
pub mod members;
pub mod messages;
pub mod pages;
pub mod perm;
pub mod read_state;
pub mod roles;
pub mod search;
pub mod server;
pub mod server_dms;
pub mod webhooks;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// There's no router-wide auth layer: almost every handler below pulls
/// [`crate::auth::Authenticated`] as an extractor, which does the work a
/// `middleware::from_fn` layer would elsewhere. The exceptions don't use it
/// because they authenticate differently (`redeem_invite`, the webhook
/// posting endpoint) or not at all (`/healthz`, `/readyz`, `GET /files/*path`).
pub fn router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        // ── Server, config, categories, membership ──────────────────────
        .route("/server", get(server::get_server))
        .route("/server/config", get(server::get_server_config))
        .route("/server/config", patch(server::update_server_config))
        .route("/server/categories", get(server::list_categories))
        .route("/server/categories", post(server::create_category))
        .route("/server/categories/:category_id", delete(server::delete_category))
        .route("/server/categories/reorder", post(server::reorder_categories))
        .route("/server/join", post(server::join_server))
        .route("/server/leave", post(server::leave_server))
        // ── Channels ─────────────────────────────────────────────────────
        .route("/channels", get(channels::list_channels))
        .route("/channels", post(channels::create_channel))
        .route("/channels/reorder", post(channels::reorder_channels))
        .route("/channels/:channel_id", get(channels::get_channel))
        .route("/channels/:channel_id", patch(channels::update_channel))
        .route("/channels/:channel_id", delete(channels::delete_channel))
        .route("/channels/:channel_id/overrides", get(channels::list_overrides))
        .route("/channels/:channel_id/overrides", put(channels::upsert_override))
        .route("/channels/:channel_id/overrides/:target_type/:target_id", delete(channels::delete_override))
        .route("/channels/:channel_id/search", get(search::search_channel))
        .route("/channels/:channel_id/webhooks", get(webhooks::list_webhooks))
        .route("/channels/:channel_id/webhooks", post(webhooks::create_webhook))
        .route("/channels/:channel_id/webhooks/:webhook_id/regenerate", post(webhooks::regenerate_token))
        .route("/channels/:channel_id/webhooks/:webhook_id", delete(webhooks::delete_webhook))
        // ── Pages ────────────────────────────────────────────────────────
        .route("/channels/:channel_id/page", get(pages::get_page))
        .route("/channels/:channel_id/page", patch(pages::update_page))
        .route("/channels/:channel_id/page/banner", post(pages::set_page_banner))
        .route("/channels/:channel_id/page/revisions", get(pages::list_revisions))
        // ── Messages ─────────────────────────────────────────────────────
        .route("/channels/:channel_id/messages", get(messages::list))
        .route("/channels/:channel_id/messages", post(messages::send))
        .route("/messages/:message_id", patch(messages::update))
        .route("/messages/:message_id", delete(messages::delete))
        .route("/messages/:message_id/pin", post(messages::pin))
        .route("/messages/:message_id/reactions", post(messages::react))
        .route("/messages/:message_id/attachments", get(messages::list_attachments))
        // ── Read state ───────────────────────────────────────────────────
        .route("/read_state", get(read_state::list_read_states))
        .route("/channels/:channel_id/read_state", put(read_state::mark_read))
        // ── Members, roles, bans ────────────────────────────────────────
        .route("/members", get(members::list_members))
        .route("/members/:user_id", get(members::get_member))
        .route("/members/:user_id/nickname", patch(members::update_nickname))
        .route("/members/:user_id/roles", put(members::set_roles))
        .route("/members/:user_id/kick", post(members::kick_member))
        .route("/roles", get(roles::list_roles))
        .route("/roles", post(roles::create_role))
        .route("/roles/reorder", post(roles::reorder_roles))
        .route("/roles/:role_id", patch(roles::update_role))
        .route("/roles/:role_id", delete(roles::delete_role))
        .route("/categories/:category_id/overrides", get(roles::list_category_overrides))
        .route("/categories/:category_id/overrides", put(roles::upsert_category_override))
        .route("/categories/:category_id/overrides/:target_type/:target_id", delete(roles::delete_category_override))
        .route("/bans", get(bans::list_bans))
        .route("/bans", post(bans::create_ban))
        .route("/bans/:user_id", delete(bans::delete_ban))
        // ── Invites ──────────────────────────────────────────────────────
        .route("/invites", get(invites::list_invites))
        .route("/invites", post(invites::create_invite))
        .route("/invites/:code", delete(invites::revoke_invite))
        .route("/invites/:code/redeem", post(invites::redeem_invite))
        // ── Audit log ────────────────────────────────────────────────────
        .route("/audit_log", get(auditlog::list_audit_log))
        // ── Server DMs ───────────────────────────────────────────────────
        .route("/dms", get(server_dms::list_conversations))
        .route("/dms", post(server_dms::open_conversation))
        .route("/dms/:conversation_id/messages", get(server_dms::history))
        .route("/dms/:conversation_id/messages", post(server_dms::send_message))
        .route("/dms/:conversation_id/messages/:message_id", patch(server_dms::edit_message))
        .route("/dms/:conversation_id/messages/:message_id", delete(server_dms::delete_message))
        .route("/dms/:conversation_id/messages/:message_id/reactions", post(server_dms::react_message))
        .route("/dms/:conversation_id/read_state", put(server_dms::mark_read))
        // ── Shared files (the hub) ───────────────────────────────────────
        .route("/hub/folders", get(hub_files::list_folders))
        .route("/hub/folders", post(hub_files::create_folder))
        .route("/hub/folders/:folder_id/move", post(hub_files::move_folder))
        .route("/hub/folders/:folder_id", delete(hub_files::delete_folder))
        .route("/hub/files", get(hub_files::list_files))
        .route("/hub/files/:file_id", get(hub_files::get_file))
        .route("/hub/files/:file_id", delete(hub_files::delete_file))
        .route("/hub/overrides", get(hub_files::list_overrides))
        .route("/hub/overrides", put(hub_files::upsert_override))
        .route("/hub/overrides/:target_type/:target_id", delete(hub_files::delete_override))
        // ── File upload/serving ──────────────────────────────────────────
        .route("/upload", post(files::upload_attachment))
        .route("/shared/upload", post(files::upload_shared_file))
        .route("/dm/upload", post(files::upload_dm_attachment))
        .route("/upload/icon", post(files::upload_icon))
        .route("/upload/banner", post(files::upload_banner))
        .route("/upload/page-banner", post(files::upload_page_banner))
        .route("/files/*path", get(files::serve_file))
        // ── Webhook posting (no member auth; authenticates via id+token) ──
        .route("/webhooks/:webhook_id/:token", post(webhooks::post_webhook_message))
}
