//! UUIDv7 id generation. Preserve v7, never substitute v4: `id`-ordering
//! must stay chronological so most `ORDER BY id` reads don't need a paired
//! `created_at` sort key.

use uuid::Uuid;

pub fn new_id() -> Uuid {
    Uuid::now_v7()
}
