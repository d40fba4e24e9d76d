pub mod audit;
pub mod bans;
pub mod channels;
pub mod dms;
pub mod invites;
pub mod members;
pub mod messages;
pub mod pages;
pub mod read_state;
pub mod roles;
pub mod search;
pub mod servers;
pub mod shared;
pub mod users;
pub mod webhooks;
