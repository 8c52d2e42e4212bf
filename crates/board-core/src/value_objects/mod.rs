//! Value objects - immutable types that represent domain concepts

mod ids;
mod tie_break;
mod topic;

pub use ids::{GroupId, UserId};
pub use tie_break::TieBreak;
pub use topic::{PresenceTopic, PRESENCE_TOPIC_PREFIX};
