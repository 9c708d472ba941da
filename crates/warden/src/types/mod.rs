mod channel_id;
mod external_id;
mod game_id;

pub use channel_id::ChannelId;
pub use external_id::ExternalId;
pub use game_id::GameId;
