//! Player Adapter - 外部播放服务客户端

mod fake_player;
mod http_player_client;

pub use fake_player::{FakePlayer, PlayerCall};
pub use http_player_client::{HttpPlayerClient, HttpPlayerClientConfig};
