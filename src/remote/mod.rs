//! 远端层：Megaverse 服务抽象与实现（HTTP / Mock）

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpMegaverseApi;
pub use mock::{ApiCall, MockMegaverseApi};
pub use traits::MegaverseApi;
