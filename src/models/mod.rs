//! 数据模型模块
//! 角色、账户、解析后的用户视图以及接口 DTO

pub mod access;
pub mod auth;

pub use access::*;
pub use auth::*;
