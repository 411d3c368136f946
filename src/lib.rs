//! 员工访问控制服务
//! 角色、账户、令牌与员工可见范围

pub mod auth;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
