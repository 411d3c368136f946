//! HTTP 处理器模块

pub mod access;
pub mod auth;
pub mod bot;
pub mod employees;
pub mod health;
