//! 解析器模块
//!
//! 提供 HTML 解析、序列化与站内链接本地化能力。

pub mod html;
pub mod link_localizer;
