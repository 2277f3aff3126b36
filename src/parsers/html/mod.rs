//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（解析、属性读写、节点构造与替换）
//! - `serializer`: 序列化功能（整篇文档与片段两种形态）

pub mod dom;
pub mod serializer;

pub use dom::{
    append_child, create_element_node, create_text_node, get_child_node_by_name, get_node_attr,
    get_node_name, html_to_dom, position_of_child, remove_child, replace_child_with, set_node_attr,
    text_content,
};
pub use serializer::{serialize_document, serialize_fragment};
