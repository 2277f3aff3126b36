use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{RcDom, SerializableHandle};

use super::dom::get_child_node_by_name;

/// 序列化整个文档
pub fn serialize_document(dom: &RcDom) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())
        .expect("Unable to serialize DOM into buffer");

    buf
}

/// 序列化文档片段
///
/// html5ever 解析任意片段时总会补全 `<html><head><body>` 外壳，
/// 这里只序列化 body 的子节点，得到与输入对应的片段 HTML。
pub fn serialize_fragment(dom: &RcDom) -> String {
    let body = get_child_node_by_name(&dom.document, "html")
        .and_then(|html| get_child_node_by_name(&html, "body"));

    let Some(body) = body else {
        return String::from_utf8_lossy(&serialize_document(dom)).to_string();
    };

    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = body.into();
    serialize(
        &mut buf,
        &serializable,
        SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        },
    )
    .expect("Unable to serialize DOM into buffer");

    String::from_utf8_lossy(&buf).to_string()
}
