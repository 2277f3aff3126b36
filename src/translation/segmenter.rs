//! 文档分段模块
//!
//! 把渲染后的 HTML 切分为可翻译的原子文本单元：每个含有非空白内容的
//! 文本节点被替换为一个携带原文（base64 编码）的占位符 `<span>`，
//! 前后空白以字面文本节点的形式原样保留；站内链接在分段之前统一
//! 本地化。结构、标记与不可翻译的子树保持逐字节不变。

use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::html::{
    append_child, create_element_node, create_text_node, get_node_attr, get_node_name,
    html_to_dom, remove_child, replace_child_with, serialize_fragment, set_node_attr,
    text_content,
};
use crate::parsers::link_localizer::localize_links;

/// 占位符元素的 class
pub const TOKEN_CLASS: &str = "wikiglot-token";

/// 终态失败占位符附加的 class，与"尚未翻译"状态有明确视觉区分
pub const TOKEN_ERROR_CLASS: &str = "wikiglot-token-error";

/// 携带 base64 编码原文的属性名
pub const TOKEN_SOURCE_ATTR: &str = "data-source";

/// 从输出中整体删除的标签（样式/脚本类元数据载体）
const STRIP_TAGS: &[&str] = &["style", "script", "link", "meta"];

/// 分段结果
#[derive(Debug)]
pub struct SegmentedDocument {
    /// 布满占位符的骨架 HTML，可立即返回给客户端渲染
    pub html: String,
    /// 按文档序排列、按内容去重后的待译单元列表
    pub units: Vec<String>,
}

/// 占位符单元的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// 翻译成功，占位符被替换为译文文本
    Translated(String),
    /// 终态失败，占位符被标记为错误状态且不再重试
    Failed,
}

/// 对页面占位符的一次扫描结果
#[derive(Debug, Default)]
pub struct PlaceholderScan {
    /// 去重后的单元文本，按文档序
    pub unique_units: Vec<String>,
    /// 单元文本 → 占位符出现位置（文档序序号）的多重映射
    pub locations: HashMap<String, Vec<usize>>,
}

impl PlaceholderScan {
    /// 页面上占位符总数（含重复单元）
    pub fn placeholder_count(&self) -> usize {
        self.locations.values().map(|v| v.len()).sum()
    }
}

/// 分段入口：链接本地化 + 文本节点占位符化
pub fn segment(html: &str, lang: &str) -> SegmentedDocument {
    let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());

    // 链接本地化作用于元素而非文本，必须在分段之前独立运行
    localize_links(&dom.document, lang);

    let mut units = Vec::new();
    let mut seen = HashSet::new();
    tokenize_node(&dom.document, &mut units, &mut seen);

    SegmentedDocument {
        html: serialize_fragment(&dom),
        units,
    }
}

/// 扫描骨架 HTML 中的全部占位符
pub fn scan_placeholders(html: &str) -> PlaceholderScan {
    let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());
    let mut scan = PlaceholderScan::default();
    let mut ordinal = 0usize;
    collect_tokens(&dom.document, &mut scan, &mut ordinal);
    scan
}

/// 把单元终态应用回骨架 HTML
///
/// 成功单元的占位符被替换为译文文本节点（周围空白已作为兄弟文本节点
/// 保留，因此整体空白逐字节还原）；失败单元被标记为错误状态；没有
/// 终态的占位符原样保留。
pub fn apply_outcomes(html: &str, outcomes: &HashMap<String, UnitOutcome>) -> String {
    let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());
    resolve_tokens(&dom.document, outcomes);
    serialize_fragment(&dom)
}

/// 解码占位符携带的原文
pub fn decode_source(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// 判断节点是否为占位符
fn is_token(node: &Handle) -> bool {
    get_node_name(node) == Some("span")
        && get_node_attr(node, "class")
            .map(|c| c.split_ascii_whitespace().any(|part| part == TOKEN_CLASS))
            .unwrap_or(false)
}

/// 判断子树是否不透明：既不深入也不分段，逐字节原样保留
///
/// 引用/脚注标记和段落编辑入口按标签 + class 约定识别。
fn is_opaque(node: &Handle) -> bool {
    let Some(name) = get_node_name(node) else {
        return false;
    };
    let class = get_node_attr(node, "class").unwrap_or_default();

    (name == "sup" && class.contains("reference"))
        || (name == "span" && class.contains("mw-editsection"))
}

/// 深度优先遍历并把文本节点替换为占位符
fn tokenize_node(node: &Handle, units: &mut Vec<String>, seen: &mut HashSet<String>) {
    // 先对子节点列表做快照，遍历期间的替换/删除不影响迭代
    let children: Vec<Handle> = node.children.borrow().clone();

    for child in children {
        match child.data {
            NodeData::Text { .. } => {
                wrap_text_node(node, &child, units, seen);
            }
            NodeData::Element { .. } => {
                if is_opaque(&child) {
                    continue;
                }

                if let Some(name) = get_node_name(&child) {
                    if STRIP_TAGS.contains(&name) {
                        remove_child(node, &child);
                        continue;
                    }
                }

                tokenize_node(&child, units, seen);
            }
            _ => {}
        }
    }
}

/// 把单个文本节点替换为 [前导空白, 占位符, 尾随空白]
fn wrap_text_node(
    parent: &Handle,
    text_node: &Handle,
    units: &mut Vec<String>,
    seen: &mut HashSet<String>,
) {
    let Some(raw) = text_content(text_node) else {
        return;
    };

    let core = raw.trim();
    if core.is_empty() {
        return;
    }

    let leading = &raw[..raw.len() - raw.trim_start().len()];
    let trailing = &raw[raw.trim_end().len()..];

    let mut replacements = Vec::with_capacity(3);
    if !leading.is_empty() {
        replacements.push(create_text_node(leading));
    }

    let token = create_element_node(
        "span",
        &[
            ("class", TOKEN_CLASS),
            (TOKEN_SOURCE_ATTR, &BASE64.encode(core.as_bytes())),
        ],
    );
    // 骨架阶段占位符仍显示原文，页面不会出现空洞
    append_child(&token, &create_text_node(core));
    replacements.push(token);

    if !trailing.is_empty() {
        replacements.push(create_text_node(trailing));
    }

    replace_child_with(parent, text_node, replacements);

    // 单元列表按内容去重，但树中每次出现都保留各自的占位符
    if seen.insert(core.to_string()) {
        units.push(core.to_string());
    }
}

/// 收集占位符（文档序）
fn collect_tokens(node: &Handle, scan: &mut PlaceholderScan, ordinal: &mut usize) {
    for child in node.children.borrow().iter() {
        if is_token(child) {
            let source = get_node_attr(child, TOKEN_SOURCE_ATTR)
                .as_deref()
                .and_then(decode_source);

            if let Some(text) = source {
                if !scan.locations.contains_key(&text) {
                    scan.unique_units.push(text.clone());
                }
                scan.locations.entry(text).or_default().push(*ordinal);
                *ordinal += 1;
            }
            continue;
        }

        collect_tokens(child, scan, ordinal);
    }
}

/// 按终态替换或标记占位符
fn resolve_tokens(node: &Handle, outcomes: &HashMap<String, UnitOutcome>) {
    let children: Vec<Handle> = node.children.borrow().clone();

    for child in children {
        if is_token(&child) {
            let source = get_node_attr(&child, TOKEN_SOURCE_ATTR)
                .as_deref()
                .and_then(decode_source);

            let Some(text) = source else {
                continue;
            };

            match outcomes.get(&text) {
                Some(UnitOutcome::Translated(translated)) => {
                    replace_child_with(node, &child, vec![create_text_node(translated)]);
                }
                Some(UnitOutcome::Failed) => {
                    set_node_attr(
                        &child,
                        "class",
                        Some(format!("{} {}", TOKEN_CLASS, TOKEN_ERROR_CLASS)),
                    );
                    set_node_attr(&child, "title", Some("Translation failed".to_string()));
                }
                None => {}
            }
            continue;
        }

        resolve_tokens(&child, outcomes);
    }
}
