//! 站内链接本地化模块
//!
//! 在分段（tokenize）之前独立运行的一个元素级处理遍：把指向站内条目的
//! 链接追加目标语言代码作为额外的路径段，使其指向对应条目的翻译视图。
//! 例如 `href="/wiki/Apple"` 在目标语言 `es` 下被改写为 `/wiki/Apple/es`。

use markup5ever_rcdom::{Handle, NodeData};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::parsers::html::{get_node_attr, set_node_attr};

/// 不参与本地化的非正文命名空间前缀
///
/// 这些页面（特殊页、讨论页、模板等）没有翻译视图，改写会产生死链。
const EXCLUDED_NAMESPACES: &[&str] = &[
    "special", "talk", "user", "user_talk", "template", "template_talk", "category",
    "category_talk", "file", "file_talk", "help", "help_talk", "mediawiki", "portal",
];

/// 指向不存在目标的链接所携带的 class 标记
const MISSING_TARGET_CLASS: &str = "new";

/// 递归遍历 DOM 树并本地化所有站内链接
pub fn localize_links(node: &Handle, lang: &str) {
    if let NodeData::Element { ref name, .. } = node.data {
        if name.local.as_ref() == "a" {
            localize_anchor(node, lang);
        }
    }

    for child_node in node.children.borrow().iter() {
        localize_links(child_node, lang);
    }
}

/// 改写单个锚点的 href 属性
fn localize_anchor(node: &Handle, lang: &str) {
    // 红链（目标条目不存在）保持原样
    if let Some(class) = get_node_attr(node, "class") {
        if class.split_ascii_whitespace().any(|c| c == MISSING_TARGET_CLASS) {
            return;
        }
    }

    if let Some(href_value) = get_node_attr(node, "href") {
        if let Some(localized) = localize_href(href_value.trim(), lang) {
            set_node_attr(node, "href", Some(localized));
        }
    }
}

/// 对单个 href 计算本地化结果
///
/// 返回 `None` 表示该链接不应被改写。
pub fn localize_href(href: &str, lang: &str) -> Option<String> {
    if should_skip_link(href) {
        return None;
    }

    // 把片段和查询串摘下来，语言段只追加到路径上
    let (rest, fragment) = match href.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (href, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    if path.is_empty() {
        return None;
    }

    let title = path.trim_start_matches("/wiki/").trim_start_matches('/');
    if title.is_empty() {
        return None;
    }

    // 命名空间前缀可能被百分号编码，解码后再比对
    let decoded = percent_decode_str(title).decode_utf8_lossy();
    if is_excluded_namespace(&decoded) {
        return None;
    }

    // 已经指向翻译视图的链接不再二次追加
    let lang_suffix = format!("/{}", lang);
    if path.ends_with(&lang_suffix) {
        return None;
    }

    let mut localized = format!("{}{}", path.trim_end_matches('/'), lang_suffix);
    if let Some(query) = query {
        localized.push('?');
        localized.push_str(query);
    }
    if let Some(fragment) = fragment {
        localized.push('#');
        localized.push_str(fragment);
    }

    Some(localized)
}

/// 判断是否应该跳过改写的链接
///
/// 跳过：空链接、页内锚点、协议相对 URL 以及任何带 scheme 的绝对
/// URL（http、mailto、javascript 等一律视为站外）。
fn should_skip_link(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') || href.starts_with("//") {
        return true;
    }

    Url::parse(href).is_ok()
}

/// 判断条目标题是否落在被排除的命名空间内
fn is_excluded_namespace(title: &str) -> bool {
    let Some((prefix, _)) = title.split_once(':') else {
        return false;
    };

    let normalized = prefix.to_ascii_lowercase().replace(' ', "_");
    EXCLUDED_NAMESPACES.contains(&normalized.as_str())
}
