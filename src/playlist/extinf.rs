//! #EXTINF 元数据行
//!
//! 语法：`#EXTINF:<时长>[ key="value"]*,<显示文本>`
//!
//! - 时长：可选 `-`，至少一位数字，可选小数部分
//! - 属性键：`[A-Za-z0-9_-]+`；值可带引号（可含逗号）或不带引号
//! - 显示文本从引号外的第一个逗号开始
//!
//! 不符合语法的行原样返回，不视为错误。

use std::collections::BTreeMap;

pub const EXTINF_TAG: &str = "#EXTINF:";
/// EPG 标识属性
pub const GUIDE_ID_ATTR: &str = "tvg-id";
/// 频道号属性
pub const CHANNEL_NUMBER_ATTR: &str = "tvg-chno";
/// 频道名属性
pub const NAME_ATTR: &str = "tvg-name";

/// 解析后的 #EXTINF 行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtinfLine<'a> {
    /// `#EXTINF:<时长>`
    pub prefix: &'a str,
    /// 属性（按出现顺序，可能有重复键）
    pub attributes: Vec<(String, String)>,
    /// 以逗号开头的显示部分
    pub suffix: &'a str,
}

impl<'a> ExtinfLine<'a> {
    /// 属性值（重复键取最后一次出现）
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 逗号后的显示文本
    pub fn display_text(&self) -> &'a str {
        self.suffix[1..].trim()
    }
}

/// 解析 #EXTINF 行，不符合语法时返回 None
pub fn parse(line: &str) -> Option<ExtinfLine<'_>> {
    let line = strip_line_terminator(line);
    let rest = line.strip_prefix(EXTINF_TAG)?;

    let duration_len = scan_duration(rest)?;
    let prefix_end = EXTINF_TAG.len() + duration_len;
    let body = &line[prefix_end..];

    let comma = find_unquoted_comma(body)?;

    Some(ExtinfLine {
        prefix: &line[..prefix_end],
        attributes: parse_attributes(&body[..comma]),
        suffix: &body[comma..],
    })
}

/// 频道显示名：非空 tvg-name 优先，否则为显示文本
pub fn display_name(line: &str) -> String {
    if let Some(parsed) = parse(line) {
        if let Some(name) = parsed.attribute(NAME_ATTR).map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        return parsed.display_text().to_string();
    }

    // 语法外的行：退化为第一个逗号之后的文本
    let line = strip_line_terminator(line);
    match find_unquoted_comma(line) {
        Some(idx) => line[idx + 1..].trim().to_string(),
        None => line.strip_prefix(EXTINF_TAG).unwrap_or(line).trim().to_string(),
    }
}

/// 重写 #EXTINF 行
///
/// - 给定 `guide_id` 时设置/覆盖 tvg-id，给定 `number` 时设置/覆盖 tvg-chno
/// - 输出顺序：tvg-id、tvg-chno、其余属性按键名字典序
/// - 结果不含换行符，由写出阶段统一追加
/// - 幂等：相同参数重写两次结果一致
pub fn rewrite(line: &str, guide_id: Option<&str>, number: Option<u32>) -> String {
    let Some(parsed) = parse(line) else {
        return line.to_string();
    };

    let mut bag: BTreeMap<String, String> = parsed.attributes.into_iter().collect();
    if let Some(id) = guide_id {
        bag.insert(GUIDE_ID_ATTR.to_string(), sanitize_value(id));
    }
    if let Some(n) = number {
        bag.insert(CHANNEL_NUMBER_ATTR.to_string(), n.to_string());
    }

    let mut rendered: Vec<String> = Vec::with_capacity(bag.len());
    for key in [GUIDE_ID_ATTR, CHANNEL_NUMBER_ATTR] {
        if let Some(value) = bag.remove(key) {
            rendered.push(format!("{}=\"{}\"", key, value));
        }
    }
    rendered.extend(bag.iter().map(|(k, v)| format!("{}=\"{}\"", k, v)));

    let mut result = String::with_capacity(line.len() + 32);
    result.push_str(parsed.prefix);
    if !rendered.is_empty() {
        result.push(' ');
        result.push_str(&rendered.join(" "));
    }
    result.push_str(parsed.suffix);
    result
}

fn strip_line_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// 时长字段长度（字节），不合法时返回 None
fn scan_duration(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut pos = 0;

    if bytes.first() == Some(&b'-') {
        pos += 1;
    }

    let digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start {
        return None;
    }

    // 可选小数部分
    if bytes.get(pos) == Some(&b'.') {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            pos = frac_end;
        }
    }

    Some(pos)
}

/// 引号外第一个逗号的位置
fn find_unquoted_comma(text: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// 解析属性区域，不成对的裸词被丢弃
fn parse_attributes(region: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = region.chars().collect();
    let mut attributes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let key_start = i;
        while i < chars.len() && is_key_char(chars[i]) {
            i += 1;
        }
        let key: String = chars[key_start..i].iter().collect();

        if !key.is_empty() && chars.get(i) == Some(&'=') {
            i += 1;
            let value = if chars.get(i) == Some(&'"') {
                i += 1;
                let value_start = i;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                let value: String = chars[value_start..i].iter().collect();
                // 跳过闭合引号
                i += 1;
                value
            } else {
                let value_start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                chars[value_start..i].iter().filter(|c| **c != '"').collect()
            };
            attributes.push((key, value));
            continue;
        }

        // 裸词或非法字符：跳到下一个引号外的空白
        let mut in_quotes = false;
        while i < chars.len() && (in_quotes || !chars[i].is_whitespace()) {
            if chars[i] == '"' {
                in_quotes = !in_quotes;
            }
            i += 1;
        }
    }

    attributes
}

fn sanitize_value(value: &str) -> String {
    value.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let parsed =
            parse(r#"#EXTINF:-1 tvg-id="old" tvg-name="La 1" group-title="TDT",La 1 HD"#).unwrap();
        assert_eq!(parsed.prefix, "#EXTINF:-1");
        assert_eq!(parsed.attribute("tvg-id"), Some("old"));
        assert_eq!(parsed.attribute("group-title"), Some("TDT"));
        assert_eq!(parsed.display_text(), "La 1 HD");
    }

    #[test]
    fn test_parse_quoted_comma_in_value() {
        let parsed = parse(r#"#EXTINF:0 group-title="Noticias, Deportes",Teledeporte"#).unwrap();
        assert_eq!(parsed.attribute("group-title"), Some("Noticias, Deportes"));
        assert_eq!(parsed.suffix, ",Teledeporte");
    }

    #[test]
    fn test_parse_rejects_non_grammar_lines() {
        assert!(parse("#EXTM3U").is_none());
        assert!(parse("#EXTINF:abc,La 1").is_none());
        assert!(parse("#EXTINF:-1 tvg-name=\"La 1\"").is_none());
        assert!(parse("http://example.com").is_none());
    }

    #[test]
    fn test_display_name_prefers_tvg_name() {
        assert_eq!(
            display_name(r#"#EXTINF:-1 tvg-name=" Cuatro HD ",Otro"#),
            "Cuatro HD"
        );
        assert_eq!(display_name(r#"#EXTINF:-1 tvg-name="",Cuatro"#), "Cuatro");
        assert_eq!(display_name("#EXTINF:-1,  Telecinco  "), "Telecinco");
    }

    #[test]
    fn test_rewrite_orders_attributes() {
        let line = r#"#EXTINF:-1 tvg-logo="l.png" group-title="TDT" tvg-name="La 1",La 1"#;
        let rewritten = rewrite(line, Some("La1.TV"), Some(1));
        assert_eq!(
            rewritten,
            r#"#EXTINF:-1 tvg-id="La1.TV" tvg-chno="1" group-title="TDT" tvg-logo="l.png" tvg-name="La 1",La 1"#
        );
    }

    #[test]
    fn test_rewrite_overwrites_existing_values() {
        let line = r#"#EXTINF:-1 tvg-chno="99" tvg-id="viejo",Cuatro"#;
        assert_eq!(
            rewrite(line, Some("Cuatro.TV"), Some(4)),
            r#"#EXTINF:-1 tvg-id="Cuatro.TV" tvg-chno="4",Cuatro"#
        );
        // 未给定的属性保持原值
        assert_eq!(
            rewrite(line, None, Some(4)),
            r#"#EXTINF:-1 tvg-id="viejo" tvg-chno="4",Cuatro"#
        );
    }

    #[test]
    fn test_rewrite_without_attributes() {
        assert_eq!(rewrite("#EXTINF:-1,La 2", None, None), "#EXTINF:-1,La 2");
        assert_eq!(
            rewrite("#EXTINF:-1,La 2", None, Some(2)),
            r#"#EXTINF:-1 tvg-chno="2",La 2"#
        );
    }

    #[test]
    fn test_rewrite_passthrough() {
        let line = "#EXTVLCOPT:http-user-agent=Mozilla";
        assert_eq!(rewrite(line, Some("x"), Some(1)), line);
    }

    #[test]
    fn test_rewrite_idempotent() {
        let line = r#"#EXTINF:-1 b="2" a=1 stray tvg-name="Neox",Neox"#;
        let once = rewrite(line, Some("Neox.TV"), Some(41));
        let twice = rewrite(&once, Some("Neox.TV"), Some(41));
        assert_eq!(once, twice);
        assert_eq!(
            once,
            r#"#EXTINF:-1 tvg-id="Neox.TV" tvg-chno="41" a="1" b="2" tvg-name="Neox",Neox"#
        );
    }

    #[test]
    fn test_rewrite_strips_line_terminator() {
        assert_eq!(
            rewrite("#EXTINF:-1,Clan\r\n", None, Some(48)),
            r#"#EXTINF:-1 tvg-chno="48",Clan"#
        );
    }

    #[test]
    fn test_rewrite_sanitizes_guide_id_quotes() {
        assert_eq!(
            rewrite("#EXTINF:-1,Mega", Some(r#"Me"ga"#), None),
            r#"#EXTINF:-1 tvg-id="Me'ga",Mega"#
        );
    }
}
