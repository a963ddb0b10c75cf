//! EPG 来源：下载（或读取本地文件）XMLTV 文档并构建 [`GuideIndex`]
//!
//! 任何下载、解压或解析失败都退化为空索引，不中断处理流程。

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::matching::GuideIndex;

/// 默认 EPG 地址（西班牙频道 XMLTV）
pub const DEFAULT_GUIDE_URL: &str =
    "https://raw.githubusercontent.com/davidmuma/EPG_dobleM/master/guiatv.xml";
pub const MAX_GUIDE_BYTES: usize = 64 * 1024 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 加载 EPG 索引，失败时返回空索引
pub async fn load_guide_index(source: &str, timeout: Duration) -> GuideIndex {
    tracing::info!("下载并解析 EPG: {}", source);

    let bytes = match fetch_guide_bytes(source, timeout).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("EPG 获取失败，继续处理但不分配 tvg-id: {:#}", err);
            return GuideIndex::new();
        }
    };

    match decode_guide(&bytes) {
        Ok(index) => {
            tracing::info!(
                "EPG 解析成功: {} 个频道, {} 个名称",
                index.channel_count(),
                index.len()
            );
            index
        }
        Err(err) => {
            tracing::warn!("EPG 解析失败，继续处理但不分配 tvg-id: {:#}", err);
            GuideIndex::new()
        }
    }
}

fn is_remote(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn fetch_guide_bytes(source: &str, timeout: Duration) -> Result<Vec<u8>> {
    if !is_remote(source) {
        return read_local_guide(Path::new(source));
    }

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(source).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    read_response_bytes_with_limit(response).await
}

fn read_local_guide(path: &Path) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("无法读取 EPG 文件: {}", path.display()))?;
    validate_content_length(Some(metadata.len()))?;
    std::fs::read(path).with_context(|| format!("无法读取 EPG 文件: {}", path.display()))
}

pub(crate) fn validate_content_length(content_length: Option<u64>) -> Result<()> {
    if let Some(content_length) = content_length {
        if content_length > MAX_GUIDE_BYTES as u64 {
            anyhow::bail!("EPG 文档过大: {} 字节", content_length);
        }
    }
    Ok(())
}

pub(crate) fn append_chunk_with_limit(buffer: &mut Vec<u8>, chunk: &[u8]) -> Result<()> {
    if buffer.len().saturating_add(chunk.len()) > MAX_GUIDE_BYTES {
        anyhow::bail!("EPG 文档过大");
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}

async fn read_response_bytes_with_limit(response: reqwest::Response) -> Result<Vec<u8>> {
    validate_content_length(response.content_length())?;

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        append_chunk_with_limit(&mut bytes, &chunk)?;
    }
    Ok(bytes)
}

/// 必要时解压，然后解析 XMLTV
pub fn decode_guide(bytes: &[u8]) -> Result<GuideIndex> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let xml = gunzip_with_limit(bytes)?;
        parse_guide_xml(&xml)
    } else {
        parse_guide_xml(bytes)
    }
}

fn gunzip_with_limit(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes).take(MAX_GUIDE_BYTES as u64 + 1);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| anyhow::anyhow!("EPG 解压失败: {}", err))?;
    if out.len() > MAX_GUIDE_BYTES {
        anyhow::bail!("EPG 解压后过大");
    }
    Ok(out)
}

/// 解析 XMLTV 文档中的 `<channel id="..">` 与其 `<display-name>`
///
/// 频道 id 与每个显示名都以规范化结果为键映射到该 id，先到先得
pub fn parse_guide_xml(xml: &[u8]) -> Result<GuideIndex> {
    let mut reader = Reader::from_reader(xml);
    let mut index = GuideIndex::new();

    let mut current_id: Option<String> = None;
    let mut in_display_name = false;
    let mut text = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"channel" => {
                current_id = channel_id(e.attributes().flatten());
                if let Some(id) = &current_id {
                    index.insert_label(id, id);
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"channel" => {
                if let Some(id) = channel_id(e.attributes().flatten()) {
                    index.insert_label(&id, &id);
                }
            }
            Ok(Event::Start(ref e)) if current_id.is_some() && e.name().as_ref() == b"display-name" => {
                in_display_name = true;
                text.clear();
            }
            Ok(Event::Text(ref e)) if in_display_name => {
                text.push_str(&String::from_utf8_lossy(&e[..]));
            }
            Ok(Event::CData(ref e)) if in_display_name => {
                // CDATA 内容不做实体还原，先转义 '&' 以便统一处理
                text.push_str(&String::from_utf8_lossy(&e[..]).replace('&', "&amp;"));
            }
            Ok(Event::GeneralRef(ref e)) if in_display_name => {
                text.push('&');
                text.push_str(&String::from_utf8_lossy(&e[..]));
                text.push(';');
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"display-name" => {
                if in_display_name {
                    if let Some(id) = &current_id {
                        let name = unescape_xml(&text);
                        let name = name.trim();
                        if !name.is_empty() {
                            index.insert_label(name, id);
                        }
                    }
                }
                in_display_name = false;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"channel" => {
                current_id = None;
                in_display_name = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                anyhow::bail!("EPG XML 解析错误 (位置 {}): {}", reader.buffer_position(), e)
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(index)
}

fn channel_id<'a>(attributes: impl Iterator<Item = quick_xml::events::attributes::Attribute<'a>>) -> Option<String> {
    for attr in attributes {
        if attr.key.as_ref() == b"id" {
            let id = unescape_xml(&String::from_utf8_lossy(&attr.value));
            let id = id.trim();
            return (!id.is_empty()).then(|| id.to_string());
        }
    }
    None
}

/// 还原 XML 预定义实体与数字字符引用
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..end];
        match decode_entity(entity) {
            Some(ch) => out.push(ch),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}
