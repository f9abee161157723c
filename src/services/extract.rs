//! 结构化提取模块
//! 从不可靠的模型输出中恢复合法 JSON，分层降级：
//! 直接解析 -> 去除 markdown 代码围栏 -> 括号定界截取 -> 逐字符扫描独立对象

use anyhow::{bail, Result};
use serde_json::Value;

/// 提取目标形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetShape {
    /// JSON 数组（对象序列）
    Array,
    /// 单个 JSON 对象
    Object,
}

/// 去除 markdown 代码围栏
/// 文本以 ``` 开头时删掉首行（```json 或 ```），末行若为裸 ``` 一并删掉
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if let Some(last) = lines.last() {
        if last.trim() == "```" {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// 截取首尾括号之间的子串，丢弃模型在 JSON 前后附带的说明文字
/// 找不到成对括号时原样返回
pub fn clip_to_bounds(text: &str, shape: TargetShape) -> &str {
    let (open, close) = match shape {
        TargetShape::Array => ('[', ']'),
        TargetShape::Object => ('{', '}'),
    };

    match (text.find(open), text.rfind(close)) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// 逐字符扫描，恢复散落在文本中的多个独立顶层对象
///
/// 显式状态机：大括号嵌套深度 + 字符串模式 + 转义标记。
/// 字符串字面量内的大括号不计入深度；反斜杠转义的引号不切换字符串模式。
/// 深度归零即得到一个候选子串，单独解析，失败则跳过继续扫描。
pub fn scan_objects(text: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut depth: u32 = 0;
    let mut obj_start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
        } else if ch == '\\' {
            escape_next = true;
        } else if ch == '"' {
            in_string = !in_string;
        } else if !in_string {
            match ch {
                '{' => {
                    if depth == 0 {
                        obj_start = Some(i);
                    }
                    depth += 1;
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(start) = obj_start.take() {
                            let candidate = &text[start..=i];
                            match serde_json::from_str::<Value>(candidate) {
                                Ok(obj) => {
                                    log::debug!(
                                        "scan recovered object {} ({} bytes)",
                                        objects.len() + 1,
                                        candidate.len()
                                    );
                                    objects.push(obj);
                                }
                                Err(e) => {
                                    log::warn!("skipping unparsable object during scan: {}", e);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    objects
}

/// 从原始模型输出中提取期望形状的 JSON 值
///
/// 数组形状在直接解析失败后回退到对象扫描；两种形状下
/// 最终结果为空或形状不符都按提取失败处理
pub fn extract_json(raw: &str, shape: TargetShape) -> Result<Value> {
    let cleaned = strip_code_fence(raw);
    let clipped = clip_to_bounds(&cleaned, shape);

    match shape {
        TargetShape::Object => match serde_json::from_str::<Value>(clipped) {
            Ok(value) if value.is_object() => Ok(value),
            Ok(value) => bail!("expected a JSON object, got {}", type_name(&value)),
            Err(e) => bail!("failed to parse grading response as JSON: {}", e),
        },
        TargetShape::Array => {
            match serde_json::from_str::<Value>(clipped) {
                Ok(value) if value.is_array() => {
                    if value.as_array().map(|a| a.is_empty()).unwrap_or(true) {
                        bail!("no valid objects found in response");
                    }
                    return Ok(value);
                }
                Ok(value) => bail!("expected a JSON array, got {}", type_name(&value)),
                Err(e) => {
                    log::info!("direct array parse failed ({}), scanning for objects", e);
                }
            }

            // 数组解析失败：模型常见故障是输出多个独立对象而非数组
            let objects = scan_objects(clipped);
            if objects.is_empty() {
                bail!("no valid objects found in response");
            }
            Ok(Value::Array(objects))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
