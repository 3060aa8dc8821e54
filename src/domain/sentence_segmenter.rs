//! 句子分割器
//!
//! 按句末标点把文本切成句子，每个句子对应一次远端请求

/// 检查是否为句末标点（总是分割）
#[inline]
fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '?' | '!' | '。' | '？' | '！')
}

/// 句末标点之后紧跟的闭合符号，归属于前一句
#[inline]
fn is_closing_mark(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | '\u{201D}' | '\u{2019}' | ')' | ']' | '）' | '」' | '』'
    )
}

/// 检查片段是否只包含引号或空白（应该被合并）
#[inline]
fn is_trivial_segment(s: &str) -> bool {
    s.chars().all(|c| {
        matches!(
            c,
            '"' | '\u{201C}' | '\u{201D}' | '\'' | '\u{2018}' | '\u{2019}'
        ) || c.is_whitespace()
    })
}

/// `3.14` 中的点不是句子边界
#[inline]
fn is_decimal_point(chars: &[char], i: usize) -> bool {
    chars[i] == '.'
        && i > 0
        && chars[i - 1].is_ascii_digit()
        && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

fn flush(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// 按句末标点分割单行文本
///
/// 连续的句末标点（`?!`、`...`）以及其后的闭合引号/括号保留在同一句中
fn split_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        current.push(ch);

        if is_sentence_end(ch) && !is_decimal_point(&chars, i) {
            while let Some(&next) = chars.get(i + 1) {
                if is_sentence_end(next) || is_closing_mark(next) {
                    current.push(next);
                    i += 1;
                } else {
                    break;
                }
            }
            flush(&mut segments, &mut current);
        }
        i += 1;
    }

    flush(&mut segments, &mut current);
    segments
}

/// 将文本分割为句子
///
/// 分割策略：
/// 1. 按行分割（换行总是句子边界）
/// 2. 每行按句末标点分割
/// 3. 去除首尾空白，丢弃空片段
/// 4. 只有引号的片段合并到相邻句子
///
/// 结果是确定的，且不会破坏 emoji 等多字节字符
pub fn segment_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut pending_prefix = String::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for sentence in split_line(line) {
            if is_trivial_segment(&sentence) {
                match sentences.last_mut() {
                    Some(last) => last.push_str(&sentence),
                    None => pending_prefix.push_str(&sentence),
                }
                continue;
            }

            if pending_prefix.is_empty() {
                sentences.push(sentence);
            } else {
                let mut merged = std::mem::take(&mut pending_prefix);
                merged.push_str(&sentence);
                sentences.push(merged);
            }
        }
    }

    // 只有引号、没有正文的输入不产生句子
    sentences
}
