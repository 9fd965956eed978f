use anyhow::{Context, Result};
use regex::Regex;

use crate::util::{collapse_whitespace, is_cjk};

const ALLOWED_SYMBOLS: &str = "+-×÷=<>≤≥%()（）[]{}.,，。、:：;；!！?？";
const SPACED_OPERATORS: &str = "+-×÷=<>≤≥";
const UNIT_MISREADS: [(&str, &str); 3] = [("克赤", "千克"), ("厘未", "厘米"), ("千未", "千米")];

/// Cleans raw page text before segmentation. Construction compiles the noise
/// patterns once; `normalize` itself never fails.
#[derive(Debug)]
pub struct TextNormalizer {
    promo_wechat: Regex,
    promo_web: Regex,
    promo_download: Regex,
    page_marker: Regex,
    page_marker_cn: Regex,
    page_marker_dashed: Regex,
    garbled_cluster: Regex,
    letter_glued_digits: Regex,
    line_alone_digits: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            promo_wechat: Regex::new(
                r"(?:关注|扫码|扫描|添加)?(?:微信|公众号)(?:公众号|号)?(?:[:：][ \t]*[A-Za-z0-9_\-]+|[A-Za-z_][A-Za-z0-9_\-]*)?",
            )
            .context("failed to compile wechat promo regex")?,
            promo_web: Regex::new(r"(?i)(?:https?:?|www\.)[A-Za-z0-9_\-.]*")
                .context("failed to compile web promo regex")?,
            promo_download: Regex::new(r"(?:更多|免费|精品)?资料(?:下载|获取)[^\s。]*")
                .context("failed to compile download promo regex")?,
            page_marker: Regex::new(r"(?i)\bp{1,2}[ \t]*\d{1,4}\b")
                .context("failed to compile page marker regex")?,
            page_marker_cn: Regex::new(r"第[ \t]*\d{1,4}[ \t]*页")
                .context("failed to compile chinese page marker regex")?,
            page_marker_dashed: Regex::new(r"(?m)^[ \t]*-[ \t]*\d{1,4}[ \t]*-[ \t]*$")
                .context("failed to compile dashed page marker regex")?,
            garbled_cluster: Regex::new(r"(?:FSFJ|BARROB|ecee)+")
                .context("failed to compile garbled cluster regex")?,
            letter_glued_digits: Regex::new(r"(?m)(?P<lead>^|[^0-9A-Za-z])[A-Za-z]+[0-9]{3,}")
                .context("failed to compile letter-glued digit regex")?,
            line_alone_digits: Regex::new(r"(?m)^[ \t]*\d{3,}[ \t]*$")
                .context("failed to compile standalone digit line regex")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return String::new();
        }

        let mapped = raw
            .chars()
            .map(map_full_width)
            .filter(|character| is_allowed(*character))
            .collect::<String>();

        let stripped = self.strip_noise(&mapped);
        let repaired = repair_ocr_substitutions(&stripped);
        let collapsed = collapse_whitespace(&repaired);
        space_operators(&collapsed)
    }

    fn strip_noise(&self, text: &str) -> String {
        let patterns = [
            &self.promo_wechat,
            &self.promo_web,
            &self.promo_download,
            &self.page_marker,
            &self.page_marker_cn,
            &self.page_marker_dashed,
            &self.garbled_cluster,
            &self.line_alone_digits,
        ];

        let mut current = text.to_string();
        for pattern in patterns {
            current = pattern.replace_all(&current, " ").into_owned();
        }
        // A letter run right after a digit is an OCR misread operator, not an account id.
        self.letter_glued_digits
            .replace_all(&current, "${lead} ")
            .into_owned()
    }
}

fn map_full_width(character: char) -> char {
    match character {
        '０'..='９' => char::from_u32(character as u32 - '０' as u32 + '0' as u32).unwrap_or(character),
        '＋' => '+',
        '－' | '−' => '-',
        '＝' => '=',
        '＜' => '<',
        '＞' => '>',
        '．' => '.',
        '\u{3000}' => ' ',
        _ => character,
    }
}

fn is_allowed(character: char) -> bool {
    is_cjk(character)
        || character.is_alphanumeric()
        || character == '_'
        || character.is_whitespace()
        || ('\u{2460}'..='\u{2469}').contains(&character)
        || ALLOWED_SYMBOLS.contains(character)
}

fn repair_ocr_substitutions(text: &str) -> String {
    let chars = text.chars().collect::<Vec<char>>();
    let mut out = String::with_capacity(text.len());

    for (index, &character) in chars.iter().enumerate() {
        let replacement = match character {
            'O' | 'o' if digit_directly_around(&chars, index) => '0',
            'l' | 'I' if digit_directly_around(&chars, index) => '1',
            'x' | 'X' if digit_around_skipping_spaces(&chars, index) => '×',
            _ => character,
        };
        out.push(replacement);
    }

    let mut repaired = out;
    for (misread, unit) in UNIT_MISREADS {
        repaired = repaired.replace(misread, unit);
    }
    repaired
}

fn digit_directly_around(chars: &[char], index: usize) -> bool {
    let before = index
        .checked_sub(1)
        .and_then(|previous| chars.get(previous))
        .is_some_and(|value| value.is_ascii_digit());
    let after = chars
        .get(index + 1)
        .is_some_and(|value| value.is_ascii_digit());
    before && after
}

fn digit_around_skipping_spaces(chars: &[char], index: usize) -> bool {
    let before = chars[..index]
        .iter()
        .rev()
        .find(|value| **value != ' ' && **value != '\t')
        .is_some_and(|value| value.is_ascii_digit());
    let after = chars[index + 1..]
        .iter()
        .find(|value| **value != ' ' && **value != '\t')
        .is_some_and(|value| value.is_ascii_digit());
    before && after
}

/// Puts exactly one space on each side of an operator sitting between two
/// digits. Expects whitespace already collapsed.
fn space_operators(text: &str) -> String {
    let chars = text.chars().collect::<Vec<char>>();
    let mut out = String::with_capacity(text.len() + 8);
    let mut skip_spaces = false;

    for (index, &character) in chars.iter().enumerate() {
        if character == ' ' {
            if skip_spaces {
                continue;
            }
            out.push(character);
            continue;
        }

        if SPACED_OPERATORS.contains(character) && digit_around_skipping_spaces(&chars, index) {
            while out.ends_with(' ') {
                out.pop();
            }
            out.push(' ');
            out.push(character);
            out.push(' ');
            skip_spaces = true;
            continue;
        }

        skip_spaces = false;
        out.push(character);
    }

    out.trim().to_string()
}
