//! Calendar event titles rendered from an event type's template.
//!
//! Placeholders are `{name}` style tokens; each has a Japanese spelling and
//! a legacy English alias. Rendering is a single left-to-right pass, so a
//! substituted value is never scanned for further placeholders.

use chrono::{DateTime, Utc};

use crate::tz;

pub const DEFAULT_TITLE_TEMPLATE: &str = "{イベント名} - {名前}";

const NOTE_PREVIEW_CHARS: usize = 50;

/// Values available to a title template
#[derive(Debug, Clone)]
pub struct TitleContext<'a> {
    pub requester_name: &'a str,
    pub requester_email: &'a str,
    pub company_name: Option<&'a str>,
    pub event_title: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub note: &'a str,
}

impl TitleContext<'_> {
    fn value(&self, placeholder: &str) -> Option<String> {
        let value = match placeholder {
            "名前" | "name" => self.requester_name.to_string(),
            "メール" | "email" => self.requester_email.to_string(),
            "会社名" | "company" => self.company_name.unwrap_or_default().to_string(),
            "イベント名" | "title" => self.event_title.to_string(),
            "日付" | "date" => tz::format_date(self.start),
            "時間" | "time" => format!(
                "{}-{}",
                tz::format_time(self.start),
                tz::format_time(self.end)
            ),
            "メモ" | "note" => self.note.chars().take(NOTE_PREVIEW_CHARS).collect(),
            _ => return None,
        };
        Some(value)
    }
}

/// Render `template` against `ctx`. Unknown placeholders are kept verbatim;
/// a blank template falls back to [`DEFAULT_TITLE_TEMPLATE`].
pub fn render(template: &str, ctx: &TitleContext<'_>) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_TITLE_TEMPLATE
    } else {
        template
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let key = &after[..close];
                match ctx.value(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            // A nested '{' means this one is literal; resume from the next
            Some(close) => {
                out.push('{');
                out.push_str(&after[..close]);
                rest = &after[close..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(note: &'a str, name: &'a str) -> TitleContext<'a> {
        TitleContext {
            requester_name: name,
            requester_email: "taro@example.com",
            company_name: Some("Example株式会社"),
            event_title: "初回相談",
            start: DateTime::parse_from_rfc3339("2026-10-20T01:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            end: DateTime::parse_from_rfc3339("2026-10-20T01:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            note,
        }
    }

    #[test]
    fn test_default_template() {
        assert_eq!(render("", &ctx("n", "山田太郎")), "初回相談 - 山田太郎");
        assert_eq!(render("   ", &ctx("n", "山田太郎")), "初回相談 - 山田太郎");
    }

    #[test]
    fn test_japanese_and_english_placeholders() {
        let c = ctx("よろしくお願いします", "山田太郎");
        assert_eq!(
            render("{会社名}/{名前} <{メール}> {日付} {時間} {メモ}", &c),
            "Example株式会社/山田太郎 <taro@example.com> 2026/10/20 10:00-10:30 よろしくお願いします"
        );
        assert_eq!(
            render("{title}: {name} ({company}) {date} {time}", &c),
            "初回相談: 山田太郎 (Example株式会社) 2026/10/20 10:00-10:30"
        );
    }

    #[test]
    fn test_note_is_truncated_by_characters() {
        let note = "あ".repeat(80);
        let rendered = render("{メモ}", &ctx(&note, "x"));
        assert_eq!(rendered.chars().count(), 50);
    }

    #[test]
    fn test_unknown_and_unbalanced_braces_kept() {
        let c = ctx("n", "Taro");
        assert_eq!(render("{unknown} {name}", &c), "{unknown} Taro");
        assert_eq!(render("{{name}}", &c), "{Taro}");
        assert_eq!(render("open { only", &c), "open { only");
        assert_eq!(render("}{name}{", &c), "}Taro{");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let c = ctx("{name}", "{メール}");
        assert_eq!(render("{名前} / {メモ}", &c), "{メール} / {name}");
    }
}
