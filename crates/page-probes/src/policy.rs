use serde::{Deserialize, Serialize};

/// Keyword lists and selectors the probes match page content against.
///
/// Keywords are compared against lowercased page text, so they are stored
/// lowercase; [`ProbePolicy::normalized`] enforces that for values loaded
/// from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbePolicy {
    /// Fragments identifying the invite input by placeholder, name, id,
    /// aria-label, data-placeholder or label text.
    pub input_keywords: Vec<String>,
    /// Fragments identifying the submit control next to the input.
    pub button_keywords: Vec<String>,
    /// Checked first after a submission.
    pub failure_keywords: Vec<String>,
    pub success_keywords: Vec<String>,
    /// Regions whose text is preferred over the whole body when classifying.
    pub error_region_selectors: Vec<String>,
    pub disconnect_keywords: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            input_keywords: owned(&[
                "invite",
                "邀请码",
                "invitation",
                "access code",
                "accesscode",
                "access-code",
                "code",
            ]),
            button_keywords: owned(&[
                "继续", "确认", "提交", "兑换", "完成", "continue", "submit", "apply", "redeem",
                "unlock", "access", "enter", "next",
            ]),
            failure_keywords: owned(&[
                "无效",
                "错误",
                "失败",
                "已使用",
                "invalid",
                "incorrect",
                "try again",
                "error",
                "not recognized",
                "not valid",
                "expired",
            ]),
            success_keywords: owned(&[
                "欢迎",
                "成功",
                "开始创作",
                "create",
                "access granted",
                "you now have access",
                "enjoy",
            ]),
            error_region_selectors: owned(&[
                "[role=\"alert\"]",
                ".text-destructive",
                ".text-error",
                ".text-red-500",
                ".error",
                ".error-message",
            ]),
            disconnect_keywords: owned(&["断开", "disconnected", "connection lost"]),
        }
    }
}

impl ProbePolicy {
    /// Lowercase every keyword list.
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.input_keywords,
            &mut self.button_keywords,
            &mut self.failure_keywords,
            &mut self.success_keywords,
            &mut self.disconnect_keywords,
        ] {
            for keyword in list.iter_mut() {
                *keyword = keyword.to_lowercase();
            }
        }
        self
    }
}

/// First keyword contained in `lowered`, which must already be lowercase.
pub(crate) fn first_match<'a>(lowered: &str, keywords: &'a [String]) -> Option<&'a str> {
    keywords
        .iter()
        .map(String::as_str)
        .find(|keyword| !keyword.is_empty() && lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let policy: ProbePolicy =
            serde_json::from_str(r#"{"success_keywords":["Welcome Aboard"]}"#).unwrap();
        let policy = policy.normalized();
        assert_eq!(policy.success_keywords, vec!["welcome aboard"]);
        assert_eq!(policy.failure_keywords, ProbePolicy::default().failure_keywords);
    }

    #[test]
    fn first_match_follows_list_order() {
        let keywords = owned(&["error", "invalid"]);
        assert_eq!(first_match("invalid code, error 42", &keywords), Some("error"));
        assert_eq!(first_match("all good", &keywords), None);
    }
}
