use action_locator::ElementDescriptor;
use page_probes::ProbePolicy;
use relay_core_types::SiteTarget;
use serde::{Deserialize, Serialize};

use crate::timings::RelayTimings;

/// Site-specific policy of a relay: where to go, what to click, what to
/// look for, and how long to wait.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayProfile {
    /// Site issuing codes
    pub source: SiteTarget,
    /// Site consuming codes
    pub target: SiteTarget,
    /// Control that generates a new code
    pub fetch_button: ElementDescriptor,
    /// Control that copies the generated code
    pub copy_button: ElementDescriptor,
    /// Control that discards a rejected code
    pub mark_invalid_button: ElementDescriptor,
    pub probes: ProbePolicy,
    pub timings: RelayTimings,
}

impl Default for RelayProfile {
    fn default() -> Self {
        Self {
            source: SiteTarget::new("https://formbiz.biz/")
                .with_pattern("https://formbiz.biz/*")
                .with_pattern("https://www.formbiz.biz/*"),
            target: SiteTarget::new("https://sora.chatgpt.com/explore")
                .with_pattern("https://sora.chatgpt.com/*"),
            fetch_button: ElementDescriptor::new()
                .selector("button[data-role=\"generate-code\"]")
                .selector("button.generate-code")
                .path("/html/body/div[2]/div[2]/div/div[1]/section[1]/div/div/div[3]/button")
                .keyword("获取")
                .keyword("刷新")
                .keyword("generate")
                .keyword("new code")
                .keyword("立即获取")
                .keyword("click"),
            copy_button: ElementDescriptor::new()
                .selector("button[data-role=\"copy-code\"]")
                .selector("button.copy-code")
                .selector("button.copy-btn")
                .path("/html/body/div[2]/div[2]/div/div[1]/section[1]/div/div[2]/button")
                .keyword("复制")
                .keyword("copy")
                .keyword("获取邀请码")
                .keyword("领取")
                .keyword("copy code"),
            mark_invalid_button: ElementDescriptor::new()
                .selector("button[data-role=\"next-code\"]")
                .selector("button.next-code")
                .path("/html/body/div[2]/div[2]/div/div[1]/section[1]/div/div[2]/div/button[2]")
                .keyword("无效")
                .keyword("下一")
                .keyword("下一个")
                .keyword("继续")
                .keyword("失败")
                .keyword("next")
                .keyword("another"),
            probes: ProbePolicy::default(),
            timings: RelayTimings::default(),
        }
    }
}

impl RelayProfile {
    /// Lowercase configured keywords.
    pub fn normalized(mut self) -> Self {
        self.probes = self.probes.normalized();
        self
    }
}
