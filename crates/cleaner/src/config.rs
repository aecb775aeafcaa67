//! Cleaner configuration
//!
//! Everything here is load-time data. The defaults are the built-in RUTUBE
//! lists; a JSON file may override any field, missing fields keep their
//! defaults.

use dom::Fragment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CleanerError, Result};
use crate::rules::{HrefScope, Rule};

/// Elements removed by their exact trimmed text
const EXACT_TEXTS: &[&str] = &[
    "Оформить подписку",
    "Безопасный режим",
    "RUTUBE x PREMIER",
    "RUTUBE x START",
    "RUTUBE всегда с вами",
    "Больше от Rutube",
    "Больше от RUTUBE",
    "RUTUBE детям",
    "RUTUBE Детям",
    "RUTUBE Спорт",
    "RUTUBE спорт",
    "Rutube в других соцсетях",
    "RUTUBE в других соцсетях",
    "Вопросы и ответы",
    "Сообщить о проблеме",
    "Написать в поддержку",
    "help@rutube.ru",
    "О RUTUBE",
    "О Rutube",
    "Направления деятельности",
    "Пользовательское соглашение",
    "Конфиденциальность",
    "Правовая информация",
    "Рекомендательная система",
    "Фирменный стиль",
];

/// Link destinations removed anywhere on the page
const HREF_PATTERNS: &[&str] = &[
    "/info/about",
    "/info/activity",
    "/info/agreement",
    "/info/privacy",
    "/info/legal",
    "/info/recommendatory",
    "/info/brandbook",
    "/info/faq",
    "/info/report",
    "/info/support",
    "help@rutube.ru",
    "premier.one",
    "start.ru",
    "apps.apple.com",
    "play.google.com",
    "appgallery.huawei.com",
    "apps.rustore.ru",
    "nashstore.ru",
    // Social profiles share the global rules: menu-immune and block-removed
    "vk.com/rutube",
    "t.me/rutube",
    "ok.ru/rutube",
    "dzen.ru/rutube",
    "tiktok.com/@rutube",
];

/// Link destinations removed only inside the footer; the side menu keeps them
const FOOTER_HREF_PATTERNS: &[&str] = &["/apps", "smarttv", "/kids", "/sport"];

const SELECTORS: &[&str] = &[
    ".premium-subscription-entrypoint-module__premium-entrypoint",
    ".safe-mode-header-entrypoint-module__entrypoint",
    "[class*=\"app-banner\"]",
    "[class*=\"app-download\"]",
    "[class*=\"apps-module\"]",
    "[class*=\"mobile-app\"]",
    "[class*=\"download-app\"]",
    "[class*=\"footer-module\"]",
    "[class*=\"wdp-footer\"]",
    "[class*=\"bottom-footer\"]",
];

/// Class-attribute patterns that describe the site's layout
///
/// All are case-insensitive regular expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutPatterns {
    /// Side-menu region
    pub menu: String,
    /// Navigation links and items
    pub navigation: String,
    /// Footer and bottom regions
    pub footer: String,
    /// List-item containers inside the menu
    pub list_item: String,
    /// Info wrappers inside the menu
    pub menu_info: String,
    /// Layout containers that block ascent must never delete
    pub stop: String,
    /// Decorative containers that are deleted together with their content
    pub content_block: String,
    /// Containers likely to hold the copyright line
    pub copyright_hint: String,
}

impl Default for LayoutPatterns {
    fn default() -> Self {
        Self {
            menu: "menu-content|wdp-mobile-menu|sidebar-module|menu-module".to_string(),
            navigation: "nav-?link|nav-?item|navigation".to_string(),
            footer: "footer|bottom-content|bottom-bar".to_string(),
            list_item: "list-item|menu-item".to_string(),
            menu_info: "menu-info|info-wrapper".to_string(),
            stop: "menu-content|application-module|wdp-mobile-menu|sidebar|main-content"
                .to_string(),
            content_block: "footer|section|block|card|banner|widget|group|entry-?point"
                .to_string(),
            copyright_hint: "copyright|footer".to_string(),
        }
    }
}

/// Re-scan timings, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sweeps after the idle hook, to catch late client-side rendering
    pub startup_delays_ms: Vec<u64>,
    /// Quiet period after the last mutation before a sweep
    pub debounce_ms: u64,
    /// Settle delay after a client-side navigation
    pub navigation_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_delays_ms: vec![1500, 3000, 5000],
            debounce_ms: 500,
            navigation_settle_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn startup_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.startup_delays_ms.iter().copied().map(Duration::from_millis)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Hosts the cleaner runs on; `*.example.com` covers subdomains
    pub match_hosts: Vec<String>,
    pub exact_texts: Vec<String>,
    pub href_patterns: Vec<String>,
    pub footer_href_patterns: Vec<String>,
    pub selectors: Vec<String>,
    /// Matched against lower-cased image `src` and `alt`
    pub image_pattern: String,
    /// Matched against a leaf node's trimmed text
    pub copyright_pattern: String,
    pub copyright_replacement: Vec<Fragment>,
    pub layout: LayoutPatterns,
    pub timing: TimingConfig,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            match_hosts: owned(&["rutube.ru", "*.rutube.ru"]),
            exact_texts: owned(EXACT_TEXTS),
            href_patterns: owned(HREF_PATTERNS),
            footer_href_patterns: owned(FOOTER_HREF_PATTERNS),
            selectors: owned(SELECTORS),
            image_pattern:
                "app[- ]?store|google[- ]?play|rustore|huawei|appgallery|nashstore|скачать"
                    .to_string(),
            copyright_pattern: r"^©\s*\d{4},?\s*RUTUBE$".to_string(),
            copyright_replacement: vec![
                Fragment::text("© 2026, RUTUBE edit by "),
                Fragment::element("a")
                    .with_attr("href", "https://github.com/dah9l")
                    .with_attr("target", "_blank")
                    .with_attr("rel", "noopener noreferrer")
                    .with_attr("style", "color: #00A1E7; text-decoration: underline;")
                    .with_text("dah9"),
            ],
            layout: LayoutPatterns::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl CleanerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Structural checks regex compilation cannot catch
    pub fn validate(&self) -> Result<()> {
        if self.timing.debounce_ms == 0 {
            return Err(CleanerError::Config(
                "timing.debounce_ms must be positive".to_string(),
            ));
        }
        if self.href_patterns.iter().chain(&self.footer_href_patterns).any(String::is_empty) {
            return Err(CleanerError::Config(
                "empty href pattern would match every link".to_string(),
            ));
        }
        Ok(())
    }

    /// The rule model this configuration describes
    pub fn rules(&self) -> Vec<Rule> {
        let texts = self.exact_texts.iter().cloned().map(Rule::ExactText);
        let global = self.href_patterns.iter().map(|pattern| Rule::HrefPattern {
            pattern: pattern.clone(),
            scope: HrefScope::Global,
        });
        let footer = self.footer_href_patterns.iter().map(|pattern| Rule::HrefPattern {
            pattern: pattern.clone(),
            scope: HrefScope::FooterOnly,
        });
        let selectors = self.selectors.iter().cloned().map(Rule::StructuralSelector);
        let image = std::iter::once(Rule::ImageSourcePattern(self.image_pattern.clone()));

        texts
            .chain(global)
            .chain(footer)
            .chain(selectors)
            .chain(image)
            .collect()
    }

    /// Whether a page URL falls under `match_hosts`
    pub fn applies_to(&self, url: &str) -> bool {
        let parsed = match url::Url::parse(url) {
            Ok(p) => p,
            Err(_) => return false,
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        let host = match parsed.host_str() {
            Some(h) => h,
            None => return false,
        };
        self.match_hosts
            .iter()
            .any(|pattern| Self::matches_host(host, pattern))
    }

    fn matches_host(host: &str, pattern: &str) -> bool {
        // Handle *.example.com pattern
        if let Some(domain) = pattern.strip_prefix("*.") {
            return host.ends_with(&format!(".{}", domain));
        }
        host == pattern || host.strip_prefix("www.") == Some(pattern)
    }
}
