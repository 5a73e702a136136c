//! User-facing strings.

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Display language for user-facing messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ko,
}

impl Locale {
    /// Parse a locale tag such as `ko` or `en-US`. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Self::En),
            "ko" => Some(Self::Ko),
            _ => None,
        }
    }

    /// Message shown when a scan ends in `kind`.
    pub fn failure_message(self, kind: FailureKind) -> &'static str {
        match (self, kind) {
            (Self::En, FailureKind::Unconfigured) => {
                "No API key is configured, so the image cannot be processed."
            }
            (Self::En, FailureKind::EmptyResult) => "Failed to extract text from the image.",
            (Self::En, FailureKind::Unauthorized) => {
                "The API key is invalid. Please select a new key."
            }
            (Self::En, FailureKind::Generic) => {
                "An error occurred while processing the receipt. Please try again."
            }
            (Self::Ko, FailureKind::Unconfigured) => {
                "API 키가 설정되지 않아 이미지를 처리할 수 없습니다."
            }
            (Self::Ko, FailureKind::EmptyResult) => "이미지에서 텍스트를 추출하는 데 실패했습니다.",
            (Self::Ko, FailureKind::Unauthorized) => {
                "API 키가 잘못되었습니다. 새 키를 선택해 주세요."
            }
            (Self::Ko, FailureKind::Generic) => {
                "영수증 처리 중 오류가 발생했습니다. 다시 시도해 주세요."
            }
        }
    }

    /// Shown while a request is in flight.
    pub fn analyzing(self) -> &'static str {
        match self {
            Self::En => "Analyzing receipt...",
            Self::Ko => "영수증 분석 중...",
        }
    }

    /// Placeholder summary for a record without readable lines.
    pub fn no_extracted_text(self) -> &'static str {
        match self {
            Self::En => "No extracted text",
            Self::Ko => "추출된 텍스트 없음",
        }
    }

    /// Title of the empty history view.
    pub fn history_empty(self) -> &'static str {
        match self {
            Self::En => "No scan history yet",
            Self::Ko => "스캔 기록이 없습니다",
        }
    }

    /// Confirmation after a copy to the clipboard.
    pub fn copied(self) -> &'static str {
        match self {
            Self::En => "Copied!",
            Self::Ko => "복사 완료!",
        }
    }
}
