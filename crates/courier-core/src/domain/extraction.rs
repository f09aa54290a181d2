//! Extraction result model: what the extractor found in a mail body.
//!
//! This module is extractor-agnostic: it does not assume an LLM, a regex,
//! or anything else. It only defines the "shape" of results the matching
//! engine can act on.

use serde::{Deserialize, Serialize};

/// 抽出された値の種別
///
/// webhook payload の `type` フィールドにそのまま載るため
/// snake_case でシリアライズする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    Code,
    Link,
    Unknown,
}

impl ExtractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionKind::Code => "code",
            ExtractionKind::Link => "link",
            ExtractionKind::Unknown => "unknown",
        }
    }

    /// 保存済みの値から種別を推定（http(s) で始まるなら link）
    pub fn infer(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            ExtractionKind::Link
        } else {
            ExtractionKind::Code
        }
    }
}

/// Extractor の出力
///
/// code と link が両方ある場合は code を優先し、link は backup_link に回る。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub kind: ExtractionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_link: Option<String>,

    /// 抽出の確信度 (0.0-1.0)。黒箱の extractor がそのまま埋める。
    #[serde(default)]
    pub confidence: f64,
}

impl ExtractionResult {
    /// 何も取れなかったことを表す結果
    pub fn unknown() -> Self {
        Self {
            kind: ExtractionKind::Unknown,
            code: None,
            link: None,
            backup_link: None,
            confidence: 0.0,
        }
    }

    pub fn code(code: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind: ExtractionKind::Code,
            code: Some(code.into()),
            link: None,
            backup_link: None,
            confidence,
        }
    }

    pub fn link(link: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind: ExtractionKind::Link,
            code: None,
            link: Some(link.into()),
            backup_link: None,
            confidence,
        }
    }

    /// 使える値が取れたか（kind が unknown でなく、code か link がある）
    pub fn is_successful(&self) -> bool {
        self.kind != ExtractionKind::Unknown && (self.code.is_some() || self.link.is_some())
    }

    /// 取れた値（code 優先、なければ link）
    pub fn value(&self) -> Option<&str> {
        self.code.as_deref().or(self.link.as_deref())
    }
}
