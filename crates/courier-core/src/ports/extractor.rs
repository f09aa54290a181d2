//! Extractor port - 本文からの検証情報抽出
//!
//! LLM 呼び出し自体は黒箱（外部協力者）。core は
//! `Extract(content) -> ExtractionResult` という形しか知らない。

use async_trait::async_trait;

use crate::domain::{CourierError, ExtractionResult};

/// Extractor はメール本文から検証コード/リンクを抽出
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, content: &str) -> Result<ExtractionResult, CourierError>;
}
