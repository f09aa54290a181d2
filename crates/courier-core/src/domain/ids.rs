//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! ID には ULID (Universally Unique Lexicographically Sortable Identifier)
//! を使用します。Phantom type パターンで共通実装を一つにまとめています。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 調整なしで複数プロセスから生成できる
//! - **UUID互換**: 128-bit で UUID と同じサイズ
//!
//! ## なぜ Phantom Type か
//! - `MailboxId` と `WaitRequestId` はコンパイル時に混同できない
//! - 実装は `Id<T>` ひとつだけ（重複なし）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"mbx-", "wait-", "mail-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "mbx-", "wait-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// MailboxLease のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mailbox {}

impl IdMarker for Mailbox {
    fn prefix() -> &'static str {
        "mbx-"
    }
}

/// WaitRequest のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Wait {}

impl IdMarker for Wait {
    fn prefix() -> &'static str {
        "wait-"
    }
}

/// Email のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mail {}

impl IdMarker for Mail {
    fn prefix() -> &'static str {
        "mail-"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of a MailboxLease (one pollable inbox).
pub type MailboxId = Id<Mailbox>;

/// Identifier of a WaitRequest (one consumer's outstanding wait).
pub type WaitRequestId = Id<Wait>;

/// Identifier of an Email (one stored message).
pub type EmailId = Id<Mail>;
