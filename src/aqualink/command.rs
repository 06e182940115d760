// コントローラーからPDAへのコマンド
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Probe,             // 0x00 プローブ
    Poll,              // 0x02 ステータス/キープアライブ
    WriteLine,         // 0x04 1行書き込み
    Handshake,         // 0x05 初期ハンドシェイク
    InvertLine,        // 0x08 1行反転表示
    ClearScreen,       // 0x09 画面消去
    Scroll,            // 0x0f スクロール
    InvertChars,       // 0x10 行の一部を反転表示
    Boot,              // 0x1b 起動時の電文
    Unknown(u8),       // 未知のコマンド
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Self::Probe => 0x00,
            Self::Poll => 0x02,
            Self::WriteLine => 0x04,
            Self::Handshake => 0x05,
            Self::InvertLine => 0x08,
            Self::ClearScreen => 0x09,
            Self::Scroll => 0x0f,
            Self::InvertChars => 0x10,
            Self::Boot => 0x1b,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Probe,
            0x02 => Self::Poll,
            0x04 => Self::WriteLine,
            0x05 => Self::Handshake,
            0x08 => Self::InvertLine,
            0x09 => Self::ClearScreen,
            0x0f => Self::Scroll,
            0x10 => Self::InvertChars,
            0x1b => Self::Boot,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN(0x{:02X})", code),
            other => write!(f, "{:?}(0x{:02X})", other, other.code()),
        }
    }
}

#[test]
fn test1() {
    for code in 0..=u8::MAX {
        assert_eq!(Command::from(code).code(), code);
    }
    assert_eq!(Command::from(0x0f), Command::Scroll);
    assert_eq!(Command::from(0x03), Command::Unknown(0x03));
    assert_eq!(Command::Poll.to_string(), "Poll(0x02)");
}
