// 受信バイト列からフレームを切り出す
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::frame::{self, DLE, ETX, FRAME_START, Frame, NUL, STX};
use thiserror::Error;

/// 開始マーカーを含む電文の最大長
pub const MAX_FRAME_LENGTH: usize = 128;

/// 再同期の理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("bad checksum (received {received:02X}, computed {computed:02X}) raw={}", frame::hex_dump(.raw))]
    ChecksumMismatch {
        received: u8,
        computed: u8,
        raw: Vec<u8>,
    },
    #[error("frame exceeds 128 bytes without end marker")]
    Overlong,
    #[error("frame too short ({len} bytes)")]
    TooShort { len: usize },
    #[error("start marker inside frame, {discarded} bytes discarded")]
    Restarted { discarded: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    // 開始マーカー(DLE STX)を探している
    Hunting { dle: bool },
    // 終了マーカー(DLE ETX)まで蓄積している
    Receiving { dle: bool },
}

/// フレームデコーダー
///
/// バイト単位で与えて、フレームが完成するか再同期が必要になったときに結果を返す。
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    // DEST から CHECKSUM までのエスケープ解除済みバイト列
    body: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            state: State::Hunting { dle: false },
            body: Vec::with_capacity(MAX_FRAME_LENGTH),
        }
    }

    /// 1バイト与える
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        match self.state {
            State::Hunting { dle } => {
                self.state = match byte {
                    STX if dle => {
                        self.body.clear();
                        State::Receiving { dle: false }
                    }
                    DLE => State::Hunting { dle: true },
                    // フレーム間のNULやゴミは読み捨てる
                    _ => State::Hunting { dle: false },
                };
                None
            }
            State::Receiving { dle: true } => match byte {
                // DLE NUL はデータとしてのDLE
                NUL => {
                    self.state = State::Receiving { dle: false };
                    self.accumulate(DLE)
                }
                ETX => {
                    self.state = State::Hunting { dle: false };
                    Some(self.finish())
                }
                STX => {
                    // 終了マーカーが来ないまま次の電文が始まった
                    let discarded = self.body.len();
                    self.body.clear();
                    self.state = State::Receiving { dle: false };
                    Some(Err(FrameError::Restarted { discarded }))
                }
                // スタッフィングされていないDLEはデータとして扱う
                DLE => self.accumulate(DLE),
                other => {
                    self.state = State::Receiving { dle: false };
                    self.accumulate(DLE).or_else(|| self.accumulate(other))
                }
            },
            State::Receiving { dle: false } => match byte {
                DLE => {
                    self.state = State::Receiving { dle: true };
                    None
                }
                other => self.accumulate(other),
            },
        }
    }

    /// まとめて与える
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Frame, FrameError>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    fn accumulate(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        self.body.push(byte);
        if FRAME_START.len() + self.body.len() > MAX_FRAME_LENGTH {
            // 長すぎる電文は破棄して開始マーカーを探し直す
            self.body.clear();
            self.state = State::Hunting { dle: false };
            return Some(Err(FrameError::Overlong));
        }
        None
    }

    fn finish(&mut self) -> Result<Frame, FrameError> {
        let body = std::mem::take(&mut self.body);
        match body.as_slice() {
            [destination, command, payload @ .., received] => {
                let frame = Frame::new(*destination, *command, payload);
                let computed = frame.checksum();
                if computed == *received {
                    Ok(frame)
                } else {
                    Err(FrameError::ChecksumMismatch {
                        received: *received,
                        computed,
                        raw: body.clone(),
                    })
                }
            }
            _ => Err(FrameError::TooShort {
                len: FRAME_START.len() + body.len(),
            }),
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// バイト列から最初に得られる結果を返す
pub fn decode(data: &[u8]) -> Option<Result<Frame, FrameError>> {
    let mut decoder = FrameDecoder::new();
    data.iter().find_map(|&b| decoder.push(b))
}

#[test]
fn test1() {
    // 往復
    for (dest, cmd, payload) in [
        (0x60u8, 0x02u8, vec![]),
        (0x60, 0x04, b"\x01POOL MODE    ON\x00".to_vec()),
        (0x00, 0x01, vec![0x40, 0x04]),
        (0x60, 0x0f, vec![0x01, 0x08, 0xff]),
    ] {
        let frame = Frame::new(dest, cmd, &payload);
        assert_eq!(decode(&frame.encode()), Some(Ok(frame)));
    }
}

#[test]
fn test2() {
    // エスケープされたDLEを含むペイロード
    let frame = Frame::new(0x60, 0x10, &[0x03, DLE, 0x0c]);
    let wire = frame.encode();
    assert!(wire.windows(2).any(|w| w == [DLE, NUL]));
    let decoded = decode(&wire).unwrap().unwrap();
    assert_eq!(decoded.payload, vec![0x03, DLE, 0x0c]);
}

#[test]
fn test3() {
    // ペイロードを1バイト壊すとチェックサム不一致になる
    let frame = Frame::new(0x60, 0x04, b"\x03EQUIPMENT");
    let mut wire = frame.encode();
    wire[6] ^= 0x20;
    assert!(matches!(
        decode(&wire),
        Some(Err(FrameError::ChecksumMismatch { .. }))
    ));
}

#[test]
fn test4() {
    // 前置のゴミとNULを読み捨てて、チェックサム不一致の後も続けて受信できる
    let good = Frame::new(0x60, 0x09, &[]);
    let mut bad = Frame::new(0x60, 0x02, &[]).encode();
    let n = bad.len();
    bad[n - 3] = bad[n - 3].wrapping_add(1);
    let mut data = vec![0x00, 0x00, 0xff, 0x42, 0x03];
    data.extend_from_slice(&bad);
    data.extend_from_slice(&[0x00, 0x00]);
    data.extend_from_slice(&good.encode());

    let mut decoder = FrameDecoder::new();
    let results = decoder.feed(&data);
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(FrameError::ChecksumMismatch { .. })));
    assert_eq!(results[1], Ok(good));
}

#[test]
fn test5() {
    // 終了マーカーの無い長い電文は強制的に再同期する
    let mut data = vec![DLE, STX];
    data.extend(std::iter::repeat_n(0x41u8, 200));
    let next = Frame::new(0x60, 0x00, &[]);
    data.extend_from_slice(&next.encode());

    let mut decoder = FrameDecoder::new();
    let results = decoder.feed(&data);
    assert_eq!(results, vec![Err(FrameError::Overlong), Ok(next)]);
}

#[test]
fn test6() {
    // 分割して届いても組み立てられる
    let frame = Frame::new(0x60, 0x08, &[0x05]);
    let wire = frame.encode();
    let mut decoder = FrameDecoder::new();
    assert!(decoder.feed(&wire[..3]).is_empty());
    assert_eq!(decoder.feed(&wire[3..]), vec![Ok(frame)]);
}

#[test]
fn test7() {
    // 途中で開始マーカーが現れた場合は新しい電文として受信し直す
    let frame = Frame::new(0x60, 0x02, &[]);
    let mut data = vec![DLE, STX, 0x60, 0x04];
    data.extend_from_slice(&frame.encode());
    let mut decoder = FrameDecoder::new();
    assert_eq!(
        decoder.feed(&data),
        vec![Err(FrameError::Restarted { discarded: 2 }), Ok(frame)]
    );
}

#[test]
fn test8() {
    // 短すぎる電文
    assert_eq!(
        decode(&[DLE, STX, 0x60, DLE, ETX]),
        Some(Err(FrameError::TooShort { len: 3 }))
    );
}
